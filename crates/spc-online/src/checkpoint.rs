// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::incremental::SeriesCheckpoint;
use crate::segmenter::SegmenterState;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use spc_core::SpcError;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current checkpoint schema version emitted by writers.
pub const CURRENT_CHECKPOINT_SCHEMA_VERSION: u32 = 1;
/// Oldest checkpoint schema version readers still accept.
pub const MIN_SUPPORTED_CHECKPOINT_SCHEMA_VERSION: u32 = 1;

/// Payload kind for a full [`SeriesCheckpoint`].
pub const SERIES_CHECKPOINT_KIND: &str = "series_checkpoint";
/// Payload kind for a bare [`SegmenterState`].
pub const SEGMENTER_STATE_KIND: &str = "segmenter_state";

/// Serialized checkpoint with integrity and compatibility metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEnvelope {
    pub kind: String,
    pub state_schema_version: u32,
    pub engine_fingerprint: String,
    pub created_at_ns: i64,
    pub payload_crc32: u32,
    /// JSON-encoded payload.
    pub payload: String,
}

impl CheckpointEnvelope {
    fn validate_metadata(&self) -> Result<(), SpcError> {
        if self.kind.trim().is_empty() {
            return Err(SpcError::invalid_input("checkpoint kind must be non-empty"));
        }
        if self.engine_fingerprint.trim().is_empty() {
            return Err(SpcError::invalid_input(
                "checkpoint engine_fingerprint must be non-empty",
            ));
        }
        if self.created_at_ns < 0 {
            return Err(SpcError::invalid_input(format!(
                "checkpoint created_at_ns must be >= 0; got {}",
                self.created_at_ns
            )));
        }
        validate_checkpoint_state_schema_version(self.state_schema_version)
    }

    fn verify_payload_crc32(&self) -> Result<(), SpcError> {
        let observed = crc32fast::hash(self.payload.as_bytes());
        if observed != self.payload_crc32 {
            return Err(SpcError::invalid_input(format!(
                "checkpoint payload crc32 mismatch: expected=0x{:08x}, observed=0x{:08x}",
                self.payload_crc32, observed
            )));
        }
        Ok(())
    }
}

fn engine_fingerprint() -> String {
    format!(
        "spc-online/{}/{}-{}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

fn now_unix_ns() -> Result<i64, SpcError> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| {
            SpcError::invalid_input(format!(
                "system clock before UNIX epoch; cannot timestamp checkpoint: {err}"
            ))
        })?;
    i64::try_from(elapsed.as_nanos())
        .map_err(|_| SpcError::invalid_input("system timestamp overflow while checkpointing"))
}

fn io_error(action: &str, path: &Path, err: std::io::Error) -> SpcError {
    SpcError::invalid_input(format!("{action} '{}': {err}", path.display()))
}

fn write_file_atomic(path: &Path, encoded: &[u8]) -> Result<(), SpcError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            SpcError::invalid_input(format!(
                "checkpoint path '{}' must include a file name",
                path.display()
            ))
        })?;

    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    let temp_path = parent.join(format!("{file_name}.tmp-{}-{suffix}", process::id()));

    let mut file = OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&temp_path)
        .map_err(|err| io_error("failed creating checkpoint temp file", &temp_path, err))?;

    let written = file
        .write_all(encoded)
        .and_then(|()| file.sync_all())
        .and_then(|()| std::fs::rename(&temp_path, path));
    if let Err(err) = written {
        let _ = std::fs::remove_file(&temp_path);
        return Err(io_error("failed writing checkpoint", path, err));
    }
    Ok(())
}

/// Rejects schema versions outside the supported read window.
pub fn validate_checkpoint_state_schema_version(state_schema_version: u32) -> Result<(), SpcError> {
    if (MIN_SUPPORTED_CHECKPOINT_SCHEMA_VERSION..=CURRENT_CHECKPOINT_SCHEMA_VERSION)
        .contains(&state_schema_version)
    {
        return Ok(());
    }
    Err(SpcError::invalid_input(format!(
        "checkpoint state_schema_version={state_schema_version} is unsupported; supported versions are {MIN_SUPPORTED_CHECKPOINT_SCHEMA_VERSION}..={CURRENT_CHECKPOINT_SCHEMA_VERSION}"
    )))
}

pub fn encode_checkpoint_envelope(envelope: &CheckpointEnvelope) -> Result<Vec<u8>, SpcError> {
    envelope.validate_metadata()?;
    envelope.verify_payload_crc32()?;
    serde_json::to_vec(envelope).map_err(|err| {
        SpcError::invalid_input(format!("checkpoint envelope serialization failed: {err}"))
    })
}

pub fn decode_checkpoint_envelope(encoded: &[u8]) -> Result<CheckpointEnvelope, SpcError> {
    let envelope: CheckpointEnvelope = serde_json::from_slice(encoded).map_err(|err| {
        SpcError::invalid_input(format!("checkpoint envelope JSON parse failed: {err}"))
    })?;
    envelope.validate_metadata()?;
    envelope.verify_payload_crc32()?;
    Ok(envelope)
}

fn seal<State: Serialize>(kind: &str, state: &State) -> Result<CheckpointEnvelope, SpcError> {
    let payload = serde_json::to_string(state).map_err(|err| {
        SpcError::invalid_input(format!("checkpoint payload serialization failed: {err}"))
    })?;
    Ok(CheckpointEnvelope {
        kind: kind.to_string(),
        state_schema_version: CURRENT_CHECKPOINT_SCHEMA_VERSION,
        engine_fingerprint: engine_fingerprint(),
        created_at_ns: now_unix_ns()?,
        payload_crc32: crc32fast::hash(payload.as_bytes()),
        payload,
    })
}

fn open<State: DeserializeOwned>(
    envelope: &CheckpointEnvelope,
    expected_kind: &str,
) -> Result<State, SpcError> {
    envelope.validate_metadata()?;
    envelope.verify_payload_crc32()?;
    if envelope.kind != expected_kind {
        return Err(SpcError::invalid_input(format!(
            "checkpoint kind mismatch: expected='{expected_kind}', found='{}'",
            envelope.kind
        )));
    }
    serde_json::from_str(&envelope.payload).map_err(|err| {
        SpcError::invalid_input(format!("checkpoint payload deserialization failed: {err}"))
    })
}

pub fn save_series_checkpoint(
    checkpoint: &SeriesCheckpoint,
) -> Result<CheckpointEnvelope, SpcError> {
    checkpoint.validate()?;
    seal(SERIES_CHECKPOINT_KIND, checkpoint)
}

/// Restores a series checkpoint and checks that its parts agree.
pub fn load_series_checkpoint(envelope: &CheckpointEnvelope) -> Result<SeriesCheckpoint, SpcError> {
    let checkpoint: SeriesCheckpoint = open(envelope, SERIES_CHECKPOINT_KIND)?;
    checkpoint.validate()?;
    Ok(checkpoint)
}

/// Writes a series checkpoint to `path` (tmp + fsync + rename).
pub fn save_series_checkpoint_file(
    path: impl AsRef<Path>,
    checkpoint: &SeriesCheckpoint,
) -> Result<CheckpointEnvelope, SpcError> {
    let envelope = save_series_checkpoint(checkpoint)?;
    write_file_atomic(path.as_ref(), &encode_checkpoint_envelope(&envelope)?)?;
    Ok(envelope)
}

pub fn load_series_checkpoint_file(path: impl AsRef<Path>) -> Result<SeriesCheckpoint, SpcError> {
    let path = path.as_ref();
    let encoded =
        std::fs::read(path).map_err(|err| io_error("failed reading checkpoint file", path, err))?;
    load_series_checkpoint(&decode_checkpoint_envelope(&encoded)?)
}

pub fn save_segmenter_state(state: &SegmenterState) -> Result<CheckpointEnvelope, SpcError> {
    seal(SEGMENTER_STATE_KIND, state)
}

/// Restores a segmenter state; pass it to
/// [`PhaseSegmenter::load_state`](crate::PhaseSegmenter::load_state) for validation.
pub fn load_segmenter_state(envelope: &CheckpointEnvelope) -> Result<SegmenterState, SpcError> {
    open(envelope, SEGMENTER_STATE_KIND)
}
