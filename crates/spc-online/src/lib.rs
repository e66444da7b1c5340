// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

#[cfg(feature = "serde")]
pub mod checkpoint;
pub mod compute;
pub mod incremental;
pub mod rules;
pub mod segmenter;

#[cfg(feature = "serde")]
pub use checkpoint::{
    CURRENT_CHECKPOINT_SCHEMA_VERSION, CheckpointEnvelope, MIN_SUPPORTED_CHECKPOINT_SCHEMA_VERSION,
    SEGMENTER_STATE_KIND, SERIES_CHECKPOINT_KIND, decode_checkpoint_envelope,
    encode_checkpoint_envelope, load_segmenter_state, load_series_checkpoint,
    load_series_checkpoint_file, save_segmenter_state, save_series_checkpoint,
    save_series_checkpoint_file, validate_checkpoint_state_schema_version,
};
pub use compute::{SeriesRequest, compute_series};
pub use incremental::{SeriesCheckpoint, compute_with_checkpoint, extend_series};
pub use rules::{Evaluation, RULES, RuleHit, RuleInput, RulePredicate, evaluate};
pub use segmenter::{
    Escalation, PhaseSegmenter, PhaseStatus, PointMark, SegmenterState, Segmentation, Shift,
    StepOutcome, segment, segment_from,
};

/// Causal segmentation and rule evaluation namespace.
pub fn crate_name() -> &'static str {
    let _ = spc_core::crate_name();
    "spc-online"
}
