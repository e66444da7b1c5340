// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use thiserror::Error;

/// Errors surfaced by the SPC engine.
///
/// The first three variants are caller contract violations on the point
/// sequence itself; the whole computation fails rather than skipping the
/// offending point.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SpcError {
    #[error("input series is empty")]
    EmptyInput,
    #[error("timestamps must be strictly increasing: index {index} does not follow its predecessor")]
    NonMonotonicTimestamps { index: usize },
    #[error("value at index {index} is not finite")]
    NonFiniteValue { index: usize },
    #[error("values up to index {index} span too wide a range for finite control limits")]
    LimitOverflow { index: usize },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl SpcError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}
