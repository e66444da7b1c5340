// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::SpcError;

/// Default number of points a phase needs before its limits are finalized.
pub const DEFAULT_MIN_PHASE_SIZE: usize = 8;
/// Default run length for the one-side-of-centerline rule.
pub const DEFAULT_RUN_LENGTH: usize = 8;

/// Sampling granularity of a series; selects the year-over-year offset.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Granularity {
    #[default]
    Daily,
    Weekly,
}

/// Engine configuration shared by every series computation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct SpcConfig {
    pub min_phase_size: usize,
    pub run_length: usize,
    /// When set, a 2-of-3 beyond 2 sigma firing is a sustained shift and is
    /// classified critical; otherwise it only warns.
    pub two_of_three_opens_phase: bool,
    /// Clamp the lower limit at zero for phases with a non-negative centerline.
    pub clamp_lcl_at_zero: bool,
    pub granularity: Granularity,
}

impl Default for SpcConfig {
    fn default() -> Self {
        Self {
            min_phase_size: DEFAULT_MIN_PHASE_SIZE,
            run_length: DEFAULT_RUN_LENGTH,
            two_of_three_opens_phase: true,
            clamp_lcl_at_zero: false,
            granularity: Granularity::Daily,
        }
    }
}

impl SpcConfig {
    pub fn with_min_phase_size(mut self, min_phase_size: usize) -> Self {
        self.min_phase_size = min_phase_size;
        self
    }

    pub fn with_run_length(mut self, run_length: usize) -> Self {
        self.run_length = run_length;
        self
    }

    pub fn with_two_of_three_opens_phase(mut self, enabled: bool) -> Self {
        self.two_of_three_opens_phase = enabled;
        self
    }

    pub fn with_clamp_lcl_at_zero(mut self, enabled: bool) -> Self {
        self.clamp_lcl_at_zero = enabled;
        self
    }

    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Number of previous in-phase values the rule evaluator needs to see.
    pub fn neighborhood_len(&self) -> usize {
        self.run_length.saturating_sub(1).max(4)
    }

    pub fn validate(&self) -> Result<(), SpcError> {
        if self.min_phase_size < 2 {
            return Err(SpcError::invalid_config(format!(
                "min_phase_size must be >= 2; got {}",
                self.min_phase_size
            )));
        }
        if self.run_length < 2 {
            return Err(SpcError::invalid_config(format!(
                "run_length must be >= 2; got {}",
                self.run_length
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Granularity, SpcConfig};

    #[test]
    fn defaults_follow_classical_xmr_rules() {
        let config = SpcConfig::default();
        assert_eq!(config.min_phase_size, 8);
        assert_eq!(config.run_length, 8);
        assert!(config.two_of_three_opens_phase);
        assert!(!config.clamp_lcl_at_zero);
        assert_eq!(config.granularity, Granularity::Daily);
        config.validate().expect("default config should validate");
    }

    #[test]
    fn rejects_degenerate_sizes() {
        let err = SpcConfig::default()
            .with_min_phase_size(1)
            .validate()
            .expect_err("min_phase_size=1 must fail");
        assert!(err.to_string().contains("min_phase_size must be >= 2"));

        let err = SpcConfig::default()
            .with_run_length(0)
            .validate()
            .expect_err("run_length=0 must fail");
        assert!(err.to_string().contains("run_length must be >= 2"));
    }

    #[test]
    fn neighborhood_covers_longest_rule_window() {
        assert_eq!(SpcConfig::default().neighborhood_len(), 7);
        assert_eq!(SpcConfig::default().with_run_length(3).neighborhood_len(), 4);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_json_fills_defaults() {
        let config: SpcConfig = serde_json::from_str(r#"{"granularity":"weekly","run_length":7}"#)
            .expect("partial config should deserialize");
        assert_eq!(config.granularity, Granularity::Weekly);
        assert_eq!(config.run_length, 7);
        assert_eq!(config.min_phase_size, 8);
    }
}
