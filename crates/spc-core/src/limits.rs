// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::SpcError;

/// Bias-correction constant d2 for moving ranges of two observations.
pub const D2: f64 = 1.128;
/// Scaling constant E2 = 3 / d2 for natural process limits.
pub const E2: f64 = 2.66;
/// Upper range limit constant D4 for moving ranges of two observations.
pub const D4: f64 = 3.268;

/// Side of the centerline a value falls on.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Above,
    Below,
}

/// Running means for the points of one phase, in arrival order.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PhaseAccumulator {
    pub count: usize,
    pub mean: f64,
    /// Mean of the `count - 1` moving ranges.
    pub mr_mean: f64,
    pub last_value: Option<f64>,
}

impl PhaseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an accumulator over `values` in order.
    pub fn from_values(values: &[f64]) -> Self {
        let mut acc = Self::new();
        for &value in values {
            acc.push(value);
        }
        acc
    }

    /// Adds one observation and returns its moving range, if any.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        let moving_range = self.last_value.map(|prev| (value - prev).abs());
        self.count += 1;
        self.mean = running_mean(self.mean, value, self.count);
        if let Some(mr) = moving_range {
            self.mr_mean = running_mean(self.mr_mean, mr, self.count - 1);
        }
        self.last_value = Some(value);
        moving_range
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Folds the `n`-th observation into a mean of `n - 1`.
///
/// Stays finite for any finite inputs, including values of opposite sign near
/// `f64::MAX` whose difference overflows.
pub(crate) fn running_mean(mean: f64, value: f64, n: usize) -> f64 {
    let n = n as f64;
    let delta = value - mean;
    if delta.is_finite() {
        mean + delta / n
    } else {
        mean + (value / n - mean / n)
    }
}

/// Individuals/moving-range limits for one phase.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct XmrLimits {
    pub cl: f64,
    pub mr_bar: f64,
    pub sigma: f64,
    pub ucl: f64,
    pub lcl: f64,
    pub two_sigma_upper: f64,
    pub two_sigma_lower: f64,
    pub mr_ucl: f64,
}

impl XmrLimits {
    /// Computes limits from a non-empty, in-order slice of phase values.
    pub fn from_values(values: &[f64], clamp_lcl_at_zero: bool) -> Result<Self, SpcError> {
        if let Some(index) = values.iter().position(|value| !value.is_finite()) {
            return Err(SpcError::NonFiniteValue { index });
        }
        let limits =
            Self::from_accumulator(&PhaseAccumulator::from_values(values), clamp_lcl_at_zero)
                .ok_or(SpcError::EmptyInput)?;
        if !limits.is_finite() {
            return Err(SpcError::LimitOverflow {
                index: values.len() - 1,
            });
        }
        Ok(limits)
    }

    /// Computes limits from running means; `None` for an empty accumulator.
    ///
    /// A single observation has no moving range, so its limits collapse onto
    /// the value itself.
    pub fn from_accumulator(acc: &PhaseAccumulator, clamp_lcl_at_zero: bool) -> Option<Self> {
        if acc.is_empty() {
            return None;
        }

        let cl = acc.mean;
        let mr_bar = if acc.count < 2 { 0.0 } else { acc.mr_mean };
        let sigma = mr_bar / D2;
        let ucl = cl + E2 * mr_bar;
        let mut lcl = cl - E2 * mr_bar;
        if clamp_lcl_at_zero && cl >= 0.0 {
            lcl = lcl.max(0.0);
        }

        Some(Self {
            cl,
            mr_bar,
            sigma,
            ucl,
            lcl,
            two_sigma_upper: cl + 2.0 * sigma,
            two_sigma_lower: cl - 2.0 * sigma,
            mr_ucl: D4 * mr_bar,
        })
    }

    /// False when the value range of the phase overflows `f64`.
    pub fn is_finite(&self) -> bool {
        [
            self.cl,
            self.mr_bar,
            self.sigma,
            self.ucl,
            self.lcl,
            self.two_sigma_upper,
            self.two_sigma_lower,
            self.mr_ucl,
        ]
        .iter()
        .all(|value| value.is_finite())
    }

    /// True when every value of the phase was identical.
    pub fn is_zero_width(&self) -> bool {
        self.mr_bar == 0.0
    }

    /// Strict side of the centerline; `None` on the centerline itself.
    pub fn side(&self, value: f64) -> Option<Side> {
        if value > self.cl {
            Some(Side::Above)
        } else if value < self.cl {
            Some(Side::Below)
        } else {
            None
        }
    }

    /// Side on which `value` lies strictly beyond `k` sigma from the centerline.
    pub fn beyond_sigma(&self, value: f64, k: f64) -> Option<Side> {
        let band = k * self.sigma;
        if value > self.cl + band {
            Some(Side::Above)
        } else if value < self.cl - band {
            Some(Side::Below)
        } else {
            None
        }
    }

    /// Side on which `value` falls outside the natural process limits.
    pub fn beyond_npl(&self, value: f64) -> Option<Side> {
        if value > self.ucl {
            Some(Side::Above)
        } else if value < self.lcl {
            Some(Side::Below)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{D2, E2, PhaseAccumulator, Side, XmrLimits};
    use crate::SpcError;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn computes_wheeler_limits() {
        let limits = XmrLimits::from_values(&[10.0, 12.0, 11.0, 13.0], false)
            .expect("limits should compute");

        assert_close(limits.cl, 11.5);
        assert_close(limits.mr_bar, (2.0 + 1.0 + 2.0) / 3.0);
        assert_close(limits.sigma, limits.mr_bar / D2);
        assert_close(limits.ucl, 11.5 + E2 * limits.mr_bar);
        assert_close(limits.lcl, 11.5 - E2 * limits.mr_bar);
        assert_close(limits.two_sigma_upper, 11.5 + 2.0 * limits.sigma);
        assert_close(limits.mr_ucl, 3.268 * limits.mr_bar);
        assert!(limits.lcl <= limits.cl && limits.cl <= limits.ucl);
    }

    #[test]
    fn constant_phase_has_zero_width_band() {
        let limits = XmrLimits::from_values(&[50.0; 20], false).expect("limits should compute");

        assert!(limits.is_zero_width());
        assert_eq!(limits.cl, 50.0);
        assert_eq!(limits.ucl, 50.0);
        assert_eq!(limits.lcl, 50.0);
        assert_eq!(limits.beyond_npl(60.0), Some(Side::Above));
        assert_eq!(limits.beyond_npl(50.0), None);
        assert_eq!(limits.beyond_sigma(49.0, 1.0), Some(Side::Below));
    }

    #[test]
    fn single_value_phase_has_no_moving_range() {
        let limits = XmrLimits::from_values(&[7.5], false).expect("limits should compute");
        assert_eq!(limits.mr_bar, 0.0);
        assert_eq!(limits.cl, 7.5);
    }

    #[test]
    fn clamps_lower_limit_only_for_non_negative_centerline() {
        let values = [0.2, 1.5, 0.1, 1.8, 0.3];
        let clamped = XmrLimits::from_values(&values, true).expect("limits should compute");
        assert_eq!(clamped.lcl, 0.0);

        let negative = [-5.0, -1.0, -6.0, -2.0];
        let unclamped = XmrLimits::from_values(&negative, true).expect("limits should compute");
        assert!(unclamped.lcl < 0.0);
        assert!(unclamped.lcl <= unclamped.cl);
    }

    #[test]
    fn rejects_empty_and_non_finite_values() {
        assert_eq!(
            XmrLimits::from_values(&[], false).expect_err("empty must fail"),
            SpcError::EmptyInput
        );
        assert_eq!(
            XmrLimits::from_values(&[1.0, f64::NAN], false).expect_err("NaN must fail"),
            SpcError::NonFiniteValue { index: 1 }
        );
    }

    #[test]
    fn accumulator_reports_moving_ranges() {
        let mut acc = PhaseAccumulator::new();
        assert_eq!(acc.push(3.0), None);
        assert_eq!(acc.push(5.0), Some(2.0));
        assert_eq!(acc.push(4.0), Some(1.0));
        assert_eq!(acc.count, 3);
        assert_eq!(acc.mean, 4.0);
        assert_eq!(acc.mr_mean, 1.5);
        assert_eq!(acc, PhaseAccumulator::from_values(&[3.0, 5.0, 4.0]));
    }

    #[test]
    fn extreme_constant_phase_stays_finite() {
        let limits = XmrLimits::from_values(&[1e308; 20], false).expect("limits should compute");
        assert!(limits.is_finite());
        assert_eq!(limits.cl, 1e308);
        assert_eq!(limits.ucl, 1e308);
        assert_eq!(limits.lcl, 1e308);
        assert!(limits.is_zero_width());
    }

    #[test]
    fn centerline_of_opposite_extremes_does_not_overflow() {
        let acc = PhaseAccumulator::from_values(&[f64::MAX, f64::MAX, -f64::MAX, -f64::MAX]);
        assert!(acc.mean.is_finite());
        assert!(acc.mean.abs() < 1e300);
    }

    #[test]
    fn rejects_ranges_wider_than_f64() {
        let err = XmrLimits::from_values(&[1e308, 1e308, -1e308], false)
            .expect_err("overflowing range must fail");
        assert_eq!(err, SpcError::LimitOverflow { index: 2 });

        let err = XmrLimits::from_values(&[0.0, 1e308, 0.0, 1e308], false)
            .expect_err("overflowing band must fail");
        assert_eq!(err, SpcError::LimitOverflow { index: 3 });
    }

    #[test]
    fn centerline_values_have_no_side() {
        let limits = XmrLimits::from_values(&[1.0, 3.0], false).expect("limits should compute");
        assert_eq!(limits.side(2.0), None);
        assert_eq!(limits.side(2.5), Some(Side::Above));
        assert_eq!(limits.side(1.5), Some(Side::Below));
    }
}
