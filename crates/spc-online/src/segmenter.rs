// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::rules::{self, Evaluation, RuleHit, RuleInput};
use spc_core::{
    Phase, PhaseAccumulator, RuleId, Side, SignalState, SpcConfig, SpcError, XmrLimits,
};
use tracing::{debug, trace};

/// Lifecycle of the open phase.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseStatus {
    /// Fewer than `min_phase_size` points; limits are provisional.
    Building,
    /// Limits are frozen and used for classification.
    Stable,
}

/// Everything the segmenter carries between points: the open phase only.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct SegmenterState {
    pub next_index: usize,
    /// Value at `next_index - 1`, whichever phase it landed in.
    pub last_value: Option<f64>,
    pub phase_number: u32,
    pub phase_start: usize,
    pub opened_by: Option<RuleId>,
    /// Running sums of the baseline; stops growing once limits are frozen.
    pub accumulator: PhaseAccumulator,
    pub frozen: Option<XmrLimits>,
    /// Most recent values classified against `frozen`, oldest first.
    pub neighborhood: Vec<f64>,
}

impl Default for SegmenterState {
    fn default() -> Self {
        Self {
            next_index: 0,
            last_value: None,
            phase_number: 1,
            phase_start: 0,
            opened_by: None,
            accumulator: PhaseAccumulator::new(),
            frozen: None,
            neighborhood: vec![],
        }
    }
}

impl SegmenterState {
    pub fn status(&self) -> PhaseStatus {
        if self.frozen.is_some() {
            PhaseStatus::Stable
        } else {
            PhaseStatus::Building
        }
    }

    /// The open phase; `None` before the first point.
    pub fn open_phase(&self, clamp_lcl_at_zero: bool) -> Option<Phase> {
        let limits = match self.frozen {
            Some(limits) => limits,
            None => XmrLimits::from_accumulator(&self.accumulator, clamp_lcl_at_zero)?,
        };
        Some(Phase {
            phase_number: self.phase_number,
            start_index: self.phase_start,
            end_index: None,
            limits,
            provisional: self.frozen.is_none(),
            opened_by: self.opened_by,
        })
    }

    pub(crate) fn validate(&self, config: &SpcConfig) -> Result<(), SpcError> {
        if self.phase_number == 0 {
            return Err(SpcError::invalid_input(
                "segmenter state.phase_number must be >= 1",
            ));
        }
        if self.last_value.is_some() != (self.next_index > 0) {
            return Err(SpcError::invalid_input(format!(
                "segmenter state.last_value must be present exactly when next_index={} > 0",
                self.next_index
            )));
        }
        if self.phase_start > self.next_index {
            return Err(SpcError::invalid_input(format!(
                "segmenter state.phase_start={} cannot exceed next_index={}",
                self.phase_start, self.next_index
            )));
        }
        if self.accumulator.count > self.next_index - self.phase_start {
            return Err(SpcError::invalid_input(format!(
                "segmenter state accumulator holds {} points but the open phase spans {}",
                self.accumulator.count,
                self.next_index - self.phase_start
            )));
        }
        match self.frozen {
            Some(_) if self.accumulator.count < config.min_phase_size => {
                return Err(SpcError::invalid_input(format!(
                    "segmenter state has frozen limits after only {} of {} baseline points",
                    self.accumulator.count, config.min_phase_size
                )));
            }
            None if self.accumulator.count >= config.min_phase_size => {
                return Err(SpcError::invalid_input(format!(
                    "segmenter state has {} baseline points but no frozen limits",
                    self.accumulator.count
                )));
            }
            None if !self.neighborhood.is_empty() => {
                return Err(SpcError::invalid_input(
                    "segmenter state has a neighborhood while still building",
                ));
            }
            _ => {}
        }
        if self.neighborhood.len() > config.neighborhood_len() {
            return Err(SpcError::invalid_input(format!(
                "segmenter state neighborhood holds {} values; at most {} allowed",
                self.neighborhood.len(),
                config.neighborhood_len()
            )));
        }
        if self.neighborhood.iter().any(|value| !value.is_finite())
            || self.last_value.is_some_and(|value| !value.is_finite())
            || self.accumulator.last_value.is_some_and(|value| !value.is_finite())
            || !self.accumulator.mean.is_finite()
            || !self.accumulator.mr_mean.is_finite()
            || self.frozen.is_some_and(|limits| !limits.is_finite())
        {
            return Err(SpcError::invalid_input(
                "segmenter state contains non-finite values",
            ));
        }
        Ok(())
    }
}

/// Signal raised on an earlier point once its run is confirmed as a shift.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Escalation {
    pub index: usize,
    pub state: SignalState,
    pub rule: RuleId,
}

/// A confirmed sustained shift.
#[derive(Clone, Debug, PartialEq)]
pub struct Shift {
    pub closed: Phase,
    pub run_start: usize,
    pub trigger: RuleId,
    pub side: Side,
    pub escalations: Vec<Escalation>,
}

/// Result of feeding one value to the segmenter.
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutcome {
    pub index: usize,
    /// Phase the point belongs to after this step.
    pub phase_number: u32,
    /// Status of the phase the point was classified in.
    pub status: PhaseStatus,
    pub signal_state: SignalState,
    pub rules: Vec<RuleId>,
    /// Limits frozen during this step, if any.
    pub finalized: Option<XmrLimits>,
    pub shift: Option<Shift>,
}

/// Causal phase segmenter: one pass, no look-ahead.
#[derive(Clone, Debug)]
pub struct PhaseSegmenter {
    config: SpcConfig,
    state: SegmenterState,
}

impl PhaseSegmenter {
    pub fn new(config: SpcConfig) -> Result<Self, SpcError> {
        config.validate()?;
        Ok(Self {
            config,
            state: SegmenterState::default(),
        })
    }

    pub fn config(&self) -> &SpcConfig {
        &self.config
    }

    pub fn state(&self) -> &SegmenterState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = SegmenterState::default();
    }

    pub fn save_state(&self) -> SegmenterState {
        self.state.clone()
    }

    pub fn load_state(&mut self, state: SegmenterState) -> Result<(), SpcError> {
        state.validate(&self.config)?;
        self.state = state;
        Ok(())
    }

    /// Classifies one value.
    ///
    /// Fails without changing state when the value is not finite, or when its
    /// moving range or the open phase's limits would overflow `f64`.
    pub fn update(&mut self, value: f64) -> Result<StepOutcome, SpcError> {
        let index = self.state.next_index;
        if !value.is_finite() {
            return Err(SpcError::NonFiniteValue { index });
        }
        if self
            .state
            .last_value
            .is_some_and(|prev| !(value - prev).is_finite())
        {
            return Err(SpcError::LimitOverflow { index });
        }

        let snapshot = self.state.clone();
        let outcome = match self.state.frozen {
            None => self.absorb_baseline(index, value),
            Some(limits) => self.classify(index, value, limits),
        };
        self.state.next_index += 1;
        self.state.last_value = Some(value);

        let limits_finite = self
            .state
            .open_phase(self.config.clamp_lcl_at_zero)
            .is_none_or(|phase| phase.limits.is_finite());
        if !limits_finite {
            self.state = snapshot;
            return Err(SpcError::LimitOverflow { index });
        }
        Ok(outcome)
    }

    fn absorb_baseline(&mut self, index: usize, value: f64) -> StepOutcome {
        self.state.accumulator.push(value);
        StepOutcome {
            index,
            phase_number: self.state.phase_number,
            status: PhaseStatus::Building,
            signal_state: SignalState::None,
            rules: vec![],
            finalized: self.try_finalize(),
            shift: None,
        }
    }

    fn try_finalize(&mut self) -> Option<XmrLimits> {
        if self.state.accumulator.count < self.config.min_phase_size {
            return None;
        }
        let limits =
            XmrLimits::from_accumulator(&self.state.accumulator, self.config.clamp_lcl_at_zero)?;
        self.state.frozen = Some(limits);
        self.state.neighborhood.clear();
        debug!(
            phase_number = self.state.phase_number,
            start_index = self.state.phase_start,
            cl = limits.cl,
            sigma = limits.sigma,
            "phase limits finalized"
        );
        Some(limits)
    }

    fn classify(&mut self, index: usize, value: f64, limits: XmrLimits) -> StepOutcome {
        let evaluation = rules::evaluate(&RuleInput {
            value,
            limits: &limits,
            history: &self.state.neighborhood,
            run_length: self.config.run_length,
            two_of_three_opens_phase: self.config.two_of_three_opens_phase,
        });
        if evaluation.state.is_signal() {
            trace!(
                index,
                value,
                state = evaluation.state.as_str(),
                phase_number = self.state.phase_number,
                "point out of control"
            );
        }

        let (shift, finalized) = match evaluation.shift_trigger().copied() {
            Some(trigger) => {
                let (shift, finalized) = self.open_phase(index, value, &limits, &evaluation, trigger);
                (Some(shift), finalized)
            }
            None => {
                self.remember(value);
                (None, None)
            }
        };

        StepOutcome {
            index,
            phase_number: self.state.phase_number,
            status: PhaseStatus::Stable,
            signal_state: evaluation.state,
            rules: evaluation.rules(),
            finalized,
            shift,
        }
    }

    fn remember(&mut self, value: f64) {
        let keep = self.config.neighborhood_len();
        self.state.neighborhood.push(value);
        if self.state.neighborhood.len() > keep {
            let excess = self.state.neighborhood.len() - keep;
            self.state.neighborhood.drain(..excess);
        }
    }

    /// Closes the open phase and reseeds a new one from the triggering run.
    fn open_phase(
        &mut self,
        index: usize,
        value: f64,
        limits: &XmrLimits,
        evaluation: &Evaluation,
        trigger: RuleHit,
    ) -> (Shift, Option<XmrLimits>) {
        let offset = trigger.run_start_offset;
        let run_start = index - offset;
        let history = &self.state.neighborhood;
        let run_values: Vec<f64> = history[history.len() - offset..]
            .iter()
            .copied()
            .chain(std::iter::once(value))
            .collect();

        let mut escalations = vec![];
        for hit in evaluation.hits.iter().filter(|hit| hit.opens_phase) {
            for idx in (index - hit.run_start_offset)..=index {
                let run_value = run_values[idx - run_start];
                match hit.rule {
                    RuleId::RunOnOneSide => escalations.push(Escalation {
                        index: idx,
                        state: SignalState::Warning,
                        rule: hit.rule,
                    }),
                    RuleId::TwoOfThreeBeyond2Sigma
                        if limits.beyond_sigma(run_value, 2.0) == Some(hit.side) =>
                    {
                        escalations.push(Escalation {
                            index: idx,
                            state: SignalState::Critical,
                            rule: hit.rule,
                        });
                    }
                    _ => {}
                }
            }
        }

        let closed = Phase {
            phase_number: self.state.phase_number,
            start_index: self.state.phase_start,
            end_index: Some(run_start),
            limits: *limits,
            provisional: false,
            opened_by: self.state.opened_by,
        };
        debug!(
            closed_phase = closed.phase_number,
            new_phase = closed.phase_number + 1,
            run_start,
            detected_at = index,
            trigger = trigger.rule.as_str(),
            "sustained shift opened a new phase"
        );

        let seed_len = run_values.len().min(self.config.min_phase_size);
        self.state.phase_number += 1;
        self.state.phase_start = run_start;
        self.state.opened_by = Some(trigger.rule);
        self.state.accumulator = PhaseAccumulator::from_values(&run_values[..seed_len]);
        self.state.frozen = None;
        self.state.neighborhood.clear();
        let finalized = self.try_finalize();

        (
            Shift {
                closed,
                run_start,
                trigger: trigger.rule,
                side: trigger.side,
                escalations,
            },
            finalized,
        )
    }
}

/// Per-point classification as recorded by the segmenter.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointMark {
    pub phase_number: u32,
    pub signal_state: SignalState,
    pub rules: Vec<RuleId>,
}

/// Accumulated segmenter output plus the state needed to continue it.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Segmentation {
    pub closed_phases: Vec<Phase>,
    pub marks: Vec<PointMark>,
    pub state: SegmenterState,
}

impl Segmentation {
    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Index where re-materialization must restart after extension.
    pub fn open_phase_start(&self) -> usize {
        self.state.phase_start
    }

    /// Closed phases followed by the open one.
    pub fn phases(&self, config: &SpcConfig) -> Vec<Phase> {
        let mut phases = self.closed_phases.clone();
        phases.extend(self.state.open_phase(config.clamp_lcl_at_zero));
        phases
    }

    fn apply(&mut self, outcome: StepOutcome) {
        if let Some(shift) = &outcome.shift {
            self.closed_phases.push(shift.closed.clone());
            for mark in self.marks.iter_mut().skip(shift.run_start) {
                mark.phase_number = outcome.phase_number;
            }
        }

        self.marks.push(PointMark {
            phase_number: outcome.phase_number,
            signal_state: outcome.signal_state,
            rules: outcome.rules,
        });

        if let Some(shift) = outcome.shift {
            for escalation in shift.escalations {
                if let Some(mark) = self.marks.get_mut(escalation.index) {
                    mark.signal_state = mark.signal_state.max(escalation.state);
                    if !mark.rules.contains(&escalation.rule) {
                        mark.rules.push(escalation.rule);
                        mark.rules.sort_unstable();
                    }
                }
            }
        }
    }
}

/// Segments `values` from scratch.
pub fn segment(values: &[f64], config: &SpcConfig) -> Result<Segmentation, SpcError> {
    segment_from(Segmentation::default(), values, config)
}

/// Continues `segmentation` with further values.
pub fn segment_from(
    segmentation: Segmentation,
    values: &[f64],
    config: &SpcConfig,
) -> Result<Segmentation, SpcError> {
    let mut segmenter = PhaseSegmenter::new(config.clone())?;
    segmenter.load_state(segmentation.state.clone())?;
    if segmentation.marks.len() != segmentation.state.next_index {
        return Err(SpcError::invalid_input(format!(
            "segmentation holds {} marks but its state expects {}",
            segmentation.marks.len(),
            segmentation.state.next_index
        )));
    }

    let mut segmentation = values.iter().try_fold(segmentation, |mut acc, &value| {
        acc.apply(segmenter.update(value)?);
        Ok::<_, SpcError>(acc)
    })?;
    segmentation.state = segmenter.save_state();
    Ok(segmentation)
}
