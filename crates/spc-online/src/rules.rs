// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use spc_core::{RuleId, Side, SignalState, XmrLimits};

/// Everything a rule may look at when classifying one point.
///
/// `history` holds the previous values of the same phase that were classified
/// against the same `limits`, oldest first.
#[derive(Clone, Copy, Debug)]
pub struct RuleInput<'a> {
    pub value: f64,
    pub limits: &'a XmrLimits,
    pub history: &'a [f64],
    pub run_length: usize,
    pub two_of_three_opens_phase: bool,
}

impl RuleInput<'_> {
    /// The current value preceded by up to `len - 1` history values.
    fn trailing(&self, len: usize) -> impl Iterator<Item = f64> + '_ {
        let take = len.saturating_sub(1).min(self.history.len());
        self.history[self.history.len() - take..]
            .iter()
            .copied()
            .chain(std::iter::once(self.value))
    }
}

/// A single rule firing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RuleHit {
    pub rule: RuleId,
    pub severity: SignalState,
    pub side: Side,
    /// How many points before the current one the violating run starts.
    pub run_start_offset: usize,
    pub opens_phase: bool,
}

pub type RulePredicate = fn(&RuleInput<'_>) -> Option<RuleHit>;

/// Rules in evaluation order.
pub const RULES: [RulePredicate; 4] = [
    beyond_three_sigma,
    two_of_three_beyond_two_sigma,
    four_of_five_beyond_one_sigma,
    run_on_one_side,
];

/// Outcome of running every rule against one point.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Evaluation {
    pub state: SignalState,
    pub hits: Vec<RuleHit>,
}

impl Evaluation {
    pub fn rules(&self) -> Vec<RuleId> {
        self.hits.iter().map(|hit| hit.rule).collect()
    }

    /// Earliest-starting hit that opens a new phase.
    pub fn shift_trigger(&self) -> Option<&RuleHit> {
        self.hits
            .iter()
            .filter(|hit| hit.opens_phase)
            .max_by_key(|hit| hit.run_start_offset)
    }
}

pub fn evaluate(input: &RuleInput<'_>) -> Evaluation {
    let hits: Vec<RuleHit> = RULES.iter().filter_map(|rule| rule(input)).collect();
    Evaluation {
        state: SignalState::rolled_up(hits.iter().map(|hit| hit.severity)),
        hits,
    }
}

pub fn beyond_three_sigma(input: &RuleInput<'_>) -> Option<RuleHit> {
    let side = input.limits.beyond_npl(input.value)?;
    Some(RuleHit {
        rule: RuleId::Beyond3Sigma,
        severity: SignalState::Critical,
        side,
        run_start_offset: 0,
        opens_phase: false,
    })
}

pub fn two_of_three_beyond_two_sigma(input: &RuleInput<'_>) -> Option<RuleHit> {
    let side = input.limits.beyond_sigma(input.value, 2.0)?;
    let window: Vec<f64> = input.trailing(3).collect();
    let first_beyond = window
        .iter()
        .position(|&v| input.limits.beyond_sigma(v, 2.0) == Some(side))?;
    let count = window
        .iter()
        .filter(|&&v| input.limits.beyond_sigma(v, 2.0) == Some(side))
        .count();
    if count < 2 {
        return None;
    }

    Some(RuleHit {
        rule: RuleId::TwoOfThreeBeyond2Sigma,
        severity: if input.two_of_three_opens_phase {
            SignalState::Critical
        } else {
            SignalState::Warning
        },
        side,
        run_start_offset: window.len() - 1 - first_beyond,
        opens_phase: input.two_of_three_opens_phase,
    })
}

pub fn four_of_five_beyond_one_sigma(input: &RuleInput<'_>) -> Option<RuleHit> {
    let side = input.limits.beyond_sigma(input.value, 1.0)?;
    let window: Vec<f64> = input.trailing(5).collect();
    let count = window
        .iter()
        .filter(|&&v| input.limits.beyond_sigma(v, 1.0) == Some(side))
        .count();
    if count < 4 {
        return None;
    }

    Some(RuleHit {
        rule: RuleId::FourOfFiveBeyond1Sigma,
        severity: SignalState::Warning,
        side,
        run_start_offset: window.len() - 1,
        opens_phase: false,
    })
}

pub fn run_on_one_side(input: &RuleInput<'_>) -> Option<RuleHit> {
    if input.run_length < 2 || input.history.len() < input.run_length - 1 {
        return None;
    }
    let side = input.limits.side(input.value)?;
    if !input
        .trailing(input.run_length)
        .all(|v| input.limits.side(v) == Some(side))
    {
        return None;
    }

    Some(RuleHit {
        rule: RuleId::RunOnOneSide,
        severity: SignalState::Warning,
        side,
        run_start_offset: input.run_length - 1,
        opens_phase: true,
    })
}
