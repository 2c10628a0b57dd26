//! Step markers derived from a job's progress percent.
//!
//! The generation pipeline runs through a fixed sequence of phases. Each
//! phase owns an entry threshold; thresholds ascend strictly so a given
//! percent always yields the same marker set.

use serde::Serialize;
use std::fmt;

/// Percent at which the final phase counts as completed
pub const COMPLETE_THRESHOLD: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Acquire,
    Analyze,
    IdentifySpeakers,
    Caption,
    Render,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Acquire,
        Phase::Analyze,
        Phase::IdentifySpeakers,
        Phase::Caption,
        Phase::Render,
    ];

    /// Percent at which this phase becomes active
    pub fn threshold(self) -> u8 {
        match self {
            Phase::Acquire => 20,
            Phase::Analyze => 40,
            Phase::IdentifySpeakers => 60,
            Phase::Caption => 80,
            Phase::Render => 90,
        }
    }

    /// Percent at which this phase is done (the next phase's threshold)
    pub fn completion_threshold(self) -> u8 {
        match self {
            Phase::Acquire => Phase::Analyze.threshold(),
            Phase::Analyze => Phase::IdentifySpeakers.threshold(),
            Phase::IdentifySpeakers => Phase::Caption.threshold(),
            Phase::Caption => Phase::Render.threshold(),
            Phase::Render => COMPLETE_THRESHOLD,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Acquire => "Downloading video",
            Phase::Analyze => "Analyzing content",
            Phase::IdentifySpeakers => "Identifying speakers",
            Phase::Caption => "Generating captions",
            Phase::Render => "Rendering clip",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseState {
    Pending,
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseMarker {
    pub phase: Phase,
    pub state: PhaseState,
}

/// Map a progress percent to the state of every phase.
pub fn phase_markers(progress: u8) -> [PhaseMarker; 5] {
    Phase::ALL.map(|phase| {
        let state = if progress >= phase.completion_threshold() {
            PhaseState::Completed
        } else if progress >= phase.threshold() {
            PhaseState::Active
        } else {
            PhaseState::Pending
        };
        PhaseMarker { phase, state }
    })
}

/// The phase currently running, if any
pub fn active_phase(progress: u8) -> Option<Phase> {
    phase_markers(progress)
        .into_iter()
        .find(|marker| marker.state == PhaseState::Active)
        .map(|marker| marker.phase)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states(progress: u8) -> Vec<PhaseState> {
        phase_markers(progress).iter().map(|m| m.state).collect()
    }

    #[test]
    fn thresholds_ascend() {
        let thresholds: Vec<u8> = Phase::ALL.iter().map(|p| p.threshold()).collect();
        assert!(thresholds.windows(2).all(|w| w[0] < w[1]));
        assert!(Phase::Render.threshold() < COMPLETE_THRESHOLD);
    }

    #[test]
    fn nothing_active_below_first_threshold() {
        assert!(states(0).iter().all(|s| *s == PhaseState::Pending));
        assert!(states(19).iter().all(|s| *s == PhaseState::Pending));
        assert_eq!(active_phase(19), None);
    }

    #[test]
    fn exactly_one_phase_active_mid_run() {
        use PhaseState::*;
        assert_eq!(states(45), vec![Completed, Active, Pending, Pending, Pending]);
        assert_eq!(active_phase(45), Some(Phase::Analyze));
        assert_eq!(states(90), vec![Completed, Completed, Completed, Completed, Active]);
    }

    #[test]
    fn everything_completed_at_100() {
        assert!(states(100).iter().all(|s| *s == PhaseState::Completed));
        assert_eq!(active_phase(100), None);
    }

    #[test]
    fn derivation_is_idempotent() {
        for p in 0..=100u8 {
            assert_eq!(phase_markers(p), phase_markers(p));
        }
    }
}
