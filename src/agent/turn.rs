//! Turn stage tracking
//!
//! Tracks where a turn is in the analyze, plan, execute and reflect cycle and
//! how many transitions it has taken.

use std::fmt;
use tracing::{error, warn};

/// Stage of the per-turn state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Analyze,
    Plan,
    Prepare,
    Execute,
    Reflect,
    ErrorRecovery,
    End,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyze => "ANALYZE",
            Self::Plan => "PLAN",
            Self::Prepare => "PREPARE",
            Self::Execute => "EXECUTE",
            Self::Reflect => "REFLECT",
            Self::ErrorRecovery => "ERROR_RECOVERY",
            Self::End => "END",
        }
    }

    /// Stages reachable in one step
    pub fn successors(&self) -> &'static [Stage] {
        use Stage::*;
        match self {
            Analyze => &[Plan, End],
            Plan => &[Prepare, End],
            Prepare => &[Execute, End],
            // Analyze here continues with the next queued sub-task
            Execute => &[ErrorRecovery, Reflect, Analyze, End],
            Reflect => &[Analyze, Plan, Prepare, End],
            ErrorRecovery => &[Analyze, Prepare, End],
            End => &[],
        }
    }

    pub fn can_reach(&self, next: Stage) -> bool {
        self.successors().contains(&next)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a stage transition was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    /// The turn used up its transitions
    TooManySteps,
    /// The target is not a successor of the current stage
    InvalidEdge,
}

/// State of one turn through the stage machine
#[derive(Debug, Clone)]
pub struct TurnState {
    stage: Stage,
    /// Transitions taken so far
    transitions: usize,
    max_transitions: usize,
    path: Vec<Stage>,
}

impl TurnState {
    /// Start a turn at ANALYZE
    pub fn new(max_transitions: usize) -> Self {
        Self {
            stage: Stage::Analyze,
            transitions: 0,
            max_transitions,
            path: vec![Stage::Analyze],
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn transitions(&self) -> usize {
        self.transitions
    }

    /// Stages visited, in order
    pub fn path(&self) -> &[Stage] {
        &self.path
    }

    /// Check if the turn should keep running
    pub fn should_continue(&self) -> bool {
        self.stage != Stage::End
    }

    /// Move to the next stage
    ///
    /// A refused move leaves the turn at END.
    pub fn advance(&mut self, next: Stage) -> Result<(), Refusal> {
        if !self.stage.can_reach(next) {
            error!(from = %self.stage, to = %next, "invalid stage transition");
            self.finish();
            return Err(Refusal::InvalidEdge);
        }
        if next != Stage::End && self.transitions >= self.max_transitions {
            warn!(
                transitions = self.transitions,
                max = self.max_transitions,
                "transition cap reached"
            );
            self.finish();
            return Err(Refusal::TooManySteps);
        }
        self.transitions += 1;
        self.stage = next;
        self.path.push(next);
        Ok(())
    }

    /// End the turn from wherever it is
    pub fn finish(&mut self) {
        if self.stage != Stage::End {
            self.stage = Stage::End;
            self.path.push(Stage::End);
        }
    }
}
