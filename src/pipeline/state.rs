use crate::errors::WorkflowError;
use serde::{Deserialize, Serialize};

/// Controller states. `Done` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Plan,
    Code,
    Test,
    Fix,
    Done,
    Aborted,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Plan => "plan",
            PipelineState::Code => "code",
            PipelineState::Test => "test",
            PipelineState::Fix => "fix",
            PipelineState::Done => "done",
            PipelineState::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Aborted)
    }

    /// Legal edges of `PLAN → CODE → TEST → {DONE | FIX → TEST | ABORTED}`.
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Plan, Code)
                | (Code, Test)
                | (Test, Done)
                | (Test, Fix)
                | (Fix, Test)
                | (Fix, Aborted)
                | (Fix, Done)
        )
    }

    pub fn transition(self, next: PipelineState) -> Result<PipelineState, WorkflowError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(WorkflowError::InvalidTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
