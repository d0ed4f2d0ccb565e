//! Typed error hierarchy for the pipeline orchestrator.
//!
//! Three enums cover the three layers:
//! - `CapabilityError`: failures raised by (or about) a stage capability call
//! - `SessionError`: session store misuse
//! - `WorkflowError`: everything that terminates a workflow run with an error
//!
//! Policy aborts (retry ceiling, panic flag) are not errors: they are reported
//! through `WorkflowResult` with `WorkflowStatus::Aborted`.

use crate::session::SessionKey;
use crate::stage::Stage;
use thiserror::Error;

/// Errors from a stage capability call.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Provider returned {code}: {message}")]
    Provider { code: u16, message: String },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Failed to parse provider response: {0}")]
    Parse(String),

    #[error("Stage returned an empty result")]
    EmptyOutput,

    #[error("Missing API key: {env_var} is not set")]
    MissingApiKey { env_var: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the session store.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session {0} not found")]
    UnknownSession(SessionKey),

    #[error("Session store lock poisoned")]
    LockPoisoned,
}

/// Errors that end a workflow run without a policy decision.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Stage {stage} is missing required input '{slot}'")]
    MissingInput { stage: Stage, slot: &'static str },

    #[error("Stage {stage} failed: {source}")]
    CapabilityFailure {
        stage: Stage,
        #[source]
        source: CapabilityError,
    },

    #[error("Stage {stage} returned a result with no text representation: {detail}")]
    MalformedResult { stage: Stage, detail: String },

    #[error("Invalid pipeline transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl WorkflowError {
    /// True for failures that came from the capability boundary (including
    /// malformed results, which are treated the same way).
    pub fn is_capability_failure(&self) -> bool {
        matches!(
            self,
            WorkflowError::CapabilityFailure { .. } | WorkflowError::MalformedResult { .. }
        )
    }

    /// The stage the failure is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            WorkflowError::MissingInput { stage, .. }
            | WorkflowError::CapabilityFailure { stage, .. }
            | WorkflowError::MalformedResult { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
