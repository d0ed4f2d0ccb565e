//! Workflow sequencing: `PLAN → CODE → TEST → {DONE | FIX → TEST | ABORTED}`.

pub mod controller;
pub mod result;
pub mod state;

pub use controller::{AbortHandle, DEFAULT_APP_NAME, DEFAULT_USER_ID, Pipeline};
pub use result::{AbortReason, WorkflowResult, WorkflowStatus};
pub use state::PipelineState;
