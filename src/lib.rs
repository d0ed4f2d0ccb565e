//! Orchestrator for a plan, code, test and fix pipeline of text-generating stages.
//!
//! A [`pipeline::Pipeline`] drives one [`capability::StageCapability`] through
//! `PLAN → CODE → TEST → {DONE | FIX → TEST | ABORTED}`. All run state lives in
//! a [`session::Session`] that only the [`router::StageRouter`] mutates.

pub mod artifact;
pub mod audit;
pub mod capability;
pub mod config;
pub mod errors;
pub mod init;
pub mod pipeline;
pub mod router;
pub mod sanitize;
pub mod session;
pub mod stage;
pub mod status;
pub mod ui;

pub use errors::{CapabilityError, SessionError, WorkflowError};
pub use pipeline::{AbortHandle, AbortReason, Pipeline, WorkflowResult, WorkflowStatus};
pub use stage::{Stage, StageOutput};
