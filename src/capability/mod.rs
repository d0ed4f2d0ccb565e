//! Stage capabilities: the external text generators the pipeline drives.
//!
//! The pipeline only sees the [`StageCapability`] trait. Two implementations
//! ship with the crate:
//! - [`LlmCapability`]: OpenAI-compatible chat-completions endpoint with one
//!   prompt template per stage
//! - [`ScriptedCapability`]: replays queued responses; used by tests and by
//!   `run --dry-run`

pub mod llm;
pub mod prompts;
pub mod scripted;

pub use llm::{LlmCapability, LlmSettings};
pub use scripted::{ScriptedCapability, ScriptedCall};

use crate::errors::CapabilityError;
use crate::stage::{Stage, StageOutput};
use async_trait::async_trait;

/// A text generator for one or more workflow stages.
///
/// One call is one blocking request/response; timeouts are the
/// implementation's responsibility.
#[async_trait]
pub trait StageCapability: Send + Sync {
    async fn invoke(&self, stage: Stage, input: &str) -> Result<StageOutput, CapabilityError>;
}

#[async_trait]
impl<T: StageCapability + ?Sized> StageCapability for std::sync::Arc<T> {
    async fn invoke(&self, stage: Stage, input: &str) -> Result<StageOutput, CapabilityError> {
        (**self).invoke(stage, input).await
    }
}
