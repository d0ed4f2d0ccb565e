//! Run audit trail: one JSON document per workflow run, one entry per stage call.
//!
//! Inputs and outputs are not stored verbatim; each entry keeps their length
//! and a SHA-256 digest so two runs can be compared without persisting model
//! output.

use crate::pipeline::{AbortReason, WorkflowResult, WorkflowStatus};
use crate::router::ShortCircuit;
use crate::session::SessionKey;
use crate::stage::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub session: SessionKey,
    pub config: RunConfig,
    pub invocations: Vec<InvocationAudit>,
    pub outcome: RunOutcome,
}

impl AuditRun {
    pub fn new(session: SessionKey, config: RunConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            ended_at: None,
            session,
            config,
            invocations: Vec::new(),
            outcome: RunOutcome::InProgress,
        }
    }

    pub fn finish(&mut self, outcome: RunOutcome) {
        self.ended_at = Some(Utc::now());
        self.outcome = outcome;
    }

    /// Most recent entry for `stage`, if the stage ran at all.
    pub fn last_invocation(&self, stage: Stage) -> Option<&InvocationAudit> {
        self.invocations.iter().rev().find(|i| i.stage == stage)
    }

    pub fn fix_attempts(&self) -> usize {
        self.invocations
            .iter()
            .filter(|i| i.stage == Stage::Fix && i.outcome == InvocationOutcome::Completed)
            .count()
    }
}

/// Settings in effect for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub task_chars: usize,
    pub task_sha256: String,
    pub artifact_cap: usize,
    pub fix_part_cap: usize,
    pub retry_ceiling: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// One stage call, or one short-circuited stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationAudit {
    pub stage: Stage,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// `fix_count` after the before-hook ran.
    pub fix_count: u32,
    pub input_chars: usize,
    pub input_sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_chars: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_circuit: Option<ShortCircuit>,
    pub outcome: InvocationOutcome,
}

impl InvocationAudit {
    pub fn new(stage: Stage, fix_count: u32, input: &str) -> Self {
        Self {
            stage,
            started_at: Utc::now(),
            duration_ms: 0,
            fix_count,
            input_chars: input.chars().count(),
            input_sha256: digest(input),
            output_chars: None,
            output_sha256: None,
            short_circuit: None,
            outcome: InvocationOutcome::InProgress,
        }
    }

    pub fn short_circuited(stage: Stage, fix_count: u32, short_circuit: ShortCircuit) -> Self {
        let mut audit = Self::new(stage, fix_count, "");
        audit.short_circuit = Some(short_circuit);
        audit.outcome = InvocationOutcome::ShortCircuited;
        audit
    }

    pub fn complete(&mut self, output: &str) {
        self.duration_ms = elapsed_ms(self.started_at);
        self.output_chars = Some(output.chars().count());
        self.output_sha256 = Some(digest(output));
        self.outcome = InvocationOutcome::Completed;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.duration_ms = elapsed_ms(self.started_at);
        self.outcome = InvocationOutcome::Failed {
            message: message.into(),
        };
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvocationOutcome {
    InProgress,
    Completed,
    ShortCircuited,
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    InProgress,
    Completed,
    Fixed { fix_count: u32 },
    Aborted { reason: AbortReason },
    Failed { message: String },
}

impl RunOutcome {
    pub fn from_result(result: &WorkflowResult) -> Self {
        match result.status {
            WorkflowStatus::Completed => RunOutcome::Completed,
            WorkflowStatus::Fixed => RunOutcome::Fixed {
                fix_count: result.fix_count,
            },
            WorkflowStatus::Aborted => match &result.abort_reason {
                Some(reason) => RunOutcome::Aborted {
                    reason: reason.clone(),
                },
                None => RunOutcome::Failed {
                    message: "aborted without a reason".to_string(),
                },
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::InProgress => "in progress",
            RunOutcome::Completed => "completed",
            RunOutcome::Fixed { .. } => "fixed",
            RunOutcome::Aborted { .. } => "aborted",
            RunOutcome::Failed { .. } => "failed",
        }
    }
}

/// Lowercase hex SHA-256 of `text`.
pub fn digest(text: &str) -> String {
    let hash = Sha256::digest(text.as_bytes());
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}

fn elapsed_ms(since: DateTime<Utc>) -> u64 {
    (Utc::now() - since).num_milliseconds().max(0) as u64
}

pub mod logger;
pub use logger::AuditLogger;
