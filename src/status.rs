//! Per-stage status board for frontends.

use crate::audit::{AuditRun, InvocationOutcome};
use crate::stage::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageState {
    Idle,
    Working,
    Success,
    Failure,
    Skipped,
}

impl StageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageState::Idle => "idle",
            StageState::Working => "working",
            StageState::Success => "success",
            StageState::Failure => "failure",
            StageState::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStatus {
    pub stage: Stage,
    pub name: String,
    pub description: String,
    pub state: StageState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StageStatus {
    fn idle(stage: Stage) -> Self {
        Self {
            stage,
            name: stage.as_str().to_string(),
            description: stage.description().to_string(),
            state: StageState::Idle,
            detail: None,
            updated_at: None,
        }
    }
}

/// Latest state of every stage. Clones share the same board.
#[derive(Debug, Clone)]
pub struct StatusBoard {
    stages: Arc<Mutex<BTreeMap<Stage, StageStatus>>>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        let stages = Stage::all()
            .iter()
            .map(|s| (*s, StageStatus::idle(*s)))
            .collect();
        Self {
            stages: Arc::new(Mutex::new(stages)),
        }
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, stage: Stage, state: StageState, detail: Option<String>) {
        if let Ok(mut stages) = self.stages.lock() {
            let entry = stages.entry(stage).or_insert_with(|| StageStatus::idle(stage));
            entry.state = state;
            entry.detail = detail;
            entry.updated_at = Some(Utc::now());
        }
    }

    pub fn get(&self, stage: Stage) -> StageState {
        self.stages
            .lock()
            .ok()
            .and_then(|s| s.get(&stage).map(|st| st.state))
            .unwrap_or(StageState::Idle)
    }

    /// Every stage in pipeline order.
    pub fn snapshot(&self) -> Vec<StageStatus> {
        self.stages
            .lock()
            .map(|s| s.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Reset every stage to idle.
    pub fn reset(&self) {
        if let Ok(mut stages) = self.stages.lock() {
            for (stage, status) in stages.iter_mut() {
                *status = StageStatus::idle(*stage);
            }
        }
    }

    /// Rebuild a board from a recorded run, using each stage's last entry.
    pub fn from_audit(run: &AuditRun) -> Self {
        let board = Self::new();
        for stage in Stage::all() {
            if let Some(inv) = run.last_invocation(*stage) {
                let (state, detail) = match &inv.outcome {
                    InvocationOutcome::InProgress => (StageState::Working, None),
                    InvocationOutcome::Completed => (StageState::Success, None),
                    InvocationOutcome::ShortCircuited => (
                        StageState::Skipped,
                        inv.short_circuit.as_ref().map(|sc| sc.message()),
                    ),
                    InvocationOutcome::Failed { message } => {
                        (StageState::Failure, Some(message.clone()))
                    }
                };
                board.set(*stage, state, detail);
            }
        }
        board
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{InvocationAudit, RunConfig, digest};
    use crate::router::ShortCircuit;
    use crate::session::SessionKey;

    #[test]
    fn test_new_board_is_idle_in_order() {
        let board = StatusBoard::new();
        let snapshot = board.snapshot();
        let stages: Vec<Stage> = snapshot.iter().map(|s| s.stage).collect();
        assert_eq!(stages, Stage::all().to_vec());
        assert!(snapshot.iter().all(|s| s.state == StageState::Idle));
    }

    #[test]
    fn test_set_updates_one_stage() {
        let board = StatusBoard::new();
        board.set(Stage::Test, StageState::Failure, Some("boom".into()));
        assert_eq!(board.get(Stage::Test), StageState::Failure);
        assert_eq!(board.get(Stage::Plan), StageState::Idle);

        let shared = board.clone();
        shared.reset();
        assert_eq!(board.get(Stage::Test), StageState::Idle);
    }

    #[test]
    fn test_from_audit_uses_last_entry_per_stage() {
        let mut run = AuditRun::new(
            SessionKey::new("a", "u", "s"),
            RunConfig {
                task_chars: 0,
                task_sha256: digest(""),
                artifact_cap: 1,
                fix_part_cap: 1,
                retry_ceiling: 1,
                model: None,
            },
        );
        let mut plan = InvocationAudit::new(Stage::Plan, 0, "t");
        plan.complete("p");
        run.invocations.push(plan);
        run.invocations.push(InvocationAudit::short_circuited(
            Stage::Fix,
            1,
            ShortCircuit::RetryCeilingBreached {
                fix_count: 1,
                ceiling: 1,
            },
        ));

        let board = StatusBoard::from_audit(&run);
        assert_eq!(board.get(Stage::Plan), StageState::Success);
        assert_eq!(board.get(Stage::Code), StageState::Idle);
        let fix = board
            .snapshot()
            .into_iter()
            .find(|s| s.stage == Stage::Fix)
            .unwrap();
        assert_eq!(fix.state, StageState::Skipped);
        assert!(fix.detail.unwrap().contains("Retry ceiling"));
    }
}
