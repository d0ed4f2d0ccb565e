use crate::session::SessionKey;
use serde::{Deserialize, Serialize};

/// Final status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    /// All clear on the first test, no fixes applied.
    Completed,
    /// All clear after at least one fix.
    Fixed,
    /// Stopped by policy (retry ceiling or panic).
    Aborted,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Fixed => "fixed",
            WorkflowStatus::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a run was stopped by policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbortReason {
    RetryCeilingBreached { fix_count: u32, ceiling: u32 },
    PanicAborted,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortReason::RetryCeilingBreached { fix_count, ceiling } => write!(
                f,
                "retry ceiling breached after {} of {} fix attempts",
                fix_count, ceiling
            ),
            AbortReason::PanicAborted => write!(f, "aborted by panic flag"),
        }
    }
}

/// What `Pipeline::start` returns when the run reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub session: SessionKey,
    pub status: WorkflowStatus,
    pub plan: String,
    pub code: String,
    pub test_result: String,
    pub fix_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<AbortReason>,
}

impl WorkflowResult {
    pub fn is_success(&self) -> bool {
        self.status != WorkflowStatus::Aborted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(WorkflowStatus::Fixed).unwrap(),
            serde_json::json!("fixed")
        );
    }

    #[test]
    fn test_abort_reason_display() {
        let reason = AbortReason::RetryCeilingBreached {
            fix_count: 3,
            ceiling: 3,
        };
        assert_eq!(
            reason.to_string(),
            "retry ceiling breached after 3 of 3 fix attempts"
        );
    }

    #[test]
    fn test_result_json_omits_absent_abort_reason() {
        let result = WorkflowResult {
            session: SessionKey::new("a", "u", "s"),
            status: WorkflowStatus::Completed,
            plan: "p".into(),
            code: "c".into(),
            test_result: "t".into(),
            fix_count: 0,
            abort_reason: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "completed");
        assert!(json.get("abort_reason").is_none());
        assert!(result.is_success());
    }
}
