//! Decision types produced by the router's before-hooks.

use crate::pipeline::AbortReason;
use serde::{Deserialize, Serialize};

/// A before-hook decision to skip the capability call and substitute a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShortCircuit {
    /// The panic flag was set; no Fix call is made.
    PanicAborted,
    /// `fix_count` reached the retry ceiling; no Fix call is made.
    RetryCeilingBreached { fix_count: u32, ceiling: u32 },
    /// The latest test report is the all-clear sentinel; nothing to fix.
    NoFixNeeded,
}

impl ShortCircuit {
    /// Human-readable result text substituted for the skipped call.
    pub fn message(&self) -> String {
        match self {
            ShortCircuit::PanicAborted => "Panic flag set; fix skipped".to_string(),
            ShortCircuit::RetryCeilingBreached { fix_count, ceiling } => format!(
                "Retry ceiling reached ({} of {} fix attempts); fix skipped",
                fix_count, ceiling
            ),
            ShortCircuit::NoFixNeeded => "No fixing needed".to_string(),
        }
    }

    /// The abort reason this short-circuit implies, if it terminates the run.
    pub fn abort_reason(&self) -> Option<AbortReason> {
        match self {
            ShortCircuit::PanicAborted => Some(AbortReason::PanicAborted),
            ShortCircuit::RetryCeilingBreached { fix_count, ceiling } => {
                Some(AbortReason::RetryCeilingBreached {
                    fix_count: *fix_count,
                    ceiling: *ceiling,
                })
            }
            ShortCircuit::NoFixNeeded => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShortCircuit::PanicAborted => "panic_aborted",
            ShortCircuit::RetryCeilingBreached { .. } => "retry_ceiling_breached",
            ShortCircuit::NoFixNeeded => "no_fix_needed",
        }
    }
}

/// Outcome of a before-hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeforeDecision {
    /// Call the capability with this sanitized input.
    Invoke { input: String },
    /// Do not call the capability.
    ShortCircuit(ShortCircuit),
}

impl BeforeDecision {
    pub fn invoke(input: impl Into<String>) -> Self {
        BeforeDecision::Invoke {
            input: input.into(),
        }
    }

    pub fn is_short_circuit(&self) -> bool {
        matches!(self, BeforeDecision::ShortCircuit(_))
    }
}

/// Limits and markers the router enforces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingPolicy {
    /// Cap on any single artifact passed as stage input.
    pub artifact_cap: usize,
    /// Cap on each of the code and test-report parts of the Fix input.
    pub fix_part_cap: usize,
    /// Maximum number of Fix invocations per run.
    pub retry_ceiling: u32,
    /// Exact Test output meaning "no defects found".
    pub all_clear_sentinel: String,
}

pub const DEFAULT_ARTIFACT_CAP: usize = 10_000;
pub const DEFAULT_FIX_PART_CAP: usize = 5_000;
pub const DEFAULT_RETRY_CEILING: u32 = 3;
pub const DEFAULT_ALL_CLEAR_SENTINEL: &str = "U EE A E A U EE EE A E";

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            artifact_cap: DEFAULT_ARTIFACT_CAP,
            fix_part_cap: DEFAULT_FIX_PART_CAP,
            retry_ceiling: DEFAULT_RETRY_CEILING,
            all_clear_sentinel: DEFAULT_ALL_CLEAR_SENTINEL.to_string(),
        }
    }
}

impl RoutingPolicy {
    /// Exact-equality sentinel match.
    pub fn is_all_clear(&self, test_report: &str) -> bool {
        test_report == self.all_clear_sentinel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceiling_breach_maps_to_abort_reason() {
        let sc = ShortCircuit::RetryCeilingBreached {
            fix_count: 3,
            ceiling: 3,
        };
        assert_eq!(
            sc.abort_reason(),
            Some(AbortReason::RetryCeilingBreached {
                fix_count: 3,
                ceiling: 3
            })
        );
        assert!(sc.message().contains("3 of 3"));
    }

    #[test]
    fn test_no_fix_needed_does_not_abort() {
        assert_eq!(ShortCircuit::NoFixNeeded.abort_reason(), None);
        assert_eq!(ShortCircuit::NoFixNeeded.message(), "No fixing needed");
    }

    #[test]
    fn test_sentinel_match_is_exact() {
        let policy = RoutingPolicy::default();
        assert!(policy.is_all_clear(DEFAULT_ALL_CLEAR_SENTINEL));
        assert!(!policy.is_all_clear(&format!("{DEFAULT_ALL_CLEAR_SENTINEL}\n")));
        assert!(!policy.is_all_clear("u ee a e a u ee ee a e"));
        assert!(!policy.is_all_clear(""));
    }

    #[test]
    fn test_short_circuit_serializes_with_kind_tag() {
        let json = serde_json::to_value(ShortCircuit::PanicAborted).unwrap();
        assert_eq!(json["kind"], "panic_aborted");
    }
}
