//! Stage router: the before/after hooks wrapped around every capability call.
//!
//! The before-hook picks and sanitizes a stage's input from the session, or
//! short-circuits the call entirely. The after-hook normalizes the stage result
//! to text and writes it to the session. These hooks are the only code that
//! mutates a session.
//!
//! | Stage | Before                                   | After                                   |
//! |-------|------------------------------------------|-----------------------------------------|
//! | Plan  | bound task description                   | `prd`                                   |
//! | Code  | bound `prd` (empty if absent)            | `code`                                  |
//! | Test  | bound `code`, clear fix trigger          | `test`                                  |
//! | Fix   | panic / ceiling / sentinel checks, then `code` + `test` payload, `fix_count += 1` | `code`, set fix trigger |

mod handlers;
pub mod types;

pub use handlers::{FIX_CODE_LABEL, FIX_TEST_LABEL};
pub use types::{BeforeDecision, RoutingPolicy, ShortCircuit};

use crate::errors::{CapabilityError, WorkflowError};
use crate::session::Session;
use crate::stage::{Stage, StageOutput};

/// Applies the routing policy to a session around each stage call.
#[derive(Debug, Clone, Default)]
pub struct StageRouter {
    policy: RoutingPolicy,
}

impl StageRouter {
    pub fn new(policy: RoutingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RoutingPolicy {
        &self.policy
    }

    /// Decide the input for `stage`, or short-circuit it.
    ///
    /// `task` is the caller's task description; only the Plan stage reads it.
    pub fn before(
        &self,
        stage: Stage,
        session: &mut Session,
        task: &str,
    ) -> Result<BeforeDecision, WorkflowError> {
        let decision = (handlers::handlers_for(stage).before)(&self.policy, session, task)?;
        match &decision {
            BeforeDecision::Invoke { input } => tracing::debug!(
                session = %session.key,
                %stage,
                input_chars = crate::sanitize::text_len(input),
                fix_count = session.fix_count,
                "before-hook: invoke"
            ),
            BeforeDecision::ShortCircuit(sc) => tracing::info!(
                session = %session.key,
                %stage,
                short_circuit = sc.as_str(),
                fix_count = session.fix_count,
                "before-hook: short-circuit"
            ),
        }
        Ok(decision)
    }

    /// Normalize `output` to text and store it in the stage's slot.
    ///
    /// Returns the stored text.
    pub fn after(
        &self,
        stage: Stage,
        session: &mut Session,
        output: StageOutput,
    ) -> Result<String, WorkflowError> {
        let text = output
            .into_text()
            .map_err(|detail| WorkflowError::MalformedResult { stage, detail })?;
        if text.trim().is_empty() {
            return Err(WorkflowError::CapabilityFailure {
                stage,
                source: CapabilityError::EmptyOutput,
            });
        }

        (handlers::handlers_for(stage).after)(session, text.clone());
        tracing::debug!(
            session = %session.key,
            %stage,
            output_chars = crate::sanitize::text_len(&text),
            "after-hook: stored result"
        );
        Ok(text)
    }

    /// Set the session's panic flag. Observed by the next Fix before-hook.
    pub fn raise_panic(&self, session: &mut Session) {
        if !session.panic {
            tracing::warn!(session = %session.key, "panic flag raised");
        }
        session.panic = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionKey, SlotName, SlotValue};

    fn session() -> Session {
        Session::new(SessionKey::new("sdlc_cycle", "user1", "t"))
    }

    fn router() -> StageRouter {
        StageRouter::default()
    }

    fn small_router() -> StageRouter {
        StageRouter::new(RoutingPolicy {
            artifact_cap: 8,
            fix_part_cap: 4,
            retry_ceiling: 2,
            all_clear_sentinel: "OK".to_string(),
        })
    }

    fn input(decision: BeforeDecision) -> String {
        match decision {
            BeforeDecision::Invoke { input } => input,
            other => panic!("expected Invoke, got {other:?}"),
        }
    }

    #[test]
    fn plan_uses_task_description() {
        let mut s = session();
        let d = router().before(Stage::Plan, &mut s, "build a CLI calculator").unwrap();
        assert_eq!(input(d), "build a CLI calculator");
    }

    #[test]
    fn plan_rejects_blank_task() {
        let mut s = session();
        let err = router().before(Stage::Plan, &mut s, "   ").unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::MissingInput {
                stage: Stage::Plan,
                ..
            }
        ));
    }

    #[test]
    fn code_runs_on_empty_input_when_prd_absent() {
        let mut s = session();
        let d = router().before(Stage::Code, &mut s, "").unwrap();
        assert_eq!(input(d), "");
    }

    #[test]
    fn code_bounds_prd_to_artifact_cap() {
        let mut s = session();
        s.set(SlotName::Prd, "0123456789abc");
        let d = small_router().before(Stage::Code, &mut s, "").unwrap();
        assert_eq!(input(d), "56789abc");
    }

    #[test]
    fn test_requires_code() {
        let mut s = session();
        let err = router().before(Stage::Test, &mut s, "").unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::MissingInput {
                stage: Stage::Test,
                slot: "code"
            }
        ));
    }

    #[test]
    fn test_clears_fix_trigger() {
        let mut s = session();
        s.set(SlotName::Code, "fn main() {}");
        s.trigger_test_after_fix = true;
        let d = router().before(Stage::Test, &mut s, "").unwrap();
        assert_eq!(input(d), "fn main() {}");
        assert!(!s.trigger_test_after_fix);
    }

    #[test]
    fn fix_panic_takes_priority_over_ceiling() {
        let mut s = session();
        s.panic = true;
        s.fix_count = 10;
        let d = router().before(Stage::Fix, &mut s, "").unwrap();
        assert_eq!(d, BeforeDecision::ShortCircuit(ShortCircuit::PanicAborted));
        assert_eq!(s.fix_count, 10);
    }

    #[test]
    fn fix_ceiling_short_circuits_without_increment() {
        let mut s = session();
        s.set(SlotName::Code, "code");
        s.set(SlotName::Test, "bug");
        s.fix_count = 3;
        let d = router().before(Stage::Fix, &mut s, "").unwrap();
        assert_eq!(
            d,
            BeforeDecision::ShortCircuit(ShortCircuit::RetryCeilingBreached {
                fix_count: 3,
                ceiling: 3
            })
        );
        assert_eq!(s.fix_count, 3);
    }

    #[test]
    fn fix_sentinel_short_circuits_without_increment() {
        let mut s = session();
        s.set(SlotName::Code, "code");
        s.set(SlotName::Test, types::DEFAULT_ALL_CLEAR_SENTINEL);
        let d = router().before(Stage::Fix, &mut s, "").unwrap();
        assert_eq!(d, BeforeDecision::ShortCircuit(ShortCircuit::NoFixNeeded));
        assert_eq!(s.fix_count, 0);
    }

    #[test]
    fn fix_combines_capped_parts_and_increments() {
        let mut s = session();
        s.set(SlotName::Code, "abcdefgh");
        s.set(SlotName::Test, "broken!!");
        let d = small_router().before(Stage::Fix, &mut s, "").unwrap();
        assert_eq!(input(d), "CODE:\nefgh\n\nTEST REPORT:\nen!!");
        assert_eq!(s.fix_count, 1);
    }

    #[test]
    fn fix_requires_test_report() {
        let mut s = session();
        s.set(SlotName::Code, "code");
        let err = router().before(Stage::Fix, &mut s, "").unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::MissingInput {
                stage: Stage::Fix,
                slot: "test_results"
            }
        ));
        assert_eq!(s.fix_count, 0);
    }

    #[test]
    fn after_writes_each_stage_slot() {
        let r = router();
        let mut s = session();
        r.after(Stage::Plan, &mut s, "prd".into()).unwrap();
        r.after(Stage::Code, &mut s, "code".into()).unwrap();
        r.after(Stage::Test, &mut s, "report".into()).unwrap();
        assert_eq!(s.get(SlotName::Prd), SlotValue::Present("prd".into()));
        assert_eq!(s.get(SlotName::Code), SlotValue::Present("code".into()));
        assert_eq!(s.get(SlotName::Test), SlotValue::Present("report".into()));
        assert!(!s.trigger_test_after_fix);
    }

    #[test]
    fn after_fix_overwrites_code_and_sets_trigger() {
        let r = router();
        let mut s = session();
        s.set(SlotName::Code, "old");
        r.after(Stage::Fix, &mut s, "new".into()).unwrap();
        assert_eq!(s.get(SlotName::Code).as_deref(), Some("new"));
        assert!(s.trigger_test_after_fix);
    }

    #[test]
    fn after_coerces_structured_results_to_text() {
        let r = router();
        let mut s = session();
        let stored = r
            .after(Stage::Code, &mut s, serde_json::json!({"a.py": "x"}).into())
            .unwrap();
        assert_eq!(stored, r#"{"a.py":"x"}"#);
        assert_eq!(s.get(SlotName::Code).as_deref(), Some(r#"{"a.py":"x"}"#));
    }

    #[test]
    fn after_rejects_malformed_and_empty_results() {
        let r = router();
        let mut s = session();
        let err = r
            .after(Stage::Test, &mut s, StageOutput::Structured(serde_json::Value::Null))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::MalformedResult { .. }));

        let err = r.after(Stage::Test, &mut s, "  \n".into()).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::CapabilityFailure {
                source: CapabilityError::EmptyOutput,
                ..
            }
        ));
        assert!(s.get(SlotName::Test).is_absent());
    }

    #[test]
    fn raise_panic_sets_flag() {
        let r = router();
        let mut s = session();
        r.raise_panic(&mut s);
        r.raise_panic(&mut s);
        assert!(s.panic);
    }
}
