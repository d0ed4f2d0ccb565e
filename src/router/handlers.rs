//! Per-stage before/after handlers and the table that selects them.

use super::types::{BeforeDecision, RoutingPolicy, ShortCircuit};
use crate::errors::WorkflowError;
use crate::sanitize::{Part, bound, combine};
use crate::session::{Session, SlotName, SlotValue};
use crate::stage::Stage;

pub const FIX_CODE_LABEL: &str = "CODE";
pub const FIX_TEST_LABEL: &str = "TEST REPORT";

type BeforeFn = fn(&RoutingPolicy, &mut Session, &str) -> Result<BeforeDecision, WorkflowError>;
type AfterFn = fn(&mut Session, String);

/// The handler pair for one stage.
pub(super) struct StageHandlers {
    pub before: BeforeFn,
    pub after: AfterFn,
}

static PLAN: StageHandlers = StageHandlers {
    before: before_plan,
    after: after_plan,
};
static CODE: StageHandlers = StageHandlers {
    before: before_code,
    after: after_code,
};
static TEST: StageHandlers = StageHandlers {
    before: before_test,
    after: after_test,
};
static FIX: StageHandlers = StageHandlers {
    before: before_fix,
    after: after_fix,
};

pub(super) fn handlers_for(stage: Stage) -> &'static StageHandlers {
    match stage {
        Stage::Plan => &PLAN,
        Stage::Code => &CODE,
        Stage::Test => &TEST,
        Stage::Fix => &FIX,
    }
}

fn before_plan(
    policy: &RoutingPolicy,
    _session: &mut Session,
    task: &str,
) -> Result<BeforeDecision, WorkflowError> {
    if task.trim().is_empty() {
        return Err(WorkflowError::MissingInput {
            stage: Stage::Plan,
            slot: "task_description",
        });
    }
    Ok(BeforeDecision::invoke(bound(task, policy.artifact_cap)))
}

// An absent PRD is tolerated: the Code stage runs on an empty string and
// reports the missing plan itself.
fn before_code(
    policy: &RoutingPolicy,
    session: &mut Session,
    _task: &str,
) -> Result<BeforeDecision, WorkflowError> {
    let prd = session.get(SlotName::Prd);
    Ok(BeforeDecision::invoke(bound(
        prd.or_empty(),
        policy.artifact_cap,
    )))
}

fn before_test(
    policy: &RoutingPolicy,
    session: &mut Session,
    _task: &str,
) -> Result<BeforeDecision, WorkflowError> {
    let code = match session.get(SlotName::Code) {
        SlotValue::Present(code) => code,
        SlotValue::Absent => {
            return Err(WorkflowError::MissingInput {
                stage: Stage::Test,
                slot: "code",
            });
        }
    };
    if session.trigger_test_after_fix {
        tracing::debug!(session = %session.key, "test triggered by previous fix");
        session.trigger_test_after_fix = false;
    }
    Ok(BeforeDecision::invoke(bound(&code, policy.artifact_cap)))
}

fn before_fix(
    policy: &RoutingPolicy,
    session: &mut Session,
    _task: &str,
) -> Result<BeforeDecision, WorkflowError> {
    if session.panic {
        return Ok(BeforeDecision::ShortCircuit(ShortCircuit::PanicAborted));
    }
    if session.fix_count >= policy.retry_ceiling {
        return Ok(BeforeDecision::ShortCircuit(
            ShortCircuit::RetryCeilingBreached {
                fix_count: session.fix_count,
                ceiling: policy.retry_ceiling,
            },
        ));
    }

    let test = session.get(SlotName::Test);
    if test.as_deref().is_some_and(|t| policy.is_all_clear(t)) {
        return Ok(BeforeDecision::ShortCircuit(ShortCircuit::NoFixNeeded));
    }

    let SlotValue::Present(code) = session.get(SlotName::Code) else {
        return Err(WorkflowError::MissingInput {
            stage: Stage::Fix,
            slot: "code",
        });
    };
    let SlotValue::Present(report) = test else {
        return Err(WorkflowError::MissingInput {
            stage: Stage::Fix,
            slot: "test_results",
        });
    };

    let payload = combine(&[
        Part::new(FIX_CODE_LABEL, &code, policy.fix_part_cap),
        Part::new(FIX_TEST_LABEL, &report, policy.fix_part_cap),
    ]);
    session.fix_count += 1;
    Ok(BeforeDecision::invoke(payload))
}

fn after_plan(session: &mut Session, text: String) {
    session.set(SlotName::Prd, text);
}

fn after_code(session: &mut Session, text: String) {
    session.set(SlotName::Code, text);
}

fn after_test(session: &mut Session, text: String) {
    session.set(SlotName::Test, text);
}

fn after_fix(session: &mut Session, text: String) {
    session.set(SlotName::Code, text);
    session.trigger_test_after_fix = true;
}
