//! The pipeline controller: runs Plan once, Code once, then the Test/Fix loop.
//!
//! The controller never touches session slots itself. Every read and write
//! goes through the router, and the store lock is only held for the duration
//! of one synchronous hook call, never across a capability `.await`.

use super::result::{AbortReason, WorkflowResult, WorkflowStatus};
use super::state::PipelineState;
use crate::audit::{AuditLogger, InvocationAudit, RunConfig, RunOutcome, digest};
use crate::capability::StageCapability;
use crate::errors::WorkflowError;
use crate::router::{BeforeDecision, RoutingPolicy, ShortCircuit, StageRouter};
use crate::sanitize::text_len;
use crate::session::{SessionKey, SessionStore, SlotName};
use crate::stage::Stage;
use crate::status::{StageState, StatusBoard};
use crate::ui::PipelineUI;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::Instrument;

pub const DEFAULT_APP_NAME: &str = "sdlc_cycle";
pub const DEFAULT_USER_ID: &str = "user1";

/// Cloneable abort request. Raising it sets the panic flag on the next stage
/// boundary, which the Fix before-hook turns into an abort.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    raised: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_abort(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

/// Result of one stage step as seen by the state machine.
enum StageOutcome {
    Completed(String),
    ShortCircuited(ShortCircuit),
}

pub struct Pipeline {
    capability: Arc<dyn StageCapability>,
    store: SessionStore,
    router: StageRouter,
    status: StatusBoard,
    abort: AbortHandle,
    app: String,
    user: String,
    audit_dir: Option<PathBuf>,
    model: Option<String>,
    ui: Option<Arc<PipelineUI>>,
}

impl Pipeline {
    pub fn new(capability: Arc<dyn StageCapability>, policy: RoutingPolicy) -> Self {
        Self {
            capability,
            store: SessionStore::new(),
            router: StageRouter::new(policy),
            status: StatusBoard::new(),
            abort: AbortHandle::new(),
            app: DEFAULT_APP_NAME.to_string(),
            user: DEFAULT_USER_ID.to_string(),
            audit_dir: None,
            model: None,
            ui: None,
        }
    }

    /// Share an existing store, e.g. to run several pipelines over one map.
    pub fn with_store(mut self, store: SessionStore) -> Self {
        self.store = store;
        self
    }

    pub fn with_identity(mut self, app: impl Into<String>, user: impl Into<String>) -> Self {
        self.app = app.into();
        self.user = user.into();
        self
    }

    /// Write an audit trail for every run under `audit_dir`.
    pub fn with_audit_dir(mut self, audit_dir: impl Into<PathBuf>) -> Self {
        self.audit_dir = Some(audit_dir.into());
        self
    }

    /// Model name recorded in the audit trail.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_ui(mut self, ui: Arc<PipelineUI>) -> Self {
        self.ui = Some(ui);
        self
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn policy(&self) -> &RoutingPolicy {
        self.router.policy()
    }

    /// Current per-stage status, in pipeline order.
    pub fn status(&self) -> Vec<crate::status::StageStatus> {
        self.status.snapshot()
    }

    /// Run the workflow for `task` in a fresh session.
    pub async fn start(&self, task: &str) -> Result<WorkflowResult, WorkflowError> {
        let key = SessionKey::generate(&self.app, &self.user);
        self.start_with_key(key, task).await
    }

    /// Run the workflow for `task` in the session identified by `key`.
    ///
    /// Returns `Ok` for both successful and policy-aborted runs; `Err` only for
    /// missing inputs and capability failures.
    pub async fn start_with_key(
        &self,
        key: SessionKey,
        task: &str,
    ) -> Result<WorkflowResult, WorkflowError> {
        self.store.create(&key)?;
        self.status.reset();

        let mut audit = self.open_audit(&key, task);
        let span = tracing::info_span!("workflow", session = %key);
        let outcome = self.drive(&key, task, &mut audit).instrument(span).await;

        let run_outcome = match &outcome {
            Ok(result) => RunOutcome::from_result(result),
            Err(e) => RunOutcome::Failed {
                message: e.to_string(),
            },
        };
        if let Some(logger) = audit.as_mut() {
            match logger.finish_run(run_outcome) {
                Ok(path) => tracing::debug!(path = %path.display(), "audit run written"),
                Err(e) => tracing::warn!(error = %e, "failed to write audit run"),
            }
        }

        match &outcome {
            Ok(result) => {
                tracing::info!(
                    session = %key,
                    status = %result.status,
                    fix_count = result.fix_count,
                    "workflow finished"
                );
                if let Some(ui) = &self.ui {
                    ui.finish(result);
                }
            }
            Err(e) => {
                tracing::error!(session = %key, error = %e, "workflow failed");
                if let Some(ui) = &self.ui {
                    ui.abandon(&e.to_string());
                }
            }
        }
        outcome
    }

    fn open_audit(&self, key: &SessionKey, task: &str) -> Option<AuditLogger> {
        let dir = self.audit_dir.as_ref()?;
        let policy = self.router.policy();
        let mut logger = AuditLogger::new(dir);
        let config = RunConfig {
            task_chars: text_len(task),
            task_sha256: digest(task),
            artifact_cap: policy.artifact_cap,
            fix_part_cap: policy.fix_part_cap,
            retry_ceiling: policy.retry_ceiling,
            model: self.model.clone(),
        };
        match logger.start_run(key.clone(), config) {
            Ok(()) => Some(logger),
            Err(e) => {
                tracing::warn!(error = %e, "audit disabled for this run");
                None
            }
        }
    }

    async fn drive(
        &self,
        key: &SessionKey,
        task: &str,
        audit: &mut Option<AuditLogger>,
    ) -> Result<WorkflowResult, WorkflowError> {
        let mut state = PipelineState::Plan;
        let mut abort_reason = None;

        while !state.is_terminal() {
            let next = match state {
                PipelineState::Plan => {
                    self.run_stage(key, Stage::Plan, task, audit).await?;
                    PipelineState::Code
                }
                PipelineState::Code => {
                    self.run_stage(key, Stage::Code, task, audit).await?;
                    PipelineState::Test
                }
                PipelineState::Test => {
                    let outcome = self.run_stage(key, Stage::Test, task, audit).await?;
                    match outcome {
                        StageOutcome::Completed(report)
                            if self.router.policy().is_all_clear(&report) =>
                        {
                            PipelineState::Done
                        }
                        _ => PipelineState::Fix,
                    }
                }
                PipelineState::Fix => match self.run_stage(key, Stage::Fix, task, audit).await? {
                    StageOutcome::Completed(_) => PipelineState::Test,
                    StageOutcome::ShortCircuited(sc) => match sc.abort_reason() {
                        Some(reason) => {
                            abort_reason = Some(reason);
                            PipelineState::Aborted
                        }
                        None => PipelineState::Done,
                    },
                },
                PipelineState::Done | PipelineState::Aborted => break,
            };
            tracing::debug!(from = %state, to = %next, "transition");
            state = state.transition(next)?;
        }

        self.finish(key, abort_reason)
    }

    fn finish(
        &self,
        key: &SessionKey,
        abort_reason: Option<AbortReason>,
    ) -> Result<WorkflowResult, WorkflowError> {
        let session = self.store.snapshot(key)?;
        let status = match (&abort_reason, session.fix_count) {
            (Some(_), _) => WorkflowStatus::Aborted,
            (None, 0) => WorkflowStatus::Completed,
            (None, _) => WorkflowStatus::Fixed,
        };
        Ok(WorkflowResult {
            session: key.clone(),
            status,
            plan: session.get(SlotName::Prd).or_empty().to_string(),
            code: session.get(SlotName::Code).or_empty().to_string(),
            test_result: session.get(SlotName::Test).or_empty().to_string(),
            fix_count: session.fix_count,
            abort_reason,
        })
    }

    /// Forward a raised abort handle to the session's panic flag.
    fn sync_abort(&self, key: &SessionKey) -> Result<(), WorkflowError> {
        if self.abort.is_requested() {
            self.store
                .update(key, |session| self.router.raise_panic(session))?;
        }
        Ok(())
    }

    async fn run_stage(
        &self,
        key: &SessionKey,
        stage: Stage,
        task: &str,
        audit: &mut Option<AuditLogger>,
    ) -> Result<StageOutcome, WorkflowError> {
        self.sync_abort(key)?;

        let before = self.store.update(key, |session| {
            self.router
                .before(stage, session, task)
                .map(|d| (d, session.fix_count))
        })?;
        let (decision, fix_count) = match before {
            Ok(decided) => decided,
            Err(e) => {
                self.status
                    .set(stage, StageState::Failure, Some(e.to_string()));
                return Err(e);
            }
        };

        let input = match decision {
            BeforeDecision::ShortCircuit(sc) => {
                self.status
                    .set(stage, StageState::Skipped, Some(sc.message()));
                if let Some(ui) = &self.ui {
                    ui.stage_skipped(stage, &sc.message());
                }
                record(
                    audit,
                    InvocationAudit::short_circuited(stage, fix_count, sc.clone()),
                );
                return Ok(StageOutcome::ShortCircuited(sc));
            }
            BeforeDecision::Invoke { input } => input,
        };

        self.status.set(stage, StageState::Working, None);
        if let Some(ui) = &self.ui {
            ui.set_fix_count(fix_count);
            ui.start_stage(stage, fix_count);
        }
        let mut entry = InvocationAudit::new(stage, fix_count, &input);
        let started = Instant::now();

        let stored = match self.capability.invoke(stage, &input).await {
            Ok(output) => self
                .store
                .update(key, |session| self.router.after(stage, session, output))
                .map_err(WorkflowError::from)
                .and_then(|r| r),
            Err(source) => Err(WorkflowError::CapabilityFailure { stage, source }),
        };

        match stored {
            Ok(text) => {
                self.status.set(stage, StageState::Success, None);
                if let Some(ui) = &self.ui {
                    ui.stage_done(stage, text_len(&text), started.elapsed());
                }
                entry.complete(&text);
                record(audit, entry);
                Ok(StageOutcome::Completed(text))
            }
            Err(e) => {
                self.status
                    .set(stage, StageState::Failure, Some(e.to_string()));
                if let Some(ui) = &self.ui {
                    ui.stage_failed(stage, &e.to_string());
                }
                entry.fail(e.to_string());
                record(audit, entry);
                Err(e)
            }
        }
    }
}

fn record(audit: &mut Option<AuditLogger>, entry: InvocationAudit) {
    if let Some(logger) = audit.as_mut()
        && let Err(e) = logger.record(entry)
    {
        tracing::warn!(error = %e, "failed to record audit entry");
    }
}
