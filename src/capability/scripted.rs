use super::StageCapability;
use crate::errors::CapabilityError;
use crate::stage::{Stage, StageOutput};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{LazyLock, Mutex};

static DRY_RUN_CODE: LazyLock<serde_json::Value> = LazyLock::new(|| {
    serde_json::json!({
        "README.md": "Generated by a dry run; no model was called.\n",
        "main.py": concat!(
            "def main():\n    print(\"hello from sdlc-cycle\")\n\n\n",
            "if __name__ == \"__main__\":\n    main()\n"
        ),
    })
});

/// One recorded call to a [`ScriptedCapability`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedCall {
    pub stage: Stage,
    pub input: String,
}

enum Scripted {
    Output(StageOutput),
    Failure(String),
}

/// Capability that replays queued responses per stage and records every call.
///
/// Responses are consumed in FIFO order. When a stage's queue is empty the
/// last response for that stage repeats if `repeat_last` is set; otherwise the
/// call fails.
#[derive(Default)]
pub struct ScriptedCapability {
    queues: Mutex<HashMap<Stage, VecDeque<Scripted>>>,
    last: Mutex<HashMap<Stage, StageOutput>>,
    calls: Mutex<Vec<ScriptedCall>>,
    repeat_last: bool,
}

impl ScriptedCapability {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep answering with the last output once a stage's queue runs dry.
    pub fn repeating(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    /// Queue an output for `stage`.
    pub fn respond(self, stage: Stage, output: impl Into<StageOutput>) -> Self {
        self.push(stage, Scripted::Output(output.into()));
        self
    }

    /// Queue a failure for `stage`.
    pub fn fail(self, stage: Stage, message: impl Into<String>) -> Self {
        self.push(stage, Scripted::Failure(message.into()));
        self
    }

    fn push(&self, stage: Stage, item: Scripted) {
        if let Ok(mut queues) = self.queues.lock() {
            queues.entry(stage).or_default().push_back(item);
        }
    }

    /// Canned offline responses for `run --dry-run`.
    pub fn dry_run(all_clear_sentinel: &str) -> Self {
        Self::dry_run_base().respond(Stage::Test, all_clear_sentinel)
    }

    /// Dry run whose test stage never clears, so the run ends at the retry
    /// ceiling.
    pub fn dry_run_with_defects() -> Self {
        Self::dry_run_base()
            .respond(
                Stage::Test,
                "Defect: main() prints a greeting instead of doing the task.",
            )
            .respond(Stage::Fix, DRY_RUN_CODE.clone())
    }

    fn dry_run_base() -> Self {
        Self::new()
            .repeating()
            .respond(
                Stage::Plan,
                "# PRD (dry run)\n\n## Introduction\nPlaceholder plan produced without a model.",
            )
            .respond(Stage::Code, DRY_RUN_CODE.clone())
    }

    pub fn calls(&self) -> Vec<ScriptedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self, stage: Stage) -> usize {
        self.calls().iter().filter(|c| c.stage == stage).count()
    }
}

#[async_trait]
impl StageCapability for ScriptedCapability {
    async fn invoke(&self, stage: Stage, input: &str) -> Result<StageOutput, CapabilityError> {
        self.calls
            .lock()
            .map_err(|_| anyhow::anyhow!("scripted call log poisoned"))?
            .push(ScriptedCall {
                stage,
                input: input.to_string(),
            });

        let next = self
            .queues
            .lock()
            .map_err(|_| anyhow::anyhow!("scripted queue poisoned"))?
            .get_mut(&stage)
            .and_then(VecDeque::pop_front);

        let mut last = self
            .last
            .lock()
            .map_err(|_| anyhow::anyhow!("scripted queue poisoned"))?;

        match next {
            Some(Scripted::Output(output)) => {
                last.insert(stage, output.clone());
                Ok(output)
            }
            Some(Scripted::Failure(message)) => Err(CapabilityError::RequestFailed(message)),
            None if self.repeat_last => last.get(&stage).cloned().ok_or_else(|| {
                CapabilityError::Other(anyhow::anyhow!("no scripted response for stage {stage}"))
            }),
            None => Err(CapabilityError::Other(anyhow::anyhow!(
                "no scripted response left for stage {stage}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_responses_are_fifo_per_stage() {
        let cap = ScriptedCapability::new()
            .respond(Stage::Test, "first")
            .respond(Stage::Test, "second");
        assert_eq!(
            cap.invoke(Stage::Test, "in").await.unwrap(),
            StageOutput::from("first")
        );
        assert_eq!(
            cap.invoke(Stage::Test, "in").await.unwrap(),
            StageOutput::from("second")
        );
        assert!(cap.invoke(Stage::Test, "in").await.is_err());
        assert_eq!(cap.call_count(Stage::Test), 3);
    }

    #[tokio::test]
    async fn test_repeating_reuses_last_output() {
        let cap = ScriptedCapability::new()
            .repeating()
            .respond(Stage::Code, "code");
        cap.invoke(Stage::Code, "").await.unwrap();
        assert_eq!(
            cap.invoke(Stage::Code, "").await.unwrap(),
            StageOutput::from("code")
        );
    }

    #[tokio::test]
    async fn test_failure_is_request_failed() {
        let cap = ScriptedCapability::new().fail(Stage::Plan, "timeout");
        let err = cap.invoke(Stage::Plan, "task").await.unwrap_err();
        assert!(matches!(err, CapabilityError::RequestFailed(m) if m == "timeout"));
    }

    #[tokio::test]
    async fn test_calls_record_inputs() {
        let cap = ScriptedCapability::new().respond(Stage::Plan, "prd");
        cap.invoke(Stage::Plan, "build a thing").await.unwrap();
        assert_eq!(
            cap.calls(),
            vec![ScriptedCall {
                stage: Stage::Plan,
                input: "build a thing".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_dry_run_answers_every_stage_but_fix() {
        let cap = ScriptedCapability::dry_run("ALL CLEAR");
        assert!(cap.invoke(Stage::Plan, "t").await.is_ok());
        assert!(cap.invoke(Stage::Code, "t").await.is_ok());
        assert_eq!(
            cap.invoke(Stage::Test, "t").await.unwrap(),
            StageOutput::from("ALL CLEAR")
        );
        assert!(cap.invoke(Stage::Fix, "t").await.is_err());
    }

    #[tokio::test]
    async fn test_dry_run_with_defects_never_clears() {
        let cap = ScriptedCapability::dry_run_with_defects();
        for _ in 0..3 {
            let report = cap.invoke(Stage::Test, "t").await.unwrap();
            assert!(report.into_text().unwrap().starts_with("Defect:"));
            assert!(cap.invoke(Stage::Fix, "t").await.is_ok());
        }
    }
}
