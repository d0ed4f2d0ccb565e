//! Stage identifiers and stage output normalization.
//!
//! A `Stage` is one named step of the workflow. Each stage maps to exactly one
//! capability call; the router picks its before/after handlers by this tag.

use serde::{Deserialize, Serialize};

/// The four workflow stages, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Turn the task description into a product requirements document.
    Plan,
    /// Turn the PRD into a code bundle.
    Code,
    /// Review the code bundle and report defects (or the all-clear sentinel).
    Test,
    /// Repair the code bundle given the latest test report.
    Fix,
}

impl Stage {
    /// Returns all stages in pipeline order.
    pub fn all() -> &'static [Stage] {
        &[Stage::Plan, Stage::Code, Stage::Test, Stage::Fix]
    }

    /// Returns the stage name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Plan => "plan",
            Stage::Code => "code",
            Stage::Test => "test",
            Stage::Fix => "fix",
        }
    }

    /// Short human-readable description of what the stage does.
    pub fn description(&self) -> &'static str {
        match self {
            Stage::Plan => "Creates a PRD from user input",
            Stage::Code => "Reads the PRD and writes the code bundle",
            Stage::Test => "Reviews the generated code and reports issues",
            Stage::Fix => "Fixes bugs in the code based on the test report",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plan" | "planner" => Ok(Stage::Plan),
            "code" | "coder" => Ok(Stage::Code),
            "test" | "tester" => Ok(Stage::Test),
            "fix" | "fixer" => Ok(Stage::Fix),
            _ => anyhow::bail!("Invalid stage '{}'. Valid values: plan, code, test, fix", s),
        }
    }
}

/// Raw result handed back by a stage capability, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Text(String),
    Structured(serde_json::Value),
    Bytes(Vec<u8>),
}

impl StageOutput {
    /// Coerce the output to its text representation.
    ///
    /// JSON strings unwrap to their contents; other JSON values render as
    /// compact JSON text. `null` and non-UTF-8 bytes have no text form and
    /// yield `Err` with a short description of what was received.
    pub fn into_text(self) -> Result<String, String> {
        match self {
            StageOutput::Text(text) => Ok(text),
            StageOutput::Structured(serde_json::Value::Null) => {
                Err("structured result was null".to_string())
            }
            StageOutput::Structured(serde_json::Value::String(text)) => Ok(text),
            StageOutput::Structured(value) => Ok(value.to_string()),
            StageOutput::Bytes(bytes) => String::from_utf8(bytes)
                .map_err(|e| format!("byte result is not valid UTF-8: {e}")),
        }
    }
}

impl From<String> for StageOutput {
    fn from(text: String) -> Self {
        StageOutput::Text(text)
    }
}

impl From<&str> for StageOutput {
    fn from(text: &str) -> Self {
        StageOutput::Text(text.to_string())
    }
}

impl From<serde_json::Value> for StageOutput {
    fn from(value: serde_json::Value) -> Self {
        StageOutput::Structured(value)
    }
}
