//! Prompt templates for the LLM-backed stage capability.
//!
//! Each template has a single `{input}` placeholder. The code and fix prompts
//! ask for a JSON object mapping file paths to file contents, which is the
//! format [`crate::artifact::CodeBundle`] parses.

use crate::stage::Stage;

const PLAN_PROMPT: &str = r#"You are a senior product manager. Turn the user request below into a Product Requirements Document in markdown with these sections:
- Introduction
- Goals
- Key Features
- User Stories
- Technical Requirements
- Constraints
- Success Criteria

Reply with the PRD only.

User request:
{input}
"#;

const CODE_PROMPT: &str = r#"You are a senior software developer. Implement the PRD below.

Reply with a single JSON object and nothing else:
- keys are file paths relative to the project root (e.g. "main.py", "models/book.py")
- values are the complete contents of each file

If the PRD is empty, reply with {"ERROR.md": "No PRD available. Run the plan stage first."}.

PRD:
{input}
"#;

const TEST_PROMPT: &str = r#"You are a senior QA engineer. The input is a software project as a JSON object whose keys are file paths and whose values are file contents.

Review the code statically; do not execute it.
1. List bugs, missing logic and syntax errors, most critical first.
2. Then list worthwhile improvements.

If nothing needs to change, reply with exactly this line and nothing else:
{sentinel}

Project:
{input}
"#;

const FIX_PROMPT: &str = r#"You are a senior engineer fixing defects. The input contains the project code (a JSON object of file path to contents, under CODE) and a review report (under TEST REPORT).

Fix only the problems the report describes. Keep the file layout and file names.
Reply with the corrected project as a single JSON object of file path to contents. No explanations, no markdown.

Input:
{input}
"#;

/// Render the prompt for `stage` around `input`.
///
/// `sentinel` is the exact reply the Test stage must give when it finds nothing
/// to fix.
pub fn render(stage: Stage, input: &str, sentinel: &str) -> String {
    let template = match stage {
        Stage::Plan => PLAN_PROMPT,
        Stage::Code => CODE_PROMPT,
        Stage::Test => TEST_PROMPT,
        Stage::Fix => FIX_PROMPT,
    };
    template
        .replace("{sentinel}", sentinel)
        .replace("{input}", input)
}
