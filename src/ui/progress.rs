use crate::pipeline::{WorkflowResult, WorkflowStatus};
use crate::stage::Stage;
use crate::ui::icons::{CHECK, CODE, CROSS, FIX, PLAN, SKIP, SPARKLE, STOP, TEST};
use console::{Emoji, style};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Terminal UI for a workflow run, rendered via `indicatif` progress bars.
///
/// Two bars are stacked vertically:
/// - Stage bar: spinner with the stage currently running
/// - Fix bar: fix attempts used against the retry ceiling
pub struct PipelineUI {
    multi: MultiProgress,
    stage_bar: ProgressBar,
    fix_bar: ProgressBar,
    verbose: bool,
}

fn stage_icon(stage: Stage) -> &'static Emoji<'static, 'static> {
    match stage {
        Stage::Plan => &PLAN,
        Stage::Code => &CODE,
        Stage::Test => &TEST,
        Stage::Fix => &FIX,
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

impl PipelineUI {
    pub fn new(retry_ceiling: u32, verbose: bool) -> Self {
        Self::with_target(retry_ceiling, verbose, ProgressDrawTarget::stderr())
    }

    /// A UI that draws nothing. Used for `--json` output.
    pub fn hidden(retry_ceiling: u32) -> Self {
        Self::with_target(retry_ceiling, false, ProgressDrawTarget::hidden())
    }

    fn with_target(retry_ceiling: u32, verbose: bool, target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);

        let stage_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");
        let stage_bar = multi.add(ProgressBar::new_spinner());
        stage_bar.set_style(stage_style);
        stage_bar.set_prefix(" Stage");

        let fix_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:20.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");
        let fix_bar = multi.add(ProgressBar::new(retry_ceiling as u64));
        fix_bar.set_style(fix_style);
        fix_bar.set_prefix(" Fixes");

        Self {
            multi,
            stage_bar,
            fix_bar,
            verbose,
        }
    }

    /// Print a line above the bars, falling back to `eprintln!`.
    pub fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    pub fn start_stage(&self, stage: Stage, fix_count: u32) {
        let attempt = if stage == Stage::Fix || fix_count > 0 {
            style(format!("(after {} fixes)", fix_count)).dim().to_string()
        } else {
            String::new()
        };
        self.stage_bar.set_message(format!(
            "{}{} {}",
            stage_icon(stage),
            style(stage.as_str().to_uppercase()).yellow(),
            attempt
        ));
        self.stage_bar.enable_steady_tick(Duration::from_millis(100));
        if self.verbose {
            self.print_line(format!(
                "    {} {}",
                style("→").dim(),
                style(stage.description()).dim()
            ));
        }
    }

    pub fn stage_done(&self, stage: Stage, output_chars: usize, elapsed: Duration) {
        self.print_line(format!(
            "{}{} {}",
            CHECK,
            style(stage.as_str().to_uppercase()).green(),
            style(format!(
                "{} chars in {}",
                output_chars,
                format_elapsed(elapsed)
            ))
            .dim()
        ));
    }

    pub fn stage_skipped(&self, stage: Stage, message: &str) {
        self.print_line(format!(
            "{}{} {}",
            SKIP,
            style(stage.as_str().to_uppercase()).dim(),
            style(message).dim()
        ));
    }

    pub fn stage_failed(&self, stage: Stage, error: &str) {
        self.print_line(format!(
            "{}{} {}",
            CROSS,
            style(stage.as_str().to_uppercase()).red(),
            style(error).red()
        ));
    }

    pub fn set_fix_count(&self, fix_count: u32) {
        self.fix_bar.set_position(fix_count as u64);
    }

    pub fn finish(&self, result: &WorkflowResult) {
        self.stage_bar.finish_and_clear();
        let message = match result.status {
            WorkflowStatus::Completed => format!(
                "{}{}",
                SPARKLE,
                style("Completed: all clear on first review").green().bold()
            ),
            WorkflowStatus::Fixed => format!(
                "{}{}",
                SPARKLE,
                style(format!("Fixed after {} attempt(s)", result.fix_count))
                    .green()
                    .bold()
            ),
            WorkflowStatus::Aborted => format!(
                "{}{}",
                STOP,
                style(format!(
                    "Aborted: {}",
                    result
                        .abort_reason
                        .as_ref()
                        .map(|r| r.to_string())
                        .unwrap_or_default()
                ))
                .red()
                .bold()
            ),
        };
        self.fix_bar.finish_with_message(message);
    }

    /// Tear down the bars after an error.
    pub fn abandon(&self, error: &str) {
        self.stage_bar.finish_and_clear();
        self.fix_bar
            .abandon_with_message(format!("{}", style(error).red()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::AbortReason;
    use crate::session::SessionKey;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_elapsed(Duration::from_secs(125)), "2m 5s");
    }

    #[test]
    fn test_hidden_ui_accepts_every_event() {
        let ui = PipelineUI::hidden(3);
        for stage in Stage::all() {
            ui.start_stage(*stage, 1);
            ui.stage_done(*stage, 10, Duration::from_millis(5));
        }
        ui.stage_skipped(Stage::Fix, "No fixing needed");
        ui.stage_failed(Stage::Code, "timeout");
        ui.set_fix_count(2);
        ui.finish(&WorkflowResult {
            session: SessionKey::new("a", "u", "s"),
            status: WorkflowStatus::Aborted,
            plan: String::new(),
            code: String::new(),
            test_result: String::new(),
            fix_count: 3,
            abort_reason: Some(AbortReason::PanicAborted),
        });
    }
}
