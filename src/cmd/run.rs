//! Workflow execution: `sdlc-cycle run "<task>"`.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use super::super::Cli;
use sdlc_cycle::pipeline::{AbortHandle, WorkflowResult};

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// What to build
    pub task: String,

    /// Write the generated files here
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// Fix attempts before aborting (overrides sdlc.toml and SDLC_RETRY_CEILING)
    #[arg(long)]
    pub retry_ceiling: Option<u32>,

    /// Model name (overrides sdlc.toml and SDLC_MODEL)
    #[arg(long)]
    pub model: Option<String>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Use canned responses instead of calling the model
    #[arg(long)]
    pub dry_run: bool,

    /// With --dry-run, have the test stage keep reporting defects
    #[arg(long, requires = "dry_run")]
    pub dry_run_defects: bool,
}

#[derive(Serialize)]
struct RunReport<'a> {
    #[serde(flatten)]
    result: &'a WorkflowResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    files: Vec<PathBuf>,
}

/// Exit code for runs aborted by policy.
const EXIT_ABORTED: u8 = 2;

/// Exit code after a second Ctrl-C.
const EXIT_INTERRUPTED: i32 = 130;

/// Handle one Ctrl-C. The first raises the abort handle; returns true when an
/// abort was already pending and the process should quit.
fn on_interrupt(abort: &AbortHandle) -> bool {
    if abort.is_requested() {
        return true;
    }
    abort.request_abort();
    false
}

pub async fn cmd_run(cli: &Cli, project_dir: &Path, args: &RunArgs) -> Result<ExitCode> {
    use sdlc_cycle::capability::{LlmCapability, ScriptedCapability, StageCapability};
    use sdlc_cycle::config::SdlcConfig;
    use sdlc_cycle::init::is_initialized;
    use sdlc_cycle::pipeline::Pipeline;
    use sdlc_cycle::ui::PipelineUI;

    let config = SdlcConfig::new(project_dir.to_path_buf())?.with_cli_args(
        cli.verbose,
        args.retry_ceiling,
        args.model.clone(),
    );
    for warning in config.validate() {
        tracing::warn!("config: {}", warning);
    }

    let capability: Arc<dyn StageCapability> = if args.dry_run_defects {
        Arc::new(ScriptedCapability::dry_run_with_defects())
    } else if args.dry_run {
        Arc::new(ScriptedCapability::dry_run(config.all_clear_sentinel()))
    } else {
        let settings = config.llm_settings()?;
        Arc::new(LlmCapability::new(settings)?)
    };

    let policy = config.routing_policy();
    let ceiling = policy.retry_ceiling;
    let ui = if args.json {
        PipelineUI::hidden(ceiling)
    } else {
        PipelineUI::new(ceiling, cli.verbose)
    };

    let mut pipeline = Pipeline::new(capability, policy)
        .with_identity(
            config.toml.session.app.clone(),
            config.toml.session.user.clone(),
        )
        .with_ui(Arc::new(ui));
    if !args.dry_run {
        pipeline = pipeline.with_model(config.model());
    }
    if is_initialized(project_dir) {
        pipeline = pipeline.with_audit_dir(config.audit_dir());
    }

    let abort = pipeline.abort_handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if on_interrupt(&abort) {
                eprintln!("{}", style("Interrupted").red());
                std::process::exit(EXIT_INTERRUPTED);
            }
            eprintln!(
                "{}",
                style("Abort requested; stopping at the next fix attempt (Ctrl-C again to quit)")
                    .yellow()
            );
        }
    });

    if !args.json {
        println!();
        println!(
            "{} {}",
            style("Task:").bold(),
            textwrap::fill(&args.task, textwrap::Options::new(72).subsequent_indent("      "))
        );
        println!();
    }

    let result = pipeline.start(&args.task).await?;

    let files = match &args.out_dir {
        Some(out_dir) if !result.code.is_empty() => export(&result, out_dir)?,
        _ => Vec::new(),
    };

    if args.json {
        let report = RunReport {
            result: &result,
            files,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&result, &files);
    }

    if result.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_ABORTED))
    }
}

fn export(result: &WorkflowResult, out_dir: &Path) -> Result<Vec<PathBuf>> {
    use sdlc_cycle::artifact::CodeBundle;

    let bundle = CodeBundle::parse(&result.code).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "code artifact is not a file map; exporting it as one file");
        CodeBundle::raw(&result.code)
    });
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory: {}", out_dir.display()))?;
    let written = bundle.write_to(out_dir)?;
    Ok(written)
}

fn print_summary(result: &WorkflowResult, files: &[PathBuf]) {
    use sdlc_cycle::pipeline::WorkflowStatus;
    use sdlc_cycle::ui::icons::{FILE_NEW, FOLDER};

    println!();
    let status = match result.status {
        WorkflowStatus::Completed | WorkflowStatus::Fixed => {
            style(result.status.as_str()).green().bold()
        }
        WorkflowStatus::Aborted => style(result.status.as_str()).red().bold(),
    };
    println!("{} {}", style("Status:").bold(), status);
    println!("{} {}", style("Fixes:").bold(), result.fix_count);
    println!("{} {}", style("Session:").bold(), result.session);
    if let Some(reason) = &result.abort_reason {
        println!("{} {}", style("Reason:").bold(), reason);
    }

    if !result.test_result.is_empty() {
        println!();
        println!("{}", style("Last test report:").bold());
        let wrapped = textwrap::fill(&result.test_result, 76);
        println!("{}", textwrap::indent(&wrapped, "  "));
    }

    if !files.is_empty() {
        println!();
        println!("{}{}", FOLDER, style("Exported files:").bold());
        for file in files {
            println!("  {}{}", FILE_NEW, file.display());
        }
    }
    println!();
}
