use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

mod cmd;

#[derive(Parser)]
#[command(name = "sdlc-cycle")]
#[command(version, about = "Plan, code, test and fix loop driven by an LLM")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Console log filter (RUST_LOG takes precedence)
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the .sdlc directory with a default configuration
    Init {
        /// Overwrite an existing sdlc.toml without asking
        #[arg(long)]
        force: bool,
    },
    /// Run one plan/code/test/fix workflow for a task
    Run(cmd::RunArgs),
    /// Show the stage board of the most recent run
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default sdlc.toml file
    Init,
}

/// Console logs go to stderr; when the project is initialised a debug-level
/// copy is written to `.sdlc/logs/`.
fn init_tracing(
    cli: &Cli,
    project_dir: &Path,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    // Priority: RUST_LOG env var > --log-level CLI arg > default
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| cli.log_level.clone());
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::try_new(&log_filter).unwrap_or_else(|_| EnvFilter::new("warn")));

    let log_dir = sdlc_cycle::init::get_sdlc_dir(project_dir).join("logs");
    let (file, guard) = if log_dir.is_dir() {
        let appender = tracing_appender::rolling::daily(&log_dir, "sdlc-cycle.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_filter(EnvFilter::new("sdlc_cycle=debug,info"));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let _log_guard = init_tracing(&cli, &project_dir);

    let code = match &cli.command {
        Commands::Init { force } => {
            cmd::cmd_init(&project_dir, *force)?;
            ExitCode::SUCCESS
        }
        Commands::Run(args) => cmd::cmd_run(&cli, &project_dir, args).await?,
        Commands::Status { json } => {
            cmd::cmd_status(&project_dir, *json)?;
            ExitCode::SUCCESS
        }
        Commands::Config { command } => {
            cmd::cmd_config(&project_dir, command.clone())?;
            ExitCode::SUCCESS
        }
    };

    Ok(code)
}
