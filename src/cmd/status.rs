//! `sdlc-cycle status`: the stage board of the most recent audited run.

use anyhow::Result;
use console::style;

pub fn cmd_status(project_dir: &std::path::Path, json: bool) -> Result<()> {
    use sdlc_cycle::audit::AuditLogger;
    use sdlc_cycle::init::{get_sdlc_dir, is_initialized};
    use sdlc_cycle::status::{StageState, StatusBoard};

    if !is_initialized(project_dir) {
        anyhow::bail!("Project not initialized. Run 'sdlc-cycle init' first.");
    }

    let logger = AuditLogger::new(&get_sdlc_dir(project_dir).join("audit"));
    let Some(run) = logger.latest_run()? else {
        if json {
            println!("null");
        } else {
            println!("No runs recorded yet.");
        }
        return Ok(());
    };
    let board = StatusBoard::from_audit(&run).snapshot();

    if json {
        let value = serde_json::json!({
            "run_id": run.run_id,
            "session": run.session,
            "started_at": run.started_at,
            "ended_at": run.ended_at,
            "outcome": run.outcome,
            "stages": board,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    println!(
        "Run {} ({})",
        style(&run.run_id.to_string()[..8]).bold(),
        run.started_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!("Session: {}", run.session);
    println!("Outcome: {}", style(run.outcome.label()).bold());
    println!("Fix attempts: {}", run.fix_attempts());
    println!();

    for stage in board {
        let state = match stage.state {
            StageState::Success => style(stage.state.as_str()).green(),
            StageState::Failure => style(stage.state.as_str()).red(),
            StageState::Skipped => style(stage.state.as_str()).yellow(),
            StageState::Working => style(stage.state.as_str()).cyan(),
            StageState::Idle => style(stage.state.as_str()).dim(),
        };
        println!("  {:<6} {:<9} {}", stage.name, state, style(&stage.description).dim());
        if let Some(detail) = stage.detail {
            println!("         {}", detail);
        }
    }
    println!();

    Ok(())
}
