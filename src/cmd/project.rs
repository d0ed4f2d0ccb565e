//! Project initialization: `sdlc-cycle init`.

use anyhow::Result;
use console::{Term, style};
use dialoguer::Confirm;

pub fn cmd_init(project_dir: &std::path::Path, force: bool) -> Result<()> {
    use sdlc_cycle::config::CONFIG_FILE;
    use sdlc_cycle::init::{get_sdlc_dir, init_project};

    let config_path = get_sdlc_dir(project_dir).join(CONFIG_FILE);
    let overwrite = if force {
        true
    } else if config_path.exists() && Term::stderr().is_term() {
        Confirm::new()
            .with_prompt(format!(
                "{} already exists. Overwrite with defaults?",
                config_path.display()
            ))
            .default(false)
            .interact()?
    } else {
        false
    };

    let result = init_project(project_dir, overwrite)?;

    if result.created {
        println!(
            "Initialized sdlc-cycle project at {}",
            result.sdlc_dir.display()
        );
        println!();
        println!("Created directory structure:");
        println!("  .sdlc/");
        println!("  ├── sdlc.toml     # Configuration");
        println!("  ├── audit/runs/   # Audit trail");
        println!("  └── logs/         # Log files");
        println!();
        println!("Next steps:");
        println!("  1. Export your API key (see [generator] api_key_env in sdlc.toml)");
        println!(
            "  2. Run {} to start a workflow",
            style("sdlc-cycle run \"<task>\"").cyan()
        );
    } else {
        println!(
            "sdlc-cycle project already initialized at {}",
            result.sdlc_dir.display()
        );
        if result.wrote_config {
            println!("Reset {} to defaults.", CONFIG_FILE);
        } else {
            println!("Directory structure verified; kept existing {}.", CONFIG_FILE);
        }
    }

    Ok(())
}
