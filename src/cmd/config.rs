//! Configuration view and validation commands: `sdlc-cycle config`.

use anyhow::Result;

use super::super::ConfigCommands;

fn print_toml(toml: &sdlc_cycle::config::SdlcToml) {
    println!("[session]");
    println!("  app = \"{}\"", toml.session.app);
    println!("  user = \"{}\"", toml.session.user);
    println!();
    println!("[limits]");
    println!("  artifact_cap = {}", toml.limits.artifact_cap);
    println!("  fix_part_cap = {}", toml.limits.fix_part_cap);
    println!("  retry_ceiling = {}", toml.limits.retry_ceiling);
    println!();
    println!("[test]");
    println!(
        "  all_clear_sentinel = \"{}\"",
        toml.test.all_clear_sentinel
    );
    println!();
    println!("[generator]");
    println!("  api_base = \"{}\"", toml.generator.api_base);
    println!("  model = \"{}\"", toml.generator.model);
    println!("  api_key_env = \"{}\"", toml.generator.api_key_env);
    println!("  timeout_secs = {}", toml.generator.timeout_secs);
    if let Some(t) = toml.generator.temperature {
        println!("  temperature = {}", t);
    }
    println!();
}

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use sdlc_cycle::config::{CONFIG_FILE, SdlcConfig, SdlcToml};
    use sdlc_cycle::init::get_sdlc_dir;

    let sdlc_dir = get_sdlc_dir(project_dir);
    let config_path = sdlc_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("sdlc-cycle Configuration");
            println!("========================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
                println!();
                print_toml(&SdlcToml::load(&config_path)?);
            } else {
                println!("No sdlc.toml found at {}", config_path.display());
                println!();
                println!("Using default configuration:");
                print_toml(&SdlcToml::default());
                println!("Run 'sdlc-cycle config init' to create a sdlc.toml file.");
                println!();
            }

            println!("Effective values (with env overrides):");
            let config = SdlcConfig::new(project_dir.to_path_buf())?;
            println!("  api_base = \"{}\"", config.api_base());
            println!("  model = \"{}\"", config.model());
            println!("  retry_ceiling = {}", config.retry_ceiling());
            println!(
                "  api_key = {}",
                if config.env.api_key.is_some() {
                    "set"
                } else {
                    "not set"
                }
            );
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No sdlc.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = SdlcToml::load(&config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("sdlc.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            std::fs::create_dir_all(&sdlc_dir)?;
            SdlcToml::default().save(&config_path)?;

            println!("Created sdlc.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [limits] artifact_cap, fix_part_cap, retry_ceiling");
            println!("  - [test] all_clear_sentinel");
            println!("  - [generator] api_base, model, api_key_env, timeout_secs");
            println!();
        }
    }

    Ok(())
}
