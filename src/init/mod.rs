//! `sdlc-cycle init`: create the `.sdlc/` directory in a project.
//!
//! ```text
//! .sdlc/
//! ├── sdlc.toml        # Configuration (defaults written on first init)
//! ├── audit/           # Run audit trail
//! │   └── runs/
//! └── logs/            # Daily rolling log files
//! ```

use crate::config::{CONFIG_FILE, SdlcToml};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// The name of the project configuration directory.
pub const SDLC_DIR: &str = ".sdlc";

#[derive(Debug)]
pub struct InitResult {
    pub sdlc_dir: PathBuf,
    /// False if the directory already existed
    pub created: bool,
    /// True if `sdlc.toml` was (re)written
    pub wrote_config: bool,
}

/// Create or complete the `.sdlc/` structure under `project_dir`.
///
/// An existing `sdlc.toml` is kept unless `overwrite_config` is set.
pub fn init_project(project_dir: &Path, overwrite_config: bool) -> Result<InitResult> {
    let sdlc_dir = get_sdlc_dir(project_dir);
    let created = !sdlc_dir.exists();

    for dir in [
        sdlc_dir.clone(),
        sdlc_dir.join("audit").join("runs"),
        sdlc_dir.join("logs"),
    ] {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    let config_path = sdlc_dir.join(CONFIG_FILE);
    let wrote_config = overwrite_config || !config_path.exists();
    if wrote_config {
        SdlcToml::default().save(&config_path)?;
    }

    Ok(InitResult {
        sdlc_dir,
        created,
        wrote_config,
    })
}

pub fn is_initialized(project_dir: &Path) -> bool {
    project_dir.join(SDLC_DIR).exists()
}

pub fn get_sdlc_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(SDLC_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_structure() {
        let dir = TempDir::new().unwrap();
        assert!(!is_initialized(dir.path()));

        let result = init_project(dir.path(), false).unwrap();
        assert!(result.created);
        assert!(result.wrote_config);
        assert!(is_initialized(dir.path()));
        assert!(result.sdlc_dir.join("audit/runs").is_dir());
        assert!(result.sdlc_dir.join("logs").is_dir());
        let toml = SdlcToml::load(&result.sdlc_dir.join(CONFIG_FILE)).unwrap();
        assert_eq!(toml.limits.retry_ceiling, 3);
    }

    #[test]
    fn test_reinit_keeps_existing_config() {
        let dir = TempDir::new().unwrap();
        init_project(dir.path(), false).unwrap();
        let config_path = get_sdlc_dir(dir.path()).join(CONFIG_FILE);
        std::fs::write(&config_path, "[limits]\nretry_ceiling = 9\n").unwrap();

        let result = init_project(dir.path(), false).unwrap();
        assert!(!result.created);
        assert!(!result.wrote_config);
        assert_eq!(
            SdlcToml::load(&config_path).unwrap().limits.retry_ceiling,
            9
        );
    }

    #[test]
    fn test_reinit_with_overwrite_resets_config() {
        let dir = TempDir::new().unwrap();
        init_project(dir.path(), false).unwrap();
        let config_path = get_sdlc_dir(dir.path()).join(CONFIG_FILE);
        std::fs::write(&config_path, "[limits]\nretry_ceiling = 9\n").unwrap();

        let result = init_project(dir.path(), true).unwrap();
        assert!(result.wrote_config);
        assert_eq!(
            SdlcToml::load(&config_path).unwrap().limits.retry_ceiling,
            3
        );
    }
}
