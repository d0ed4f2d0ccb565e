//! Configuration for sdlc-cycle, read from `.sdlc/sdlc.toml`.
//!
//! Settings are layered file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! [session]
//! app = "sdlc_cycle"
//! user = "user1"
//!
//! [limits]
//! artifact_cap = 10000
//! fix_part_cap = 5000
//! retry_ceiling = 3
//!
//! [test]
//! all_clear_sentinel = "U EE A E A U EE EE A E"
//!
//! [generator]
//! api_base = "https://generativelanguage.googleapis.com/v1beta/openai"
//! model = "gemini-2.0-flash"
//! api_key_env = "GEMINI_API_KEY"
//! timeout_secs = 120
//! temperature = 0.2
//! ```

use crate::capability::LlmSettings;
use crate::errors::CapabilityError;
use crate::init::get_sdlc_dir;
use crate::pipeline::{DEFAULT_APP_NAME, DEFAULT_USER_ID};
use crate::router::RoutingPolicy;
use crate::router::types::{
    DEFAULT_ALL_CLEAR_SENTINEL, DEFAULT_ARTIFACT_CAP, DEFAULT_FIX_PART_CAP, DEFAULT_RETRY_CEILING,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "sdlc.toml";

pub const ENV_API_BASE: &str = "SDLC_API_BASE";
pub const ENV_MODEL: &str = "SDLC_MODEL";
pub const ENV_RETRY_CEILING: &str = "SDLC_RETRY_CEILING";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    #[serde(default = "default_app")]
    pub app: String,
    #[serde(default = "default_user")]
    pub user: String,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            app: default_app(),
            user: default_user(),
        }
    }
}

fn default_app() -> String {
    DEFAULT_APP_NAME.to_string()
}

fn default_user() -> String {
    DEFAULT_USER_ID.to_string()
}

/// Size caps and the retry ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsSection {
    /// Cap, in characters, for any single artifact passed to a stage
    #[serde(default = "default_artifact_cap")]
    pub artifact_cap: usize,
    /// Cap for each of the code and test report parts of the Fix payload
    #[serde(default = "default_fix_part_cap")]
    pub fix_part_cap: usize,
    /// Fix attempts allowed before the run is aborted
    #[serde(default = "default_retry_ceiling")]
    pub retry_ceiling: u32,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            artifact_cap: default_artifact_cap(),
            fix_part_cap: default_fix_part_cap(),
            retry_ceiling: default_retry_ceiling(),
        }
    }
}

fn default_artifact_cap() -> usize {
    DEFAULT_ARTIFACT_CAP
}

fn default_fix_part_cap() -> usize {
    DEFAULT_FIX_PART_CAP
}

fn default_retry_ceiling() -> u32 {
    DEFAULT_RETRY_CEILING
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSection {
    /// Exact Test stage output meaning "no defects found"
    #[serde(default = "default_sentinel")]
    pub all_clear_sentinel: String,
}

impl Default for TestSection {
    fn default() -> Self {
        Self {
            all_clear_sentinel: default_sentinel(),
        }
    }
}

fn default_sentinel() -> String {
    DEFAULT_ALL_CLEAR_SENTINEL.to_string()
}

/// OpenAI-compatible endpoint the stages are sent to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorSection {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl Default for GeneratorSection {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            temperature: None,
        }
    }
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

/// Contents of `sdlc.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SdlcToml {
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub limits: LimitsSection,
    #[serde(default)]
    pub test: TestSection,
    #[serde(default)]
    pub generator: GeneratorSection,
}

impl SdlcToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse sdlc.toml")
    }

    /// Load `sdlc_dir/sdlc.toml`, or defaults if it does not exist.
    pub fn load_or_default(sdlc_dir: &Path) -> Result<Self> {
        let config_path = sdlc_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize sdlc.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Check the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let limits = &self.limits;

        if limits.artifact_cap == 0 {
            warnings.push("limits.artifact_cap is 0: every stage input will be empty".to_string());
        }
        if limits.fix_part_cap == 0 {
            warnings.push("limits.fix_part_cap is 0: fix payloads will be empty".to_string());
        }
        if limits.fix_part_cap > limits.artifact_cap {
            warnings.push(format!(
                "limits.fix_part_cap ({}) exceeds limits.artifact_cap ({})",
                limits.fix_part_cap, limits.artifact_cap
            ));
        }
        if limits.retry_ceiling == 0 {
            warnings.push(
                "limits.retry_ceiling is 0: any failing test report aborts the run".to_string(),
            );
        }
        if self.test.all_clear_sentinel.trim().is_empty() {
            warnings.push("test.all_clear_sentinel is empty".to_string());
        } else if self.test.all_clear_sentinel.trim() != self.test.all_clear_sentinel {
            warnings.push(
                "test.all_clear_sentinel has surrounding whitespace; model output is trimmed and will never match"
                    .to_string(),
            );
        }
        if self.generator.model.trim().is_empty() {
            warnings.push("generator.model is empty".to_string());
        }
        if self.generator.timeout_secs == 0 {
            warnings.push("generator.timeout_secs is 0".to_string());
        }
        if let Some(t) = self.generator.temperature
            && !(0.0..=2.0).contains(&t)
        {
            warnings.push(format!("generator.temperature {} is outside 0.0..=2.0", t));
        }

        warnings
    }
}

/// Environment overrides, captured once.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub api_base: Option<String>,
    pub model: Option<String>,
    pub retry_ceiling: Option<u32>,
    pub api_key: Option<String>,
}

impl EnvOverrides {
    /// Read overrides from the process environment.
    pub fn from_env(api_key_env: &str) -> Self {
        Self::from_lookup(api_key_env, |name| std::env::var(name).ok())
    }

    pub fn from_lookup(api_key_env: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let retry_ceiling =
            non_empty(ENV_RETRY_CEILING).and_then(|v| match v.trim().parse::<u32>() {
                Ok(n) => Some(n),
                Err(_) => {
                    tracing::warn!(value = %v, "ignoring invalid {}", ENV_RETRY_CEILING);
                    None
                }
            });
        Self {
            api_base: non_empty(ENV_API_BASE),
            model: non_empty(ENV_MODEL),
            retry_ceiling,
            api_key: non_empty(api_key_env),
        }
    }
}

/// Effective configuration: `sdlc.toml`, then environment, then CLI flags.
#[derive(Debug, Clone)]
pub struct SdlcConfig {
    pub project_dir: PathBuf,
    pub sdlc_dir: PathBuf,
    pub toml: SdlcToml,
    pub env: EnvOverrides,
    pub verbose: bool,
    pub cli_retry_ceiling: Option<u32>,
    pub cli_model: Option<String>,
}

impl SdlcConfig {
    /// Load configuration for `project_dir`, reading `.env` and the process environment.
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        if let Err(e) = dotenvy::from_path(project_dir.join(".env"))
            && !e.not_found()
        {
            tracing::warn!(error = %e, "failed to load .env");
        }
        let sdlc_dir = get_sdlc_dir(&project_dir);
        let toml = SdlcToml::load_or_default(&sdlc_dir)?;
        let env = EnvOverrides::from_env(&toml.generator.api_key_env);
        Ok(Self::from_parts(project_dir, toml, env))
    }

    pub fn from_parts(project_dir: PathBuf, toml: SdlcToml, env: EnvOverrides) -> Self {
        let sdlc_dir = get_sdlc_dir(&project_dir);
        Self {
            project_dir,
            sdlc_dir,
            toml,
            env,
            verbose: false,
            cli_retry_ceiling: None,
            cli_model: None,
        }
    }

    pub fn with_cli_args(
        mut self,
        verbose: bool,
        retry_ceiling: Option<u32>,
        model: Option<String>,
    ) -> Self {
        self.verbose = verbose;
        self.cli_retry_ceiling = retry_ceiling;
        self.cli_model = model;
        self
    }

    /// Retry ceiling (CLI → env → file).
    pub fn retry_ceiling(&self) -> u32 {
        self.cli_retry_ceiling
            .or(self.env.retry_ceiling)
            .unwrap_or(self.toml.limits.retry_ceiling)
    }

    /// Model name (CLI → env → file).
    pub fn model(&self) -> String {
        self.cli_model
            .clone()
            .or_else(|| self.env.model.clone())
            .unwrap_or_else(|| self.toml.generator.model.clone())
    }

    /// API base URL (env → file).
    pub fn api_base(&self) -> String {
        self.env
            .api_base
            .clone()
            .unwrap_or_else(|| self.toml.generator.api_base.clone())
    }

    pub fn all_clear_sentinel(&self) -> &str {
        &self.toml.test.all_clear_sentinel
    }

    pub fn routing_policy(&self) -> RoutingPolicy {
        RoutingPolicy {
            artifact_cap: self.toml.limits.artifact_cap,
            fix_part_cap: self.toml.limits.fix_part_cap,
            retry_ceiling: self.retry_ceiling(),
            all_clear_sentinel: self.toml.test.all_clear_sentinel.clone(),
        }
    }

    /// Settings for the LLM capability. Fails when the API key is not set.
    pub fn llm_settings(&self) -> Result<LlmSettings, CapabilityError> {
        let api_key = self
            .env
            .api_key
            .clone()
            .ok_or_else(|| CapabilityError::MissingApiKey {
                env_var: self.toml.generator.api_key_env.clone(),
            })?;
        Ok(LlmSettings {
            api_base: self.api_base(),
            model: self.model(),
            api_key: Some(api_key),
            timeout: Duration::from_secs(self.toml.generator.timeout_secs),
            temperature: self.toml.generator.temperature,
            all_clear_sentinel: self.toml.test.all_clear_sentinel.clone(),
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.sdlc_dir.join(CONFIG_FILE)
    }

    pub fn audit_dir(&self) -> PathBuf {
        self.sdlc_dir.join("audit")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.sdlc_dir.join("logs")
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}
