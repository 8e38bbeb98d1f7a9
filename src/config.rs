//! Configuration for hnbrief.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (HNBRIEF_HOME, HNBRIEF_RESET_POLICY)
//! 2. Config file (.hnbrief/config.yaml)
//! 3. Defaults (~/.hnbrief)
//!
//! Config file discovery:
//! - Searches current directory and parents for .hnbrief/config.yaml
//! - A relative `paths.home` is resolved against the .hnbrief/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::fabric::DEFAULT_PATTERN;
use crate::adapters::HackerNewsParams;
use crate::core::JobSettings;
use crate::domain::ResetPolicy;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub listing: HackerNewsParams,
    #[serde(default)]
    pub job: JobSettings,
    #[serde(default)]
    pub summarizer: SummarizerSettings,
    #[serde(default)]
    pub render: RenderSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .hnbrief/)
    pub home: Option<String>,
}

/// Fabric summarizer settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SummarizerSettings {
    /// Binary to run; autodetected (fabric-ai, then fabric) when unset
    #[serde(default)]
    pub binary: Option<String>,

    #[serde(default = "default_pattern")]
    pub pattern: String,

    #[serde(default = "default_summary_timeout")]
    pub timeout_seconds: u64,

    /// Summaries requested in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_pattern() -> String {
    DEFAULT_PATTERN.to_string()
}
fn default_summary_timeout() -> u64 {
    120
}
fn default_concurrency() -> usize {
    4
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            binary: None,
            pattern: default_pattern(),
            timeout_seconds: default_summary_timeout(),
            concurrency: default_concurrency(),
        }
    }
}

/// Headless rendering settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RenderSettings {
    /// Disable to resolve every URL with a plain fetch
    #[serde(default = "default_render_enabled")]
    pub enabled: bool,

    /// Chrome/Chromium executable; detected when unset
    #[serde(default)]
    pub executable: Option<PathBuf>,
}

fn default_render_enabled() -> bool {
    true
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            enabled: default_render_enabled(),
            executable: None,
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to hnbrief home (job state)
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Listing query parameters
    pub listing: HackerNewsParams,
    /// Job timeouts, retry and reset policy
    pub job: JobSettings,
    pub summarizer: SummarizerSettings,
    pub render: RenderSettings,
}

impl ResolvedConfig {
    /// Directory holding one subdirectory per job
    pub fn jobs_dir(&self) -> PathBuf {
        self.home.join("jobs")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".hnbrief").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Environment overrides, captured once so resolution stays testable
#[derive(Debug, Clone, Default)]
struct EnvOverrides {
    home: Option<String>,
    reset_policy: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            home: std::env::var("HNBRIEF_HOME").ok(),
            reset_policy: std::env::var("HNBRIEF_RESET_POLICY").ok(),
        }
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    resolve_config(find_config_file(), &EnvOverrides::from_env())
}

fn resolve_config(config_file: Option<PathBuf>, env: &EnvOverrides) -> Result<ResolvedConfig> {
    // Default home directory
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".hnbrief");

    let config = match &config_file {
        Some(path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    let home = if let Some(env_home) = &env.home {
        PathBuf::from(env_home)
    } else if let (Some(config_path), Some(home_path)) = (&config_file, &config.paths.home) {
        // home is relative to .hnbrief/ directory
        let hnbrief_dir = config_path.parent().unwrap_or(Path::new("."));
        resolve_path(hnbrief_dir, home_path)
    } else {
        default_home
    };

    let mut job = config.job;
    if let Some(policy) = &env.reset_policy {
        job.reset_policy = policy
            .parse::<ResetPolicy>()
            .map_err(anyhow::Error::msg)
            .context("Invalid HNBRIEF_RESET_POLICY")?;
    }

    Ok(ResolvedConfig {
        home,
        config_file,
        listing: config.listing,
        job,
        summarizer: config.summarizer,
        render: config.render,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

/// Get the hnbrief home directory
pub fn hnbrief_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}

/// Get the jobs directory ($HNBRIEF_HOME/jobs)
pub fn jobs_dir() -> Result<PathBuf> {
    Ok(config()?.jobs_dir())
}
