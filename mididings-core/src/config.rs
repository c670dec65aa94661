use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

/// Longest grace period teardown will ever wait for the worker.
const MAX_SHUTDOWN_TIMEOUT_MS: u64 = 60_000;

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    dispatch: DispatchSection,
}

#[derive(Deserialize, Default)]
struct DispatchSection {
    shutdown_timeout_ms: Option<u64>,
    worker_thread_name: Option<String>,
    call_budget_us: Option<u32>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Parse(e)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Parse(e) => write!(f, "TOML error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Runtime settings of the callback dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// How long dropping the dispatcher waits for the worker before abandoning it
    pub shutdown_timeout: Duration,
    pub worker_thread_name: String,
    /// Synchronous calls longer than this are counted as overruns
    pub call_budget_us: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        let base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");
        Self::from_section(base.dispatch)
    }
}

impl DispatchConfig {
    /// Embedded defaults overlaid with `<config_dir>/mididings/config.toml`.
    /// A missing user file is normal; an unreadable or malformed one is logged and ignored.
    pub fn load() -> Self {
        match user_config_path() {
            Some(path) if path.exists() => match Self::load_from(&path) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!(target: "config", "ignoring config {}: {}", path.display(), e);
                    Self::default()
                }
            },
            _ => Self::default(),
        }
    }

    /// Embedded defaults overlaid with the file at `path`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Embedded defaults overlaid with `contents`. Keys absent from `contents`
    /// keep their default value.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let mut base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");
        let user: ConfigFile = toml::from_str(contents)?;
        merge_dispatch(&mut base.dispatch, user.dispatch);
        Ok(Self::from_section(base.dispatch))
    }

    fn from_section(section: DispatchSection) -> Self {
        let timeout_ms = section
            .shutdown_timeout_ms
            .unwrap_or(3000)
            .min(MAX_SHUTDOWN_TIMEOUT_MS);
        let worker_thread_name = section
            .worker_thread_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "mididings-async".to_string());
        Self {
            shutdown_timeout: Duration::from_millis(timeout_ms),
            worker_thread_name,
            call_budget_us: section.call_budget_us.unwrap_or(1000).max(1),
        }
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mididings").join("config.toml"))
}

fn merge_dispatch(base: &mut DispatchSection, user: DispatchSection) {
    if user.shutdown_timeout_ms.is_some() {
        base.shutdown_timeout_ms = user.shutdown_timeout_ms;
    }
    if user.worker_thread_name.is_some() {
        base.worker_thread_name = user.worker_thread_name;
    }
    if user.call_budget_us.is_some() {
        base.call_budget_us = user.call_budget_us;
    }
}
