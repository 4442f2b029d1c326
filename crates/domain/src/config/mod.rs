mod logging;
mod notices;

pub use logging::*;
pub use notices::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// History window used when `max_context_messages` is absent or not positive.
pub const DEFAULT_MAX_CONTEXT_MESSAGES: usize = 10;

/// Environment variable that supplies the API key when the file leaves it empty.
pub const API_KEY_ENV: &str = "DG_API_KEY";
/// Environment variable that supplies the Telegram token when the file leaves it empty.
pub const TELEGRAM_TOKEN_ENV: &str = "DG_TELEGRAM_BOT_TOKEN";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process configuration, read once from `config.yaml` at startup and
/// shared as `Arc<Config>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the Assistants API, e.g. `https://api.openai.com/v1/`.
    #[serde(default = "d_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub telegram_bot_token: String,
    #[serde(default = "d_telegram_api_url")]
    pub telegram_api_url: String,
    /// Long-poll timeout passed to `getUpdates`.
    #[serde(default = "d_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Directory whose files are uploaded into the retrieval index.
    #[serde(default = "d_files_path")]
    pub files_path: PathBuf,

    // ── Assistant definition ─────────────────────────────────────────
    #[serde(default = "d_name")]
    pub name: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default = "d_tools")]
    pub tools: Vec<String>,
    #[serde(default = "d_sampling")]
    pub temperature: f64,
    #[serde(default = "d_sampling")]
    pub top_p: f64,

    // ── Conversation handling ────────────────────────────────────────
    /// Raw value from the file; read it through [`Config::context_window`].
    #[serde(default)]
    pub max_context_messages: i64,
    /// Upper bound on concurrently running replies.  `None` keeps the
    /// unbounded task-per-message fan-out.
    #[serde(default)]
    pub max_in_flight: Option<usize>,
    #[serde(default)]
    pub notices: NoticesConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: d_api_url(),
            api_key: String::new(),
            telegram_bot_token: String::new(),
            telegram_api_url: d_telegram_api_url(),
            poll_timeout_secs: d_poll_timeout(),
            files_path: d_files_path(),
            name: d_name(),
            instructions: String::new(),
            model: d_model(),
            tools: d_tools(),
            temperature: d_sampling(),
            top_p: d_sampling(),
            max_context_messages: DEFAULT_MAX_CONTEXT_MESSAGES as i64,
            max_in_flight: None,
            notices: NoticesConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Parse a YAML document and normalize it.
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(raw)?;
        config.normalize();
        Ok(config)
    }

    /// Read and parse the config file at `path`, then fill empty secrets
    /// from the environment.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
        let mut config = Self::from_yaml_str(&raw)
            .map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Fill `api_key` / `telegram_bot_token` from the environment when the
    /// file leaves them empty.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_key.is_empty() {
            if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.is_empty()) {
                self.api_key = key;
            }
        }
        if self.telegram_bot_token.is_empty() {
            if let Some(token) = lookup(TELEGRAM_TOKEN_ENV).filter(|v| !v.is_empty()) {
                self.telegram_bot_token = token;
            }
        }
    }

    fn normalize(&mut self) {
        if self.max_context_messages <= 0 {
            self.max_context_messages = DEFAULT_MAX_CONTEXT_MESSAGES as i64;
        }
    }

    /// Maximum number of turns kept per session.  Always at least 1.
    pub fn context_window(&self) -> usize {
        usize::try_from(self.max_context_messages)
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_CONTEXT_MESSAGES)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let mut error = |field: &str, message: &str| {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: field.into(),
                message: message.into(),
            })
        };

        if self.api_url.trim().is_empty() {
            error("api_url", "must not be empty");
        } else if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            error("api_url", "must start with http:// or https://");
        }
        if self.api_key.is_empty() {
            error("api_key", "not set (config file or DG_API_KEY)");
        }
        if self.telegram_bot_token.is_empty() {
            error(
                "telegram_bot_token",
                "not set (config file or DG_TELEGRAM_BOT_TOKEN)",
            );
        }
        if self.model.trim().is_empty() {
            error("model", "must not be empty");
        }
        if self.max_in_flight == Some(0) {
            error("max_in_flight", "must be greater than 0 when set");
        }

        if !self.tools.iter().any(|t| t == "file_search") {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "tools".into(),
                message: "file_search is not enabled; uploaded documents will not be searched"
                    .into(),
            });
        }
        if !self.files_path.is_dir() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "files_path".into(),
                message: format!("{} is not a directory", self.files_path.display()),
            });
        }

        issues
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_api_url() -> String {
    "https://api.openai.com/v1/".into()
}
fn d_telegram_api_url() -> String {
    "https://api.telegram.org".into()
}
fn d_poll_timeout() -> u64 {
    60
}
fn d_files_path() -> PathBuf {
    PathBuf::from("./files")
}
fn d_name() -> String {
    "docguide".into()
}
fn d_model() -> String {
    "gpt-4o".into()
}
fn d_tools() -> Vec<String> {
    vec!["file_search".into()]
}
fn d_sampling() -> f64 {
    1.0
}
