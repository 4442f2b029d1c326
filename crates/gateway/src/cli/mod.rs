pub mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use dg_domain::config::Config;

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV: &str = "DG_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// docguide: answers questions about a document set over Telegram.
#[derive(Debug, Parser)]
#[command(name = "docguide", version, about)]
pub struct Cli {
    /// Path to the YAML config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Provision the assistant and start answering messages (default).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as YAML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Pick the config path: `--config`, then `DG_CONFIG`, then `config.yaml`.
pub fn resolve_config_path(flag: Option<PathBuf>, env: Option<String>) -> PathBuf {
    flag.or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load the configuration and return it with the path that was used.
///
/// Shared by `serve` and the `config` subcommands.  A missing or unparsable
/// file is an error.
pub fn load_config(flag: Option<PathBuf>) -> anyhow::Result<(Config, PathBuf)> {
    let path = resolve_config_path(flag, std::env::var(CONFIG_ENV).ok());
    let config = Config::load(&path)?;
    Ok((config, path))
}
