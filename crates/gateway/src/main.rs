use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use dg_domain::config::{Config, LoggingConfig};
use dg_gateway::bootstrap;
use dg_gateway::channel::telegram::TelegramClient;
use dg_gateway::cli::{Cli, Command, ConfigCommand};
use dg_gateway::runtime::{supervise, Dispatcher, Orchestrator};
use dg_providers::AssistantsClient;
use dg_sessions::SessionStore;

/// Inbound messages buffered between the poller and the dispatch loop.
const INBOUND_CAPACITY: usize = 256;
/// How long in-flight replies may keep running after a shutdown signal.
const DRAIN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            let (config, config_path) = dg_gateway::cli::load_config(cli.config)?;
            init_tracing(&config.logging);
            tracing::info!(config = %config_path.display(), "config loaded");
            serve(Arc::new(config)).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            init_cli_tracing();
            let (config, config_path) = dg_gateway::cli::load_config(cli.config)?;
            if !dg_gateway::cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            init_cli_tracing();
            let (config, _config_path) = dg_gateway::cli::load_config(cli.config)?;
            dg_gateway::cli::config::show(&config)
        }
        Some(Command::Version) => {
            println!("docguide {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize tracing for `serve`: JSON lines by default, pretty output when
/// `logging.json` is off.  `RUST_LOG` overrides the configured filter.
fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    if logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

/// Initialize compact stderr-only tracing for CLI one-shot commands.
///
/// Defaults to `warn` level so diagnostic output does not pollute stdout.
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Provision the assistant and answer messages until a shutdown signal.
async fn serve(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("docguide starting");

    bootstrap::check_config(&config)?;

    // ── Front end ────────────────────────────────────────────────────
    let telegram = Arc::new(TelegramClient::from_config(&config).context("telegram client")?);
    telegram
        .authenticate()
        .await
        .context("authenticating telegram bot")?;

    // ── Assistant + retrieval index ──────────────────────────────────
    let assistants =
        Arc::new(AssistantsClient::from_config(&config).context("assistants client")?);
    let provisioned = bootstrap::provision(assistants.as_ref(), &config)
        .await
        .context("provisioning assistant")?;
    tracing::info!(
        assistant_id = %provisioned.assistant_id,
        index_id = %provisioned.index_id,
        documents = provisioned.documents,
        "assistant ready"
    );

    // ── Runtime ──────────────────────────────────────────────────────
    let sessions = Arc::new(SessionStore::new(config.context_window()));
    let orchestrator = Arc::new(Orchestrator::new(
        sessions,
        assistants,
        telegram.clone(),
        provisioned.assistant_id,
        provisioned.index_id,
        config.notices.clone(),
    ));
    let dispatcher = Dispatcher::new(orchestrator, config.max_in_flight);

    let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);
    let poller = tokio::spawn(telegram.poll(tx));
    let dispatch = tokio::spawn(async move { dispatcher.run(rx).await });

    let mut in_flight = supervise(poller, dispatch, shutdown_signal()).await?;

    tracing::info!(in_flight = in_flight.len(), "draining in-flight replies");
    let drained = tokio::time::timeout(DRAIN_GRACE, async {
        while in_flight.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        tracing::warn!(
            remaining = in_flight.len(),
            "grace period elapsed, abandoning in-flight replies"
        );
        in_flight.abort_all();
    }

    tracing::info!("shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable, waiting for SIGINT only");
                let _ = ctrl_c.await;
                tracing::info!("received SIGINT, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        tracing::info!("received SIGINT, shutting down");
    }
}
