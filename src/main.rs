#![forbid(unsafe_code)]

//! `agent-callroom` — voice session orchestrator server binary.
//!
//! Bootstraps configuration, opens the database, connects the remote
//! conversation provider client, and serves the HTTP API until a shutdown
//! signal arrives.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::{fmt, EnvFilter};

use agent_callroom::api::{self, AppState};
use agent_callroom::config::GlobalConfig;
use agent_callroom::orchestrator::{BookingAdmin, HealthStatus, SessionOrchestrator, TokenResolver};
use agent_callroom::persistence::agent_repo::AgentRepo;
use agent_callroom::persistence::booking_repo::BookingRepo;
use agent_callroom::persistence::db;
use agent_callroom::provider::http::HttpProvider;
use agent_callroom::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "agent-callroom", about = "Voice session orchestrator", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the HTTP port from the config file.
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("agent-callroom server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    if let Some(port) = args.port {
        config.http_port = port;
    }
    config.load_credentials().await?;
    let config = Arc::new(config);
    info!("configuration loaded");

    // ── Initialize database ─────────────────────────────
    let db = Arc::new(db::connect(&config.db_path).await?);
    info!(db_path = %config.db_path.display(), "database connected");

    // ── Build orchestrator ──────────────────────────────
    let provider = Arc::new(HttpProvider::new(&config.provider)?);
    let orchestrator =
        SessionOrchestrator::new(Arc::clone(&db), provider, config.provider.timeout());
    let resolver = TokenResolver::new(
        BookingRepo::new(Arc::clone(&db)),
        AgentRepo::new(Arc::clone(&db)),
    );
    let admin = BookingAdmin::new(Arc::clone(&db));

    report_startup_state(&orchestrator).await;

    let state = Arc::new(AppState {
        config: Arc::clone(&config),
        orchestrator,
        resolver,
        admin,
    });

    // ── Serve HTTP API ──────────────────────────────────
    let ct = CancellationToken::new();
    let api_ct = ct.clone();
    let api_state = Arc::clone(&state);
    let api_handle = tokio::spawn(async move {
        if let Err(err) = api::serve(api_state, api_ct).await {
            error!(%err, "HTTP API failed");
        }
    });

    info!(bind = %config.bind_addr(), "agent-callroom ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    if let Err(err) = api_handle.await {
        error!(%err, "HTTP API task failed");
    }
    info!("agent-callroom shut down");

    Ok(())
}

/// Log provider health and any session records left active by a prior run.
///
/// Leftover records are not touched here: each is reconciled against the
/// provider the next time its booking is started, rejoined, or ended.
async fn report_startup_state(orchestrator: &SessionOrchestrator) {
    async {
        let health = orchestrator.health().await;
        if health.status == HealthStatus::Ok {
            info!("conversation provider healthy");
        } else {
            warn!(services = ?health.services, "conversation provider degraded or unreachable");
        }

        match orchestrator.list_active().await {
            Ok(active) if active.is_empty() => info!("no active session records on startup"),
            Ok(active) => info!(
                count = active.len(),
                "active session records found on startup; will reconcile on access"
            ),
            Err(err) => error!(%err, "failed to list active session records"),
        }
    }
    .instrument(info_span!("startup_check"))
    .await;
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
