use anyhow::{Context, Result};
use clap::Parser;
use gamestream_host::{
    create_router, init_engine, AppState, Config, EventBus, Host, Settings, TerminateEvent,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "gamestream-host", version, about = "Game streaming host")]
struct Args {
    /// Host settings file (TOML); defaults and GSHOST__* variables apply without it
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Streaming config file, overrides `config_path` from the settings
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings =
        Settings::load(args.settings.as_deref()).context("Failed to load host settings")?;
    if let Some(config_path) = args.config {
        settings.config_path = config_path;
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.logging.filter))
        .context("Invalid logging filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("GameStream host v{}", env!("CARGO_PKG_VERSION"));

    let engine = init_engine(settings.engine).context("Failed to initialize media engine")?;
    info!("Media engine: {}", engine.name());

    let config = Config::load_or_default(&settings.config_path, engine.as_ref())
        .with_context(|| format!("Failed to load config {}", settings.config_path.display()))?;
    let config = Arc::new(config);
    info!("Host {} ({})", config.hostname, config.uuid);

    let bus = EventBus::new();
    let host = Host::new(
        Arc::clone(&config),
        bus.clone(),
        engine,
        tokio::runtime::Handle::current(),
    );
    let _handlers = host.install();

    let app = create_router(AppState::new(config, bus.clone(), host.sessions().clone()));

    let addr = format!("{}:{}", settings.http.bind, settings.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    for session_id in host.sessions().session_ids() {
        info!(session_id, "Terminating session on shutdown");
        bus.publish(TerminateEvent { session_id });
    }

    // Let pipelines drain and runners stop their workloads.
    let deadline = Instant::now() + SHUTDOWN_GRACE;
    while !host.sessions().list().is_empty() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Unable to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
