mod config;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use nexus_sync::{RunCoordinator, SyncError, WorkerPool, validate_pair};
use nexus_sync_http::{NexusClient, StreamCopier};
use tokio_util::sync::CancellationToken;

use crate::config::{EndpointSection, FileConfig};
use crate::logging::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "nexus-sync", version)]
#[command(about = "Mirror new and changed artifacts from one Nexus repository to another")]
struct Cli {
    /// Source server URL [default: http://localhost:8081]
    #[arg(long, alias = "from_url")]
    from_url: Option<String>,
    /// Source user name [default: admin]
    #[arg(long, alias = "from_user")]
    from_user: Option<String>,
    /// Source password [default: admin123]
    #[arg(long, alias = "from_pass")]
    from_pass: Option<String>,
    /// Source repository [default: maven-releases]
    #[arg(long, alias = "from_repo")]
    from_repo: Option<String>,

    /// Destination server URL [default: http://localhost:8081]
    #[arg(long, alias = "to_url")]
    to_url: Option<String>,
    /// Destination user name [default: admin]
    #[arg(long, alias = "to_user")]
    to_user: Option<String>,
    /// Destination password [default: admin123]
    #[arg(long, alias = "to_pass")]
    to_pass: Option<String>,
    /// Destination repository [default: maven-releases]
    #[arg(long, alias = "to_repo")]
    to_repo: Option<String>,

    /// Concurrent fetches and transfers [default: 16]
    #[arg(long)]
    workers: Option<usize>,

    /// Config file (defaults to ~/.config/nexus-sync/config.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Cli {
    fn overrides(&self) -> FileConfig {
        FileConfig {
            from: EndpointSection {
                url: self.from_url.clone(),
                user: self.from_user.clone(),
                password: self.from_pass.clone(),
                repo: self.from_repo.clone(),
            },
            to: EndpointSection {
                url: self.to_url.clone(),
                user: self.to_user.clone(),
                password: self.to_pass.clone(),
                repo: self.to_repo.clone(),
            },
            workers: self.workers,
        }
    }
}

/// Cancel the returned token on SIGINT or SIGTERM (Ctrl-C elsewhere).
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(name) => {
                tracing::info!("received {name}, shutting down");
                trigger.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "could not install signal handlers"),
        }
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = interrupt.recv() => Ok("SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl-C")
}

async fn run(cli: Cli) -> Result<()> {
    let file = config::load_config(cli.config.as_deref())?;
    let settings = config::resolve(cli.overrides(), file);

    validate_pair(&settings.from, &settings.to).context("validate options failed")?;
    let source = NexusClient::new(settings.from.clone()).context("validate options failed")?;
    let destination = NexusClient::new(settings.to.clone()).context("validate options failed")?;

    let pool = WorkerPool::new(
        settings.workers,
        tracing::info_span!("pool", workers = settings.workers),
    )
    .context("nexus-sync pool init failed")?;

    tracing::info!("nexus-sync version {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("mirroring {} -> {}", settings.from, settings.to);

    let copier = StreamCopier::new(source.clone(), destination.clone());
    let coordinator =
        RunCoordinator::new(Arc::new(source), Arc::new(destination), Arc::new(copier), pool);

    let report = coordinator.run(&shutdown_token()).await?;

    if report.is_noop() {
        return Ok(());
    }
    if report.is_clean() {
        tracing::info!("mirrored {} artifacts", report.transferred);
    } else {
        tracing::warn!(
            "mirrored {} of {} artifacts, {} failed",
            report.transferred,
            report.planned,
            report.failures.len()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log_level, cli.log_format) {
        eprintln!("error: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.downcast_ref::<SyncError>().is_some_and(SyncError::is_cancelled) {
                tracing::info!("nexus-sync canceled");
            } else {
                tracing::error!("nexus-sync failed: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}
