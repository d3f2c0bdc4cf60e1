//! The courier daemon: HTTP API in front of a rate-limited SMTP relay.

mod config;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use courier_dispatch::{DispatchQueue, Signal};
use courier_http::{ApiServer, ApiState, IpAllowlist};
use courier_transport::{MailTransport, SmtpMailer};

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "courier", version, about = "HTTP-to-SMTP mail relay")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref(), |key| std::env::var(key).ok())?;

    let transport: Arc<dyn MailTransport> =
        Arc::new(SmtpMailer::new(&config.smtp).context("failed to construct SMTP transport")?);

    // A failed verification is worth knowing about, but the relay may
    // simply not be up yet; sends will retry on their own schedule.
    match transport.verify().await {
        Ok(()) => tracing::info!(host = %config.smtp.host, "SMTP relay verified"),
        Err(error) => tracing::warn!(
            host = %config.smtp.host,
            %error,
            "SMTP relay verification failed, continuing anyway"
        ),
    }

    let (queue, worker) = DispatchQueue::new(config.dispatch.clone(), Arc::clone(&transport));

    let (shutdown, _) = broadcast::channel::<Signal>(8);
    spawn_signal_listener(shutdown.clone());

    let worker_task = tokio::spawn(worker.serve(shutdown.subscribe()));

    let allowlist = IpAllowlist::new(&config.http.allowed_ips)?;
    let server = ApiServer::bind(&config.http, ApiState { queue }, allowlist).await?;
    server.serve(shutdown.subscribe()).await?;

    // The server has drained; wait for the worker to reject leftovers.
    worker_task.await.context("drain worker panicked")?;

    tracing::info!("shut down cleanly");
    Ok(())
}

/// Broadcast a shutdown once SIGINT or SIGTERM arrives.
fn spawn_signal_listener(shutdown: broadcast::Sender<Signal>) {
    tokio::spawn(async move {
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(error) => {
                    tracing::error!(%error, "failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, shutting down");
            }
            () = terminate => {
                tracing::info!("terminate received, shutting down");
            }
        }

        let _ = shutdown.send(Signal::Shutdown);
    });
}
