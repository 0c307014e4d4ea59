//! Ingestion and lifecycle service for uploaded interactive bundles.

mod error;
mod http;
mod service;

use clap::Parser;
use exn::ResultExt;
use interactives_config::Config;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

use crate::error::{ErrorKind, Result};
use crate::service::Service;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Address to listen on, overriding the configuration.
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = ?err, "service failed");
            ExitCode::FAILURE
        },
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load(args.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    let Service { state, database, dispatcher } = Service::build(&config).await?;
    if !config.publishing_enabled {
        tracing::info!("publishing disabled, serving published interactives read-only");
    }

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .or_raise(|| ErrorKind::Bind(config.bind_addr.to_string()))?;
    tracing::info!(addr = %config.bind_addr, "listening");

    let app = http::router(state);
    let timeout = config.shutdown_timeout();
    let (signalled, on_signal) = oneshot::channel();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                let _ = signalled.send(());
            })
            .await
    });
    let joined = tokio::select! {
        joined = &mut server => joined,
        _ = on_signal => match tokio::time::timeout(timeout, &mut server).await {
            Ok(joined) => joined,
            Err(_) => {
                tracing::warn!(?timeout, "in-flight requests still running, aborting");
                server.abort();
                Ok(Ok(()))
            },
        },
    };
    let result = joined.or_raise(|| ErrorKind::Serve).and_then(|served| served.or_raise(|| ErrorKind::Serve));

    // The router (and with it the last event sender) is gone; let the
    // dispatcher drain what is left.
    if tokio::time::timeout(timeout, dispatcher).await.is_err() {
        tracing::warn!(?timeout, "importer events still queued at shutdown");
    }
    database.close().await;
    tracing::info!("shut down");
    result
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
