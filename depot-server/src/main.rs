//! Depot file server

mod args;

use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;

use args::Args;
use depot_server::constants::*;
use depot_server::store::default_file_root;
use depot_server::{FileService, FileStore, logging, serve};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logging::init_logging(args.verbosity(), args.log_file.as_deref())
        .context("failed to initialize logging")?;

    tracing::info!("{}{}", MSG_BANNER, env!("CARGO_PKG_VERSION"));

    let store = setup_file_store(&args)?;
    tracing::info!("{}{}", MSG_FILE_ROOT, store.root().display());

    let service_config = args.service_config();
    let service = FileService::new(store, service_config);

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("{ERR_BIND}{addr}"))?;

    tracing::info!(
        %addr,
        transfer_capacity = service_config.transfer_capacity,
        list_capacity = service_config.list_capacity,
        "listening"
    );

    serve(listener, service, args.server_config(), setup_shutdown_signal()).await;

    tracing::info!("server stopped");
    Ok(())
}

/// Open the store at `--file-root`, or the platform default
fn setup_file_store(args: &Args) -> anyhow::Result<FileStore> {
    let root = match &args.file_root {
        Some(root) => root.clone(),
        None => default_file_root().map_err(anyhow::Error::msg)?,
    };
    FileStore::open(&root).map_err(anyhow::Error::msg)
}

/// Resolve on SIGINT or SIGTERM (Ctrl+C elsewhere)
async fn setup_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate()).expect(ERR_SIGNAL_SIGTERM);
        let mut sigint = signal(SignalKind::interrupt()).expect(ERR_SIGNAL_SIGINT);

        tokio::select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect(ERR_SIGNAL_CTRLC);
    }
}
