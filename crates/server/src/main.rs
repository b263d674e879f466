// crates/server/src/main.rs
//! Hooks viewer binary.
//!
//! Binds the listener first so a taken port fails fast, then starts the log
//! watcher and serves until an authenticated `POST /shutdown` or Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use hooks_viewer_server::telemetry::init_tracing;
use hooks_viewer_server::{init_metrics, ServerConfig, ViewerServer};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();
    init_tracing(config.log_json)?;
    init_metrics();

    let (shutdown_secret, generated) = match config.shutdown_token.clone() {
        Some(token) if !token.trim().is_empty() => (token, false),
        _ => (uuid::Uuid::new_v4().to_string(), true),
    };

    let addr = config.addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let server = ViewerServer::start(&config, shutdown_secret.clone()).await;

    eprintln!("\n  hooks-viewer v{}\n", env!("CARGO_PKG_VERSION"));
    eprintln!("  \u{2192} http://localhost:{}", config.port);
    eprintln!("  log file:   {}", config.log_file.display());
    match config.resolved_static_dir() {
        Some(dir) => eprintln!("  dashboard:  {}", dir.display()),
        None => eprintln!("  dashboard:  (none, API only)"),
    }
    if generated {
        eprintln!("  shutdown token: {shutdown_secret}");
    }
    eprintln!();

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received");
            shutdown.cancel();
        }
    });

    server.serve(listener).await.context("server error")?;
    Ok(())
}
