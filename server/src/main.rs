#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # termgate
//!
//! Serve a server-side terminal application to web browsers.
//!
//! One browser at a time controls the application over `/ws`; any number of
//! others watch a live mirror of its output over `/ws/viewer`.
//!
//! ## HTTP surface
//!
//! | Method | Path          | Auth        | Description                         |
//! |--------|---------------|-------------|-------------------------------------|
//! | GET    | `/`           | No          | Controller page (xterm.js client)   |
//! | GET    | `/viewer`     | No          | Viewer page                         |
//! | GET    | `/client.js`  | No          | Shared browser client               |
//! | GET    | `/ws`         | controller* | Controller WebSocket (single slot)  |
//! | GET    | `/ws/viewer`  | viewer*     | Viewer WebSocket (read-only mirror) |
//!
//! *Passwords travel as `?password=<secret>`; a role without a configured
//! password accepts anyone.
//!
//! ## Architecture
//!
//! ```text
//! main.rs          entry point, CLI, tracing setup, graceful shutdown
//! config.rs        TOML + env-var configuration
//! auth.rs          per-role password check, constant-time comparison
//! http.rs          request head parsing, plain responses
//! assets.rs        built-in browser client plus configured files
//! routes/
//!   mod.rs         accept loop and path dispatch
//!   upgrade.rs     controller/viewer upgrades, slot arbitration
//!   assets.rs      static file responses
//! ws/
//!   frame.rs       RFC 6455 frame codec
//!   handshake.rs   Sec-WebSocket-Accept
//!   mod.rs         Connection: send, receive, close
//! sessions/
//!   buffer.rs      coalescing output buffer
//!   mod.rs         Session (controller + viewers) and the slot
//! engine/
//!   mod.rs         Page, PageRegistry, RemoteTerminal
//!   driver.rs      reader, flusher and page driver for one controller
//! demo.rs          sample pages
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use termgate::{demo, AppState, Assets, Config, Server};

/// Serve a terminal application to web browsers.
#[derive(Parser)]
#[command(name = "termgate", version)]
struct Cli {
    /// Path to TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Address to listen on; overrides config and environment.
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("termgate: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("termgate v{} starting", env!("CARGO_PKG_VERSION"));

    if config.auth.controller_password.is_none() {
        warn!("No controller password set; anyone who can reach the port can drive");
    }

    let extra = match config.load_assets() {
        Ok(extra) => extra,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let listener = match TcpListener::bind(&config.server.listen).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind {}: {e}", config.server.listen);
            return ExitCode::FAILURE;
        }
    };
    match listener.local_addr() {
        Ok(addr) => info!("Listening on {addr}"),
        Err(_) => info!("Listening on {}", config.server.listen),
    }

    let state = AppState::new(config, Assets::new(extra), demo::pages());
    Server::new(state).serve(listener, shutdown_signal()).await;

    info!("Goodbye");
    ExitCode::SUCCESS
}

/// Resolve on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received SIGINT"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!("Failed to register SIGTERM: {e}");
                ctrl_c.await.ok();
                info!("Received SIGINT");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received SIGINT");
    }
}
