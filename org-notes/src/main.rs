mod config;

mod app;
mod auth;
mod client;
mod ctx;
mod dashboard;
mod db;
mod errors;
mod members;
mod notes;
mod openapi;
mod realtime;
mod reconcile;
mod shared;
mod state;
mod users;

use std::{net::SocketAddr, time::Duration};

use app::AppParams;
use clap::{Parser, Subcommand};
pub use config::config;
pub use db::{init_db, DB};
pub use errors::{Error, Result};
use shared::tracing::{add_tracing_layer, setup_tracing};
use tokio::net::TcpListener;
use tower_sessions::ExpiredDeletion;
use tower_sessions_rusqlite_store::RusqliteStore;

#[derive(Parser)]
#[command(name = "org-notes")]
#[command(about = "Multi-tenant notes with realtime list updates")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Follow a live note listing from a running server
    Watch(client::watch::WatchArgs),
}

#[tokio::main]
async fn main() -> errors::Result<()> {
    let cli = Cli::parse();
    let config = config();
    setup_tracing(config.log_json);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Watch(args) => client::watch::run(args)
            .await
            .map_err(|e| Error::App(e.into())),
    }
}

async fn serve() -> errors::Result<()> {
    let config = config();

    let conn = init_db(&config.database_url).await?;

    let (app, _) = app::create(AppParams { db: conn.clone() }).await?;
    let app = add_tracing_layer(app);

    let sessions = RusqliteStore::new(conn);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60 * 60));
        loop {
            interval.tick().await;
            if let Err(e) = sessions.delete_expired().await {
                tracing::warn!("failed to purge expired sessions: {e}");
            }
        }
    });

    let port = config.port;
    let listener = TcpListener::bind(format!("127.0.0.1:{port}"))
        .await
        .map_err(|e| Error::App(e.into()))?;

    if let Ok(addr) = listener.local_addr() {
        tracing::info!("listening on http://{addr}");
    }

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::App(e.into()))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
