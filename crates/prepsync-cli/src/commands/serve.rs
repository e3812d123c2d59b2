//! Serve command handler

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use prepsync_core::{Config, RealtimeSyncServer, SqliteGateway};

/// Open the gateway, seed the day's slots if needed, and run the server
/// until the process is stopped.
pub async fn run(
    config: Config,
    addr: Option<String>,
    db: Option<PathBuf>,
    lead_time: Option<i64>,
) -> Result<()> {
    let bind_addr = addr.unwrap_or_else(|| config.bind_addr.clone());
    let lead_minutes = lead_time.unwrap_or(config.lead_time_minutes);

    let db_path = match db {
        Some(path) => path,
        None => {
            config.ensure_data_dir()?;
            config.sqlite_path()
        }
    };
    let gateway = SqliteGateway::open(&db_path)
        .with_context(|| format!("Failed to open database at {:?}", db_path))?;

    let labels = config.day_labels()?;
    if gateway.seed_slots(&labels).await? {
        info!("seeded {} pickup slots into {:?}", labels.len(), db_path);
    }

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!("listening on ws://{bind_addr} (lead time {lead_minutes} min)");

    let server = RealtimeSyncServer::new(Arc::new(gateway), lead_minutes);
    server.run(listener).await.context("Server stopped")?;
    Ok(())
}
