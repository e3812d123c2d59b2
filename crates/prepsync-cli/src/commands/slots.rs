//! Slots command handler

use std::path::PathBuf;

use anyhow::{Context, Result};

use prepsync_core::{Config, PersistenceGateway, SqliteGateway};

/// Print the day's slot sequence with occupancy markers
pub async fn show(config: Config, db: Option<PathBuf>) -> Result<()> {
    let db_path = db.unwrap_or_else(|| config.sqlite_path());
    let gateway = SqliteGateway::open(&db_path)
        .with_context(|| format!("Failed to open database at {:?}", db_path))?;

    let slots = gateway.load_day_slots().await?;
    if slots.is_empty() {
        println!("No slots seeded yet. Run `prepsync serve` once to seed the day.");
        return Ok(());
    }

    let free = slots.iter().filter(|s| !s.occupied).count();
    for slot in &slots {
        let marker = if slot.occupied { "taken" } else { "free" };
        println!("{}  {}", slot.label, marker);
    }
    println!();
    println!("{free} free / {} total", slots.len());
    Ok(())
}
