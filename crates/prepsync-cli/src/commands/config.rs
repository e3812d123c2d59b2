//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use prepsync_core::Config;

/// Show current configuration
pub fn show(config: &Config) -> Result<()> {
    println!("Configuration:");
    println!("  bind_addr:             {}", config.bind_addr);
    println!("  data_dir:              {}", config.data_dir.display());
    println!("  lead_time_minutes:     {}", config.lead_time_minutes);
    println!("  first_slot:            {}", config.first_slot);
    println!("  last_slot:             {}", config.last_slot);
    println!("  slot_interval_minutes: {}", config.slot_interval_minutes);
    println!();
    println!("Config file: {}", Config::config_file_path().display());
    Ok(())
}

/// Set a configuration value
pub fn set(
    mut config: Config,
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
) -> Result<()> {
    match key.as_str() {
        "bind_addr" => config.bind_addr = value.clone(),
        "data_dir" => config.data_dir = value.clone().into(),
        "lead_time_minutes" => {
            config.lead_time_minutes = value
                .parse()
                .context("Invalid value for lead_time_minutes. Use a number of minutes.")?;
        }
        "first_slot" => config.first_slot = value.clone(),
        "last_slot" => config.last_slot = value.clone(),
        "slot_interval_minutes" => {
            config.slot_interval_minutes = value
                .parse()
                .context("Invalid value for slot_interval_minutes. Use a number of minutes.")?;
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: bind_addr, data_dir, lead_time_minutes, first_slot, last_slot, slot_interval_minutes",
                key
            );
        }
    }

    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;
    println!("Set {} = {}", key, value);
    Ok(())
}
