//! `pagesmith config`

use anyhow::{Context, Result};
use serde_json::json;

use pagesmith_config::Config;

/// Print effective configuration with the source of every value.
pub fn execute_config_command(config: &Config, json: bool) -> Result<()> {
    let entries = config.effective_entries();

    if json {
        let doc = json!({
            "config_file": config.config_path.as_ref().map(|p| p.display().to_string()),
            "entries": entries,
        });
        let rendered =
            serde_json::to_string_pretty(&doc).context("Failed to serialize configuration")?;
        println!("{rendered}");
        return Ok(());
    }

    println!("Effective configuration");
    match &config.config_path {
        Some(path) => println!("  Config file: {}", path.display()),
        None => println!("  Config file: (none found)"),
    }
    println!();

    let key_width = entries.iter().map(|e| e.key.len()).max().unwrap_or(0);
    for entry in &entries {
        println!(
            "  {:<key_width$}  {}  [{}]",
            entry.key, entry.value, entry.source
        );
    }
    Ok(())
}
