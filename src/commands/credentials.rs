use anyhow::Result;
use colored::Colorize;
use inventory_report::{
    credentials::{ACCESS_TOKEN, CLIENT_SECRET},
    logging::Redacted,
};

use super::Context;

/// Execute `credentials set`
pub async fn set(ctx: Context, entries: Vec<(String, String)>) -> Result<()> {
    let updates: Vec<(&str, &str)> = entries
        .iter()
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();

    let path = ctx.store.update(&updates).await?;

    for (key, value) in &updates {
        let shown = if *key == ACCESS_TOKEN || *key == CLIENT_SECRET {
            Redacted::new(value).to_string()
        } else {
            value.to_string()
        };
        println!("  {} {}={}", "✓".green(), key, shown);
    }
    println!();
    println!("Credentials saved to {}", path.display());

    Ok(())
}
