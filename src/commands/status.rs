use anyhow::Result;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use inventory_report::{
    credentials::{
        defines, Credentials, ACCESS_TOKEN, API_LIMIT, API_OFFSET, API_VERSION, CLIENT_ID,
        CLIENT_SECRET, LOCATION_ID,
    },
    logging::Redacted,
};

use super::Context;

/// Execute the status command
pub async fn execute(ctx: Context) -> Result<()> {
    println!("{}", "🔍 Credential Status".bold());
    println!();

    match ctx.store.active_path() {
        Some(path) => println!("  {} {}", "Credential file:".bold(), path.display()),
        None => {
            println!("  {} No credential file found", "ℹ".blue());
            for candidate in ctx.store.candidates() {
                println!("    searched {}", candidate.display().to_string().dimmed());
            }
        }
    }
    println!(
        "  {} {}",
        "API:".bold(),
        ctx.settings.api.base_url
    );
    println!();

    let values = ctx.store.load_values().await?;
    let credentials = Credentials::from_values(&values);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("KEY").fg(Color::Cyan),
        Cell::new("STATUS").fg(Color::Cyan),
        Cell::new("VALUE").fg(Color::Cyan),
    ]);

    let rows: [(&str, String); 7] = [
        (CLIENT_ID, credentials.client_id.clone()),
        (CLIENT_SECRET, Redacted::new(&credentials.client_secret).to_string()),
        (ACCESS_TOKEN, Redacted::new(&credentials.access_token).to_string()),
        (LOCATION_ID, credentials.location_id.clone()),
        (API_VERSION, credentials.api_version.clone()),
        (API_LIMIT, display_number(credentials.default_limit)),
        (API_OFFSET, display_number(credentials.default_offset)),
    ];

    for (key, value) in rows {
        let status = if defines(&values, key) {
            Cell::new("set").fg(Color::Green)
        } else {
            Cell::new("missing").fg(Color::Red)
        };
        let value = if defines(&values, key) { value } else { "-".to_string() };
        table.add_row(vec![Cell::new(key), status, Cell::new(value)]);
    }

    println!("{table}");
    println!();

    if credentials.is_complete() {
        println!("{}", "✓ Ready to fetch inventory".green().bold());
    } else if credentials.has_client() {
        println!(
            "{} Run {} to obtain an access token",
            "⚠".yellow(),
            "inventory-report authorize".cyan()
        );
    } else {
        println!(
            "{} Set {} and {} first, e.g. {}",
            "⚠".yellow(),
            CLIENT_ID,
            CLIENT_SECRET,
            "inventory-report credentials set CLIENT_ID=... CLIENT_SECRET=...".cyan()
        );
    }

    Ok(())
}

fn display_number(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}
