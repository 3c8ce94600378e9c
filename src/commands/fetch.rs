use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Color, ContentArrangement, Table};
use inventory_report::{
    dispatcher::{Action, ActionEvent, Dispatcher, FetchRequest},
    inventory::{total_quantity, InventoryClient, InventoryRecord},
};

use super::{await_action, Context};

/// Records shown in the preview table
const PREVIEW_ROWS: usize = 5;

/// Execute the fetch command
pub async fn execute(
    ctx: Context,
    request: FetchRequest,
    output: Option<PathBuf>,
    export: bool,
) -> Result<()> {
    println!("{}", "📦 HighLevel Inventory".bold());
    println!();

    let (dispatcher, mut events) = Dispatcher::new(&ctx.settings, ctx.store.clone())?;

    dispatcher.fetch(request)?;
    let records = match await_action(&mut events, Action::Fetch, "Fetching inventory...").await? {
        ActionEvent::Fetched(records) => records,
        other => anyhow::bail!("Unexpected fetch result: {:?}", other),
    };

    print_preview(&records);

    if output.is_none() && !export {
        println!();
        println!(
            "  {} Use {} to write an Excel report",
            "ℹ".blue(),
            "--export".cyan()
        );
        return Ok(());
    }

    if records.is_empty() {
        println!("  {} Nothing to export", "ℹ".blue());
        return Ok(());
    }

    println!();
    dispatcher.export(records, output)?;
    let path = match await_action(&mut events, Action::Export, "Writing report...").await? {
        ActionEvent::Exported(path) => path,
        other => anyhow::bail!("Unexpected export result: {:?}", other),
    };

    println!("{} {}", "✓ Report written to".green().bold(), path.display());

    Ok(())
}

fn print_preview(records: &[InventoryRecord]) {
    println!(
        "{} {} products, {} units available",
        "✓".green(),
        records.len().to_string().bold(),
        total_quantity(records).to_string().bold()
    );

    if records.is_empty() {
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("#").fg(Color::Cyan),
        Cell::new("NAME").fg(Color::Cyan),
        Cell::new("PRODUCT").fg(Color::Cyan),
        Cell::new("AVAILABLE").fg(Color::Cyan),
        Cell::new("IMAGE").fg(Color::Cyan),
    ]);

    for (i, record) in records.iter().take(PREVIEW_ROWS).enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&record.name),
            Cell::new(&record.product_name),
            Cell::new(record.available_quantity).set_alignment(CellAlignment::Right),
            Cell::new(record.image_url().unwrap_or("-")),
        ]);
    }

    println!("{table}");

    if records.len() > PREVIEW_ROWS {
        println!("... and {} more products", records.len() - PREVIEW_ROWS);
    }
}

/// Execute the test-connection command
pub async fn test_connection(ctx: Context) -> Result<()> {
    println!("{}", "🔌 Testing HighLevel connection".bold());
    println!();

    let credentials = ctx.store.load().await?;
    let client = InventoryClient::new(&ctx.settings.api)?;

    let report = client.test_connection(&credentials).await?;

    println!("{}", "✓ Connection successful".green().bold());
    println!("  {} Endpoint: {}", "✓".green(), report.endpoint);
    println!("  {} Items returned: {}", "✓".green(), report.items_count);

    Ok(())
}
