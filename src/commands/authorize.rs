use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use inventory_report::{
    dispatcher::{Action, ActionEvent, ClientOverride, Dispatcher},
    logging::Redacted,
    oauth::NoBrowser,
};

use super::{await_action, Context};

/// Execute the authorize command
pub async fn execute(
    mut ctx: Context,
    no_browser: bool,
    timeout: Option<u64>,
    client: ClientOverride,
) -> Result<()> {
    println!("{}", "🔐 HighLevel OAuth Authorization".bold());
    println!();

    if let Some(timeout) = timeout {
        ctx.settings.oauth.timeout_seconds = timeout;
        ctx.settings.validate()?;
    }

    let callback = &ctx.settings.oauth.callback;
    println!(
        "  {} Redirect URI must be registered as {}",
        "ℹ".blue(),
        format!("http://localhost:{}{}", callback.port, callback.path).cyan()
    );
    println!(
        "  {} Waiting up to {} seconds for the browser redirect",
        "ℹ".blue(),
        ctx.settings.oauth.timeout_seconds
    );
    println!();

    let (dispatcher, mut events) = Dispatcher::new(&ctx.settings, ctx.store.clone())?;
    let dispatcher = if no_browser {
        dispatcher.with_browser(Arc::new(NoBrowser))
    } else {
        dispatcher
    };

    dispatcher.authorize(client)?;

    let outcome =
        match await_action(&mut events, Action::Authorize, "Waiting for authorization...").await? {
            ActionEvent::Authorized(outcome) => outcome,
            other => anyhow::bail!("Unexpected authorization result: {:?}", other),
        };

    println!("{}", "✓ Authorization successful!".green().bold());
    println!();
    println!(
        "  {} Access token: {}",
        "✓".green(),
        Redacted::new(&outcome.credentials.access_token)
    );
    if outcome.location_missing {
        println!(
            "  {} The token response had no location id; LOCATION_ID was left as {}",
            "⚠".yellow(),
            if outcome.credentials.location_id.is_empty() {
                "unset".to_string()
            } else {
                outcome.credentials.location_id.clone()
            }
        );
        println!(
            "    Set it with {}",
            "inventory-report credentials set LOCATION_ID=<id>".cyan()
        );
    } else {
        println!(
            "  {} Location ID: {}",
            "✓".green(),
            outcome.credentials.location_id
        );
    }
    println!(
        "  {} Credentials saved to {}",
        "✓".green(),
        outcome.path.display()
    );
    println!();
    println!(
        "You can now run {}",
        "inventory-report fetch --export".cyan()
    );

    Ok(())
}
