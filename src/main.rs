use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use inventory_report::{
    dispatcher::{ClientOverride, FetchRequest},
    init_tracing,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = cli::Cli::parse();

    init_tracing(args.verbose);

    let ctx = commands::Context::load(args.settings.as_deref(), args.env_file.clone())?;

    // Dispatch to appropriate command handler
    match args.get_command() {
        cli::Commands::Authorize {
            no_browser,
            timeout,
            client_id,
            client_secret,
        } => {
            let client = ClientOverride {
                client_id,
                client_secret,
            };
            commands::authorize::execute(ctx, no_browser, timeout, client).await?;
        }
        cli::Commands::Status => {
            commands::status::execute(ctx).await?;
        }
        cli::Commands::Credentials { action } => match action {
            cli::CredentialCommands::Set { entries } => {
                commands::credentials::set(ctx, entries).await?
            }
        },
        cli::Commands::TestConnection => {
            commands::fetch::test_connection(ctx).await?;
        }
        cli::Commands::Fetch {
            limit,
            offset,
            all,
            output,
            export,
        } => {
            let request = FetchRequest { limit, offset, all };
            commands::fetch::execute(ctx, request, output, export).await?;
        }
    }

    Ok(())
}
