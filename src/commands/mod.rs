//! Command implementations for the CLI
//!
//! - authorize: browser OAuth flow, stores the token
//! - status: credential overview
//! - credentials: manual credential entry
//! - fetch: inventory fetch, preview, export and connection test

pub mod authorize;
pub mod credentials;
pub mod fetch;
pub mod status;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use inventory_report::{
    config::Settings,
    credentials::CredentialStore,
    dispatcher::{Action, ActionEvent},
};
use tokio::sync::mpsc::UnboundedReceiver;

/// Settings plus the credential store they point at
pub struct Context {
    pub settings: Settings,
    pub store: CredentialStore,
}

impl Context {
    pub fn load(settings_path: Option<&Path>, env_file: Option<PathBuf>) -> Result<Self> {
        let mut settings = Settings::load(settings_path)?;
        if env_file.is_some() {
            settings.credentials.path = env_file;
        }
        let store = CredentialStore::discover(&settings.credentials);

        Ok(Self { settings, store })
    }
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Render events of `action` until it finishes and return its result event
pub async fn await_action(
    receiver: &mut UnboundedReceiver<ActionEvent>,
    action: Action,
    waiting: &str,
) -> Result<ActionEvent> {
    let spinner = spinner(waiting);
    let mut result = None;

    while let Some(event) = receiver.recv().await {
        match event {
            ActionEvent::Progress { message, .. } => {
                spinner.println(format!("  {} {}", "→".cyan(), message));
            }
            ActionEvent::Finished(finished) if finished == action => break,
            ActionEvent::Finished(_) => {}
            ActionEvent::Failed { error, .. } => {
                spinner.finish_and_clear();
                return Err(error.into());
            }
            other => result = Some(other),
        }
    }

    spinner.finish_and_clear();
    result.ok_or_else(|| anyhow::anyhow!("{} ended without a result", action))
}
