//! Background execution of user actions.
//!
//! Each action runs on its own tokio task and reports back over one event
//! channel. At most one task per [`Action`] kind is in flight; starting a second
//! one fails with [`AppError::ActionInFlight`] until the first has finished.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{OAuthSettings, Settings};
use crate::credentials::CredentialStore;
use crate::error::AppError;
use crate::inventory::{InventoryClient, InventoryRecord, PageRequest};
use crate::oauth::{AuthorizationFlow, AuthorizationOutcome, BrowserOpener, SystemBrowser};
use crate::report::ReportWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Authorize,
    Fetch,
    Export,
}

impl Action {
    fn index(self) -> usize {
        match self {
            Action::Authorize => 0,
            Action::Fetch => 1,
            Action::Export => 2,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Authorize => "authorize",
            Action::Fetch => "fetch",
            Action::Export => "export",
        };
        f.write_str(name)
    }
}

/// Messages sent from action tasks to the driver
#[derive(Debug)]
pub enum ActionEvent {
    Progress { action: Action, message: String },
    Authorized(AuthorizationOutcome),
    Fetched(Vec<InventoryRecord>),
    Exported(PathBuf),
    Failed { action: Action, error: AppError },
    /// Always the last event of an action; the action can be started again
    Finished(Action),
}

/// Client credentials given on the command line, overriding the stored ones
#[derive(Debug, Clone, Default)]
pub struct ClientOverride {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Page selection for a fetch; `None` falls back to the stored defaults
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchRequest {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    /// Keep requesting pages until a short one arrives
    pub all: bool,
}

#[derive(Default)]
struct InFlight([AtomicBool; 3]);

/// Releases the action slot when dropped
struct InFlightGuard {
    flags: Arc<InFlight>,
    action: Action,
}

impl InFlight {
    fn acquire(self: &Arc<Self>, action: Action) -> Result<InFlightGuard, AppError> {
        self.0[action.index()]
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AppError::ActionInFlight(action))?;

        Ok(InFlightGuard {
            flags: Arc::clone(self),
            action,
        })
    }

    fn is_running(&self, action: Action) -> bool {
        self.0[action.index()].load(Ordering::Acquire)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flags.0[self.action.index()].store(false, Ordering::Release);
    }
}

pub struct Dispatcher {
    oauth: OAuthSettings,
    browser: Arc<dyn BrowserOpener>,
    store: CredentialStore,
    client: Arc<InventoryClient>,
    writer: ReportWriter,
    max_pages: u32,
    in_flight: Arc<InFlight>,
    events: mpsc::UnboundedSender<ActionEvent>,
}

impl Dispatcher {
    pub fn new(
        settings: &Settings,
        store: CredentialStore,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ActionEvent>), AppError> {
        let (events, receiver) = mpsc::unbounded_channel();
        let client = InventoryClient::new(&settings.api)?;

        let dispatcher = Self {
            oauth: settings.oauth.clone(),
            browser: Arc::new(SystemBrowser),
            store,
            client: Arc::new(client),
            writer: ReportWriter::new(),
            max_pages: settings.api.max_pages,
            in_flight: Arc::new(InFlight::default()),
            events,
        };

        Ok((dispatcher, receiver))
    }

    pub fn with_browser(mut self, browser: Arc<dyn BrowserOpener>) -> Self {
        self.browser = browser;
        self
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn is_running(&self, action: Action) -> bool {
        self.in_flight.is_running(action)
    }

    /// Start the browser authorization
    pub fn authorize(&self, client: ClientOverride) -> Result<JoinHandle<()>, AppError> {
        let guard = self.in_flight.acquire(Action::Authorize)?;
        let flow = AuthorizationFlow::new(self.oauth.clone(), self.store.clone())
            .with_browser(Arc::clone(&self.browser));
        let store = self.store.clone();
        let events = self.events.clone();

        Ok(tokio::spawn(async move {
            let progress = |message: &str| {
                let _ = events.send(ActionEvent::Progress {
                    action: Action::Authorize,
                    message: message.to_string(),
                });
            };

            let event = match run_authorization(&store, &flow, client, progress).await {
                Ok(outcome) => ActionEvent::Authorized(outcome),
                Err(error) => ActionEvent::Failed {
                    action: Action::Authorize,
                    error,
                },
            };
            finish(&events, guard, event);
        }))
    }

    /// Start fetching inventory with freshly loaded credentials
    pub fn fetch(&self, request: FetchRequest) -> Result<JoinHandle<()>, AppError> {
        let guard = self.in_flight.acquire(Action::Fetch)?;
        let store = self.store.clone();
        let client = Arc::clone(&self.client);
        let max_pages = self.max_pages;
        let events = self.events.clone();

        Ok(tokio::spawn(async move {
            let event = match fetch_records(&store, &client, request, max_pages, &events).await {
                Ok(records) => ActionEvent::Fetched(records),
                Err(error) => ActionEvent::Failed {
                    action: Action::Fetch,
                    error,
                },
            };
            finish(&events, guard, event);
        }))
    }

    /// Start writing `records` to a spreadsheet
    pub fn export(
        &self,
        records: Vec<InventoryRecord>,
        output: Option<PathBuf>,
    ) -> Result<JoinHandle<()>, AppError> {
        let guard = self.in_flight.acquire(Action::Export)?;
        let writer = self.writer.clone();
        let events = self.events.clone();

        Ok(tokio::spawn(async move {
            let progress_events = events.clone();
            let result = tokio::task::spawn_blocking(move || {
                let progress = |message: &str| {
                    let _ = progress_events.send(ActionEvent::Progress {
                        action: Action::Export,
                        message: message.to_string(),
                    });
                };
                writer.write(&records, output.as_deref(), Some(&progress))
            })
            .await
            .unwrap_or_else(|e| Err(AppError::Report(format!("Export task failed: {}", e))));

            let event = match result {
                Ok(path) => ActionEvent::Exported(path),
                Err(error) => ActionEvent::Failed {
                    action: Action::Export,
                    error,
                },
            };
            finish(&events, guard, event);
        }))
    }
}

/// Send the result, release the slot, then announce completion
fn finish(events: &mpsc::UnboundedSender<ActionEvent>, guard: InFlightGuard, event: ActionEvent) {
    let action = guard.action;
    if let ActionEvent::Failed { error, .. } = &event {
        tracing::error!(action = %action, kind = error.kind(), error = %error, "Action failed");
    }
    let _ = events.send(event);
    drop(guard);
    let _ = events.send(ActionEvent::Finished(action));
}

/// Resolve client credentials (overrides first, then the store) and run the flow
async fn run_authorization<P>(
    store: &CredentialStore,
    flow: &AuthorizationFlow,
    client: ClientOverride,
    progress: P,
) -> Result<AuthorizationOutcome, AppError>
where
    P: Fn(&str) + Send + Sync,
{
    let stored = store.load().await?;
    let client_id = client.client_id.unwrap_or(stored.client_id);
    let client_secret = client.client_secret.unwrap_or(stored.client_secret);
    flow.run(&client_id, &client_secret, progress).await
}

async fn fetch_records(
    store: &CredentialStore,
    client: &InventoryClient,
    request: FetchRequest,
    max_pages: u32,
    events: &mpsc::UnboundedSender<ActionEvent>,
) -> Result<Vec<InventoryRecord>, AppError> {
    let credentials = store.load().await?;

    let limit = request
        .limit
        .or(credentials.default_limit)
        .unwrap_or(client.max_page_size())
        .clamp(1, client.max_page_size());
    let mut offset = request.offset.or(credentials.default_offset).unwrap_or(0);

    let progress = |message: String| {
        let _ = events.send(ActionEvent::Progress {
            action: Action::Fetch,
            message,
        });
    };

    progress(format!("Fetching inventory (limit={}, offset={})...", limit, offset));

    let mut records = client
        .fetch_page(&credentials, PageRequest { limit, offset })
        .await?;
    progress(format!("Received {} products", records.len()));

    if !request.all {
        return Ok(records);
    }

    let mut last_page = records.len();
    let mut pages = 1;
    while last_page as u32 == limit {
        if pages >= max_pages {
            tracing::warn!(max_pages, "Page limit reached, stopping pagination");
            break;
        }

        offset = offset.saturating_add(limit);
        let page = client
            .fetch_page(&credentials, PageRequest { limit, offset })
            .await?;
        last_page = page.len();
        pages += 1;
        records.extend(page);
        progress(format!("Received {} products ({} pages)", records.len(), pages));
    }

    Ok(records)
}
