use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{OAuthSettings, DEFAULT_API_VERSION, UPSTREAM_MAX_PAGE_SIZE};
use crate::credentials::{
    self, CredentialStore, Credentials, ACCESS_TOKEN, API_LIMIT, API_OFFSET, API_VERSION,
    CLIENT_ID, CLIENT_SECRET, LOCATION_ID,
};
use crate::error::AppError;
use crate::oauth::callback_server::CallbackListener;
use crate::oauth::exchange::{ExchangeParams, TokenExchanger};
use crate::oauth::state::generate_state;
use crate::oauth::types::AuthorizationRequest;

/// Opens the authorization URL for the user
pub trait BrowserOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<(), AppError>;
}

/// Default system browser
pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    fn open(&self, url: &str) -> Result<(), AppError> {
        webbrowser::open(url)
            .map_err(|e| AppError::CallbackServer(format!("Failed to open browser: {}", e)))
    }
}

/// Never opens anything; the URL is only reported through progress
pub struct NoBrowser;

impl BrowserOpener for NoBrowser {
    fn open(&self, _url: &str) -> Result<(), AppError> {
        Err(AppError::CallbackServer("browser launch disabled".to_string()))
    }
}

/// What a completed authorization left behind
#[derive(Debug, Clone)]
pub struct AuthorizationOutcome {
    /// Credentials as re-read from the store after the update
    pub credentials: Credentials,
    pub path: PathBuf,
    /// The token response carried no location id; the previous one, if any, was kept
    pub location_missing: bool,
}

/// Browser-based authorization-code flow, end to end
pub struct AuthorizationFlow {
    settings: OAuthSettings,
    store: CredentialStore,
    browser: Arc<dyn BrowserOpener>,
}

impl AuthorizationFlow {
    pub fn new(settings: OAuthSettings, store: CredentialStore) -> Self {
        Self {
            settings,
            store,
            browser: Arc::new(SystemBrowser),
        }
    }

    pub fn with_browser(mut self, browser: Arc<dyn BrowserOpener>) -> Self {
        self.browser = browser;
        self
    }

    pub fn settings(&self) -> &OAuthSettings {
        &self.settings
    }

    /// Run one authorization: bind, open browser, wait for the redirect,
    /// exchange the code and persist the result.
    ///
    /// `progress` receives user-facing status lines, including the URL when the
    /// browser could not be opened.
    pub async fn run<P>(
        &self,
        client_id: &str,
        client_secret: &str,
        progress: P,
    ) -> Result<AuthorizationOutcome, AppError>
    where
        P: Fn(&str) + Send + Sync,
    {
        if client_id.is_empty() || client_secret.is_empty() {
            return Err(AppError::MissingCredentials(
                "CLIENT_ID and CLIENT_SECRET are required to authorize".to_string(),
            ));
        }

        // Bind first so the redirect can never race the listener
        let mut listener = CallbackListener::bind(&self.settings.callback).await?;
        let redirect_uri = listener.redirect_uri();

        let state = generate_state();
        listener.expect_state(state.clone());

        let request = AuthorizationRequest {
            authorize_url: self.settings.authorize_url.clone(),
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.clone(),
            scopes: self.settings.scopes.clone(),
            state,
        };
        let url = request.url()?;

        tracing::info!(redirect_uri = %redirect_uri, "Starting OAuth authorization");

        // Launchers may block on a child process
        let browser = Arc::clone(&self.browser);
        let target = url.clone();
        let opened = tokio::task::spawn_blocking(move || browser.open(&target))
            .await
            .map_err(|e| AppError::CallbackServer(format!("Browser launch task failed: {}", e)))
            .and_then(|result| result);

        match opened {
            Ok(()) => progress("Browser opened, waiting for authorization..."),
            Err(e) => {
                tracing::warn!(error = %e, "Could not open browser");
                progress(&format!("Open this URL in your browser to authorize:\n{}", url));
            }
        }

        let timeout = Duration::from_secs(self.settings.timeout_seconds);
        let code = listener.wait(timeout).await?;
        progress("Authorization code received, exchanging for access token...");

        let exchanger = TokenExchanger::new(&self.settings)?;
        let token = exchanger
            .exchange(
                code,
                &ExchangeParams {
                    client_id,
                    client_secret,
                    redirect_uri: &redirect_uri,
                },
            )
            .await?;

        let existing = self.store.load_values().await?;
        let location_missing = token.location().is_none();
        if location_missing {
            tracing::warn!("Token response did not include a locationId, keeping the stored one");
        }

        let limit = UPSTREAM_MAX_PAGE_SIZE.to_string();
        let mut updates: Vec<(&str, &str)> = vec![(ACCESS_TOKEN, token.access_token.as_str())];
        if let Some(location_id) = token.location() {
            updates.push((LOCATION_ID, location_id));
        }
        updates.push((CLIENT_ID, client_id));
        updates.push((CLIENT_SECRET, client_secret));
        for (key, default) in [
            (API_VERSION, DEFAULT_API_VERSION),
            (API_LIMIT, limit.as_str()),
            (API_OFFSET, "0"),
        ] {
            if !credentials::defines(&existing, key) {
                updates.push((key, default));
            }
        }

        let path = self.store.update(&updates).await?;
        progress(&format!("Credentials saved to {}", path.display()));

        let credentials = self.store.load().await?;

        Ok(AuthorizationOutcome {
            credentials,
            path,
            location_missing,
        })
    }
}
