use std::path::PathBuf;

use thiserror::Error;

use crate::dispatcher::Action;

/// Maximum number of characters of an upstream body kept in error messages
pub const MAX_ERROR_BODY_CHARS: usize = 200;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Access token or location id absent; raised before any request is sent
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// No callback reached the loopback listener within the wait window
    #[error("Authorization timeout: no callback received within {seconds} seconds")]
    AuthorizationTimeout { seconds: u64 },

    /// The callback arrived but did not carry a usable authorization code
    #[error("Authorization rejected: {0}")]
    AuthorizationRejected(String),

    /// Upstream rejected the code exchange, or the exchange never reached it
    #[error("Token exchange failed{}: {body}", status_suffix(.status))]
    TokenExchangeFailed { status: Option<u16>, body: String },

    /// Upstream rejected or errored on a listing request
    #[error("Inventory fetch failed (HTTP {status}): {body}")]
    FetchFailed { status: u16, body: String },

    /// Transport-level failure (DNS, connect, timeout)
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credential file error ({}): {source}", .path.display())]
    CredentialStore {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Report error: {0}")]
    Report(String),

    #[error("Action already in progress: {0}")]
    ActionInFlight(Action),

    /// OAuth callback server error
    #[error("Callback server error: {0}")]
    CallbackServer(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(status) => format!(" (HTTP {})", status),
        None => String::new(),
    }
}

impl AppError {
    /// Short machine-friendly name, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredentials(_) => "missing_credentials",
            Self::AuthorizationTimeout { .. } => "authorization_timeout",
            Self::AuthorizationRejected(_) => "authorization_rejected",
            Self::TokenExchangeFailed { .. } => "token_exchange_failed",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::NetworkError(_) => "network_error",
            Self::InvalidInput(_) => "invalid_input",
            Self::Config(_) => "config_error",
            Self::CredentialStore { .. } => "credential_store_error",
            Self::Report(_) => "report_error",
            Self::ActionInFlight(_) => "action_in_flight",
            Self::CallbackServer(_) => "callback_server_error",
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::NetworkError(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for AppError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Self::Report(err.to_string())
    }
}

/// Truncate an upstream body for diagnostics, respecting char boundaries
pub fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        body.to_string()
    } else {
        let truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = AppError::MissingCredentials("ACCESS_TOKEN is not configured".to_string());
        assert_eq!(
            error.to_string(),
            "Missing credentials: ACCESS_TOKEN is not configured"
        );
    }

    #[test]
    fn test_token_exchange_display_with_and_without_status() {
        let with_status = AppError::TokenExchangeFailed {
            status: Some(401),
            body: "invalid_grant".to_string(),
        };
        assert_eq!(
            with_status.to_string(),
            "Token exchange failed (HTTP 401): invalid_grant"
        );

        let without_status = AppError::TokenExchangeFailed {
            status: None,
            body: "connection refused".to_string(),
        };
        assert_eq!(
            without_status.to_string(),
            "Token exchange failed: connection refused"
        );
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(
            AppError::AuthorizationTimeout { seconds: 300 }.kind(),
            "authorization_timeout"
        );
        assert_eq!(
            AppError::FetchFailed { status: 500, body: String::new() }.kind(),
            "fetch_failed"
        );
    }

    #[test]
    fn test_truncate_body() {
        let short = "a".repeat(50);
        assert_eq!(truncate_body(&short), short);

        let long = "é".repeat(500);
        let truncated = truncate_body(&long);
        assert_eq!(truncated.chars().count(), MAX_ERROR_BODY_CHARS + 3);
        assert!(truncated.ends_with("..."));
    }
}
