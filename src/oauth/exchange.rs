use std::time::Duration;

use reqwest::{header::ACCEPT, Client, StatusCode};

use crate::config::OAuthSettings;
use crate::error::{truncate_body, AppError};
use crate::logging::redact_secret_in;
use crate::oauth::types::{AuthorizationCode, TokenResponse};

/// Client parameters of the authorization-code grant
#[derive(Debug, Clone, Copy)]
pub struct ExchangeParams<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    /// Must be byte-identical to the one sent in the authorization request
    pub redirect_uri: &'a str,
}

/// Exchanges authorization codes at the token endpoint
#[derive(Debug, Clone)]
pub struct TokenExchanger {
    client: Client,
    token_url: String,
}

impl TokenExchanger {
    pub fn new(settings: &OAuthSettings) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_seconds))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            token_url: settings.token_url.clone(),
        })
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Exchange authorization code for access token.
    ///
    /// One POST, no retries: codes are single-use, so a failure means the
    /// whole authorization has to be restarted.
    pub async fn exchange(
        &self,
        code: AuthorizationCode,
        params: &ExchangeParams<'_>,
    ) -> Result<TokenResponse, AppError> {
        if params.client_id.is_empty() || params.client_secret.is_empty() {
            return Err(AppError::MissingCredentials(
                "CLIENT_ID and CLIENT_SECRET are required for the token exchange".to_string(),
            ));
        }

        let code = code.into_inner();
        let form = [
            ("client_id", params.client_id),
            ("client_secret", params.client_secret),
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", params.redirect_uri),
        ];

        tracing::debug!(token_url = %self.token_url, "Exchanging authorization code");

        let response = self
            .client
            .post(&self.token_url)
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::TokenExchangeFailed {
                status: None,
                body: format!("Token exchange request failed: {}", e),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::TokenExchangeFailed {
                status: Some(status.as_u16()),
                body: format!("Failed to read token response: {}", e),
            })?;
        let diagnostic = || truncate_body(&redact_secret_in(&body, params.client_secret));

        if status != StatusCode::OK {
            tracing::warn!(status = status.as_u16(), "Token endpoint rejected the exchange");
            return Err(AppError::TokenExchangeFailed {
                status: Some(status.as_u16()),
                body: diagnostic(),
            });
        }

        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| AppError::TokenExchangeFailed {
                status: Some(status.as_u16()),
                body: format!("Failed to parse token response ({}): {}", e, diagnostic()),
            })?;

        if token.access_token.is_empty() {
            return Err(AppError::TokenExchangeFailed {
                status: Some(status.as_u16()),
                body: "Token response did not contain an access_token".to_string(),
            });
        }

        tracing::info!(
            location_id = token.location().unwrap_or("-"),
            expires_in = ?token.expires_in,
            "Access token obtained"
        );

        Ok(token)
    }
}
