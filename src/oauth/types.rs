use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::AppError;

/// Single-use authorization code captured from the redirect.
///
/// Deliberately not `Clone`: the exchanger takes it by value.
#[derive(Debug, PartialEq, Eq)]
pub struct AuthorizationCode(String);

impl AuthorizationCode {
    pub fn new(code: impl Into<String>) -> Result<Self, AppError> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "authorization code must not be empty".to_string(),
            ));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// One OAuth round trip: everything needed to build the authorization URL
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub authorize_url: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub state: String,
}

impl AuthorizationRequest {
    /// Get the authorization URL to open in the browser
    pub fn url(&self) -> Result<String, AppError> {
        let mut url = url::Url::parse(&self.authorize_url)
            .map_err(|e| AppError::Config(format!("Invalid authorize URL: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", &self.state);

        Ok(url.to_string())
    }
}

/// Token endpoint response, normalized.
///
/// Only `access_token` is checked; the other fields are informational and fall
/// back to `None` when the upstream sends them with an unexpected type.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    /// Tenant the user picked on the consent screen
    #[serde(
        default,
        rename = "locationId",
        alias = "location_id",
        deserialize_with = "lenient_string"
    )]
    pub location_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub token_type: Option<String>,
    /// Lifetime in seconds
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub expires_in: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub refresh_token: Option<String>,
    /// Space separated, also when sent as a list
    #[serde(default, deserialize_with = "scope_list")]
    pub scope: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn scope_list<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" "),
        ),
        _ => None,
    })
}

impl TokenResponse {
    /// Location id, treating an empty string as absent
    pub fn location(&self) -> Option<&str> {
        self.location_id.as_deref().filter(|id| !id.is_empty())
    }
}
