use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Default settings file name (without extension), looked up in the working directory
pub const DEFAULT_SETTINGS_NAME: &str = "inventory-report";

/// Prefix for environment overrides, e.g. `INVENTORY_REPORT__API__BASE_URL`
pub const ENV_PREFIX: &str = "INVENTORY_REPORT";

/// Upstream hard limit on page size
pub const UPSTREAM_MAX_PAGE_SIZE: u32 = 300;

pub const DEFAULT_API_VERSION: &str = "2021-07-28";

/// Application settings.
///
/// Built once and handed to each component at construction time. Nothing reads
/// process state behind its back: call [`Settings::reload`] to pick up changes.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub oauth: OAuthSettings,
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub credentials: CredentialFileSettings,
    #[serde(skip)]
    source: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthSettings {
    pub authorize_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
    pub callback: CallbackSettings,
    /// How long to wait for the browser redirect
    pub timeout_seconds: u64,
    /// Timeout for the token endpoint request
    pub request_timeout_seconds: u64,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            authorize_url: "https://marketplace.gohighlevel.com/oauth/chooselocation".to_string(),
            token_url: "https://services.leadconnectorhq.com/oauth/token".to_string(),
            scopes: [
                "locations.readonly",
                "products.readonly",
                "products.write",
                "products/prices.readonly",
                "products/prices.write",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            callback: CallbackSettings::default(),
            timeout_seconds: 300,
            request_timeout_seconds: 30,
        }
    }
}

/// Loopback callback listener settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CallbackSettings {
    /// Port 0 binds an ephemeral port (tests only: the redirect URI must match the registered one)
    pub port: u16,
    pub path: String,
}

impl Default for CallbackSettings {
    fn default() -> Self {
        Self {
            port: 8080,
            path: "/callback".to_string(),
        }
    }
}

/// Which endpoint candidates the inventory client may try
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateMode {
    /// Only the primary `(path, params)` combination
    PrimaryOnly,
    /// Primary first, then the documented fallbacks
    All,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub max_page_size: u32,
    pub candidates: CandidateMode,
    /// Safety cap for `fetch --all`
    pub max_pages: u32,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://services.leadconnectorhq.com".to_string(),
            timeout_seconds: 30,
            max_page_size: UPSTREAM_MAX_PAGE_SIZE,
            candidates: CandidateMode::All,
            max_pages: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CredentialFileSettings {
    pub file_name: String,
    /// Explicit credential file, last entry of the search list
    pub path: Option<PathBuf>,
}

impl Default for CredentialFileSettings {
    fn default() -> Self {
        Self {
            file_name: ".env".to_string(),
            path: None,
        }
    }
}

impl Settings {
    /// Load settings from `path` (required to exist) or from the optional
    /// `inventory-report.{toml,json,yaml}` in the working directory, then apply
    /// `INVENTORY_REPORT__*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let file_source = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_SETTINGS_NAME).required(false),
        };

        let built = config::Config::builder()
            .add_source(file_source)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let mut settings: Settings = built.try_deserialize()?;
        settings.source = path.map(Path::to_path_buf);
        settings.validate()?;

        tracing::debug!(
            source = ?settings.source,
            api = %settings.api.base_url,
            callback_port = settings.oauth.callback.port,
            "Settings loaded"
        );

        Ok(settings)
    }

    /// Re-read the same sources this instance was built from
    pub fn reload(&mut self) -> Result<(), AppError> {
        let fresh = Self::load(self.source.as_deref())?;
        *self = fresh;
        Ok(())
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.api.max_page_size == 0 || self.api.max_page_size > UPSTREAM_MAX_PAGE_SIZE {
            return Err(AppError::Config(format!(
                "api.max_page_size must be between 1 and {}",
                UPSTREAM_MAX_PAGE_SIZE
            )));
        }

        if !self.oauth.callback.path.starts_with('/') {
            return Err(AppError::Config(
                "oauth.callback.path must start with '/'".to_string(),
            ));
        }

        if self.oauth.timeout_seconds == 0 {
            return Err(AppError::Config(
                "oauth.timeout_seconds must be greater than zero".to_string(),
            ));
        }

        for (name, value) in [
            ("oauth.authorize_url", &self.oauth.authorize_url),
            ("oauth.token_url", &self.oauth.token_url),
            ("api.base_url", &self.api.base_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| AppError::Config(format!("{} is not a valid URL: {}", name, e)))?;
        }

        if self.oauth.scopes.is_empty() {
            return Err(AppError::Config(
                "oauth.scopes must contain at least one scope".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.oauth.callback.port, 8080);
        assert_eq!(settings.oauth.callback.path, "/callback");
        assert_eq!(settings.api.max_page_size, 300);
        assert_eq!(settings.oauth.scopes.len(), 5);
    }

    #[test]
    fn test_validate_rejects_oversized_page() {
        let mut settings = Settings::default();
        settings.api.max_page_size = 301;

        let result = settings.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("max_page_size"));
    }

    #[test]
    fn test_validate_rejects_relative_callback_path() {
        let mut settings = Settings::default();
        settings.oauth.callback.path = "callback".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_partial_file_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "[api]\nbase_url = \"http://127.0.0.1:9999\"\ncandidates = \"primary_only\"\n",
        )
        .unwrap();

        let mut settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.api.base_url, "http://127.0.0.1:9999");
        assert_eq!(settings.api.candidates, CandidateMode::PrimaryOnly);
        // Untouched sections keep their defaults
        assert_eq!(settings.oauth.callback.port, 8080);

        std::fs::write(&path, "[oauth.callback]\nport = 9090\n").unwrap();
        settings.reload().unwrap();
        assert_eq!(settings.oauth.callback.port, 9090);
        assert_eq!(settings.api.base_url, "https://services.leadconnectorhq.com");
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.toml");
        assert!(Settings::load(Some(&path)).is_err());
    }
}
