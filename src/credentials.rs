//! Flat `KEY=VALUE` credential file.
//!
//! The file stays human-editable: updates only touch the lines that define the
//! updated keys, every other line (comments, blanks, unrelated keys) is written
//! back untouched and in order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::config::{CredentialFileSettings, DEFAULT_API_VERSION};
use crate::error::AppError;
use crate::logging::Redacted;

pub const ACCESS_TOKEN: &str = "ACCESS_TOKEN";
pub const LOCATION_ID: &str = "LOCATION_ID";
pub const API_VERSION: &str = "API_VERSION";
pub const CLIENT_ID: &str = "CLIENT_ID";
pub const CLIENT_SECRET: &str = "CLIENT_SECRET";
pub const API_LIMIT: &str = "API_LIMIT";
pub const API_OFFSET: &str = "API_OFFSET";

/// Prefix used by older credential files
const LEGACY_PREFIX: &str = "HIGHLEVEL_";

/// Credentials for the upstream platform. Empty strings mean "not set".
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub access_token: String,
    pub location_id: String,
    pub api_version: String,
    /// Default page parameters persisted next to the credentials
    pub default_limit: Option<u32>,
    pub default_offset: Option<u32>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &Redacted::new(&self.client_secret).to_string())
            .field("access_token", &Redacted::new(&self.access_token).to_string())
            .field("location_id", &self.location_id)
            .field("api_version", &self.api_version)
            .finish()
    }
}

fn lookup<'a>(values: &'a HashMap<String, String>, key: &str) -> Option<&'a String> {
    values
        .get(key)
        .or_else(|| values.get(&format!("{}{}", LEGACY_PREFIX, key)))
}

/// `key` (or its legacy spelling) has a non-empty value
pub fn defines(values: &HashMap<String, String>, key: &str) -> bool {
    lookup(values, key).is_some_and(|value| !value.is_empty())
}

impl Credentials {
    /// Build credentials from parsed key/value pairs
    pub fn from_values(values: &HashMap<String, String>) -> Self {
        let get = |key: &str| -> String { lookup(values, key).cloned().unwrap_or_default() };
        let get_u32 = |key: &str| get(key).parse::<u32>().ok();

        let api_version = get(API_VERSION);

        Self {
            client_id: get(CLIENT_ID),
            client_secret: get(CLIENT_SECRET),
            access_token: get(ACCESS_TOKEN),
            location_id: get(LOCATION_ID),
            api_version: if api_version.is_empty() {
                DEFAULT_API_VERSION.to_string()
            } else {
                api_version
            },
            default_limit: get_u32(API_LIMIT),
            default_offset: get_u32(API_OFFSET),
        }
    }

    /// Both the access token and the tenant identifier are present
    pub fn is_complete(&self) -> bool {
        !self.access_token.is_empty() && !self.location_id.is_empty()
    }

    /// Fail with `MissingCredentials` unless [`Credentials::is_complete`]
    pub fn require_complete(&self) -> Result<(), AppError> {
        let mut missing = Vec::new();
        if self.access_token.is_empty() {
            missing.push(ACCESS_TOKEN);
        }
        if self.location_id.is_empty() {
            missing.push(LOCATION_ID);
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::MissingCredentials(format!(
                "{} not configured; run `inventory-report authorize` first",
                missing.join(" and ")
            )))
        }
    }

    pub fn has_client(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

/// Persistent credential file with an ordered search list
#[derive(Debug, Clone)]
pub struct CredentialStore {
    candidates: Vec<PathBuf>,
    write_target: PathBuf,
}

impl CredentialStore {
    /// Search `<cwd>/<file>`, then `<exe dir>/<file>`, then the explicit override
    pub fn discover(settings: &CredentialFileSettings) -> Self {
        let mut candidates = Vec::new();

        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join(&settings.file_name));
        }

        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            let path = exe_dir.join(&settings.file_name);
            if !candidates.contains(&path) {
                candidates.push(path);
            }
        }

        if let Some(path) = &settings.path {
            candidates.push(path.clone());
        }

        let write_target = settings
            .path
            .clone()
            .or_else(|| candidates.first().cloned())
            .unwrap_or_else(|| PathBuf::from(&settings.file_name));

        Self {
            candidates,
            write_target,
        }
    }

    /// Use an explicit search list; the first entry is the write target when none exists
    pub fn with_candidates(candidates: Vec<PathBuf>) -> Self {
        let write_target = candidates
            .first()
            .cloned()
            .unwrap_or_else(|| PathBuf::from(".env"));
        Self {
            candidates,
            write_target,
        }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// First candidate that currently exists on disk
    pub fn active_path(&self) -> Option<&Path> {
        self.candidates
            .iter()
            .find(|path| path.is_file())
            .map(PathBuf::as_path)
    }

    /// Path the next `update` will write to
    pub fn target_path(&self) -> &Path {
        self.active_path().unwrap_or(&self.write_target)
    }

    /// Read raw key/value pairs. A missing file yields an empty map.
    pub async fn load_values(&self) -> Result<HashMap<String, String>, AppError> {
        let Some(path) = self.active_path() else {
            tracing::debug!(candidates = ?self.candidates, "No credential file found");
            return Ok(HashMap::new());
        };

        match fs::read_to_string(path).await {
            Ok(content) => Ok(parse_values(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(AppError::CredentialStore {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Load credentials, always re-reading the file
    pub async fn load(&self) -> Result<Credentials, AppError> {
        let values = self.load_values().await?;
        Ok(Credentials::from_values(&values))
    }

    /// Merge `updates` into the credential file and return the path written.
    ///
    /// Every entry is checked with [`validate_entry`] before the file is read.
    pub async fn update(&self, updates: &[(&str, &str)]) -> Result<PathBuf, AppError> {
        for (key, value) in updates {
            validate_entry(key, value)?;
        }

        let path = self.target_path().to_path_buf();

        let existing = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(AppError::CredentialStore { path, source: e }),
        };

        let merged = merge_lines(&existing, updates);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::CredentialStore {
                    path: path.clone(),
                    source: e,
                })?;
        }

        fs::write(&path, merged)
            .await
            .map_err(|e| AppError::CredentialStore {
                path: path.clone(),
                source: e,
            })?;

        tracing::info!(
            path = %path.display(),
            keys = ?updates.iter().map(|(k, _)| *k).collect::<Vec<_>>(),
            "Credential file updated"
        );

        Ok(path)
    }
}

/// Check that `key=value` is written as exactly one line that reads back as `key`.
///
/// Keys must be non-empty without `=`, `#` or whitespace; values must not contain
/// line breaks.
pub fn validate_entry(key: &str, value: &str) -> Result<(), AppError> {
    if key.is_empty()
        || key.contains('=')
        || key.contains('#')
        || key.chars().any(char::is_whitespace)
    {
        return Err(AppError::InvalidInput(format!(
            "invalid credential key '{}'",
            key.escape_debug()
        )));
    }
    if value.contains('\n') || value.contains('\r') {
        return Err(AppError::InvalidInput(format!(
            "value for '{}' must be a single line",
            key
        )));
    }
    Ok(())
}

/// Key defined by a line, if any. Comments and lines without `=` define nothing.
fn line_key(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let (key, _) = trimmed.split_once('=')?;
    let key = key.trim();
    let key = key.strip_prefix("export ").map(str::trim).unwrap_or(key);
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' || first == b'\'') && first == last {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Parse `KEY=VALUE` content; later definitions win
pub fn parse_values(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .filter_map(|line| {
            let key = line_key(line)?;
            let (_, value) = line.split_once('=')?;
            Some((key.to_string(), unquote(value.trim()).to_string()))
        })
        .collect()
}

/// Line-level merge of `updates` into `content`.
///
/// Lines defining an updated key are replaced by `KEY=value`; keys not present
/// are appended in update order. All other lines are kept verbatim. Applying the
/// same updates twice yields the same content.
pub fn merge_lines(content: &str, updates: &[(&str, &str)]) -> String {
    let had_trailing_newline = content.is_empty() || content.ends_with('\n');
    let body = content.strip_suffix('\n').unwrap_or(content);

    let mut lines: Vec<String> = if content.is_empty() {
        Vec::new()
    } else {
        body.split('\n').map(str::to_string).collect()
    };

    let mut seen = vec![false; updates.len()];

    for line in lines.iter_mut() {
        let Some(key) = line_key(line) else {
            continue;
        };
        if let Some(idx) = updates.iter().position(|(k, _)| *k == key) {
            let (k, v) = updates[idx];
            *line = format!("{}={}", k, v);
            seen[idx] = true;
        }
    }

    for (idx, (key, value)) in updates.iter().enumerate() {
        // Duplicate keys inside one update set: first occurrence wins
        let duplicate = updates[..idx].iter().any(|(k, _)| k == key);
        if !seen[idx] && !duplicate {
            lines.push(format!("{}={}", key, value));
        }
    }

    let mut merged = lines.join("\n");
    if had_trailing_newline && !lines.is_empty() {
        merged.push('\n');
    }
    merged
}
