use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::{header::ACCEPT, Client, StatusCode};
use serde_json::Value;

use crate::config::{ApiSettings, CandidateMode};
use crate::credentials::Credentials;
use crate::error::{truncate_body, AppError};
use crate::inventory::models::{extract_items, normalize, InventoryRecord};

/// How the tenant is passed to a listing endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamShape {
    /// `locationId=<id>`
    LocationId,
    /// `altId=<id>&altType=location`
    AltId,
}

/// One `(path, parameter shape)` combination the client may try
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointCandidate {
    /// `{locationId}` is replaced with the tenant id
    pub path: &'static str,
    pub params: ParamShape,
}

const LOCATION_PLACEHOLDER: &str = "{locationId}";

/// Primary endpoint first, then the fallbacks, in the order they are tried
pub const ENDPOINT_CANDIDATES: [EndpointCandidate; 6] = [
    EndpointCandidate {
        path: "/products/inventory",
        params: ParamShape::LocationId,
    },
    EndpointCandidate {
        path: "/products/inventory",
        params: ParamShape::AltId,
    },
    EndpointCandidate {
        path: "/products",
        params: ParamShape::LocationId,
    },
    EndpointCandidate {
        path: "/products",
        params: ParamShape::AltId,
    },
    EndpointCandidate {
        path: "/locations/{locationId}/products",
        params: ParamShape::LocationId,
    },
    EndpointCandidate {
        path: "/locations/{locationId}/products",
        params: ParamShape::AltId,
    },
];

impl EndpointCandidate {
    pub fn candidates(mode: CandidateMode) -> &'static [EndpointCandidate] {
        match mode {
            CandidateMode::PrimaryOnly => &ENDPOINT_CANDIDATES[..1],
            CandidateMode::All => &ENDPOINT_CANDIDATES,
        }
    }

    fn url(&self, base_url: &str, location_id: &str) -> String {
        format!(
            "{}{}",
            base_url.trim_end_matches('/'),
            self.path.replace(LOCATION_PLACEHOLDER, location_id)
        )
    }

    fn query(&self, page: &PageRequest, location_id: &str) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("limit", page.limit.to_string()),
            ("offset", page.offset.to_string()),
        ];
        match self.params {
            ParamShape::LocationId => query.push(("locationId", location_id.to_string())),
            ParamShape::AltId => {
                query.push(("altId", location_id.to_string()));
                query.push(("altType", "location".to_string()));
            }
        }
        query
    }
}

impl std::fmt::Display for EndpointCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shape = match self.params {
            ParamShape::LocationId => "locationId",
            ParamShape::AltId => "altId/altType",
        };
        write!(f, "{} ({})", self.path, shape)
    }
}

/// Page parameters for one listing request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: crate::config::UPSTREAM_MAX_PAGE_SIZE,
            offset: 0,
        }
    }
}

/// Result of a connection check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionReport {
    pub items_count: usize,
    /// Candidate that answered
    pub endpoint: String,
}

/// Inventory listing client
#[derive(Debug)]
pub struct InventoryClient {
    client: Client,
    base_url: String,
    candidates: &'static [EndpointCandidate],
    max_page_size: u32,
    /// Index of the last candidate that answered 200
    preferred: AtomicUsize,
}

impl InventoryClient {
    pub fn new(settings: &ApiSettings) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            candidates: EndpointCandidate::candidates(settings.candidates),
            max_page_size: settings.max_page_size,
            preferred: AtomicUsize::new(0),
        })
    }

    pub fn max_page_size(&self) -> u32 {
        self.max_page_size
    }

    /// Candidate tried first on the next request
    pub fn preferred_candidate(&self) -> EndpointCandidate {
        self.candidates[self.preferred_index()]
    }

    fn preferred_index(&self) -> usize {
        self.preferred
            .load(Ordering::Relaxed)
            .min(self.candidates.len().saturating_sub(1))
    }

    /// Preferred candidate first, the rest in list order
    fn attempt_order(&self) -> Vec<usize> {
        let preferred = self.preferred_index();
        std::iter::once(preferred)
            .chain((0..self.candidates.len()).filter(|idx| *idx != preferred))
            .collect()
    }

    /// Fetch one page of inventory records.
    ///
    /// Fails with `MissingCredentials` before any request when the token or the
    /// location id is empty. `limit` is clamped to `1..=max_page_size`.
    pub async fn fetch_page(
        &self,
        credentials: &Credentials,
        page: PageRequest,
    ) -> Result<Vec<InventoryRecord>, AppError> {
        credentials.require_complete()?;

        let page = PageRequest {
            limit: page.limit.clamp(1, self.max_page_size),
            offset: page.offset,
        };

        let mut last_http: Option<(u16, String)> = None;
        let mut last_transport: Option<String> = None;

        for idx in self.attempt_order() {
            let candidate = self.candidates[idx];
            let url = candidate.url(&self.base_url, &credentials.location_id);

            tracing::debug!(
                endpoint = %candidate,
                limit = page.limit,
                offset = page.offset,
                "Requesting inventory page"
            );

            let response = match self
                .client
                .get(&url)
                .bearer_auth(&credentials.access_token)
                .header(ACCEPT, "application/json")
                .header("Version", &credentials.api_version)
                .query(&candidate.query(&page, &credentials.location_id))
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(endpoint = %candidate, error = %e, "Inventory request failed");
                    last_transport = Some(e.to_string());
                    continue;
                }
            };

            let status = response.status();
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    last_transport = Some(e.to_string());
                    continue;
                }
            };

            if status != StatusCode::OK {
                tracing::warn!(
                    endpoint = %candidate,
                    status = status.as_u16(),
                    body = %truncate_body(&body),
                    "Inventory endpoint rejected request"
                );
                last_http = Some((status.as_u16(), truncate_body(&body)));
                continue;
            }

            let parsed: Value = match serde_json::from_str(&body) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(endpoint = %candidate, error = %e, "Inventory response is not JSON");
                    last_http = Some((
                        status.as_u16(),
                        format!("Invalid JSON ({}): {}", e, truncate_body(&body)),
                    ));
                    continue;
                }
            };

            if idx != self.preferred_index() {
                tracing::info!(endpoint = %candidate, "Switching to inventory endpoint");
            }
            self.preferred.store(idx, Ordering::Relaxed);

            return Ok(match extract_items(parsed) {
                Some(items) => {
                    tracing::info!(endpoint = %candidate, count = items.len(), "Inventory page received");
                    normalize(&items)
                }
                None => {
                    tracing::warn!(endpoint = %candidate, "Unrecognized inventory response shape");
                    Vec::new()
                }
            });
        }

        match (last_http, last_transport) {
            (Some((status, body)), _) => Err(AppError::FetchFailed { status, body }),
            (None, Some(error)) => Err(AppError::NetworkError(error)),
            (None, None) => Err(AppError::Config(
                "No inventory endpoint candidates configured".to_string(),
            )),
        }
    }

    /// Fetch a single item to verify token, tenant and endpoint
    pub async fn test_connection(
        &self,
        credentials: &Credentials,
    ) -> Result<ConnectionReport, AppError> {
        let records = self
            .fetch_page(credentials, PageRequest { limit: 1, offset: 0 })
            .await?;

        Ok(ConnectionReport {
            items_count: records.len(),
            endpoint: self.preferred_candidate().to_string(),
        })
    }
}
