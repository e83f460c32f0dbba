//! Nightscout Client
//!
//! Fetches the single most recent entry from the Nightscout v3 entries API.

use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::SourceError;
use crate::reading::Reading;

/// Default bound on a single fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

const ENTRIES_PATH: &str = "/api/v3/entries";
const USER_AGENT: &str = "sugarmonitor";

/// Anything that can produce the latest glucose reading on demand
pub trait ReadingSource: Send + Sync {
    /// Fetch the most recent reading, or fail
    fn fetch_latest(&self) -> impl Future<Output = Result<Reading, SourceError>> + Send;
}

impl<T: ReadingSource> ReadingSource for Arc<T> {
    fn fetch_latest(&self) -> impl Future<Output = Result<Reading, SourceError>> + Send {
        (**self).fetch_latest()
    }
}

/// Entries response envelope
#[derive(Debug, Deserialize)]
struct EntriesResponse {
    status: i64,
    #[serde(default)]
    result: Vec<Entry>,
}

/// A single entry; only the fields used downstream are decoded
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Entry {
    sgv: Option<i64>,
    sys_time: String,
    #[serde(default)]
    identifier: String,
}

/// HTTP client for a Nightscout instance
pub struct NightscoutClient {
    /// Fully-built entries URL (path, token, limit and sort applied)
    entries_url: Url,
    /// Shared connection pool
    http: reqwest::Client,
    /// Per-request timeout
    timeout: Duration,
}

impl NightscoutClient {
    /// Create a client for the given base URL with the default timeout
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self, SourceError> {
        Self::with_timeout(base_url, token, DEFAULT_FETCH_TIMEOUT)
    }

    /// Create a client with an explicit request timeout
    pub fn with_timeout(
        base_url: &str,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let entries_url = build_entries_url(base_url, token)?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        info!("Created Nightscout client for {}", entries_url.host_str().unwrap_or("?"));

        Ok(Self {
            entries_url,
            http,
            timeout,
        })
    }

    /// URL queried on every fetch
    pub fn entries_url(&self) -> &Url {
        &self.entries_url
    }

    /// Fetch and decode the latest entry
    pub async fn fetch_latest(&self) -> Result<Reading, SourceError> {
        debug!("Querying {}", ENTRIES_PATH);

        let response = self
            .http
            .get(self.entries_url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if response.status() != StatusCode::OK {
            return Err(SourceError::HttpStatus(response.status().as_u16()));
        }

        let body: EntriesResponse = response.json().await.map_err(|e| self.classify(e))?;

        if body.status != 200 {
            return Err(SourceError::EmbeddedStatus(body.status));
        }

        let entry = body.result.into_iter().next().ok_or(SourceError::NoResults)?;
        let sgv = entry
            .sgv
            .ok_or_else(|| SourceError::Decode("latest entry has no sgv".to_string()))?;

        // e.g. "2023-12-28T12:59:16.000Z"
        let measured_at = DateTime::parse_from_rfc3339(&entry.sys_time)
            .map_err(|e| SourceError::InvalidTimestamp {
                value: entry.sys_time.clone(),
                reason: e.to_string(),
            })?
            .with_timezone(&Utc);

        Reading::from_mgdl(entry.identifier, measured_at, sgv)
    }

    fn classify(&self, err: reqwest::Error) -> SourceError {
        if err.is_timeout() {
            SourceError::Timeout(self.timeout.as_millis() as u64)
        } else {
            SourceError::from(err)
        }
    }
}

impl ReadingSource for NightscoutClient {
    async fn fetch_latest(&self) -> Result<Reading, SourceError> {
        NightscoutClient::fetch_latest(self).await
    }
}

/// Point the base URL at the entries API, asking for only the newest entry
fn build_entries_url(base_url: &str, token: Option<&str>) -> Result<Url, SourceError> {
    let mut url = Url::parse(base_url).map_err(|e| SourceError::InvalidUrl(e.to_string()))?;

    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(SourceError::InvalidUrl(format!(
            "{} is not an http(s) URL",
            base_url
        )));
    }

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !matches!(k.as_ref(), "token" | "limit" | "sort$desc"))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.set_path(ENTRIES_PATH);
    {
        let mut query = url.query_pairs_mut();
        query.clear();
        query.extend_pairs(retained);
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            query.append_pair("token", token);
        }
        query.append_pair("limit", "1");
        query.append_pair("sort$desc", "date");
    }

    Ok(url)
}
