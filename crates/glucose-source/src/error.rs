//! Reading Source Error Types

use thiserror::Error;

/// Errors that can occur while fetching the latest reading
#[derive(Debug, Error)]
pub enum SourceError {
    /// Base URL could not be parsed
    #[error("Invalid source URL: {0}")]
    InvalidUrl(String),

    /// Transport-level failure (connect, TLS, body read)
    #[error("Request failed: {0}")]
    Request(String),

    /// Timed out waiting for the source
    #[error("Timeout waiting for reading after {0}ms")]
    Timeout(u64),

    /// Non-200 HTTP response
    #[error("Non-200 response from Nightscout: {0}")]
    HttpStatus(u16),

    /// Non-200 status embedded in the response body
    #[error("Non-200 status code from Nightscout: {0}")]
    EmbeddedStatus(i64),

    /// Response body could not be decoded
    #[error("Invalid response: {0}")]
    Decode(String),

    /// Result set was empty
    #[error("No results returned from Nightscout")]
    NoResults,

    /// `sysTime` was not RFC 3339
    #[error("Unparsable timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    /// Sensor value outside what a glucose reading can be
    #[error("Invalid sensor glucose value: {0} mg/dL")]
    InvalidValue(i64),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else {
            SourceError::Request(err.to_string())
        }
    }
}
