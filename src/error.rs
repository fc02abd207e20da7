//! Error types for the harvesting pipeline.
//!
//! Two families exist. [`FetchError`] covers expected remote failures
//! (transport, status, body); the fetcher and resolver absorb these into
//! sentinel values. [`PipelineError`] covers unexpected processing failures
//! that end a run early with whatever rows were already accumulated.

use thiserror::Error;

/// Errors from a single remote JSON request.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL could not be parsed or does not use http/https.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The rejected URL string.
        url: String,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// Request did not complete within the configured timeout.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Response body was not the JSON shape the caller expected.
    #[error("malformed response body from {url}: {reason}")]
    MalformedBody {
        /// The URL whose body was rejected.
        url: String,
        /// What was wrong with the body.
        reason: String,
    },

    /// HTTP client could not be constructed.
    #[error("HTTP client construction failed: {reason}")]
    ClientBuild {
        /// Builder failure description.
        reason: String,
    },
}

impl FetchError {
    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a network error from a reqwest error.
    ///
    /// Timeouts are split out into [`FetchError::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a malformed body error.
    pub fn malformed_body(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedBody {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for transport-level failures (connection, DNS, timeout).
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }
}

/// Unexpected failures while processing a page that was fetched successfully.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A record does not have the shape the transform rules require.
    #[error("malformed record at index {index}: {reason}")]
    MalformedRecord {
        /// Position of the record within its page.
        index: usize,
        /// What was wrong with the record.
        reason: String,
    },

    /// A record carries a column the established header does not have.
    #[error("record at index {index} has column '{column}' not present in the table header")]
    SchemaMismatch {
        /// Position of the record within its page.
        index: usize,
        /// The unexpected column.
        column: String,
    },

    /// The next-page pointer names a page that was already fetched.
    #[error("pagination cycle detected at {url}")]
    PaginationCycle {
        /// The repeated page URL.
        url: String,
    },

    /// CSV serialization failed.
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    /// IO error while writing serialized output.
    #[error("IO error writing table: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Creates a malformed record error.
    pub fn malformed_record(index: usize, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            index,
            reason: reason.into(),
        }
    }

    /// Creates a schema mismatch error.
    pub fn schema_mismatch(index: usize, column: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            index,
            column: column.into(),
        }
    }
}
