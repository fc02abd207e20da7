//! Harvest Core Library
//!
//! This library retrieves paginated records from a REST API (the Star Wars
//! API `people` resource by default), resolves cross-referenced resource URLs
//! into display names, strips unneeded fields, and accumulates the result
//! into a single CSV table.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`http`] - JSON-over-HTTP access behind the [`JsonSource`] seam
//! - [`resolver`] - Memoized, coalescing reference resolution
//! - [`fetcher`] - One-page-at-a-time retrieval with fail-stop semantics
//! - [`transform`] - Per-record enrichment and reshaping
//! - [`table`] - Accumulating CSV output table
//! - [`pipeline`] - The page-loop state machine tying it all together
//! - [`error`] - Error types

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod fetcher;
pub mod http;
pub mod pipeline;
pub mod resolver;
pub mod table;
#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub mod test_support;
pub mod transform;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use error::{FetchError, PipelineError};
pub use fetcher::{Page, PageFetcher};
pub use http::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, HttpJsonSource, HttpTimeouts,
    JsonSource,
};
pub use pipeline::{PipelineDriver, PipelineState, RunReport, Termination};
pub use resolver::{ResolutionCache, ResolverStats, ResourceResolver};
pub use table::OutputTable;
pub use transform::{
    DEFAULT_CONCURRENCY, Record, RecordTransformer, TransformRules, TransformerError,
};

/// Start of the Star Wars API `people` listing.
pub const DEFAULT_START_URL: &str = "https://swapi.dev/api/people/";
