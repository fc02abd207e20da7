//! Retrieval of one page of results from a paginated API.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::FetchError;
use crate::http::JsonSource;
use crate::transform::Record;

/// One batch of records plus the pointer to the following page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Records in server order.
    pub records: Vec<Record>,
    /// URL of the next page; `None` ends the sequence.
    pub next: Option<String>,
}

impl Page {
    /// The terminal empty page returned when a fetch fails.
    #[must_use]
    pub fn end() -> Self {
        Self::default()
    }

    /// Returns true if this page carries no records and no continuation.
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.records.is_empty() && self.next.is_none()
    }
}

/// Wire shape of a page body: `{"results": [...], "next": "..." | null}`.
#[derive(Debug, Deserialize)]
struct PageBody {
    results: Vec<Record>,
    #[serde(default)]
    next: Option<String>,
}

/// Issues one request per page URL and splits the body into records and
/// the next-page pointer.
pub struct PageFetcher {
    source: Arc<dyn JsonSource>,
}

impl std::fmt::Debug for PageFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageFetcher").finish_non_exhaustive()
    }
}

impl PageFetcher {
    /// Creates a fetcher over `source`.
    #[must_use]
    pub fn new(source: Arc<dyn JsonSource>) -> Self {
        Self { source }
    }

    /// Fetches the page at `url`.
    ///
    /// Any failure (transport, status, body shape) yields [`Page::end`]:
    /// the continuation pointer is only known from a successful response,
    /// so there is nothing to skip ahead to.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch(&self, url: &str) -> Page {
        match self.try_fetch(url).await {
            Ok(page) => {
                debug!(
                    records = page.records.len(),
                    next = page.next.as_deref().unwrap_or("<none>"),
                    "fetched page"
                );
                page
            }
            Err(error) => {
                warn!(url, error = %error, "page fetch failed; ending pagination");
                Page::end()
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<Page, FetchError> {
        let body = self.source.get_json(url).await?;
        parse_page(url, body)
    }
}

fn parse_page(url: &str, body: Value) -> Result<Page, FetchError> {
    let body: PageBody =
        serde_json::from_value(body).map_err(|e| FetchError::malformed_body(url, e.to_string()))?;
    let next = body.next.filter(|n| !n.trim().is_empty());
    Ok(Page {
        records: body.results,
        next,
    })
}
