//! Page-loop driver: fetch, transform, append, repeat.
//!
//! The driver is an explicit state machine:
//!
//! ```text
//! Fetching ──▶ Transforming ──▶ Appending ──┬──▶ Fetching (next page)
//!                   │               │        └──▶ Done     (no next page)
//!                   └───────────────┴──────────▶ Failed    (partial result)
//! ```
//!
//! Expected remote failures never reach the driver: the fetcher turns them
//! into an empty terminal page and the resolver into nulls. Unexpected
//! processing failures move the machine to [`PipelineState::Failed`]; the
//! rows accumulated so far are kept. [`PipelineDriver::run`] never returns
//! an error.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use harvest_core::{HttpJsonSource, JsonSource, PipelineDriver};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source: Arc<dyn JsonSource> = Arc::new(HttpJsonSource::new()?);
//! let driver = PipelineDriver::for_people(source);
//! let table = driver.run("https://swapi.dev/api/people/").await;
//! print!("{}", table.to_csv_string()?);
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use crate::error::PipelineError;
use crate::fetcher::{Page, PageFetcher};
use crate::http::JsonSource;
use crate::resolver::ResourceResolver;
use crate::table::OutputTable;
use crate::transform::{Record, RecordTransformer, TransformRules};

/// How often an in-flight step checks the interrupt flag.
const INTERRUPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Where the driver is within one iteration of the page loop.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    /// About to request the page at `url`.
    Fetching {
        /// Page URL.
        url: String,
    },
    /// A page arrived and its records await transformation.
    Transforming {
        /// The fetched page.
        page: Page,
    },
    /// Transformed records await appending to the table.
    Appending {
        /// Cleaned records.
        records: Vec<Record>,
        /// Pointer to the following page.
        next: Option<String>,
    },
    /// Pagination ended normally.
    Done,
    /// The run stopped early; the table holds a partial result.
    Failed {
        /// Why the run stopped.
        reason: String,
    },
    /// The interrupt flag was raised; the table holds a partial result.
    Cancelled,
}

impl PipelineState {
    /// Returns true for `Done`, `Failed`, and `Cancelled`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. } | Self::Cancelled)
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Every page was processed (or a fetch failure ended pagination).
    Completed,
    /// An unexpected processing failure stopped the run.
    Aborted {
        /// Failure description.
        reason: String,
    },
    /// The run was interrupted.
    Cancelled,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Accumulated rows; partial unless `termination` is `Completed`.
    pub table: OutputTable,
    /// Number of page requests issued.
    pub pages_fetched: usize,
    /// How the run ended.
    pub termination: Termination,
}

impl RunReport {
    /// Returns true if the run ended without an abort or interruption.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.termination == Termination::Completed
    }
}

/// Drives the fetch → transform → append loop for one dataset snapshot.
#[derive(Debug)]
pub struct PipelineDriver {
    fetcher: PageFetcher,
    transformer: RecordTransformer,
    interrupted: Arc<AtomicBool>,
}

impl PipelineDriver {
    /// Creates a driver from its collaborators.
    #[must_use]
    pub fn new(fetcher: PageFetcher, transformer: RecordTransformer) -> Self {
        Self {
            fetcher,
            transformer,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Creates a driver for the `people` dataset sharing one source for
    /// pages and references.
    #[must_use]
    pub fn for_people(source: Arc<dyn JsonSource>) -> Self {
        let resolver = Arc::new(ResourceResolver::new(Arc::clone(&source)));
        Self::new(
            PageFetcher::new(source),
            RecordTransformer::new(resolver, TransformRules::people()),
        )
    }

    /// Uses `flag` as the interrupt signal; raising it abandons the step in
    /// flight and ends the run with the rows appended so far.
    #[must_use]
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = flag;
        self
    }

    /// The interrupt flag observed by this driver.
    #[must_use]
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    /// The transformer, for access to its resolver statistics.
    #[must_use]
    pub fn transformer(&self) -> &RecordTransformer {
        &self.transformer
    }

    /// Harvests every page reachable from `start_url` into one table.
    pub async fn run(&self, start_url: &str) -> OutputTable {
        self.run_with_report(start_url).await.table
    }

    /// Like [`run`](Self::run), also reporting page count and termination.
    #[instrument(skip(self))]
    pub async fn run_with_report(&self, start_url: &str) -> RunReport {
        let mut table = OutputTable::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut pages_fetched = 0;
        let mut state = PipelineState::Fetching {
            url: start_url.to_string(),
        };

        while !state.is_terminal() {
            if self.interrupted.load(Ordering::SeqCst) {
                state = PipelineState::Cancelled;
                break;
            }
            if let PipelineState::Fetching { url } = &state {
                if !visited.insert(url.clone()) {
                    let cycle = PipelineError::PaginationCycle { url: url.clone() };
                    state = PipelineState::Failed {
                        reason: cycle.to_string(),
                    };
                    break;
                }
                pages_fetched += 1;
            }
            // A raised flag abandons the in-flight step; appends are synchronous,
            // so the table never holds half a page.
            state = tokio::select! {
                biased;
                () = self.interrupt_requested() => PipelineState::Cancelled,
                next = self.step(state, &mut table) => next,
            };
        }

        let termination = match state {
            PipelineState::Failed { reason } => {
                error!(
                    rows = table.len(),
                    pages_fetched, %reason,
                    "Harvest aborted; returning partial table"
                );
                Termination::Aborted { reason }
            }
            PipelineState::Cancelled => {
                warn!(rows = table.len(), pages_fetched, "Harvest interrupted; returning partial table");
                Termination::Cancelled
            }
            _ => Termination::Completed,
        };

        let stats = self.transformer.resolver().stats();
        info!(
            rows = table.len(),
            pages_fetched,
            cache_hits = stats.cache_hits(),
            lookups = stats.lookups(),
            lookup_failures = stats.failures(),
            "Harvest finished"
        );

        RunReport {
            table,
            pages_fetched,
            termination,
        }
    }

    async fn interrupt_requested(&self) {
        while !self.interrupted.load(Ordering::SeqCst) {
            tokio::time::sleep(INTERRUPT_POLL_INTERVAL).await;
        }
    }

    /// Performs one state transition. Terminal states are returned unchanged.
    pub async fn step(&self, state: PipelineState, table: &mut OutputTable) -> PipelineState {
        match state {
            PipelineState::Fetching { url } => {
                let page = self.fetcher.fetch(&url).await;
                PipelineState::Transforming { page }
            }
            PipelineState::Transforming { page } => {
                let Page { records, next } = page;
                match self.transformer.transform(records).await {
                    Ok(records) => PipelineState::Appending { records, next },
                    Err(error) => PipelineState::Failed {
                        reason: error.to_string(),
                    },
                }
            }
            PipelineState::Appending { records, next } => match table.append_page(&records) {
                Ok(appended) => {
                    debug!(appended, total = table.len(), "appended page");
                    match next {
                        Some(url) => PipelineState::Fetching { url },
                        None => PipelineState::Done,
                    }
                }
                Err(error) => PipelineState::Failed {
                    reason: error.to_string(),
                },
            },
            terminal => terminal,
        }
    }
}
