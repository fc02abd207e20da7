//! Memoized resolution of cross-reference URLs into display names.
//!
//! A record's reference field (for people: `homeworld`) holds the URL of
//! another resource. [`ResourceResolver`] fetches that resource once, keeps
//! its `name` in a [`ResolutionCache`], and answers every later occurrence
//! from the cache.
//!
//! # Coalescing
//!
//! The cache holds one slot per URL. Concurrent resolutions of the same
//! uncached URL wait on the same slot, so only one remote lookup is in
//! flight for it. A failed lookup leaves the slot empty; the next caller
//! tries again.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};

use crate::error::FetchError;
use crate::http::{JsonSource, parse_http_url};

/// Field of a referenced resource that holds its display name.
pub const NAME_FIELD: &str = "name";

/// Append-only map from reference URL to resolved display name.
///
/// Entries are never evicted; the map is bounded by the number of distinct
/// reference targets. Only [`ResourceResolver`] writes to it.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    /// Arc lets a caller clone the slot and release the `DashMap` shard lock
    /// before awaiting on it.
    slots: DashMap<String, Arc<OnceCell<String>>>,
}

impl ResolutionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached name for `url`, if resolved.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<String> {
        self.slots
            .get(url)
            .and_then(|slot| slot.value().get().cloned())
    }

    /// Number of resolved entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    /// Returns true if nothing has been resolved yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, url: &str) -> Arc<OnceCell<String>> {
        if let Some(existing) = self.slots.get(url) {
            return Arc::clone(existing.value());
        }
        Arc::clone(self.slots.entry(url.to_string()).or_default().value())
    }
}

/// Counters describing resolver traffic for one run.
#[derive(Debug, Default)]
pub struct ResolverStats {
    cache_hits: AtomicUsize,
    lookups: AtomicUsize,
    failures: AtomicUsize,
}

impl ResolverStats {
    /// Resolutions answered without a remote call.
    #[must_use]
    pub fn cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::SeqCst)
    }

    /// Remote lookups performed (successful or not).
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Remote lookups that did not yield a name.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

/// Translates reference URLs into display names, at most one successful
/// remote call per distinct URL.
pub struct ResourceResolver {
    source: Arc<dyn JsonSource>,
    cache: ResolutionCache,
    stats: ResolverStats,
}

impl std::fmt::Debug for ResourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceResolver")
            .field("cached", &self.cache.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl ResourceResolver {
    /// Creates a resolver with an empty cache.
    #[must_use]
    pub fn new(source: Arc<dyn JsonSource>) -> Self {
        Self::with_cache(source, ResolutionCache::new())
    }

    /// Creates a resolver that starts from an existing cache.
    #[must_use]
    pub fn with_cache(source: Arc<dyn JsonSource>, cache: ResolutionCache) -> Self {
        Self {
            source,
            cache,
            stats: ResolverStats::default(),
        }
    }

    /// Read access to the cache.
    #[must_use]
    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    /// Traffic counters.
    #[must_use]
    pub fn stats(&self) -> &ResolverStats {
        &self.stats
    }

    /// Resolves `url` to a display name.
    ///
    /// Returns `None` without a remote call for a missing, blank, or non-http
    /// value. Returns `None` when the lookup fails; failures are not cached.
    #[instrument(level = "debug", skip(self))]
    pub async fn resolve(&self, url: Option<&str>) -> Option<String> {
        let url = url.map(str::trim).filter(|u| !u.is_empty())?;

        if parse_http_url(url).is_err() {
            debug!(url, "reference is not an http(s) URL; leaving unresolved");
            return None;
        }

        let slot = self.cache.slot(url);
        if let Some(name) = slot.get() {
            self.stats.cache_hits.fetch_add(1, Ordering::SeqCst);
            return Some(name.clone());
        }

        match slot.get_or_try_init(|| self.lookup(url)).await {
            Ok(name) => Some(name.clone()),
            Err(error) => {
                warn!(url, error = %error, "reference lookup failed; leaving unresolved");
                None
            }
        }
    }

    async fn lookup(&self, url: &str) -> Result<String, FetchError> {
        self.stats.lookups.fetch_add(1, Ordering::SeqCst);
        let result = self.source.get_json(url).await.and_then(|body| {
            body.get(NAME_FIELD)
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    FetchError::malformed_body(url, format!("missing string `{NAME_FIELD}` field"))
                })
        });
        match &result {
            Ok(name) => debug!(url, name = %name, "resolved reference"),
            Err(_) => {
                self.stats.failures.fetch_add(1, Ordering::SeqCst);
            }
        }
        result
    }
}
