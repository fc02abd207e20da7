//! Shared helpers for unit tests.

pub mod socket_guard;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::FetchError;
use crate::http::JsonSource;

/// Canned response for one URL.
#[derive(Debug, Clone)]
pub enum StubResponse {
    Json(Value),
    Status(u16),
}

/// In-memory [`JsonSource`] that counts requests per URL.
///
/// Unknown URLs answer with HTTP 404.
#[derive(Debug, Default)]
pub struct StubSource {
    responses: HashMap<String, StubResponse>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
}

impl StubSource {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_json(mut self, url: &str, body: Value) -> Self {
        self.responses
            .insert(url.to_string(), StubResponse::Json(body));
        self
    }

    #[must_use]
    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.responses
            .insert(url.to_string(), StubResponse::Status(status));
        self
    }

    /// Adds an artificial latency to every response so concurrent callers overlap.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl JsonSource for StubSource {
    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_insert(0) += 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.responses.get(url) {
            Some(StubResponse::Json(body)) => Ok(body.clone()),
            Some(StubResponse::Status(status)) => Err(FetchError::http_status(url, *status)),
            None => Err(FetchError::http_status(url, 404)),
        }
    }
}

/// Builds a people record shaped like the Star Wars API returns.
pub fn person(name: &str, homeworld: Option<&str>, edited: &str) -> Value {
    json!({
        "name": name,
        "height": "172",
        "homeworld": homeworld,
        "films": ["https://x/films/1/"],
        "species": [],
        "vehicles": [],
        "starships": [],
        "created": "2014-12-09T13:50:51.644000Z",
        "edited": edited,
        "url": format!("https://x/people/{name}/"),
    })
}

/// Builds a page body.
pub fn page(results: Vec<Value>, next: Option<&str>) -> Value {
    json!({
        "count": results.len(),
        "next": next,
        "previous": null,
        "results": results,
    })
}
