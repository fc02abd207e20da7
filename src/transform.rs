//! Per-record enrichment and reshaping.
//!
//! For each record the transformer:
//! 1. replaces every reference field with its resolved display name (or null),
//!    inserting the field as null when the record lacks it;
//! 2. removes the fields that are not part of the output schema;
//! 3. appends a `date` field holding the date part of the timestamp field.
//!
//! Reference lookups within a page run concurrently up to a configured
//! limit; the output keeps the input order.

use std::sync::Arc;

use futures_util::{StreamExt, TryStreamExt, stream};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::error::PipelineError;
use crate::resolver::ResourceResolver;

/// A single API result: field name to JSON value, in server order.
pub type Record = Map<String, Value>;

/// Default limit on concurrent reference lookups within a page.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Which fields the transformer resolves, derives, and drops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRules {
    /// Fields whose URL value is replaced by the referenced resource's name.
    pub reference_fields: Vec<String>,
    /// Field holding an ISO-8601 timestamp.
    pub timestamp_field: String,
    /// Separator between the date and time parts of the timestamp.
    pub time_separator: char,
    /// Name of the derived date-only field.
    pub date_field: String,
    /// Fields removed from every record.
    pub dropped_fields: Vec<String>,
}

impl TransformRules {
    /// Rules for the Star Wars API `people` resource.
    #[must_use]
    pub fn people() -> Self {
        Self {
            reference_fields: vec!["homeworld".to_string()],
            timestamp_field: "edited".to_string(),
            time_separator: 'T',
            date_field: "date".to_string(),
            dropped_fields: [
                "films",
                "species",
                "vehicles",
                "starships",
                "created",
                "edited",
                "url",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        }
    }

    /// Extracts the date part of `timestamp`, i.e. everything before the
    /// first time separator.
    #[must_use]
    pub fn date_part<'a>(&self, timestamp: &'a str) -> &'a str {
        timestamp
            .split(self.time_separator)
            .next()
            .unwrap_or(timestamp)
    }
}

impl Default for TransformRules {
    fn default() -> Self {
        Self::people()
    }
}

/// Error type for transformer construction.
#[derive(Debug, thiserror::Error)]
pub enum TransformerError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Applies [`TransformRules`] to a page of records.
#[derive(Debug)]
pub struct RecordTransformer {
    resolver: Arc<ResourceResolver>,
    rules: TransformRules,
    concurrency: usize,
}

impl RecordTransformer {
    /// Creates a transformer with the default concurrency.
    #[must_use]
    pub fn new(resolver: Arc<ResourceResolver>, rules: TransformRules) -> Self {
        Self {
            resolver,
            rules,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Creates a transformer with an explicit lookup concurrency.
    ///
    /// # Errors
    ///
    /// Returns [`TransformerError::InvalidConcurrency`] outside `1..=100`.
    pub fn with_concurrency(
        resolver: Arc<ResourceResolver>,
        rules: TransformRules,
        concurrency: usize,
    ) -> Result<Self, TransformerError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(TransformerError::InvalidConcurrency { value: concurrency });
        }
        Ok(Self {
            resolver,
            rules,
            concurrency,
        })
    }

    /// The rules this transformer applies.
    #[must_use]
    pub fn rules(&self) -> &TransformRules {
        &self.rules
    }

    /// Shared resolver used for reference fields.
    #[must_use]
    pub fn resolver(&self) -> &Arc<ResourceResolver> {
        &self.resolver
    }

    /// Transforms one page of records, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MalformedRecord`] when a record lacks a string
    /// timestamp field or carries a reference field that is neither a string
    /// nor null. Records are checked before any lookup is issued.
    #[instrument(level = "debug", skip_all, fields(records = records.len()))]
    pub async fn transform(&self, records: Vec<Record>) -> Result<Vec<Record>, PipelineError> {
        for (index, record) in records.iter().enumerate() {
            self.check_shape(index, record)?;
        }

        let transformed: Vec<Record> = stream::iter(records.into_iter().enumerate())
            .map(|(index, record)| self.transform_record(index, record))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        debug!(records = transformed.len(), "transformed page");
        Ok(transformed)
    }

    fn check_shape(&self, index: usize, record: &Record) -> Result<(), PipelineError> {
        match record.get(&self.rules.timestamp_field) {
            Some(Value::String(_)) => {}
            Some(_) => {
                return Err(PipelineError::malformed_record(
                    index,
                    format!("`{}` is not a string", self.rules.timestamp_field),
                ));
            }
            None => {
                return Err(PipelineError::malformed_record(
                    index,
                    format!("missing `{}`", self.rules.timestamp_field),
                ));
            }
        }

        for field in &self.rules.reference_fields {
            match record.get(field) {
                None | Some(Value::Null | Value::String(_)) => {}
                Some(_) => {
                    return Err(PipelineError::malformed_record(
                        index,
                        format!("reference field `{field}` is not a URL string"),
                    ));
                }
            }
        }
        Ok(())
    }

    async fn transform_record(
        &self,
        index: usize,
        mut record: Record,
    ) -> Result<Record, PipelineError> {
        for field in &self.rules.reference_fields {
            let resolved = match record.get(field) {
                Some(Value::String(url)) => self.resolver.resolve(Some(url.as_str())).await,
                _ => None,
            };
            record.insert(
                field.clone(),
                resolved.map_or(Value::Null, Value::String),
            );
        }

        let date = record
            .get(&self.rules.timestamp_field)
            .and_then(Value::as_str)
            .map(|ts| self.rules.date_part(ts).to_string())
            .ok_or_else(|| {
                PipelineError::malformed_record(
                    index,
                    format!("missing `{}`", self.rules.timestamp_field),
                )
            })?;

        for field in &self.rules.dropped_fields {
            record.shift_remove(field);
        }
        record.insert(self.rules.date_field.clone(), Value::String(date));

        Ok(record)
    }
}
