use crate::grid::{GridError, TimeGrid};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::{collections::HashSet, time::Duration};
use thiserror::Error;

/// A single query of a batch, as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    // Key of this query's entry in the batch response. Unique within a batch.
    pub ref_id: String,
    pub expr: String,
    #[serde(flatten)]
    pub kind: QueryKind,
    // Column naming template, e.g. "{{job}} on {{instance}}".
    #[serde(default)]
    pub legend_format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum QueryKind {
    Range {
        start: DateTime<Utc>,
        // Inclusive.
        end: DateTime<Utc>,
        #[serde(with = "humantime_serde")]
        step: Duration,
    },
    Instant {
        time: DateTime<Utc>,
    },
}

impl Query {
    pub fn range(
        ref_id: impl Into<String>,
        expr: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Self {
        Self {
            ref_id: ref_id.into(),
            expr: expr.into(),
            kind: QueryKind::Range { start, end, step },
            legend_format: None,
        }
    }

    pub fn instant(
        ref_id: impl Into<String>,
        expr: impl Into<String>,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            ref_id: ref_id.into(),
            expr: expr.into(),
            kind: QueryKind::Instant { time },
            legend_format: None,
        }
    }

    pub fn with_legend_format(mut self, legend_format: impl Into<String>) -> Self {
        self.legend_format = Some(legend_format.into());
        self
    }

    /// The grid a range query's frame is aligned to. Instant queries have none.
    pub fn grid(&self, max_points: usize) -> Result<Option<TimeGrid>, GridError> {
        match self.kind {
            QueryKind::Range { start, end, step } => {
                TimeGrid::from_range(start, end, step)?.limit(max_points).map(Some)
            }
            QueryKind::Instant { .. } => Ok(None),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("query without a ref id")]
    EmptyReference,
    #[error("ref id {0:?} is used by more than one query")]
    DuplicateReference(String),
    #[error("invalid range for query {ref_id:?}: {source}")]
    InvalidRange {
        ref_id: String,
        #[source]
        source: GridError,
    },
}

/// Checks a batch before anything is sent to the backend. Any failure
/// rejects the whole batch.
pub fn validate_batch(queries: &[Query], max_points: usize) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(queries.len());
    for query in queries {
        if query.ref_id.is_empty() {
            return Err(ValidationError::EmptyReference);
        }
        if !seen.insert(query.ref_id.as_str()) {
            return Err(ValidationError::DuplicateReference(query.ref_id.clone()));
        }
        query
            .grid(max_points)
            .map_err(|source| ValidationError::InvalidRange {
                ref_id: query.ref_id.clone(),
                source,
            })?;
    }
    Ok(())
}
