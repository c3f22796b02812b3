use crate::{
    client::{Backend, ClientError, ResultType},
    frame::{assemble_instant, assemble_range, Frame},
    grid::{GridError, TimeGrid},
    legend::Legend,
    parser::{parse_result, ParseError},
    query::{validate_batch, Query, QueryKind, ValidationError},
};
use futures::{stream, StreamExt};
use log::{debug, warn};
use serde::{Deserialize, Serialize, Serializer};
use std::{collections::BTreeMap, fmt::Display, time::Duration};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DispatchConfig {
    // Number of queries of one batch in flight against the backend at once.
    pub max_concurrent_queries: usize,
    // Deadline for a single query, backend call included. No deadline when unset.
    #[serde(with = "humantime_serde")]
    pub query_timeout: Option<Duration>,
    // Largest grid a range query may ask for.
    pub max_points_per_series: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_queries: 16,
            query_timeout: None,
            max_points_per_series: 11_000,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("max_concurrent_queries must be greater than zero")]
    NoConcurrency,
    #[error("max_points_per_series must be greater than zero")]
    NoPoints,
    #[error("query_timeout must be greater than zero")]
    ZeroTimeout,
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_queries == 0 {
            return Err(ConfigError::NoConcurrency);
        }
        if self.max_points_per_series == 0 {
            return Err(ConfigError::NoPoints);
        }
        if self.query_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Failure of a single query. Recorded in that query's slot of the batch
/// response; never fails the batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend error ({error_type}): {message}")]
    Backend { error_type: String, message: String },
    #[error("unsupported result type {0}, expected vector or matrix")]
    UnsupportedResultType(ResultType),
    #[error("malformed sample value {0:?}")]
    MalformedValue(String),
    #[error("query timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid query: {0}")]
    InvalidQuery(#[from] GridError),
}

impl From<ClientError> for QueryError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Backend {
                error_type,
                message,
            } => QueryError::Backend {
                error_type,
                message,
            },
            other => QueryError::Transport(other.to_string()),
        }
    }
}

impl From<ParseError> for QueryError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::UnsupportedResultType(t) => QueryError::UnsupportedResultType(t),
            ParseError::MalformedValue(token) => QueryError::MalformedValue(token),
        }
    }
}

/// Failure of a batch as a whole. No partial response is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    #[error("invalid dispatch config: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("invalid batch: {0}")]
    InvalidBatch(#[from] ValidationError),
    #[error("batch cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataResponse {
    Frame(Frame),
    Error(#[serde(serialize_with = "serialize_display")] QueryError),
}

impl DataResponse {
    pub fn frame(&self) -> Option<&Frame> {
        match self {
            DataResponse::Frame(frame) => Some(frame),
            DataResponse::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&QueryError> {
        match self {
            DataResponse::Frame(_) => None,
            DataResponse::Error(e) => Some(e),
        }
    }
}

impl From<Result<Frame, QueryError>> for DataResponse {
    fn from(result: Result<Frame, QueryError>) -> Self {
        match result {
            Ok(frame) => DataResponse::Frame(frame),
            Err(e) => DataResponse::Error(e),
        }
    }
}

/// One entry per query of the batch, keyed and ordered by ref id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BatchResponse {
    responses: BTreeMap<String, DataResponse>,
}

impl BatchResponse {
    pub fn get(&self, ref_id: &str) -> Option<&DataResponse> {
        self.responses.get(ref_id)
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DataResponse)> {
        self.responses.iter()
    }
}

/// Runs batches of queries against one backend.
pub struct Dispatcher<B> {
    backend: B,
    config: DispatchConfig,
}

impl<B: Backend> Dispatcher<B> {
    pub fn new(backend: B, config: DispatchConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    /// Runs every query of the batch and collects one outcome per ref id.
    ///
    /// Queries run concurrently and fail independently of each other. The
    /// batch itself fails only when it is malformed or when `cancel` fires
    /// before every query has finished; in-flight queries are dropped then.
    pub async fn execute(
        &self,
        queries: Vec<Query>,
        cancel: CancellationToken,
    ) -> Result<BatchResponse, BatchError> {
        validate_batch(&queries, self.config.max_points_per_series)?;
        debug!("running batch of {} queries", queries.len());

        let slots = stream::iter(&queries)
            .map(|query| async move { (query.ref_id.clone(), self.execute_query(query).await) })
            .buffer_unordered(self.config.max_concurrent_queries)
            .collect::<Vec<_>>();

        let slots = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("batch of {} queries cancelled", queries.len());
                return Err(BatchError::Cancelled);
            }
            slots = slots => slots,
        };

        let responses: BTreeMap<String, DataResponse> = slots
            .into_iter()
            .map(|(ref_id, result)| (ref_id, DataResponse::from(result)))
            .collect();
        debug!(
            "batch finished: {} frames, {} errors",
            responses.values().filter(|r| r.frame().is_some()).count(),
            responses.values().filter(|r| r.error().is_some()).count()
        );
        Ok(BatchResponse { responses })
    }

    /// Runs the fetch, parse and assemble pipeline for a single query.
    pub async fn execute_query(&self, query: &Query) -> Result<Frame, QueryError> {
        let result = match self.config.query_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.run(query))
                .await
                .unwrap_or(Err(QueryError::Timeout(timeout))),
            None => self.run(query).await,
        };
        if let Err(e) = &result {
            warn!("query {} failed: {}", query.ref_id, e);
        }
        result
    }

    async fn run(&self, query: &Query) -> Result<Frame, QueryError> {
        let legend = Legend::new(query.legend_format.as_deref(), &query.expr);
        match query.kind {
            QueryKind::Range { start, end, step } => {
                let grid = TimeGrid::from_range(start, end, step)?
                    .limit(self.config.max_points_per_series)?;
                let data = self
                    .backend
                    .query_range(&query.expr, start, end, step)
                    .await?;
                let series = parse_result(data)?;
                Ok(assemble_range(&query.ref_id, &grid, series, &legend))
            }
            QueryKind::Instant { time } => {
                let data = self.backend.query(&query.expr, time).await?;
                let series = parse_result(data)?;
                Ok(assemble_instant(&query.ref_id, series, &legend))
            }
        }
    }
}

fn serialize_display<T: Display, S: Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
