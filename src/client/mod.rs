use crate::metric::Labels;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::{fmt, time::Duration};
use thiserror::Error;

pub mod api;
pub mod http;

pub use http::{ClientConfig, PrometheusClient};

/// Read-only access to a Prometheus-compatible query API.
///
/// Implementations own transport, auth and retry policy. Results are handed
/// back exactly as the backend reported them; turning them into series and
/// frames is the caller's job.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Evaluates `expr` at a single point in time.
    async fn query(&self, expr: &str, time: DateTime<Utc>) -> Result<QueryData, ClientError>;

    /// Evaluates `expr` over `[start, end]` at a fixed `step`.
    async fn query_range(
        &self,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<QueryData, ClientError>;
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for std::sync::Arc<B> {
    async fn query(&self, expr: &str, time: DateTime<Utc>) -> Result<QueryData, ClientError> {
        (**self).query(expr, time).await
    }

    async fn query_range(
        &self,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<QueryData, ClientError> {
        (**self).query_range(expr, start, end, step).await
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Transport(String),
    #[error("unable to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{error_type}: {message}")]
    Backend { error_type: String, message: String },
}

/// `[<unix seconds>, "<value>"]` as it appears on the wire. The value is
/// left undecoded so that the parser decides what counts as a number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawSample(pub f64, pub String);

/// One element of a vector result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstantSeries {
    #[serde(default)]
    pub metric: Labels,
    pub value: RawSample,
}

/// One element of a matrix result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RangeSeries {
    #[serde(default)]
    pub metric: Labels,
    #[serde(default)]
    pub values: Vec<RawSample>,
}

/// The `data` member of a successful query response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub enum QueryData {
    Vector(Vec<InstantSeries>),
    Matrix(Vec<RangeSeries>),
    Scalar(RawSample),
    String(RawSample),
}

impl QueryData {
    pub fn result_type(&self) -> ResultType {
        match self {
            QueryData::Vector(_) => ResultType::Vector,
            QueryData::Matrix(_) => ResultType::Matrix,
            QueryData::Scalar(_) => ResultType::Scalar,
            QueryData::String(_) => ResultType::String,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    Vector,
    Matrix,
    Scalar,
    String,
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultType::Vector => "vector",
            ResultType::Matrix => "matrix",
            ResultType::Scalar => "scalar",
            ResultType::String => "string",
        };
        f.write_str(name)
    }
}
