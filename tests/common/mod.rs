#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use promframes::{
    client::{api, Backend, ClientError, QueryData},
    BatchError, BatchResponse, DispatchConfig, Dispatcher, Query,
};
use std::{collections::HashMap, time::Duration};
use tokio_util::sync::CancellationToken;

/// Serves canned Prometheus response bodies keyed by query expression.
/// Bodies go through the same envelope decoding as real HTTP responses.
#[derive(Default)]
pub struct JsonBackend {
    bodies: HashMap<String, &'static str>,
    unreachable: Vec<String>,
}

impl JsonBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, expr: &str, body: &'static str) -> Self {
        self.bodies.insert(expr.to_string(), body);
        self
    }

    pub fn unreachable(mut self, expr: &str) -> Self {
        self.unreachable.push(expr.to_string());
        self
    }

    fn reply(&self, expr: &str) -> Result<QueryData, ClientError> {
        if self.unreachable.iter().any(|e| e == expr) {
            return Err(ClientError::Transport(
                "dial tcp 127.0.0.1:9999: connect: connection refused".to_string(),
            ));
        }
        match self.bodies.get(expr) {
            Some(body) => api::decode(body.as_bytes()),
            None => Err(ClientError::Transport(format!("no response for {:?}", expr))),
        }
    }
}

#[async_trait]
impl Backend for JsonBackend {
    async fn query(&self, expr: &str, _time: DateTime<Utc>) -> Result<QueryData, ClientError> {
        self.reply(expr)
    }

    async fn query_range(
        &self,
        expr: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _step: Duration,
    ) -> Result<QueryData, ClientError> {
        self.reply(expr)
    }
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 2022-01-11T08:25:30Z, the evaluation time all fixtures are recorded at.
pub fn t0() -> DateTime<Utc> {
    Utc.timestamp_opt(1641889530, 0).unwrap()
}

pub const T0_MS: i64 = 1641889530000;

/// A range query starting at `t0` with a one second step.
pub fn range_query(ref_id: &str, expr: &str, seconds: i64) -> Query {
    Query::range(
        ref_id,
        expr,
        t0(),
        t0() + chrono::Duration::seconds(seconds),
        Duration::from_secs(1),
    )
}

pub async fn run_batch(
    backend: JsonBackend,
    queries: Vec<Query>,
) -> Result<BatchResponse, BatchError> {
    init_logger();
    let dispatcher = Dispatcher::new(backend, DispatchConfig::default()).unwrap();
    dispatcher.execute(queries, CancellationToken::new()).await
}
