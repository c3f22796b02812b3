use super::{api, Backend, ClientError, QueryData};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Url,
};
use serde::Deserialize;
use std::{collections::BTreeMap, time::Duration};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    // Base URL of the Prometheus server, e.g. "http://localhost:9090".
    pub url: String,
    // Per-request timeout. No timeout when unset.
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    // Extra headers sent with every request (auth, tenant ids, ...).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// [`Backend`] speaking the Prometheus HTTP API over `reqwest`.
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    base_url: String,
    http: reqwest::Client,
}

impl PrometheusClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base_url = config.url.trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| ClientError::Transport(format!("invalid url {:?}: {}", config.url, e)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ClientError::Transport(format!("invalid header {:?}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ClientError::Transport(format!("invalid header {:?}: {}", name, e)))?;
            headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            base_url,
            http: builder.build()?,
        })
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url, ClientError> {
        let mut url = Url::parse(&format!("{}/api/v1/{}", self.base_url, path))
            .map_err(|e| ClientError::Transport(format!("invalid url: {}", e)))?;
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<QueryData, ClientError> {
        debug!("GET {}", url);
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        // Prometheus reports query failures as an error envelope with a 4xx/5xx
        // status, so the body is decoded before the status is looked at.
        match api::decode(&body) {
            Err(ClientError::Decode(e)) if !status.is_success() => Err(ClientError::Transport(
                format!("unexpected status {}: {}", status, e),
            )),
            result => result,
        }
    }
}

#[async_trait]
impl Backend for PrometheusClient {
    async fn query(&self, expr: &str, time: DateTime<Utc>) -> Result<QueryData, ClientError> {
        let url = self.endpoint(
            "query",
            &[
                ("query", expr.to_string()),
                ("time", format_seconds(time.timestamp_millis())),
            ],
        )?;
        self.get(url).await
    }

    async fn query_range(
        &self,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<QueryData, ClientError> {
        let step_ms = i64::try_from(step.as_millis())
            .map_err(|_| ClientError::Transport(format!("step {:?} out of range", step)))?;
        let url = self.endpoint(
            "query_range",
            &[
                ("query", expr.to_string()),
                ("start", format_seconds(start.timestamp_millis())),
                ("end", format_seconds(end.timestamp_millis())),
                ("step", format_seconds(step_ms)),
            ],
        )?;
        self.get(url).await
    }
}

// Prometheus accepts fractional unix seconds for time and duration parameters.
fn format_seconds(ms: i64) -> String {
    let secs = ms.div_euclid(1000);
    let millis = ms.rem_euclid(1000);
    if millis == 0 {
        secs.to_string()
    } else {
        format!("{}.{:03}", secs, millis)
    }
}
