//! Prometheus-compatible monitoring client.
//!
//! Implements the [`Monitoring`] contract the engine consumes against a
//! standard `/api/v1/query` + `/api/v1/query_range` HTTP surface. The
//! workspace URL comes from the environment; authentication is an optional
//! bearer token — deployments fronted by a signing proxy need nothing else,
//! and a differently-authenticated client can replace this one behind the
//! same trait.

use crate::Result;
use crate::engine::Monitoring;
use anyhow::{Context, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core::time::Duration;
use serde::Deserialize;

const LOG_TARGET: &str = "monitoring";

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: QueryData,
}

#[derive(Debug, Deserialize, Default)]
struct QueryData {
    #[serde(default)]
    result: serde_json::Value,
}

/// HTTP client for a Prometheus-compatible query API.
#[derive(Debug, Clone)]
pub struct PrometheusService {
    client: reqwest::Client,
    base_url: String,
}

impl PrometheusService {
    /// Build a client from `PROMETHEUS_WORKSPACE_URL` and the optional
    /// `PROMETHEUS_TOKEN`. Returns `None` when no workspace is configured,
    /// in which case `prometheus` facts will fail with a configuration
    /// error.
    pub fn from_env() -> Result<Option<Self>> {
        let Ok(base_url) = std::env::var("PROMETHEUS_WORKSPACE_URL") else {
            log::debug!(target: LOG_TARGET, "PROMETHEUS_WORKSPACE_URL not set, monitoring queries disabled");
            return Ok(None);
        };

        let token = std::env::var("PROMETHEUS_TOKEN").ok();
        Self::new(&base_url, token.as_deref()).map(Some)
    }

    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};

        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = token {
            let mut auth_value = HeaderValue::from_str(&format!("Bearer {token}")).context("monitoring token is not a valid header value")?;
            auth_value.set_sensitive(true);
            let _ = headers.insert(AUTHORIZATION, auth_value);
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("catalog-compute/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .context("building monitoring HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn query(&self, endpoint: &str, params: &[(&str, String)]) -> Result<QueryData> {
        let url = format!("{}{endpoint}", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .with_context(|| format!("requesting '{url}'"))?;

        let status = response.status();
        let body = response.bytes().await.with_context(|| format!("reading response from '{url}'"))?;
        if !status.is_success() {
            bail!("monitoring API error {status}: {}", String::from_utf8_lossy(&body));
        }

        let parsed: QueryResponse = serde_json::from_slice(&body).context("parsing monitoring response")?;
        if parsed.status != "success" {
            bail!("monitoring query reported status '{}'", parsed.status);
        }

        Ok(parsed.data)
    }
}

#[async_trait]
impl Monitoring for PrometheusService {
    async fn instant_query(&self, query: &str) -> Result<f64> {
        let data = self
            .query("/api/v1/query", &[("query", query.to_string())])
            .await
            .with_context(|| format!("instant query '{query}'"))?;

        Ok(scalar_from_vector(&data.result))
    }

    async fn range_query(&self, query: &str, start: DateTime<Utc>, end: DateTime<Utc>, step: Duration) -> Result<serde_json::Value> {
        let data = self
            .query(
                "/api/v1/query_range",
                &[
                    ("query", query.to_string()),
                    ("start", start.timestamp().to_string()),
                    ("end", end.timestamp().to_string()),
                    ("step", step.as_secs().to_string()),
                ],
            )
            .await
            .with_context(|| format!("range query '{query}'"))?;

        Ok(data.result)
    }
}

/// Pull the scalar out of an instant-query vector result. Multiple samples
/// collapse to the last one; an empty vector reads as zero.
fn scalar_from_vector(result: &serde_json::Value) -> f64 {
    let Some(samples) = result.as_array() else {
        return 0.0;
    };

    samples
        .iter()
        .filter_map(|sample| sample.get("value")?.get(1)?.as_str()?.parse().ok())
        .last()
        .unwrap_or(0.0)
}
