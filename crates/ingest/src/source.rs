use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use gridscope_core::config::SourceConfig;
use gridscope_core::Reading;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),
}

/// Earliest and latest day a node has data for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDateRange {
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
}

/// Where readings come from.
///
/// Implementations are injected into the orchestrator. Day fetches must be
/// idempotent: a (node, day) pair always denotes the same batch, which is
/// what makes the day cache sound.
#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// All readings a node captured on one day.
    async fn fetch_day(&self, node: &str, date: NaiveDate) -> Result<Vec<Reading>, SourceError>;

    /// Readings for one day strictly newer than `since`.
    async fn fetch_since(
        &self,
        node: &str,
        date: NaiveDate,
        since: DateTime<Utc>,
    ) -> Result<Vec<Reading>, SourceError>;

    /// Known node identifiers.
    async fn nodes(&self) -> Result<Vec<String>, SourceError>;

    /// Earliest and latest available day, None when the node has no data.
    async fn date_range(&self, node: &str) -> Result<Option<NodeDateRange>, SourceError>;
}

/// Reading source backed by the telemetry store's HTTP API.
pub struct HttpReadingSource {
    client: Client,
    base_url: String,
}

impl HttpReadingSource {
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_readings(&self, query: &[(&str, String)]) -> Result<Vec<Reading>, SourceError> {
        let response = self
            .client
            .get(format!("{}/firebase/node-data/", self.base_url))
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Api(format!("{status}: {body}")));
        }

        Ok(response.json().await?)
    }
}

fn day_query(node: &str, date: NaiveDate) -> Vec<(&'static str, String)> {
    vec![
        ("node", node.to_string()),
        ("year", date.format("%Y").to_string()),
        ("month", date.format("%m").to_string()),
        ("day", date.format("%d").to_string()),
    ]
}

#[derive(Deserialize)]
struct DateRangeResponse {
    min_date: Option<NaiveDate>,
    max_date: Option<NaiveDate>,
}

#[async_trait]
impl ReadingSource for HttpReadingSource {
    async fn fetch_day(&self, node: &str, date: NaiveDate) -> Result<Vec<Reading>, SourceError> {
        let readings = self.get_readings(&day_query(node, date)).await?;
        debug!(node, date = %date, count = readings.len(), "fetched day");
        Ok(readings)
    }

    async fn fetch_since(
        &self,
        node: &str,
        date: NaiveDate,
        since: DateTime<Utc>,
    ) -> Result<Vec<Reading>, SourceError> {
        let mut query = day_query(node, date);
        query.push(("since_timestamp", since.to_rfc3339()));
        let readings = self.get_readings(&query).await?;
        debug!(node, since = %since, count = readings.len(), "fetched new readings");
        Ok(readings)
    }

    async fn nodes(&self) -> Result<Vec<String>, SourceError> {
        let response = self
            .client
            .get(format!("{}/firebase/nodes/", self.base_url))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Api(format!("{status}: {body}")));
        }

        Ok(response.json().await?)
    }

    async fn date_range(&self, node: &str) -> Result<Option<NodeDateRange>, SourceError> {
        let response = self
            .client
            .get(format!("{}/node-date-range/", self.base_url))
            .query(&[("node", node)])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Api(format!("{status}: {body}")));
        }

        let parsed: DateRangeResponse = response.json().await?;
        Ok(match (parsed.min_date, parsed.max_date) {
            (Some(min_date), Some(max_date)) => Some(NodeDateRange { min_date, max_date }),
            _ => None,
        })
    }
}
