use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gridscope_compute::annotate;
use gridscope_core::{Reading, ThresholdSet};

/// Ceiling on readings per classification call. Callers chunk their data
/// below this; the remote service rejects anything larger.
pub const MAX_CLASSIFY_BATCH: usize = 25_000;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("batch of {len} readings exceeds the ceiling of {max}")]
    BatchTooLarge { len: usize, max: usize },
}

/// A classified batch: the input readings with fresh anomaly flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedBatch {
    pub readings: Vec<Reading>,
    pub anomaly_count: usize,
}

/// Anomaly classification backend.
///
/// The pipeline treats this as best effort: a failed call leaves the
/// affected chunk on its last-known flags and the run continues.
#[async_trait]
pub trait AnomalyClassifier: Send + Sync {
    async fn classify(
        &self,
        readings: &[Reading],
        thresholds: &ThresholdSet,
    ) -> Result<ClassifiedBatch, ClassifyError>;
}

/// In-process classification with the threshold evaluator. The fallback
/// when no remote service is configured.
pub struct LocalClassifier;

#[async_trait]
impl AnomalyClassifier for LocalClassifier {
    async fn classify(
        &self,
        readings: &[Reading],
        thresholds: &ThresholdSet,
    ) -> Result<ClassifiedBatch, ClassifyError> {
        let mut readings = readings.to_vec();
        let anomaly_count = annotate(&mut readings, thresholds);
        Ok(ClassifiedBatch {
            readings,
            anomaly_count,
        })
    }
}

/// Remote anomaly classification service.
pub struct HttpClassifier {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    readings: &'a [Reading],
    thresholds: &'a ThresholdSet,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    readings: Vec<Reading>,
    #[serde(default)]
    anomaly_count: Option<usize>,
}

impl HttpClassifier {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ClassifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AnomalyClassifier for HttpClassifier {
    async fn classify(
        &self,
        readings: &[Reading],
        thresholds: &ThresholdSet,
    ) -> Result<ClassifiedBatch, ClassifyError> {
        if readings.len() > MAX_CLASSIFY_BATCH {
            return Err(ClassifyError::BatchTooLarge {
                len: readings.len(),
                max: MAX_CLASSIFY_BATCH,
            });
        }

        let request = ClassifyRequest {
            readings,
            thresholds,
        };

        let response = self
            .client
            .post(format!("{}/anomalies/", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifyError::Api(format!("{status}: {body}")));
        }

        let parsed: ClassifyResponse = response.json().await?;
        let anomaly_count = parsed
            .anomaly_count
            .unwrap_or_else(|| parsed.readings.iter().filter(|r| r.is_anomaly).count());

        Ok(ClassifiedBatch {
            readings: parsed.readings,
            anomaly_count,
        })
    }
}
