use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u16(key: &str, default: u16) -> u16 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub source: SourceConfig,
    pub classifier: ClassifierConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            source: SourceConfig::from_env(),
            classifier: ClassifierConfig::from_env(),
            pipeline: PipelineConfig::from_env(),
        }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  server:      host={}, port={}", self.server.host, self.server.port);
        tracing::info!("  source:      url={}", self.source.base_url);
        tracing::info!(
            "  classifier:  url={}",
            self.classifier.base_url.as_deref().unwrap_or("(local)")
        );
        tracing::info!(
            "  pipeline:    batch_days={}, chunk={}, delay_ms={}, thresholds={}, quality={}/{}",
            self.pipeline.fetch_batch_days,
            self.pipeline.classify_chunk_size,
            self.pipeline.classify_delay_ms,
            self.pipeline.threshold_preset,
            self.pipeline.quality_preset,
            self.pipeline.quality_method,
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_u16("PORT", 4000),
            cors_origin: env_or("CORS_ORIGIN", "*"),
        }
    }
}

// ── Telemetry store ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl SourceConfig {
    fn from_env() -> Self {
        Self {
            base_url: env_or("SOURCE_URL", "http://localhost:8000/api"),
            timeout_secs: env_u64("SOURCE_TIMEOUT_SECS", 30),
        }
    }
}

// ── Anomaly classification service ────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Remote classifier endpoint. Unset means classify in-process.
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl ClassifierConfig {
    fn from_env() -> Self {
        Self {
            base_url: env_opt("CLASSIFIER_URL"),
            timeout_secs: env_u64("CLASSIFIER_TIMEOUT_SECS", 30),
        }
    }
}

// ── Pipeline tuning ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Days fetched concurrently per phase-1 batch.
    pub fetch_batch_days: usize,
    /// Readings per phase-2 classification chunk.
    pub classify_chunk_size: usize,
    /// Pause between the fast snapshot and the first classification chunk.
    pub classify_delay_ms: u64,
    /// Threshold preset name for anomaly evaluation ("strict" | "relaxed").
    pub threshold_preset: String,
    /// Quality preset name for verdicts ("strict" | "relaxed").
    pub quality_preset: String,
    /// Quality method ("anomaly" | "voltage" | "combined").
    pub quality_method: String,
}

impl PipelineConfig {
    fn from_env() -> Self {
        Self {
            fetch_batch_days: env_usize("FETCH_BATCH_DAYS", 3),
            classify_chunk_size: env_usize("CLASSIFY_CHUNK_SIZE", 20_000),
            classify_delay_ms: env_u64("CLASSIFY_DELAY_MS", 500),
            threshold_preset: env_or("THRESHOLD_PRESET", "relaxed"),
            quality_preset: env_or("QUALITY_PRESET", "relaxed"),
            quality_method: env_or("QUALITY_METHOD", "combined"),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_batch_days: 3,
            classify_chunk_size: 20_000,
            classify_delay_ms: 500,
            threshold_preset: "relaxed".to_string(),
            quality_preset: "relaxed".to_string(),
            quality_method: "combined".to_string(),
        }
    }
}
