//! Typed configuration, loaded once at process start from environment
//! variables (with `.env` support via `dotenvy` for local development).
//! Unknown environment keys are ignored; a missing required key fails
//! startup with a descriptive error rather than falling back to a default.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,

    pub ingest_token: String,
    pub ingest_batch_limit: usize,
    pub rate_limit_capacity: u64,
    pub rate_limit_refill_per_min: u64,
    pub dedup_window_secs: u64,

    pub worker_pool_size: usize,
    pub worker_queue_capacity: usize,
    pub worker_record_deadline: Duration,

    pub scheduler_tick_interval: Duration,
    pub scheduler_indexing_min_interval: Duration,

    pub store_url: String,
    pub store_max_conns: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            port: env_parse_default("XC_PORT", 3000)?,

            ingest_token: env_required("XC_INGEST_TOKEN")?,
            ingest_batch_limit: env_parse_default("XC_INGEST_BATCH_LIMIT", 1_000)?,
            // bucket capacity and refill rate share one configured value: a
            // service can burst up to a full minute's allowance, then refills
            // at the same rate.
            rate_limit_capacity: env_parse_default("XC_INGEST_RATE_LIMIT_PER_SERVICE_PER_MIN", 10_000)?,
            rate_limit_refill_per_min: env_parse_default("XC_INGEST_RATE_LIMIT_PER_SERVICE_PER_MIN", 10_000)?,
            dedup_window_secs: env_parse_default("XC_INGEST_DEDUP_WINDOW_SECONDS", 600)?,

            worker_pool_size: env_parse_default("XC_WORKER_POOL_SIZE", 8)?,
            worker_queue_capacity: env_parse_default("XC_WORKER_QUEUE_CAPACITY", 10_000)?,
            worker_record_deadline: Duration::from_millis(env_parse_default("XC_WORKER_RECORD_DEADLINE_MS", 5_000)?),

            scheduler_tick_interval: Duration::from_secs(env_parse_default("XC_SCHEDULER_TICK_SECONDS", 300)?),
            scheduler_indexing_min_interval: Duration::from_secs(
                env_parse_default::<u64>("XC_SCHEDULER_CODE_INDEXING_MIN_INTERVAL_MINUTES", 5)? * 60,
            ),

            store_url: env_required("XC_STORE_URL")?,
            store_max_conns: env_parse_default("XC_STORE_MAX_CONNS", 10)?,
        })
    }
}

fn env_required(key: &'static str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn env_parse_default<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}
