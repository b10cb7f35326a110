use crate::aggregator_core::window::BucketWidth;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound the queue service accepts for a single receive call
pub const MAX_RECEIVE_BATCH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowlistBackend {
    Json,
    Sqlite,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Runtime configuration, loaded from environment variables with defaults
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub allowlist_backend: AllowlistBackend,
    /// JSON document or SQLite database, depending on `allowlist_backend`
    pub allowlist_path: PathBuf,
    /// JSONL file of raw queue message bodies
    pub queue_path: PathBuf,
    pub report_path: PathBuf,
    pub max_messages: usize,
    pub wait_time: Duration,
    pub bucket_width: BucketWidth,
    /// Log the queue size every N receive iterations
    pub queue_size_log_every: u64,
    pub receive_error_pause: Duration,
}

impl MonitorConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `GASMON_ALLOWLIST_PATH` (default: locations.json)
    /// - `GASMON_QUEUE_PATH` (default: queue/messages.jsonl)
    /// - `GASMON_REPORT_PATH` (default: MinuteAverages.csv)
    /// - `GASMON_MAX_MESSAGES` (default: 1, at most 10)
    /// - `GASMON_WAIT_TIME_SECS` (default: 2)
    /// - `GASMON_BUCKET_WIDTH` (default: 1m; one of 1m, 5m, 15m, 1h)
    /// - `GASMON_QUEUE_SIZE_LOG_EVERY` (default: 5)
    /// - `GASMON_RECEIVE_ERROR_PAUSE_MS` (default: 5000)
    ///
    /// The allowlist backend comes from `--backend json|sqlite` on the command line.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(parse_backend_from_args(), |key| env::var(key).ok())
    }

    pub fn from_lookup<F>(allowlist_backend: AllowlistBackend, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_messages = lookup("GASMON_MAX_MESSAGES")
            .map(|s| {
                s.parse::<usize>()
                    .map_err(|_| ConfigError::InvalidValue(format!("GASMON_MAX_MESSAGES '{}'", s)))
            })
            .transpose()?
            .unwrap_or(1);

        if max_messages == 0 || max_messages > MAX_RECEIVE_BATCH {
            return Err(ConfigError::InvalidValue(format!(
                "GASMON_MAX_MESSAGES must be between 1 and {}, got {}",
                MAX_RECEIVE_BATCH, max_messages
            )));
        }

        let bucket_width = match lookup("GASMON_BUCKET_WIDTH") {
            Some(s) => BucketWidth::from_str(&s).ok_or_else(|| {
                ConfigError::InvalidValue(format!(
                    "GASMON_BUCKET_WIDTH must be one of 1m, 5m, 15m, 1h, got '{}'",
                    s
                ))
            })?,
            None => BucketWidth::Minute,
        };

        let queue_size_log_every = lookup("GASMON_QUEUE_SIZE_LOG_EVERY")
            .and_then(|s| s.parse().ok())
            .filter(|n: &u64| *n > 0)
            .unwrap_or(5);

        Ok(Self {
            allowlist_backend,
            allowlist_path: lookup("GASMON_ALLOWLIST_PATH")
                .unwrap_or_else(|| "locations.json".to_string())
                .into(),
            queue_path: lookup("GASMON_QUEUE_PATH")
                .unwrap_or_else(|| "queue/messages.jsonl".to_string())
                .into(),
            report_path: lookup("GASMON_REPORT_PATH")
                .unwrap_or_else(|| "MinuteAverages.csv".to_string())
                .into(),
            max_messages,
            wait_time: Duration::from_secs(
                lookup("GASMON_WAIT_TIME_SECS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            ),
            bucket_width,
            queue_size_log_every,
            receive_error_pause: Duration::from_millis(
                lookup("GASMON_RECEIVE_ERROR_PAUSE_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5_000),
            ),
        })
    }
}

pub fn parse_backend_from_args() -> AllowlistBackend {
    let args: Vec<String> = env::args().collect();
    backend_from_args(&args)
}

fn backend_from_args(args: &[String]) -> AllowlistBackend {
    if let Some(idx) = args.iter().position(|x| x == "--backend") {
        match args.get(idx + 1).map(|s| s.as_str()) {
            Some("sqlite") => return AllowlistBackend::Sqlite,
            Some("json") => return AllowlistBackend::Json,
            Some(other) => {
                log::warn!("Unknown allowlist backend '{}', defaulting to json", other);
            }
            None => {}
        }
    }
    AllowlistBackend::Json
}
