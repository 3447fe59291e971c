//! Configuration loading for the flowmetrics service.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `FLOWMETRICS_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Application configuration derived from `FLOWMETRICS_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operator_tokens: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crypto_key: Option<Vec<u8>>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Scheduler-specific configuration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SchedulerConfig {
    /// Seconds between scheduler ticks.
    #[serde(default = "default_scheduler_tick_interval_seconds")]
    pub tick_interval_seconds: u64,
    /// Target seconds between two syncs of the same tenant.
    #[serde(default = "default_scheduler_sync_interval_seconds")]
    pub sync_interval_seconds: u64,
    /// Jitter applied to a tenant's effective interval, lower bound.
    #[serde(default = "default_scheduler_jitter_pct_min")]
    pub jitter_pct_min: f64,
    /// Jitter applied to a tenant's effective interval, upper bound.
    #[serde(default = "default_scheduler_jitter_pct_max")]
    pub jitter_pct_max: f64,
    /// Hour of day (UTC) at which the nightly re-aggregation runs.
    #[serde(default = "default_scheduler_aggregation_hour_utc")]
    pub aggregation_hour_utc: u32,
    /// Maximum number of tenants synced concurrently per tick.
    #[serde(default = "default_scheduler_concurrency")]
    pub concurrency: usize,
}

/// Sync engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SyncConfig {
    /// Per-request timeout against the remote n8n API, in seconds.
    #[serde(default = "default_sync_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    /// Overlap subtracted from the last sync checkpoint to absorb clock
    /// skew and late-arriving writes, in seconds.
    #[serde(default = "default_sync_overlap_seconds")]
    pub overlap_seconds: i64,
    /// Lookback window for a tenant's first-ever sync, in days.
    #[serde(default = "default_sync_initial_lookback_days")]
    pub initial_lookback_days: i64,
    /// Safety cap on pages fetched per collection per sync run.
    #[serde(default = "default_sync_max_pages")]
    pub max_pages: usize,
    /// Page size requested from the remote API.
    #[serde(default = "default_sync_page_limit")]
    pub page_limit: u32,
    /// TTL of the per-tenant sync lock, in seconds. Acts as a deadlock
    /// safety valve if a worker dies mid-sync.
    #[serde(default = "default_sync_lock_ttl_seconds")]
    pub lock_ttl_seconds: i64,
}

/// Metrics query cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct CacheConfig {
    /// TTL of cached query results, in seconds.
    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

fn default_profile() -> String {
    "dev".to_string()
}

fn default_api_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "postgres://localhost/flowmetrics".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_scheduler_tick_interval_seconds() -> u64 {
    60
}

fn default_scheduler_sync_interval_seconds() -> u64 {
    900
}

fn default_scheduler_jitter_pct_min() -> f64 {
    0.0
}

fn default_scheduler_jitter_pct_max() -> f64 {
    0.2
}

fn default_scheduler_aggregation_hour_utc() -> u32 {
    2
}

fn default_scheduler_concurrency() -> usize {
    4
}

fn default_sync_request_timeout_seconds() -> u64 {
    30
}

fn default_sync_overlap_seconds() -> i64 {
    3_600
}

fn default_sync_initial_lookback_days() -> i64 {
    30
}

fn default_sync_max_pages() -> usize {
    50
}

fn default_sync_page_limit() -> u32 {
    100
}

fn default_sync_lock_ttl_seconds() -> i64 {
    600
}

fn default_cache_ttl_seconds() -> u64 {
    60
}

fn default_cache_capacity() -> usize {
    256
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            operator_tokens: Vec::new(),
            crypto_key: None,
            scheduler: SchedulerConfig::default(),
            sync: SyncConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_seconds: default_scheduler_tick_interval_seconds(),
            sync_interval_seconds: default_scheduler_sync_interval_seconds(),
            jitter_pct_min: default_scheduler_jitter_pct_min(),
            jitter_pct_max: default_scheduler_jitter_pct_max(),
            aggregation_hour_utc: default_scheduler_aggregation_hour_utc(),
            concurrency: default_scheduler_concurrency(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_sync_request_timeout_seconds(),
            overlap_seconds: default_sync_overlap_seconds(),
            initial_lookback_days: default_sync_initial_lookback_days(),
            max_pages: default_sync_max_pages(),
            page_limit: default_sync_page_limit(),
            lock_ttl_seconds: default_sync_lock_ttl_seconds(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_cache_ttl_seconds(),
            capacity: default_cache_capacity(),
        }
    }
}

impl AppConfig {
    /// Parse the configured bind address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Serialize the config as JSON with secrets redacted.
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if !config.operator_tokens.is_empty() {
            config.operator_tokens = vec!["[REDACTED]".to_string()];
        }
        if config.crypto_key.is_some() {
            config.crypto_key = Some(b"[REDACTED]".to_vec());
        }
        serde_json::to_string(&config)
    }

    /// Validate cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(key) = &self.crypto_key
            && key.len() != 32
        {
            return Err(ConfigError::InvalidCryptoKeyLength { length: key.len() });
        }

        if self.scheduler.jitter_pct_min > self.scheduler.jitter_pct_max {
            return Err(ConfigError::InvalidJitterBounds {
                min: self.scheduler.jitter_pct_min,
                max: self.scheduler.jitter_pct_max,
            });
        }

        if self.scheduler.aggregation_hour_utc > 23 {
            return Err(ConfigError::InvalidAggregationHour {
                hour: self.scheduler.aggregation_hour_utc,
            });
        }

        if self.sync.overlap_seconds < 0 || self.sync.initial_lookback_days <= 0 {
            return Err(ConfigError::InvalidSyncWindow);
        }

        if self.sync.lock_ttl_seconds <= 0 {
            return Err(ConfigError::InvalidLockTtl {
                seconds: self.sync.lock_ttl_seconds,
            });
        }

        Ok(())
    }
}

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid crypto key: expected 32 bytes, got {length}")]
    InvalidCryptoKeyLength { length: usize },
    #[error("crypto key is not valid base64: {error}")]
    InvalidCryptoKeyBase64 { error: String },
    #[error("invalid scheduler jitter bounds: min {min} > max {max}")]
    InvalidJitterBounds { min: f64, max: f64 },
    #[error("invalid aggregation hour {hour}: must be 0-23")]
    InvalidAggregationHour { hour: u32 },
    #[error("invalid sync window configuration")]
    InvalidSyncWindow,
    #[error("invalid sync lock TTL: {seconds}s")]
    InvalidLockTtl { seconds: i64 },
}

/// Loads configuration using layered `.env` files and `FLOWMETRICS_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

const ENV_PREFIX: &str = "FLOWMETRICS_";

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads configuration from layered `.env` files overlaid by the process
    /// environment, validates it, and returns the typed config.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = layered
            .remove("PROFILE")
            .filter(|v| !v.is_empty())
            .unwrap_or(profile_hint);
        let api_bind_addr = layered
            .remove("API_BIND_ADDR")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_api_bind_addr);
        let log_level = layered
            .remove("LOG_LEVEL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_level);
        let log_format = layered
            .remove("LOG_FORMAT")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_format);
        let database_url = layered
            .remove("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_database_url);
        let db_max_connections = layered
            .remove("DB_MAX_CONNECTIONS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = layered
            .remove("DB_ACQUIRE_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_acquire_timeout_ms);

        // Operator tokens: comma-separated list or a single token
        let operator_tokens = if let Some(tokens) = layered.remove("OPERATOR_TOKENS") {
            tokens
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        } else if let Some(token) = layered.remove("OPERATOR_TOKEN") {
            vec![token]
        } else {
            Vec::new()
        };

        let crypto_key = match layered.remove("CRYPTO_KEY") {
            Some(key_str) if !key_str.is_empty() => {
                use base64::{Engine as _, engine::general_purpose};
                Some(general_purpose::STANDARD.decode(&key_str).map_err(|e| {
                    ConfigError::InvalidCryptoKeyBase64 {
                        error: e.to_string(),
                    }
                })?)
            }
            _ => None,
        };

        let scheduler = SchedulerConfig {
            tick_interval_seconds: layered
                .remove("SCHEDULER_TICK_INTERVAL_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_scheduler_tick_interval_seconds),
            sync_interval_seconds: layered
                .remove("SCHEDULER_SYNC_INTERVAL_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_scheduler_sync_interval_seconds),
            jitter_pct_min: layered
                .remove("SCHEDULER_JITTER_PCT_MIN")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_scheduler_jitter_pct_min),
            jitter_pct_max: layered
                .remove("SCHEDULER_JITTER_PCT_MAX")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_scheduler_jitter_pct_max),
            aggregation_hour_utc: layered
                .remove("SCHEDULER_AGGREGATION_HOUR_UTC")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_scheduler_aggregation_hour_utc),
            concurrency: layered
                .remove("SCHEDULER_CONCURRENCY")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_scheduler_concurrency),
        };

        let sync = SyncConfig {
            request_timeout_seconds: layered
                .remove("SYNC_REQUEST_TIMEOUT_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_sync_request_timeout_seconds),
            overlap_seconds: layered
                .remove("SYNC_OVERLAP_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_sync_overlap_seconds),
            initial_lookback_days: layered
                .remove("SYNC_INITIAL_LOOKBACK_DAYS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_sync_initial_lookback_days),
            max_pages: layered
                .remove("SYNC_MAX_PAGES")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_sync_max_pages),
            page_limit: layered
                .remove("SYNC_PAGE_LIMIT")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_sync_page_limit),
            lock_ttl_seconds: layered
                .remove("SYNC_LOCK_TTL_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_sync_lock_ttl_seconds),
        };

        let cache = CacheConfig {
            ttl_seconds: layered
                .remove("CACHE_TTL_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_cache_ttl_seconds),
            capacity: layered
                .remove("CACHE_CAPACITY")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_cache_capacity),
        };

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            operator_tokens,
            crypto_key,
            scheduler,
            sync,
            cache,
        };

        config.validate()?;
        Ok(config)
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var("FLOWMETRICS_PROFILE")
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}
