// src/config.rs
// Pipeline configuration: hard defaults overridable via environment

use std::env;

const MB: u64 = 1024 * 1024;

pub const DEFAULT_BROKER_URL: &str = "http://localhost:8080";
pub const DEFAULT_PROVIDER_URL: &str = "http://localhost:8081";
pub const DEFAULT_DIRECT_LIMIT_BYTES: u64 = 32 * MB;
pub const DEFAULT_CHUNK_SIZE_BYTES: u64 = 4 * MB;
pub const DEFAULT_MAX_ATTEMPTS: u8 = 3;
pub const DEFAULT_TIMEOUT_FLOOR_SECS: u64 = 20;
pub const DEFAULT_MIN_THROUGHPUT_BYTES_PER_SEC: u64 = 128 * 1024;
pub const DEFAULT_TIMEOUT_BUFFER_SECS: u64 = 10;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_POLL_CEILING_SECS: u64 = 4 * 3600;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub broker_base_url: String,
    pub provider_base_url: String,
    pub provider_api_key: String,
    /// Per-upload ceiling enforced by the gateway in front of the direct
    /// path; larger files are chunked.
    pub direct_limit_bytes: u64,
    /// Nominal chunk size, kept well under the gateway ceiling and under
    /// the synchronous endpoint's cap.
    pub chunk_size_bytes: u64,
    pub max_attempts: u8,
    pub timeout_floor_secs: u64,
    pub min_throughput_bytes_per_sec: u64,
    pub timeout_buffer_secs: u64,
    pub poll_interval_secs: u64,
    pub poll_ceiling_secs: u64,
    pub speaker_labels: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            broker_base_url: DEFAULT_BROKER_URL.to_string(),
            provider_base_url: DEFAULT_PROVIDER_URL.to_string(),
            provider_api_key: String::new(),
            direct_limit_bytes: DEFAULT_DIRECT_LIMIT_BYTES,
            chunk_size_bytes: DEFAULT_CHUNK_SIZE_BYTES,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout_floor_secs: DEFAULT_TIMEOUT_FLOOR_SECS,
            min_throughput_bytes_per_sec: DEFAULT_MIN_THROUGHPUT_BYTES_PER_SEC,
            timeout_buffer_secs: DEFAULT_TIMEOUT_BUFFER_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            poll_ceiling_secs: DEFAULT_POLL_CEILING_SECS,
            speaker_labels: true,
        }
    }
}

impl PipelineConfig {
    /// Build a config from `SCRIBE_RELAY_*` environment variables, falling
    /// back to defaults for anything unset or unparseable. The caller is
    /// expected to have loaded `.env` (via `dotenvy`) beforehand.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut config = Self {
            broker_base_url: normalize_base_url(
                &env_string("SCRIBE_RELAY_BROKER_URL", &defaults.broker_base_url),
            ),
            provider_base_url: normalize_base_url(
                &env_string("SCRIBE_RELAY_PROVIDER_URL", &defaults.provider_base_url),
            ),
            provider_api_key: env_string("SCRIBE_RELAY_API_KEY", ""),
            direct_limit_bytes: env_u64(
                "SCRIBE_RELAY_DIRECT_LIMIT_BYTES",
                defaults.direct_limit_bytes,
            ),
            chunk_size_bytes: env_u64("SCRIBE_RELAY_CHUNK_SIZE_BYTES", defaults.chunk_size_bytes),
            max_attempts: env_u64("SCRIBE_RELAY_MAX_ATTEMPTS", defaults.max_attempts as u64)
                .clamp(1, u8::MAX as u64) as u8,
            timeout_floor_secs: env_u64(
                "SCRIBE_RELAY_TIMEOUT_FLOOR_SECS",
                defaults.timeout_floor_secs,
            ),
            min_throughput_bytes_per_sec: env_u64(
                "SCRIBE_RELAY_MIN_THROUGHPUT",
                defaults.min_throughput_bytes_per_sec,
            ),
            timeout_buffer_secs: env_u64(
                "SCRIBE_RELAY_TIMEOUT_BUFFER_SECS",
                defaults.timeout_buffer_secs,
            ),
            poll_interval_secs: env_u64(
                "SCRIBE_RELAY_POLL_INTERVAL_SECS",
                defaults.poll_interval_secs,
            ),
            poll_ceiling_secs: env_u64(
                "SCRIBE_RELAY_POLL_CEILING_SECS",
                defaults.poll_ceiling_secs,
            ),
            speaker_labels: env_bool("SCRIBE_RELAY_SPEAKER_LABELS", defaults.speaker_labels),
        };

        // chunks must stay strictly under the gateway ceiling
        if config.chunk_size_bytes == 0 || config.chunk_size_bytes > config.direct_limit_bytes {
            tracing::warn!(
                "Chunk size {} out of range, using default",
                config.chunk_size_bytes
            );
            config.chunk_size_bytes = DEFAULT_CHUNK_SIZE_BYTES.min(config.direct_limit_bytes);
        }

        config
    }
}

pub fn normalize_base_url(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_BROKER_URL.to_string()
    } else {
        trimmed.to_string()
    }
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}
