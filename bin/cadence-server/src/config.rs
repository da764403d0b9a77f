//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;
use std::time::Duration;

use cadence_core::engine::{EngineConfig, RemoteConfig, SineConfig};

/// Runtime configuration for cadence-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8000"`).
    pub bind_address: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Directory receiving one `{job_id}.wav` per completed job.
    pub output_dir: PathBuf,

    /// `"mock"` (built-in tone generator) or `"remote"` (model sidecar).
    pub engine: String,

    /// Base URL of the model sidecar when `engine` is `"remote"`.
    pub engine_url: String,

    /// Upper bound for one sidecar generation call, in seconds.
    pub engine_timeout_secs: u64,

    /// Sample rate of the mock engine.
    pub mock_sample_rate: u32,

    /// Wall seconds the mock engine spends per second of audio.
    pub mock_latency: f32,

    /// Jobs allowed to run inference at the same time.
    pub max_concurrent_jobs: usize,

    /// Comma-separated CORS origins; unset means any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI and the OpenAPI document.
    pub enable_swagger: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("CADENCE_BIND", "0.0.0.0:8000"),
            log_level: env_or("CADENCE_LOG", "info"),
            log_json: parse_flag("CADENCE_LOG_JSON", false),
            output_dir: PathBuf::from(env_or("CADENCE_OUTPUT_DIR", "generated_audio")),
            engine: env_or("CADENCE_ENGINE", "mock"),
            engine_url: env_or("CADENCE_ENGINE_URL", "http://127.0.0.1:5000"),
            engine_timeout_secs: parse_env("CADENCE_ENGINE_TIMEOUT_SECS", 600),
            mock_sample_rate: parse_env("CADENCE_MOCK_SAMPLE_RATE", 32_000),
            mock_latency: parse_env("CADENCE_MOCK_LATENCY", 0.0),
            max_concurrent_jobs: parse_env("CADENCE_MAX_CONCURRENT_JOBS", 1),
            cors_allowed_origins: std::env::var("CADENCE_CORS_ORIGINS").ok(),
            enable_swagger: parse_flag("CADENCE_ENABLE_SWAGGER", true),
        }
    }

    /// Engine selected by `engine`.
    pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        match self.engine.to_ascii_lowercase().as_str() {
            "mock" | "sine" => Ok(EngineConfig::Sine(SineConfig {
                sample_rate: self.mock_sample_rate,
                latency_factor: self.mock_latency,
            })),
            "remote" => Ok(EngineConfig::Remote(RemoteConfig {
                base_url: self.engine_url.clone(),
                timeout: Duration::from_secs(self.engine_timeout_secs),
            })),
            other => anyhow::bail!("unknown CADENCE_ENGINE '{other}' (expected 'mock' or 'remote')"),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

#[cfg(test)]
pub(crate) fn test_config(output_dir: PathBuf) -> Config {
    Config {
        bind_address: "127.0.0.1:0".to_owned(),
        log_level: "debug".to_owned(),
        log_json: false,
        output_dir,
        engine: "mock".to_owned(),
        engine_url: "http://127.0.0.1:9".to_owned(),
        engine_timeout_secs: 1,
        mock_sample_rate: 8_000,
        mock_latency: 0.0,
        max_concurrent_jobs: 2,
        cors_allowed_origins: None,
        enable_swagger: true,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn engine_selection() {
        let mut config = test_config(PathBuf::from("out"));
        assert!(matches!(config.engine_config(), Ok(EngineConfig::Sine(_))));

        config.engine = "Remote".to_owned();
        match config.engine_config() {
            Ok(EngineConfig::Remote(remote)) => {
                assert_eq!(remote.timeout, Duration::from_secs(1));
            }
            other => panic!("expected remote engine, got {other:?}"),
        }

        config.engine = "gpu".to_owned();
        assert!(config.engine_config().is_err());
    }
}
