//! Runtime configuration for completion-relay.
//!
//! Configuration can be loaded from a JSON file or constructed programmatically.
//! The listen address, expected bearer token, upstream endpoint, and chunk
//! pacing all live here; none of them are compiled-in constants.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "completion-relay",
    about = "Chat-completion relay with synthesized SSE streaming"
)]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address (overrides the config file).
    #[arg(long)]
    pub listen: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Inbound authorization.
    pub auth: AuthConfig,

    /// Upstream completion API.
    pub upstream: UpstreamConfig,

    /// Stream synthesis tuning.
    pub stream: StreamConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:8080").
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Inbound bearer-token authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Expected bearer token. Requests must carry `Authorization: Bearer <token>`.
    pub token: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token: "sk-123".to_string(),
        }
    }
}

/// Upstream completion API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Endpoint the relayed request is POSTed to.
    pub url: String,

    /// Outbound request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "https://multillm.ai-pro.org/api/openai-completion".to_string(),
            request_timeout_secs: 300,
        }
    }
}

/// Stream synthesis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Delay between consecutive SSE chunks in milliseconds.
    pub token_delay_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            token_delay_ms: 1000,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }
}

impl UpstreamConfig {
    /// Outbound request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl StreamConfig {
    /// Inter-chunk delay as a [`Duration`].
    pub fn token_delay(&self) -> Duration {
        Duration::from_millis(self.token_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.server.listen, "0.0.0.0:8080");
        assert_eq!(cfg.stream.token_delay_ms, 1000);
        assert_eq!(cfg.upstream.request_timeout_secs, 300);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let cfg = Config::load(std::path::Path::new("/nonexistent/config.json")).unwrap();
        assert_eq!(cfg.auth.token, "sk-123");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"auth": {{"token": "secret"}}, "stream": {{"token_delay_ms": 50}}}}"#
        )
        .unwrap();

        let cfg = Config::load(file.path()).unwrap();
        assert_eq!(cfg.auth.token, "secret");
        assert_eq!(cfg.stream.token_delay_ms, 50);
        // Untouched sections keep their defaults.
        assert_eq!(cfg.server.listen, "0.0.0.0:8080");
    }

    #[test]
    fn test_token_delay_duration() {
        let cfg = StreamConfig { token_delay_ms: 250 };
        assert_eq!(cfg.token_delay(), Duration::from_millis(250));
    }
}
