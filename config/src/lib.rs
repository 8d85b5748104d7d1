//! Configuration for the reading service, the headless client, and the engine.
//!
//! Loaded from `~/.arcana/config.toml`. Every section is optional and a missing
//! file is not an error. String values may reference the environment as
//! `${VAR}`.

use serde::Deserialize;
use std::{env, fs, path::Path, path::PathBuf};

use arcana_types::ApiKey;

/// Environment variable holding the backend credential.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const HOST_ENV: &str = "ARCANA_HOST";
pub const PORT_ENV: &str = "ARCANA_PORT";
pub const ENDPOINT_ENV: &str = "ARCANA_ENDPOINT";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8787;

const fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct ArcanaConfig {
    pub server: Option<ServerConfig>,
    pub google: Option<GoogleConfig>,
    pub engine: Option<EngineSection>,
    pub client: Option<ClientConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("missing API key: set [google] api_key or the {API_KEY_ENV} environment variable")]
    MissingCredential,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Default, Deserialize)]
pub struct GoogleConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_retries: Option<u32>,
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key = if self.api_key.is_some() {
            "[REDACTED]"
        } else {
            "None"
        };
        f.debug_struct("GoogleConfig")
            .field("api_key", &key)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Interaction engine tuning. Absent fields fall back to the engine defaults.
#[derive(Debug, Deserialize)]
pub struct EngineSection {
    /// Shuffle animation length in milliseconds.
    pub shuffle_ms: Option<u64>,
    /// Fan-to-slot transfer animation length in milliseconds.
    pub transfer_ms: Option<u64>,
    /// Fling stops once |velocity| falls to this many degrees per second.
    pub fling_min_velocity: Option<f64>,
    /// Gate fan interaction on a non-empty question.
    #[serde(default = "default_true")]
    pub require_question: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClientConfig {
    /// Full URL of the reading endpoint.
    pub endpoint: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    /// Append logs to this file instead of stderr. A leading `~/` is expanded.
    pub file: Option<String>,
}

/// Expand `${VAR}` references from the process environment.
///
/// Unset variables expand to the empty string; an unclosed `${` is kept verbatim.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    expand_with(value, |name| env::var(name).ok())
}

fn expand_with(value: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        if !name.is_empty() {
            out.push_str(&lookup(name).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ArcanaConfig {
    /// Load `~/.arcana/config.toml`, `Ok(None)` when it does not exist.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {:?}: {}", path, source);
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        toml::from_str(&content).map_err(|source| {
            tracing::warn!("Failed to parse config at {:?}: {}", path, source);
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Backend credential: `[google] api_key` first, then `GEMINI_API_KEY`.
    pub fn api_key(&self) -> Result<ApiKey, ConfigError> {
        self.api_key_with(|name| env::var(name).ok())
    }

    fn api_key_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<ApiKey, ConfigError> {
        let configured = self
            .google
            .as_ref()
            .and_then(|google| google.api_key.as_deref())
            .map(|raw| expand_with(raw, &lookup));

        non_empty(configured)
            .or_else(|| non_empty(lookup(API_KEY_ENV)))
            .and_then(|key| ApiKey::new(key).ok())
            .ok_or(ConfigError::MissingCredential)
    }

    #[must_use]
    pub fn model(&self) -> Option<String> {
        non_empty(
            self.google
                .as_ref()
                .and_then(|google| google.model.as_deref())
                .map(expand_env_vars),
        )
    }

    #[must_use]
    pub fn base_url(&self) -> Option<String> {
        non_empty(
            self.google
                .as_ref()
                .and_then(|google| google.base_url.as_deref())
                .map(expand_env_vars),
        )
    }

    #[must_use]
    pub fn max_retries(&self) -> Option<u32> {
        self.google.as_ref().and_then(|google| google.max_retries)
    }

    /// `host:port` the service binds, with `ARCANA_HOST` / `ARCANA_PORT` overrides.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        self.listen_addr_with(|name| env::var(name).ok())
    }

    fn listen_addr_with(&self, lookup: impl Fn(&str) -> Option<String>) -> String {
        let server = self.server.as_ref();
        let host = non_empty(lookup(HOST_ENV))
            .or_else(|| non_empty(server.and_then(|s| s.host.as_deref()).map(expand_env_vars)))
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = lookup(PORT_ENV)
            .and_then(|p| p.trim().parse::<u16>().ok())
            .or_else(|| server.and_then(|s| s.port))
            .unwrap_or(DEFAULT_PORT);
        if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]:{port}")
        } else {
            format!("{host}:{port}")
        }
    }

    /// Reading endpoint used by the headless client.
    #[must_use]
    pub fn endpoint(&self) -> String {
        self.endpoint_with(|name| env::var(name).ok())
    }

    fn endpoint_with(&self, lookup: impl Fn(&str) -> Option<String>) -> String {
        non_empty(lookup(ENDPOINT_ENV))
            .or_else(|| {
                non_empty(
                    self.client
                        .as_ref()
                        .and_then(|client| client.endpoint.as_deref())
                        .map(expand_env_vars),
                )
            })
            .unwrap_or_else(|| format!("http://{}/api/threecard", self.listen_addr_with(&lookup)))
    }

    #[must_use]
    pub fn log_file(&self) -> Option<PathBuf> {
        let raw = self.logging.as_ref()?.file.as_deref()?;
        let raw = non_empty(Some(expand_env_vars(raw)))?;
        match raw.strip_prefix("~/") {
            Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
            None => Some(PathBuf::from(raw)),
        }
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".arcana").join("config.toml"))
}
