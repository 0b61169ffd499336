use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "agent.toml";

/// Shared secret the field nodes derive their envelope key from.
///
/// Debug output never includes the value.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SharedSecret(String);

impl SharedSecret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(***)")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Orion context broker base URL
    pub orion_base: String,
    pub gps_entity_id: String,
    pub temp_entity_id: String,
    pub hum_entity_id: String,
    /// Absent is allowed at startup; every ingest then fails decryption.
    pub agent_token: Option<SharedSecret>,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub port: u16,
    pub forward: ForwardConfig,
    /// Directory served under /static
    pub static_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForwardConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            orion_base: "http://localhost:1026".to_string(),
            gps_entity_id: "gps_oruga".to_string(),
            temp_entity_id: "temp_oruga".to_string(),
            hum_entity_id: "hum_oruga".to_string(),
            agent_token: None,
            log_level: "info".to_string(),
            port: 5000,
            forward: ForwardConfig::default(),
            static_dir: "static".to_string(),
        }
    }
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 3000,
            max_retries: 2,
            backoff_ms: 500,
        }
    }
}

impl ForwardConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl AgentConfig {
    /// Load configuration once at process start.
    ///
    /// Order: built-in defaults, then the TOML file named by `AGENT_CONFIG`
    /// (or `agent.toml` when present), then environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mut config = match std::env::var("AGENT_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(DEFAULT_CONFIG_PATH)?
            }
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Overlay values from an environment-style lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ORION_BASE") {
            self.orion_base = v;
        }
        if let Some(v) = lookup("GPS_ENTITY_ID") {
            self.gps_entity_id = v;
        }
        if let Some(v) = lookup("TEMP_ENTITY_ID") {
            self.temp_entity_id = v;
        }
        if let Some(v) = lookup("HUM_ENTITY_ID") {
            self.hum_entity_id = v;
        }
        if let Some(v) = lookup("AGENT_TOKEN") {
            self.agent_token = Some(SharedSecret::new(v));
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.log_level = v.to_lowercase();
        }
        if let Some(v) = lookup("AGENT_PORT") {
            self.port = parse_value("AGENT_PORT", &v)?;
        }
        if let Some(v) = lookup("FORWARD_TIMEOUT_MS") {
            self.forward.timeout_ms = parse_value("FORWARD_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("FORWARD_MAX_RETRIES") {
            self.forward.max_retries = parse_value("FORWARD_MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("FORWARD_BACKOFF_MS") {
            self.forward.backoff_ms = parse_value("FORWARD_BACKOFF_MS", &v)?;
        }
        if let Some(v) = lookup("STATIC_DIR") {
            self.static_dir = v;
        }
        Ok(())
    }

    /// `{base}/v2/entities/{entity_id}/attrs`
    pub fn attrs_url(&self, entity_id: &str) -> String {
        format!(
            "{}/v2/entities/{}/attrs",
            self.orion_base.trim_end_matches('/'),
            entity_id
        )
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
