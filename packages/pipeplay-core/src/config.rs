//! Typed configuration with documented defaults.
//!
//! The file is JSON. Every section uses serde defaults, so a partial file is
//! merged over the defaults and unknown keys are ignored. Loading is eager:
//! values are validated once at startup and never reloaded.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding `api.host`.
pub const ENV_API_HOST: &str = "PIPEPLAY_API_HOST";
/// Environment variable overriding `api.port`.
pub const ENV_API_PORT: &str = "PIPEPLAY_API_PORT";
/// Environment variable overriding `api.auth.api_key`.
pub const ENV_API_KEY: &str = "PIPEPLAY_API_KEY";
/// Environment variable overriding `logging.level`.
pub const ENV_LOG_LEVEL: &str = "PIPEPLAY_LOG_LEVEL";

const CONFIG_DIR_NAME: &str = "pipeplay";
const CONFIG_FILE_NAME: &str = "config.json";

/// Errors raised while loading or saving configuration. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Complete process configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Friendly name reported by `/api/info`.
    pub name: String,
    pub unique_id: String,
    pub device_class: String,
    pub api: ApiConfig,
    pub discovery: DiscoveryConfig,
    pub audio: AudioConfig,
    pub metadata: MetadataConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "PipePlay Player".to_string(),
            unique_id: "pipeplay_player".to_string(),
            device_class: "speaker".to_string(),
            api: ApiConfig::default(),
            discovery: DiscoveryConfig::default(),
            audio: AudioConfig::default(),
            metadata: MetadataConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    /// Bind address. Unspecified (`0.0.0.0`) listens on all interfaces.
    pub host: IpAddr,
    pub port: u16,
    pub auth: AuthConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            auth: AuthConfig::default(),
        }
    }
}

/// Bearer-token authentication settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub generate_key_on_first_run: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            generate_key_on_first_run: true,
        }
    }
}

/// Network discovery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub enabled: bool,
    /// Instance name in the advertised service record.
    pub name: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name: "PipePlay Player".to_string(),
        }
    }
}

/// Audio output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Volume applied at startup, in `[0.0, 1.0]`.
    pub default_volume: f64,
    /// Increment for `volume_up` / `volume_down`, in `(0.0, 1.0]`.
    pub volume_step: f64,
    /// Extra properties passed verbatim to the playback backend.
    pub mpv_options: BTreeMap<String, String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            default_volume: 0.5,
            volume_step: 0.1,
            mpv_options: BTreeMap::new(),
        }
    }
}

/// Metadata resolver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub cache_size: usize,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self { cache_size: 1000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Whether protected endpoints require a bearer token.
    #[must_use]
    pub fn auth_required(&self) -> bool {
        self.api.auth.enabled
    }

    /// Applies `PIPEPLAY_*` overrides. Values that fail to parse are ignored.
    ///
    /// `lookup` abstracts the environment so callers (and tests) can supply
    /// their own source.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup(ENV_API_HOST) {
            match val.parse() {
                Ok(host) => self.api.host = host,
                Err(_) => log::warn!("[Config] Ignoring {}={}: not an IP address", ENV_API_HOST, val),
            }
        }

        if let Some(val) = lookup(ENV_API_PORT) {
            match val.parse() {
                Ok(port) => self.api.port = port,
                Err(_) => log::warn!("[Config] Ignoring {}={}: not a port", ENV_API_PORT, val),
            }
        }

        if let Some(val) = lookup(ENV_API_KEY) {
            if !val.trim().is_empty() {
                self.api.auth.api_key = Some(val);
            }
        }

        if let Some(val) = lookup(ENV_LOG_LEVEL) {
            if val.parse::<log::LevelFilter>().is_ok() {
                self.logging.level = val;
            } else {
                log::warn!("[Config] Ignoring {}={}: not a log level", ENV_LOG_LEVEL, val);
            }
        }
    }

    /// Checks every constrained field.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        let v = self.audio.default_volume;
        if !(0.0..=1.0).contains(&v) {
            return invalid(format!("audio.default_volume must be in [0, 1], got {}", v));
        }
        let step = self.audio.volume_step;
        if !(step > 0.0 && step <= 1.0) {
            return invalid(format!("audio.volume_step must be in (0, 1], got {}", step));
        }
        if self.api.enabled && self.api.port == 0 {
            return invalid("api.port must not be 0".to_string());
        }
        if self.logging.level.parse::<log::LevelFilter>().is_err() {
            return invalid(format!("logging.level '{}' is not a log level", self.logging.level));
        }
        if self.metadata.cache_size == 0 {
            return invalid("metadata.cache_size must be at least 1".to_string());
        }
        let auth = &self.api.auth;
        if auth.enabled && auth.api_key.is_none() && !auth.generate_key_on_first_run {
            return invalid(
                "api.auth is enabled but no api_key is set and key generation is disabled"
                    .to_string(),
            );
        }
        if auth.api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            return invalid("api.auth.api_key must not be empty".to_string());
        }
        Ok(())
    }
}

/// Generates a random API key (hex UUIDv4).
#[must_use]
pub fn generate_api_key() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Loads and persists [`Config`] at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Creates a store for the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<user config dir>/pipeplay/config.json`, if the platform has one.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads configuration using the process environment for overrides.
    ///
    /// # Errors
    /// See [`load_with_env`](Self::load_with_env).
    pub fn load(&self) -> Result<Config, ConfigError> {
        self.load_with_env(|key| std::env::var(key).ok())
    }

    /// Loads the file (creating it with defaults if missing), generates an API
    /// key if one is needed, applies overrides from `lookup` and validates.
    ///
    /// Overrides are applied to the returned value only; they are never
    /// written back to the file.
    ///
    /// # Errors
    /// - [`ConfigError::Io`] / [`ConfigError::Parse`] for an unreadable or
    ///   malformed existing file
    /// - [`ConfigError::Invalid`] if validation fails
    /// - [`ConfigError::Write`] if defaults or a generated key cannot be saved
    pub fn load_with_env(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Config, ConfigError> {
        let (mut stored, mut dirty) = match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let config: Config =
                    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                        path: self.path.clone(),
                        source,
                    })?;
                log::info!("[Config] Loaded {}", self.path.display());
                (config, false)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "[Config] No config at {}, creating defaults",
                    self.path.display()
                );
                (Config::default(), true)
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let auth = &mut stored.api.auth;
        if auth.enabled && auth.api_key.is_none() && auth.generate_key_on_first_run {
            auth.api_key = Some(generate_api_key());
            log::info!("[Config] Generated new API key");
            dirty = true;
        }

        let mut effective = stored.clone();
        effective.apply_env_overrides(lookup);
        effective.validate()?;

        if dirty {
            self.save(&stored)?;
        }
        Ok(effective)
    }

    /// Writes `config` atomically (temp file + rename), creating directories.
    ///
    /// # Errors
    /// Returns [`ConfigError::Write`] on any filesystem failure.
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(write_err)?;
        }
        let contents = serde_json::to_string_pretty(config)
            .map_err(|e| write_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, contents).map_err(write_err)?;
        std::fs::rename(&temp_path, &self.path).map_err(write_err)?;

        log::info!("[Config] Saved {}", self.path.display());
        Ok(())
    }
}
