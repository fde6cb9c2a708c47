//! Daemon settings.
//!
//! Read from `visionhub.toml`, or from the file named by `VISIONHUB_CONFIG`,
//! then overridden by `VISIONHUB_*` variables. A missing default file means
//! defaults; a missing explicit file, unknown keys, or a malformed override
//! are errors.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use visionhub_app::status_registry::RegistryConfig;

const DEFAULT_PATH: &str = "visionhub.toml";
const PATH_VAR: &str = "VISIONHUB_CONFIG";

/// Everything `visionhubd` needs to start.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerSection,
    pub database: DatabaseSection,
    pub logging: LoggingSection,
    pub registry: RegistrySection,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSection {
    /// sqlx `SQLite` URL; `sqlite::memory:` keeps everything in RAM.
    pub url: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: "sqlite:visionhub.db?mode=rwc".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    /// `RUST_LOG` syntax.
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: "visionhubd=info,visionhub_app=info,visionhub_adapter_http_axum=info,tower_http=debug"
                .to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrySection {
    /// Seconds between two unconditional snapshot broadcasts.
    pub broadcast_interval_secs: u64,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            broadcast_interval_secs: 5,
        }
    }
}

impl Config {
    /// Resolve the settings from the config file and the process environment.
    ///
    /// # Errors
    ///
    /// See [`ConfigError`].
    pub fn load() -> Result<Self, ConfigError> {
        let var = |name: &str| std::env::var(name).ok();
        let mut config = match var(PATH_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::from_file_or_default(Path::new(DEFAULT_PATH))?,
        };
        config.apply_overrides(var)?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_file_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `VISIONHUB_*` overrides looked up through `var`.
    ///
    /// `VISIONHUB_BIND` wins over `VISIONHUB_HOST`/`VISIONHUB_PORT`, and
    /// `RUST_LOG` over `VISIONHUB_LOG`.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(host) = var("VISIONHUB_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("VISIONHUB_PORT") {
            self.server.port = parse_override("VISIONHUB_PORT", &port)?;
        }
        if let Some(bind) = var("VISIONHUB_BIND") {
            let Some((host, port)) = bind.rsplit_once(':') else {
                return Err(ConfigError::Override {
                    var: "VISIONHUB_BIND",
                    value: bind,
                });
            };
            self.server.port = parse_override("VISIONHUB_BIND", port)?;
            self.server.host = host.to_string();
        }
        if let Some(url) = var("VISIONHUB_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(filter) = var("RUST_LOG").or_else(|| var("VISIONHUB_LOG")) {
            self.logging.filter = filter;
        }
        if let Some(secs) = var("VISIONHUB_BROADCAST_INTERVAL_SECS") {
            self.registry.broadcast_interval_secs =
                parse_override("VISIONHUB_BROADCAST_INTERVAL_SECS", &secs)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server.host must not be empty"));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero"));
        }
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Invalid("database.url must not be empty"));
        }
        if self.registry.broadcast_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "registry.broadcast_interval_secs must be non-zero",
            ));
        }
        Ok(())
    }

    /// `host:port` to listen on.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Settings of the live status registry.
    #[must_use]
    pub fn registry(&self) -> RegistryConfig {
        RegistryConfig {
            broadcast_interval: Duration::from_secs(self.registry.broadcast_interval_secs),
        }
    }
}

fn parse_override<T: FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Override {
        var,
        value: value.to_string(),
    })
}

/// Why the settings could not be resolved.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value {value:?} in {var}")]
    Override { var: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}
