use std::path::Path;

use serde::{Deserialize, Serialize};

/// Settings for the remote row-store gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the hosted backend.
    pub base_url: String,
    /// Project API key sent with every call.
    pub api_key: String,
    /// Identity that every stored row is scoped to.
    pub user_id: String,
}

impl RemoteConfig {
    /// Whether every field needed to talk to the backend is filled in.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.base_url.trim().is_empty()
            && !self.api_key.trim().is_empty()
            && !self.user_id.trim().is_empty()
    }
}

/// Application settings, stored as `config.toml` in the data directory.
///
/// A missing or unreadable file degrades to the defaults; the application
/// never refuses to start over configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// Whether listings include archived records by default.
    pub show_archived: bool,

    /// Remote sync settings. Absent (or incomplete) means local-only.
    pub remote: Option<RemoteConfig>,
}

/// Loading the settings file failed.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// There is no settings file at the given path.
    #[error("config file not found")]
    NotFound,
    /// The file exists but could not be read.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// The file is not valid TOML for any known version.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
}

/// Writing the settings file failed.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// The settings could not be serialized.
    #[error("failed to serialize config")]
    Serialize(#[from] toml::ser::Error),
    /// The file could not be written.
    #[error("failed to write config file")]
    Io(#[from] std::io::Error),
}

/// A `config set` request named a key or value the settings don't have.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SetError {
    /// The key is not a known setting.
    #[error("unknown config key '{0}'")]
    UnknownKey(String),
    /// The value does not parse for this key.
    #[error("invalid value for '{key}': expected {expected}")]
    InvalidValue {
        /// The key being set.
        key: String,
        /// What a valid value looks like.
        expected: &'static str,
    },
}

impl Config {
    /// Loads the settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, or not valid
    /// TOML.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(LoadError::NotFound);
            }
            Err(error) => return Err(LoadError::Io(error)),
        };

        Ok(toml::from_str(&content)?)
    }

    /// Loads the settings, falling back to defaults instead of failing.
    #[must_use]
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(LoadError::NotFound) => {
                tracing::debug!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(error) => {
                tracing::warn!("Failed to load config: {error}; using defaults");
                Self::default()
            }
        }
    }

    /// Saves the settings to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), SaveError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// The remote settings, if present and complete enough to use.
    #[must_use]
    pub fn usable_remote(&self) -> Option<&RemoteConfig> {
        self.remote.as_ref().filter(|remote| remote.is_complete())
    }

    /// Applies a `key = value` style settings change.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown keys or unparseable values.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SetError> {
        match key {
            "show_archived" => {
                self.show_archived =
                    value
                        .trim()
                        .parse()
                        .map_err(|_| SetError::InvalidValue {
                            key: key.to_string(),
                            expected: "true or false",
                        })?;
            }
            "remote.base_url" => self.remote_mut().base_url = value.to_string(),
            "remote.api_key" => self.remote_mut().api_key = value.to_string(),
            "remote.user_id" => self.remote_mut().user_id = value.to_string(),
            other => return Err(SetError::UnknownKey(other.to_string())),
        }

        Ok(())
    }

    fn remote_mut(&mut self) -> &mut RemoteConfig {
        self.remote.get_or_insert_with(RemoteConfig::default)
    }
}

/// The serialized versions of the settings file.
/// This allows the file format and the domain type to evolve independently
/// without breaking existing data directories.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default)]
        show_archived: bool,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        remote: Option<RemoteConfig>,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                show_archived,
                remote,
            } => Self {
                show_archived,
                remote,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            show_archived: config.show_archived,
            remote: config.remote,
        }
    }
}
