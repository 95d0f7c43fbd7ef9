//! Locating and reading the tailer's TOML configuration.

use std::path::{Path, PathBuf};

use super::TailConfig;

/// File name looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "w3c-tail.toml";

/// Finds and parses a [`TailConfig`].
///
/// An explicitly requested file must exist. Without one, the working
/// directory and then the user config directory are searched, and defaults
/// apply if neither holds a file.
#[derive(Debug)]
pub struct ConfigLoader {
    explicit: Option<PathBuf>,
    candidates: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Search `./w3c-tail.toml`, then `<config dir>/w3c-tail/config.toml`.
    #[must_use]
    pub fn new() -> Self {
        let candidates = std::iter::once(PathBuf::from(LOCAL_CONFIG_FILE))
            .chain(dirs::config_dir().map(|dir| dir.join("w3c-tail").join("config.toml")))
            .collect();
        Self {
            explicit: None,
            candidates,
        }
    }

    /// Load exactly `path`, failing if it is missing.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            explicit: Some(path),
            candidates: Vec::new(),
        }
    }

    /// Files consulted when no explicit path was given, in priority order.
    #[must_use]
    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// The file that [`load`](Self::load) would read, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if an explicit path does not exist.
    pub fn locate(&self) -> Result<Option<PathBuf>, ConfigError> {
        match &self.explicit {
            Some(path) if path.is_file() => Ok(Some(path.clone())),
            Some(path) => Err(ConfigError::NotFound { path: path.clone() }),
            None => Ok(self.candidates.iter().find(|p| p.is_file()).cloned()),
        }
    }

    /// Read the located file, or fall back to [`TailConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing, or the chosen file
    /// cannot be read or is not a valid configuration.
    pub fn load(&self) -> Result<TailConfig, ConfigError> {
        let Some(path) = self.locate()? else {
            tracing::debug!(
                searched = self.candidates.len(),
                "No config file found, using defaults"
            );
            return Ok(TailConfig::default());
        };

        let config = read_config(&path)?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_config(path: &Path) -> Result<TailConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file named with `--config` does not exist.
    #[error("Config file {path} does not exist")]
    NotFound { path: PathBuf },

    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
