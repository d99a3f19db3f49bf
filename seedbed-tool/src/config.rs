use std::path::{Path, PathBuf};

use seedbed_core::{Initializer, SeedOptions};
use serde::Deserialize;

use crate::error::ToolError;

pub const DEFAULT_CONFIG: &str = "seedbed.toml";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub initializer: Option<Initializer>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub seed: SeedOptions,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
}

pub fn default_store_path() -> PathBuf {
    PathBuf::from("seedbed-db")
}

/// Reads the config file. An explicit path must exist; the default
/// `seedbed.toml` is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ToolError> {
    let path = explicit.unwrap_or(Path::new(DEFAULT_CONFIG));
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if explicit.is_none() && err.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("no {DEFAULT_CONFIG}, using defaults");
            return Ok(Config::default());
        }
        Err(source) => {
            return Err(ToolError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    parse_config(&content).map_err(|source| ToolError::Config {
        path: path.to_path_buf(),
        source,
    })
}

pub fn parse_config(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub store: Option<PathBuf>,
    pub document: Option<PathBuf>,
    pub base_dir: Option<PathBuf>,
    pub initializer: Option<Initializer>,
}

/// Effective settings after merging.
#[derive(Debug)]
pub struct Settings {
    pub store_path: PathBuf,
    pub initializer: Initializer,
    pub seed: SeedOptions,
}

pub fn resolve(config: Config, overrides: Overrides) -> Settings {
    let mut seed = config.seed;
    if let Some(document) = overrides.document {
        seed.document = Some(document);
    }
    if let Some(base_dir) = overrides.base_dir {
        seed.base_dir = Some(base_dir);
    }

    Settings {
        store_path: overrides
            .store
            .or(config.store.path)
            .unwrap_or_else(default_store_path),
        initializer: overrides.initializer.or(config.initializer).unwrap_or_default(),
        seed,
    }
}
