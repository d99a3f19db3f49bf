use std::path::PathBuf;

use seedbed_core::{SeedError, StoreSinkError};
use seedbed_rocks::RocksError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Config error in {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store error: {0}")]
    Store(#[from] RocksError),

    #[error("Stored data error: {0}")]
    StoredData(#[from] StoreSinkError),

    #[error("Seed error: {0}")]
    Seed(#[from] SeedError),

    #[error("Record {key} is not a {expected}")]
    UnexpectedRecord { key: String, expected: &'static str },
}
