use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use walkrank::salsa::SalsaSettings;
use walkrank::storage::GraphLimits;

/// Contents of a `walkrank` TOML config file.
///
/// ```toml
/// [graph]
/// segment_edge_capacity = 100000
/// max_segments = 4
///
/// [salsa]
/// max_random_walk_length = 6
/// reset_probability = 0.3
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub graph: GraphLimits,
    pub salsa: SalsaSettings,
}

impl CliConfig {
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => read_file(path),
            None => Ok(Self::default()),
        }
    }
}

fn read_file(path: &Path) -> Result<CliConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
