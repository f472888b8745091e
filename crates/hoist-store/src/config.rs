use serde::{Deserialize, Serialize};

use crate::layout::StoreLayout;
use crate::StoreError;

pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub version: u32,
    pub name: Option<String>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            version: 1,
            name: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

pub fn write_config(layout: &StoreLayout, config: &StoreConfig) -> Result<(), StoreError> {
    let toml_str =
        toml::to_string_pretty(config).map_err(|e| StoreError::Config(e.to_string()))?;
    std::fs::write(layout.config_file(), toml_str)?;
    Ok(())
}

pub fn read_config(layout: &StoreLayout) -> Result<StoreConfig, StoreError> {
    let content = std::fs::read_to_string(layout.config_file())?;
    let config: StoreConfig =
        toml::from_str(&content).map_err(|e| StoreError::Config(e.to_string()))?;
    if config.chunk_size == 0 {
        return Err(StoreError::Config("chunk_size must be positive".into()));
    }
    Ok(config)
}
