//! Cache configuration, loadable from YAML or JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors from loading or validating a [`CacheConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported config extension: {0:?}")]
    UnsupportedFormat(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Debug overlay toggles. Not part of the cache contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub chunk_borders: bool,
    pub light_map: bool,
}

/// Sizing and policy knobs for the chunk cache and lighting pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Edge of one tile in pixels.
    pub tile_size: u32,
    /// Edge of one chunk in tiles. 20, 25, 40, 50 and 100 divide every
    /// standard world size evenly.
    pub chunk_tiles: u32,
    /// Rings of chunks kept resident around the visible ones.
    pub offscreen_buffer_chunks: u32,
    /// Distance from a chunk edge within which an edit also dirties the
    /// neighbouring chunk.
    pub edge_threshold_tiles: u32,
    /// Tiles of padding around the screen in the lighting buffers.
    pub lighting_margin_tiles: u32,
    /// Lighting workers. 0 uses the global rayon pool.
    pub worker_threads: usize,
    pub debug: DebugConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            tile_size: 16,
            chunk_tiles: 20,
            offscreen_buffer_chunks: 1,
            edge_threshold_tiles: 3,
            lighting_margin_tiles: 1,
            worker_threads: 0,
            debug: DebugConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Edge of one chunk in pixels.
    pub fn chunk_size(&self) -> i32 {
        (self.tile_size * self.chunk_tiles) as i32
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_size == 0 {
            return Err(ConfigError::Invalid("tile_size must be positive".into()));
        }
        if self.chunk_tiles == 0 {
            return Err(ConfigError::Invalid("chunk_tiles must be positive".into()));
        }
        if self.edge_threshold_tiles * 2 > self.chunk_tiles {
            return Err(ConfigError::Invalid(format!(
                "edge_threshold_tiles ({}) must be at most half of chunk_tiles ({})",
                self.edge_threshold_tiles, self.chunk_tiles
            )));
        }
        Ok(())
    }

    pub fn from_yaml_str(src: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(src: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.yaml`/`.yml` or `.json` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&data),
            Some("json") => Self::from_json_str(&data),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }
}
