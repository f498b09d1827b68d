//! Shared types for the tile cache: grid coordinates, colours, camera and
//! configuration.
//!
//! # Invariants
//! - `Color` is `#[repr(C)]` RGBA8 so lighting buffers upload without copies.
//! - `PixelRect` is half-open on both axes.

pub mod config;
pub mod types;

pub use config::{CacheConfig, ConfigError, DebugConfig};
pub use types::{
    AnimatedCell, AnimatedKind, Camera, ChunkCoord, Color, LayerKind, PixelRect, TilePos,
};

pub fn crate_info() -> &'static str {
    "tilecache-common v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("common"));
    }
}
