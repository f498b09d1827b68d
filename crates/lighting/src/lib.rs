//! Tile-space lighting: a parallel compute pass over a margin-padded light
//! buffer, upload to tile-sized textures and a scaled transfer into
//! screen-aligned textures.
//!
//! # Invariants
//! - Buffers and textures are (re)allocated together, only on resize; a
//!   compute never sees a stale size.
//! - Workers write disjoint rows of the arena and are joined before upload.
//! - Compute, upload and transfer are no-ops before the first resize.

mod arena;
mod pipeline;

pub use arena::LightingArena;
pub use pipeline::{LightingError, LightingPipeline};

pub fn crate_info() -> &'static str {
    "tilecache-lighting v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("lighting"));
    }
}
