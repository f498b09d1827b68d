//! Chunked surface cache for one render layer at a time.
//!
//! Each `ChunkCollection` owns the chunks of one layer (walls, non-solid
//! tiles, solid tiles), keeps them resident around the camera, repopulates
//! them when edits dirty them and composites them into a viewport-sized
//! target.
//!
//! # Invariants
//! - The dirty set is always a subset of the loaded chunks.
//! - A chunk's surface is disposed exactly once, when the chunk leaves the
//!   collection.
//! - Population starts from a cleared surface, so repopulating unchanged
//!   content gives identical pixels.
//! - Animated cells are never baked into a surface.

mod chunk;
mod collection;
mod invalidation;
mod painter;
mod populate;

pub use chunk::Chunk;
pub use collection::{ChunkCollection, CollectionStats};
pub use invalidation::{Invalidation, InvalidationQueue};
pub use painter::{CellPainter, FlatPainter};
pub use populate::{CellClass, LayerPopulator};

pub fn crate_info() -> &'static str {
    "tilecache-chunks v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("chunks"));
    }
}
