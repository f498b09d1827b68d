//! Grid indexing for the chunk cache.
//!
//! # Invariants
//! - Chunk coordinates use floor division, so negative world positions map
//!   to negative chunks without a seam at zero.
//! - `affected_chunks` always contains the owning chunk.
//! - A resident set computed from a `ChunkRange` contains every chunk in the
//!   range and nothing outside it.

mod indexer;
mod residency;

pub use indexer::{ChunkRange, GridIndexer};
pub use residency::{FrameTimer, ResidencyDiff};

pub fn crate_info() -> &'static str {
    "tilecache-grid v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("grid"));
    }
}
