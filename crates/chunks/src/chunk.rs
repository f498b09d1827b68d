use tilecache_common::{AnimatedCell, ChunkCoord};
use tilecache_render::SurfaceId;

/// One cached chunk of one layer: an offscreen surface holding every static
/// cell, plus the cells that must be redrawn each frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub coord: ChunkCoord,
    pub surface: SurfaceId,
    pub animated: Vec<AnimatedCell>,
    /// Number of times the surface has been populated.
    pub generation: u32,
}

impl Chunk {
    pub fn new(coord: ChunkCoord, surface: SurfaceId) -> Self {
        Self {
            coord,
            surface,
            animated: Vec::new(),
            generation: 0,
        }
    }
}
