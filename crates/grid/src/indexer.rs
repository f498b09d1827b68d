use glam::Vec2;
use tilecache_common::{CacheConfig, ChunkCoord, PixelRect, TilePos};

/// Inclusive rectangle of chunk coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkRange {
    pub min: ChunkCoord,
    pub max: ChunkCoord,
}

impl ChunkRange {
    pub fn new(min: ChunkCoord, max: ChunkCoord) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        coord.x >= self.min.x && coord.x <= self.max.x && coord.y >= self.min.y && coord.y <= self.max.y
    }

    pub fn width(&self) -> usize {
        (self.max.x - self.min.x + 1).max(0) as usize
    }

    pub fn height(&self) -> usize {
        (self.max.y - self.min.y + 1).max(0) as usize
    }

    pub fn len(&self) -> usize {
        self.width() * self.height()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major iteration over every coordinate in the range.
    pub fn iter(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        (self.min.y..=self.max.y)
            .flat_map(move |y| (self.min.x..=self.max.x).map(move |x| ChunkCoord::new(x, y)))
    }
}

/// Maps world pixels and tiles onto the chunk grid.
///
/// A chunk is a square of `chunk_tiles` tiles, each `tile_size` pixels wide.
/// Chunk `(cx, cy)` covers the world pixels
/// `[cx * chunk_size, (cx + 1) * chunk_size)` horizontally and the same
/// vertically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridIndexer {
    tile_size: i32,
    chunk_tiles: i32,
}

impl GridIndexer {
    pub fn new(tile_size: u32, chunk_tiles: u32) -> Self {
        assert!(tile_size > 0, "tile_size must be positive");
        assert!(chunk_tiles > 0, "chunk_tiles must be positive");
        Self {
            tile_size: tile_size as i32,
            chunk_tiles: chunk_tiles as i32,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.tile_size, config.chunk_tiles)
    }

    pub fn tile_size(&self) -> i32 {
        self.tile_size
    }

    pub fn chunk_tiles(&self) -> i32 {
        self.chunk_tiles
    }

    /// Chunk edge in pixels.
    pub fn chunk_size(&self) -> i32 {
        self.tile_size * self.chunk_tiles
    }

    /// Chunk containing a world pixel position.
    pub fn to_chunk_coord(&self, world: Vec2) -> ChunkCoord {
        let size = self.chunk_size() as f32;
        ChunkCoord::new(
            (world.x / size).floor() as i32,
            (world.y / size).floor() as i32,
        )
    }

    /// Chunk containing a tile.
    pub fn tile_to_chunk(&self, tile: TilePos) -> ChunkCoord {
        ChunkCoord::new(
            tile.x.div_euclid(self.chunk_tiles),
            tile.y.div_euclid(self.chunk_tiles),
        )
    }

    /// Top-left world pixel of a chunk.
    pub fn chunk_origin(&self, coord: ChunkCoord) -> Vec2 {
        let size = self.chunk_size();
        Vec2::new((coord.x * size) as f32, (coord.y * size) as f32)
    }

    /// Top-left tile of a chunk.
    pub fn chunk_tile_origin(&self, coord: ChunkCoord) -> TilePos {
        TilePos::new(coord.x * self.chunk_tiles, coord.y * self.chunk_tiles)
    }

    pub fn chunk_rect(&self, coord: ChunkCoord) -> PixelRect {
        let size = self.chunk_size();
        PixelRect::new(coord.x * size, coord.y * size, size, size)
    }

    /// Chunks that must be resident for a camera rectangle: the chunk-aligned
    /// bounding box of the camera, grown by `buffer_chunks` on every side.
    ///
    /// The right and bottom camera edges are treated as inclusive, so a
    /// viewport ending exactly on a chunk boundary keeps that next chunk.
    pub fn visible_range(&self, camera: PixelRect, buffer_chunks: i32) -> ChunkRange {
        let size = self.chunk_size();
        ChunkRange::new(
            ChunkCoord::new(
                camera.x.div_euclid(size) - buffer_chunks,
                camera.y.div_euclid(size) - buffer_chunks,
            ),
            ChunkCoord::new(
                camera.right().div_euclid(size) + buffer_chunks,
                camera.bottom().div_euclid(size) + buffer_chunks,
            ),
        )
    }

    /// Chunks whose cached surface may show an edited cell.
    ///
    /// Always the owning chunk; plus the neighbour across each edge the cell
    /// lies within `edge_threshold` tiles of; plus the diagonal neighbour
    /// when the cell is near two edges at once. Sorted and deduplicated.
    pub fn affected_chunks(&self, tile: TilePos, edge_threshold: i32) -> Vec<ChunkCoord> {
        let owner = self.tile_to_chunk(tile);
        let dx = self.edge_offset(tile.x, edge_threshold);
        let dy = self.edge_offset(tile.y, edge_threshold);

        let mut chunks = vec![owner];
        if dx != 0 {
            chunks.push(ChunkCoord::new(owner.x + dx, owner.y));
        }
        if dy != 0 {
            chunks.push(ChunkCoord::new(owner.x, owner.y + dy));
        }
        if dx != 0 && dy != 0 {
            chunks.push(ChunkCoord::new(owner.x + dx, owner.y + dy));
        }
        chunks.sort();
        chunks.dedup();
        chunks
    }

    /// -1 near the low edge, +1 near the high edge, 0 otherwise.
    fn edge_offset(&self, tile: i32, edge_threshold: i32) -> i32 {
        if edge_threshold <= 0 {
            return 0;
        }
        let local = tile.rem_euclid(self.chunk_tiles);
        if local < edge_threshold {
            -1
        } else if local >= self.chunk_tiles - edge_threshold {
            1
        } else {
            0
        }
    }
}

impl Default for GridIndexer {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
