use tilecache_common::{Color, TilePos};

/// Tile-space light buffers covering the viewport plus a margin of tiles on
/// every side.
///
/// Two slots of equal size: `base` holds the light each tile receives,
/// `overrides` the special-sight colour (transparent where none applies).
/// Index `i` is row-major: column `i % width`, row `i / width`.
#[derive(Debug, Clone, PartialEq)]
pub struct LightingArena {
    width: usize,
    height: usize,
    pub(crate) base: Vec<Color>,
    pub(crate) overrides: Vec<Color>,
}

impl LightingArena {
    /// # Panics
    /// If either dimension is zero. Empty viewports never reach an arena;
    /// the pipeline stays unallocated instead.
    pub fn new(width: usize, height: usize) -> Self {
        assert!(width > 0 && height > 0, "lighting arena must not be empty");
        Self {
            width,
            height,
            base: vec![Color::TRANSPARENT; width * height],
            overrides: vec![Color::TRANSPARENT; width * height],
        }
    }

    /// Buffer dimensions for a viewport: `ceil(size / tile_size) + 2 * margin`
    /// on each axis.
    pub fn dimensions_for(viewport: (u32, u32), tile_size: u32, margin: u32) -> (usize, usize) {
        let tiles = |px: u32| px.div_ceil(tile_size) as usize + 2 * margin as usize;
        (tiles(viewport.0), tiles(viewport.1))
    }

    pub fn for_viewport(viewport: (u32, u32), tile_size: u32, margin: u32) -> Self {
        let (w, h) = Self::dimensions_for(viewport, tile_size, margin);
        Self::new(w, h)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn base(&self) -> &[Color] {
        &self.base
    }

    pub fn overrides(&self) -> &[Color] {
        &self.overrides
    }

    /// World tile sampled by flat index `i` when the buffer's top-left
    /// corresponds to `top_left`.
    pub fn tile_at_index(&self, i: usize, top_left: TilePos) -> TilePos {
        TilePos::new(
            top_left.x + (i % self.width) as i32,
            top_left.y + (i / self.width) as i32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_viewport_dimensions() {
        assert_eq!(LightingArena::dimensions_for((1280, 720), 16, 1), (82, 47));
        assert_eq!(LightingArena::dimensions_for((1920, 1080), 16, 1), (122, 70));
        assert_eq!(LightingArena::dimensions_for((1281, 720), 16, 0), (81, 45));
    }

    #[test]
    fn index_maps_row_major() {
        let arena = LightingArena::new(82, 47);
        let top_left = TilePos::new(-1, -1);
        assert_eq!(arena.tile_at_index(0, top_left), TilePos::new(-1, -1));
        assert_eq!(arena.tile_at_index(81, top_left), TilePos::new(80, -1));
        assert_eq!(arena.tile_at_index(82, top_left), TilePos::new(-1, 0));
        assert_eq!(arena.len(), 82 * 47);
    }

    #[test]
    fn slots_start_transparent() {
        let arena = LightingArena::new(3, 2);
        assert!(arena.base().iter().all(|c| c.is_transparent()));
        assert_eq!(arena.overrides().len(), 6);
    }
}
