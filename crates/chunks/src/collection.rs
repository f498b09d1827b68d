use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;
use tilecache_common::{AnimatedCell, Camera, ChunkCoord, Color, LayerKind, TilePos};
use tilecache_grid::{ChunkRange, GridIndexer, ResidencyDiff};
use tilecache_render::{DrawBackend, RenderTarget, SurfaceId};
use tilecache_world::TileSource;

use crate::chunk::Chunk;
use crate::painter::CellPainter;
use crate::populate::{CellClass, LayerPopulator};

/// Counters accumulated since the last [`ChunkCollection::take_stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionStats {
    pub loaded: usize,
    pub unloaded: usize,
    pub populated: usize,
}

/// The loaded chunks of one render layer.
///
/// Every coordinate in the dirty set is also loaded.
#[derive(Debug)]
pub struct ChunkCollection {
    layer: LayerKind,
    populator: LayerPopulator,
    grid: GridIndexer,
    loaded: BTreeMap<ChunkCoord, Chunk>,
    needs_populating: BTreeSet<ChunkCoord>,
    composite: Option<SurfaceId>,
    stats: CollectionStats,
}

impl ChunkCollection {
    pub fn new(layer: LayerKind, grid: GridIndexer) -> Self {
        Self {
            layer,
            populator: LayerPopulator::for_layer(layer),
            grid,
            loaded: BTreeMap::new(),
            needs_populating: BTreeSet::new(),
            composite: None,
            stats: CollectionStats::default(),
        }
    }

    pub fn layer(&self) -> LayerKind {
        self.layer
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    pub fn is_loaded(&self, coord: ChunkCoord) -> bool {
        self.loaded.contains_key(&coord)
    }

    /// Loaded coordinates in sorted order.
    pub fn loaded_coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.loaded.keys().copied()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.loaded.values()
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.loaded.get(&coord)
    }

    pub fn needs_populating(&self) -> &BTreeSet<ChunkCoord> {
        &self.needs_populating
    }

    pub fn composite_target(&self) -> Option<SurfaceId> {
        self.composite
    }

    pub fn take_stats(&mut self) -> CollectionStats {
        std::mem::take(&mut self.stats)
    }

    /// Allocate and populate a chunk. No-op when already loaded.
    pub fn load_chunk(
        &mut self,
        backend: &mut dyn DrawBackend,
        world: &dyn TileSource,
        painter: &dyn CellPainter,
        coord: ChunkCoord,
    ) {
        if self.loaded.contains_key(&coord) {
            return;
        }
        let size = self.grid.chunk_size() as u32;
        let surface = backend.create_surface(size, size);
        self.loaded.insert(coord, Chunk::new(coord, surface));
        self.populate(backend, world, painter, coord);
        self.stats.loaded += 1;
        tracing::debug!(layer = self.layer.name(), ?coord, "chunk loaded");
    }

    fn unload_chunk(&mut self, backend: &mut dyn DrawBackend, coord: ChunkCoord) {
        if let Some(chunk) = self.loaded.remove(&coord) {
            backend.dispose_surface(chunk.surface);
            self.needs_populating.remove(&coord);
            self.stats.unloaded += 1;
            tracing::debug!(layer = self.layer.name(), ?coord, "chunk unloaded");
        }
    }

    /// Make the loaded set equal `range`, then repopulate every dirty chunk.
    pub fn update_resident(
        &mut self,
        backend: &mut dyn DrawBackend,
        world: &dyn TileSource,
        painter: &dyn CellPainter,
        range: ChunkRange,
    ) {
        let diff = ResidencyDiff::compute(self.loaded.keys(), range);
        for coord in diff.to_load {
            self.load_chunk(backend, world, painter, coord);
        }
        for coord in diff.to_unload {
            self.unload_chunk(backend, coord);
        }

        let dirty = std::mem::take(&mut self.needs_populating);
        for coord in dirty {
            self.populate(backend, world, painter, coord);
            tracing::debug!(layer = self.layer.name(), ?coord, "chunk repopulated");
        }
    }

    /// Queue a loaded chunk for repopulation. Returns false, and does
    /// nothing, when the chunk is not loaded.
    pub fn mark_dirty(&mut self, coord: ChunkCoord) -> bool {
        if !self.loaded.contains_key(&coord) {
            return false;
        }
        self.needs_populating.insert(coord);
        true
    }

    pub fn mark_all_dirty(&mut self) -> usize {
        self.needs_populating.extend(self.loaded.keys().copied());
        self.needs_populating.len()
    }

    /// Redraw a loaded chunk's surface from the world.
    ///
    /// Scans the chunk's cells plus a one-cell halo so content overhanging a
    /// chunk edge is included. Animated cells inside the chunk are recorded
    /// for the per-frame overlay instead of being drawn.
    pub fn populate(
        &mut self,
        backend: &mut dyn DrawBackend,
        world: &dyn TileSource,
        painter: &dyn CellPainter,
        coord: ChunkCoord,
    ) {
        let grid = self.grid;
        let populator = self.populator;
        let Some(chunk) = self.loaded.get_mut(&coord) else {
            return;
        };

        chunk.animated.clear();
        backend.bind_target(RenderTarget::Surface(chunk.surface));
        backend.clear(Color::TRANSPARENT);

        let Some(tint) = populator.visibility_tint(world.visibility()) else {
            chunk.generation += 1;
            self.stats.populated += 1;
            return;
        };

        let origin = grid.chunk_tile_origin(coord);
        let tile_size = grid.tile_size();
        let n = grid.chunk_tiles();
        for ty in -1..=n {
            for tx in -1..=n {
                let (x, y) = (origin.x + tx, origin.y + ty);
                if !world.in_world(x, y) {
                    continue;
                }
                match populator.classify(world, x, y) {
                    CellClass::Empty => {}
                    CellClass::Animated => {
                        let inside = (0..n).contains(&tx) && (0..n).contains(&ty);
                        if inside {
                            chunk.animated.push(AnimatedCell::tile(TilePos::new(x, y)));
                        }
                    }
                    CellClass::Static => {
                        let at = Vec2::new((tx * tile_size) as f32, (ty * tile_size) as f32);
                        populator.paint(
                            painter,
                            backend,
                            world,
                            TilePos::new(x, y),
                            at,
                            tile_size,
                            tint,
                        );
                    }
                }
            }
        }

        chunk.generation += 1;
        self.stats.populated += 1;
    }

    /// (Re)create the viewport-sized composite target. A zero-area viewport
    /// leaves the layer without one.
    pub fn resize(&mut self, backend: &mut dyn DrawBackend, width: u32, height: u32) {
        if let Some(old) = self.composite.take() {
            backend.dispose_surface(old);
        }
        if width > 0 && height > 0 {
            self.composite = Some(backend.create_surface(width, height));
        }
    }

    /// Draw every loaded chunk overlapping the camera into the composite
    /// target, offset by the camera origin.
    ///
    /// # Panics
    /// If the composite target was never allocated, or a loaded chunk's
    /// surface has been disposed.
    pub fn composite_to_viewport(&self, backend: &mut dyn DrawBackend, camera: &Camera) -> usize {
        let Some(target) = self.composite else {
            panic!(
                "{} composite target used before resize",
                self.layer.name()
            );
        };
        backend.bind_target(RenderTarget::Surface(target));
        backend.clear(Color::TRANSPARENT);

        let view = camera.pixel_rect();
        let mut drawn = 0;
        for (coord, chunk) in &self.loaded {
            if !self.grid.chunk_rect(*coord).intersects(&view) {
                continue;
            }
            assert!(
                !backend.is_disposed(chunk.surface),
                "{} chunk {coord:?} has a disposed surface",
                self.layer.name()
            );
            let pos = self.grid.chunk_origin(*coord) - camera.origin;
            backend.draw_sprite(chunk.surface, pos, Color::WHITE, 1.0);
            drawn += 1;
        }
        drawn
    }

    /// Draw every recorded animated cell into the bound target. Returns the
    /// number of cells drawn.
    pub fn draw_animated_overlay(
        &self,
        backend: &mut dyn DrawBackend,
        world: &dyn TileSource,
        painter: &dyn CellPainter,
        camera: &Camera,
        frame: u64,
    ) -> usize {
        let tile_size = self.grid.tile_size();
        let mut drawn = 0;
        for chunk in self.loaded.values() {
            for cell in &chunk.animated {
                let world_px = Vec2::new(
                    (cell.pos.x * tile_size) as f32,
                    (cell.pos.y * tile_size) as f32,
                );
                painter.paint_animated(
                    backend,
                    world,
                    self.layer,
                    cell.pos,
                    world_px - camera.origin,
                    tile_size,
                    frame,
                );
                drawn += 1;
            }
        }
        drawn
    }

    /// Forget every chunk without touching the backend, returning the
    /// surfaces that still need disposing.
    pub fn detach_all(&mut self) -> Vec<SurfaceId> {
        self.needs_populating.clear();
        let surfaces: Vec<SurfaceId> = std::mem::take(&mut self.loaded)
            .into_values()
            .map(|c| c.surface)
            .collect();
        self.stats.unloaded += surfaces.len();
        surfaces
    }

    /// Dispose every chunk surface and the composite target.
    pub fn dispose_all(&mut self, backend: &mut dyn DrawBackend) {
        for surface in self.detach_all() {
            backend.dispose_surface(surface);
        }
        if let Some(composite) = self.composite.take() {
            backend.dispose_surface(composite);
        }
        tracing::debug!(layer = self.layer.name(), "collection disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::painter::FlatPainter;
    use tilecache_common::PixelRect;
    use tilecache_render::RecordingBackend;
    use tilecache_world::registry::ids;
    use tilecache_world::{ContentRegistry, Tile, TileWorld};

    fn grid() -> GridIndexer {
        GridIndexer::new(16, 20)
    }

    fn solid(grid: GridIndexer) -> ChunkCollection {
        ChunkCollection::new(LayerKind::SolidTiles, grid)
    }

    #[test]
    fn residency_matches_range() {
        let world = TileWorld::generate(400, 200, 11);
        let mut backend = RecordingBackend::new(1280, 720);
        let mut col = solid(grid());

        let camera = PixelRect::new(0, 0, 1280, 720);
        let range = grid().visible_range(camera, 1);
        col.update_resident(&mut backend, &world, &FlatPainter, range);
        let expected: Vec<ChunkCoord> = {
            let mut v: Vec<_> = range.iter().collect();
            v.sort();
            v
        };
        assert_eq!(col.loaded_coords().collect::<Vec<_>>(), expected);
        assert_eq!(col.len(), 35);
        assert_eq!(backend.live_surfaces(), 35);

        // Scroll one chunk right.
        let range = grid().visible_range(PixelRect::new(320, 0, 1280, 720), 1);
        col.update_resident(&mut backend, &world, &FlatPainter, range);
        assert!(col.loaded_coords().all(|c| range.contains(c)));
        assert_eq!(col.len(), range.len());
        assert_eq!(backend.live_surfaces(), 35);
        let stats = col.take_stats();
        assert_eq!(stats.loaded, 40);
        assert_eq!(stats.unloaded, 5);
    }

    #[test]
    fn load_chunk_is_idempotent() {
        let world = TileWorld::generate(100, 100, 1);
        let mut backend = RecordingBackend::new(64, 64);
        let mut col = solid(grid());
        col.load_chunk(&mut backend, &world, &FlatPainter, ChunkCoord::new(0, 0));
        col.load_chunk(&mut backend, &world, &FlatPainter, ChunkCoord::new(0, 0));
        assert_eq!(col.len(), 1);
        assert_eq!(backend.surfaces_created(), 1);
        assert_eq!(col.chunk(ChunkCoord::new(0, 0)).map(|c| c.generation), Some(1));
    }

    #[test]
    fn dirty_marks_only_apply_to_loaded_chunks() {
        let world = TileWorld::generate(100, 100, 1);
        let mut backend = RecordingBackend::new(64, 64);
        let mut col = solid(grid());
        col.load_chunk(&mut backend, &world, &FlatPainter, ChunkCoord::new(0, 0));

        assert!(col.mark_dirty(ChunkCoord::new(0, 0)));
        assert!(!col.mark_dirty(ChunkCoord::new(3, 3)));
        assert_eq!(col.needs_populating().len(), 1);
        assert!(col.needs_populating().iter().all(|c| col.is_loaded(*c)));
    }

    #[test]
    fn dirty_chunks_repopulate_exactly_once() {
        let mut world = TileWorld::generate(200, 100, 5);
        let mut backend = RecordingBackend::new(640, 320);
        let mut col = solid(grid());
        let range = ChunkRange::new(ChunkCoord::new(0, 0), ChunkCoord::new(2, 2));
        col.update_resident(&mut backend, &world, &FlatPainter, range);

        world.set_tile(19, 45, Tile::new(ids::STONE));
        col.mark_dirty(ChunkCoord::new(0, 2));
        col.mark_dirty(ChunkCoord::new(1, 2));
        col.mark_dirty(ChunkCoord::new(1, 2));
        col.update_resident(&mut backend, &world, &FlatPainter, range);

        assert!(col.needs_populating().is_empty());
        for chunk in col.chunks() {
            let expected = if chunk.coord.y == 2 && chunk.coord.x < 2 { 2 } else { 1 };
            assert_eq!(chunk.generation, expected, "chunk {:?}", chunk.coord);
        }

        col.update_resident(&mut backend, &world, &FlatPainter, range);
        assert_eq!(col.chunk(ChunkCoord::new(1, 2)).map(|c| c.generation), Some(2));
    }

    #[test]
    fn population_is_idempotent() {
        let world = TileWorld::generate(200, 100, 9);
        let mut backend = RecordingBackend::new(64, 64);
        let mut col = solid(grid());
        let coord = ChunkCoord::new(2, 1);
        col.load_chunk(&mut backend, &world, &FlatPainter, coord);
        let surface = col.chunk(coord).map(|c| c.surface).unwrap();
        let first = backend.content_hash(surface);

        col.populate(&mut backend, &world, &FlatPainter, coord);
        assert_eq!(backend.content_hash(surface), first);
    }

    #[test]
    fn edits_change_surface_content() {
        let mut world = TileWorld::new(40, 40, ContentRegistry::standard());
        let mut backend = RecordingBackend::new(64, 64);
        let mut col = solid(grid());
        let coord = ChunkCoord::new(0, 0);
        col.load_chunk(&mut backend, &world, &FlatPainter, coord);
        let surface = col.chunk(coord).map(|c| c.surface).unwrap();
        let before = backend.content_hash(surface);

        world.set_tile(5, 5, Tile::new(ids::STONE));
        col.populate(&mut backend, &world, &FlatPainter, coord);
        assert_ne!(backend.content_hash(surface), before);
        assert_eq!(
            backend.pixel(RenderTarget::Surface(surface), 5 * 16, 5 * 16),
            Some(FlatPainter::tile_color(ids::STONE, 0))
        );
    }

    #[test]
    fn animated_cells_are_recorded_not_drawn() {
        let mut world = TileWorld::new(40, 40, ContentRegistry::standard());
        world.set_tile(3, 4, Tile::new(ids::TORCH));
        // In the halo of chunk (0, 0), owned by chunk (1, 0).
        world.set_tile(20, 4, Tile::new(ids::TORCH));
        let mut backend = RecordingBackend::new(64, 64);
        let mut col = ChunkCollection::new(LayerKind::NonSolidTiles, grid());
        let coord = ChunkCoord::new(0, 0);
        col.load_chunk(&mut backend, &world, &FlatPainter, coord);

        let chunk = col.chunk(coord).unwrap();
        assert_eq!(chunk.animated, vec![AnimatedCell::tile(TilePos::new(3, 4))]);
        assert_eq!(
            backend.pixel(RenderTarget::Surface(chunk.surface), 3 * 16, 4 * 16),
            Some(Color::TRANSPARENT)
        );

        backend.bind_target(RenderTarget::Screen);
        let drawn = col.draw_animated_overlay(&mut backend, &world, &FlatPainter, &Camera::default(), 0);
        assert_eq!(drawn, 1);
    }

    #[test]
    fn halo_cells_bleed_into_neighbouring_surfaces() {
        let mut world = TileWorld::new(60, 60, ContentRegistry::standard());
        world.set_tile(20, 2, Tile::new(ids::STONE));
        let mut backend = RecordingBackend::new(64, 64);
        let mut col = solid(grid());
        col.load_chunk(&mut backend, &world, &FlatPainter, ChunkCoord::new(0, 0));
        let draws = backend
            .commands()
            .iter()
            .filter(|(_, c)| matches!(c, tilecache_render::DrawCommand::FillRect(..)))
            .count();
        assert_eq!(draws, 1);
    }

    #[test]
    fn composite_skips_chunks_outside_the_camera() {
        let world = TileWorld::generate(200, 100, 2);
        let mut backend = RecordingBackend::new(640, 360);
        let mut col = solid(grid());
        col.resize(&mut backend, 640, 360);
        let camera = Camera::new(Vec2::new(10.0, 0.0), 640, 360);
        let range = grid().visible_range(camera.pixel_rect(), 1);
        col.update_resident(&mut backend, &world, &FlatPainter, range);

        let drawn = col.composite_to_viewport(&mut backend, &camera);
        // Columns 0..=2 and rows 0..=1 overlap the view.
        assert_eq!(drawn, 6);
        assert!(col.len() > drawn);
    }

    #[test]
    #[should_panic(expected = "disposed surface")]
    fn compositing_a_disposed_chunk_panics() {
        let world = TileWorld::generate(100, 100, 2);
        let mut backend = RecordingBackend::new(320, 320);
        let mut col = solid(grid());
        col.resize(&mut backend, 320, 320);
        col.load_chunk(&mut backend, &world, &FlatPainter, ChunkCoord::new(0, 0));
        let surface = col.chunk(ChunkCoord::new(0, 0)).unwrap().surface;
        backend.dispose_surface(surface);
        col.composite_to_viewport(&mut backend, &Camera::new(Vec2::ZERO, 320, 320));
    }

    #[test]
    fn out_of_world_chunks_populate_empty() {
        let world = TileWorld::generate(40, 40, 2);
        let mut backend = RecordingBackend::new(64, 64);
        let mut col = solid(grid());
        col.load_chunk(&mut backend, &world, &FlatPainter, ChunkCoord::new(-3, -3));
        assert!(col.chunk(ChunkCoord::new(-3, -3)).unwrap().animated.is_empty());
        let fills = backend
            .commands()
            .iter()
            .filter(|(_, c)| matches!(c, tilecache_render::DrawCommand::FillRect(..)))
            .count();
        assert_eq!(fills, 0);
    }

    #[test]
    fn detach_and_dispose_release_everything() {
        let world = TileWorld::generate(100, 100, 4);
        let mut backend = RecordingBackend::new(64, 64);
        let mut col = solid(grid());
        col.resize(&mut backend, 64, 64);
        let range = ChunkRange::new(ChunkCoord::new(0, 0), ChunkCoord::new(1, 1));
        col.update_resident(&mut backend, &world, &FlatPainter, range);
        col.mark_all_dirty();

        let detached = col.detach_all();
        assert_eq!(detached.len(), 4);
        assert!(col.is_empty());
        assert!(col.needs_populating().is_empty());
        assert_eq!(backend.live_surfaces(), 5);

        col.dispose_all(&mut backend);
        assert_eq!(backend.live_surfaces(), 4);
        assert!(col.composite_target().is_none());
    }
}
