use std::time::{Duration, Instant};

use glam::Vec2;
use rayon::prelude::*;
use tilecache_common::{CacheConfig, Color, TilePos};
use tilecache_render::{DrawBackend, RenderTarget, SurfaceId};
use tilecache_world::LightSource;

use crate::arena::LightingArena;

#[derive(Debug, thiserror::Error)]
pub enum LightingError {
    #[error("failed to build lighting worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// GPU resources matching one arena size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Textures {
    tile_base: SurfaceId,
    tile_override: SurfaceId,
    screen_base: SurfaceId,
    screen_override: SurfaceId,
}

impl Textures {
    fn all(&self) -> [SurfaceId; 4] {
        [
            self.tile_base,
            self.tile_override,
            self.screen_base,
            self.screen_override,
        ]
    }
}

/// Computes per-tile light on worker threads and moves it into
/// screen-aligned textures on the render thread.
///
/// Nothing happens until the first [`LightingPipeline::resize`].
pub struct LightingPipeline {
    tile_size: u32,
    margin: u32,
    pool: Option<rayon::ThreadPool>,
    arena: Option<LightingArena>,
    textures: Option<Textures>,
    viewport: Option<(u32, u32)>,
    camera_origin: Vec2,
    override_computed: bool,
    last_compute: Duration,
    allocations: u32,
}

impl std::fmt::Debug for LightingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightingPipeline")
            .field("tile_size", &self.tile_size)
            .field("margin", &self.margin)
            .field("dedicated_pool", &self.pool.is_some())
            .field("viewport", &self.viewport)
            .field("allocations", &self.allocations)
            .finish()
    }
}

impl LightingPipeline {
    /// A pipeline computing on the global rayon pool.
    pub fn new(tile_size: u32, margin: u32) -> Self {
        assert!(tile_size > 0, "tile_size must be positive");
        Self {
            tile_size,
            margin,
            pool: None,
            arena: None,
            textures: None,
            viewport: None,
            camera_origin: Vec2::ZERO,
            override_computed: false,
            last_compute: Duration::ZERO,
            allocations: 0,
        }
    }

    /// A pipeline sized from config, with a dedicated pool when
    /// `worker_threads` is non-zero.
    pub fn from_config(config: &CacheConfig) -> Result<Self, LightingError> {
        let mut pipeline = Self::new(config.tile_size, config.lighting_margin_tiles);
        if config.worker_threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.worker_threads)
                .thread_name(|i| format!("lighting-{i}"))
                .build()?;
            pipeline.pool = Some(pool);
        }
        Ok(pipeline)
    }

    pub fn is_allocated(&self) -> bool {
        self.arena.is_some()
    }

    pub fn viewport(&self) -> Option<(u32, u32)> {
        self.viewport
    }

    pub fn arena(&self) -> Option<&LightingArena> {
        self.arena.as_ref()
    }

    /// Times resources have been (re)allocated.
    pub fn allocations(&self) -> u32 {
        self.allocations
    }

    /// Whether the last compute filled the override slot.
    pub fn override_computed(&self) -> bool {
        self.override_computed
    }

    pub fn last_compute(&self) -> Duration {
        self.last_compute
    }

    /// The screen-sized `(base, override)` textures.
    ///
    /// # Panics
    /// Before the first resize.
    pub fn screen_textures(&self) -> (SurfaceId, SurfaceId) {
        let Some(t) = self.textures else {
            panic!("lighting textures read before the first resize");
        };
        (t.screen_base, t.screen_override)
    }

    /// The tile-space `(base, override)` textures, if allocated.
    pub fn tile_textures(&self) -> Option<(SurfaceId, SurfaceId)> {
        self.textures.map(|t| (t.tile_base, t.tile_override))
    }

    /// Rebuild the arena and all four textures for a new viewport size.
    /// Returns false when nothing changed.
    ///
    /// A zero-area viewport releases everything and leaves the pipeline
    /// unallocated, so compute and transfer stay no-ops until a non-empty
    /// size arrives.
    pub fn resize(&mut self, backend: &mut dyn DrawBackend, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            if !self.is_allocated() {
                return false;
            }
            self.dispose(backend);
            tracing::debug!(width, height, "lighting buffers released for empty viewport");
            return true;
        }
        if self.viewport == Some((width, height)) && self.arena.is_some() {
            return false;
        }
        self.dispose(backend);

        let arena = LightingArena::for_viewport((width, height), self.tile_size, self.margin);
        let (w, h) = (arena.width() as u32, arena.height() as u32);
        self.textures = Some(Textures {
            tile_base: backend.create_surface(w, h),
            tile_override: backend.create_surface(w, h),
            screen_base: backend.create_surface(width, height),
            screen_override: backend.create_surface(width, height),
        });
        self.arena = Some(arena);
        self.viewport = Some((width, height));
        self.override_computed = false;
        self.allocations += 1;
        tracing::debug!(width, height, tiles_w = w, tiles_h = h, "lighting buffers allocated");
        true
    }

    /// Release the arena and textures. The pipeline returns to its
    /// unallocated state.
    pub fn dispose(&mut self, backend: &mut dyn DrawBackend) {
        if let Some(textures) = self.textures.take() {
            for id in textures.all() {
                backend.dispose_surface(id);
            }
        }
        self.arena = None;
        self.viewport = None;
        self.override_computed = false;
    }

    /// Top-left tile covered by the arena for a camera origin.
    pub fn top_left_tile(&self, camera_origin: Vec2) -> TilePos {
        let ts = self.tile_size as f32;
        let m = self.margin as i32;
        TilePos::new(
            (camera_origin.x / ts).floor() as i32 - m,
            (camera_origin.y / ts).floor() as i32 - m,
        )
    }

    /// Fill both slots from `source` in parallel, one arena row per task.
    /// The override slot is cleared unless `check_override` is set.
    ///
    /// No-op before the first resize.
    pub fn compute_buffers(
        &mut self,
        source: &dyn LightSource,
        camera_origin: Vec2,
        check_override: bool,
    ) {
        let top_left = self.top_left_tile(camera_origin);
        let Some(arena) = self.arena.as_mut() else {
            return;
        };
        let _span = tracing::info_span!("lighting_compute").entered();
        let start = Instant::now();

        let width = arena.width();
        let LightingArena {
            base, overrides, ..
        } = arena;

        let mut fill = || {
            base.par_chunks_mut(width)
                .zip(overrides.par_chunks_mut(width))
                .enumerate()
                .for_each(|(row, (base_row, override_row))| {
                    let y = top_left.y + row as i32;
                    for (col, (b, o)) in base_row.iter_mut().zip(override_row).enumerate() {
                        let x = top_left.x + col as i32;
                        *b = source.color_at(x, y);
                        *o = if check_override {
                            source.dynamic_override_at(x, y, *b)
                        } else {
                            Color::TRANSPARENT
                        };
                    }
                });
        };
        match &self.pool {
            Some(pool) => pool.install(fill),
            None => fill(),
        }

        self.camera_origin = camera_origin;
        self.override_computed = check_override;
        self.last_compute = start.elapsed();
        tracing::trace!(elapsed = ?self.last_compute, check_override, "lighting computed");
    }

    /// Copy the computed slots into the tile-space textures. The override
    /// slot is only copied when it was computed.
    pub fn upload_buffers(&self, backend: &mut dyn DrawBackend) {
        let (Some(arena), Some(textures)) = (&self.arena, self.textures) else {
            return;
        };
        backend.upload(textures.tile_base, arena.base());
        if self.override_computed {
            backend.upload(textures.tile_override, arena.overrides());
        }
    }

    /// Where the tile-space texture lands in screen space: shifted out by the
    /// margin and back by the camera's sub-tile offset.
    pub fn screen_offset(&self, camera_origin: Vec2) -> Vec2 {
        let ts = self.tile_size as f32;
        let m = self.margin as f32;
        Vec2::new(
            -m * ts - camera_origin.x.rem_euclid(ts),
            -m * ts - camera_origin.y.rem_euclid(ts),
        )
    }

    /// Stretch the tile-space textures into the screen-sized ones, aligned
    /// to the camera used by the last compute.
    pub fn transfer_to_screen_space(&self, backend: &mut dyn DrawBackend) {
        let Some(textures) = self.textures else {
            return;
        };
        let offset = self.screen_offset(self.camera_origin);
        let scale = self.tile_size as f32;

        backend.bind_target(RenderTarget::Surface(textures.screen_base));
        backend.clear(Color::TRANSPARENT);
        backend.draw_sprite(textures.tile_base, offset, Color::WHITE, scale);

        if self.override_computed {
            backend.bind_target(RenderTarget::Surface(textures.screen_override));
            backend.clear(Color::TRANSPARENT);
            backend.draw_sprite(textures.tile_override, offset, Color::WHITE, scale);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilecache_render::{DrawCommand, RecordingBackend};

    /// Light encodes the tile position so tests can check the mapping.
    struct CoordLight {
        override_active: bool,
    }

    impl LightSource for CoordLight {
        fn color_at(&self, x: i32, y: i32) -> Color {
            Color::rgb(x.rem_euclid(256) as u8, y.rem_euclid(256) as u8, 7)
        }

        fn dynamic_override_active(&self) -> bool {
            self.override_active
        }

        fn dynamic_override_at(&self, x: i32, _y: i32, base: Color) -> Color {
            if x % 2 == 0 {
                Color::rgb(base.r, 255, 0)
            } else {
                Color::TRANSPARENT
            }
        }
    }

    #[test]
    fn noop_before_resize() {
        let mut backend = RecordingBackend::new(64, 64);
        let mut lighting = LightingPipeline::new(16, 1);
        lighting.compute_buffers(&CoordLight { override_active: false }, Vec2::ZERO, false);
        lighting.upload_buffers(&mut backend);
        lighting.transfer_to_screen_space(&mut backend);
        assert!(backend.commands().is_empty());
        assert!(!lighting.is_allocated());
        assert_eq!(backend.live_surfaces(), 0);
    }

    #[test]
    #[should_panic(expected = "before the first resize")]
    fn screen_textures_require_allocation() {
        LightingPipeline::new(16, 1).screen_textures();
    }

    #[test]
    fn resize_allocates_four_resources() {
        let mut backend = RecordingBackend::new(1280, 720);
        let mut lighting = LightingPipeline::new(16, 1);
        assert!(lighting.resize(&mut backend, 1280, 720));
        assert_eq!(lighting.arena().map(|a| a.dimensions()), Some((82, 47)));
        assert_eq!(backend.live_surfaces(), 4);
        let (tile_base, _) = lighting.tile_textures().unwrap();
        assert_eq!(backend.surface_size(tile_base), Some((82, 47)));
        assert!(!lighting.resize(&mut backend, 1280, 720));
        assert_eq!(lighting.allocations(), 1);
    }

    #[test]
    fn resize_rebuilds_everything_before_next_compute() {
        let mut backend = RecordingBackend::new(1920, 1080);
        let mut lighting = LightingPipeline::new(16, 1);
        lighting.resize(&mut backend, 1280, 720);
        let (old_base, old_override) = lighting.screen_textures();
        let (old_tile_base, old_tile_override) = lighting.tile_textures().unwrap();

        assert!(lighting.resize(&mut backend, 1920, 1080));
        for old in [old_base, old_override, old_tile_base, old_tile_override] {
            assert!(backend.is_disposed(old));
        }
        assert_eq!(backend.live_surfaces(), 4);
        assert_eq!(lighting.arena().map(|a| a.dimensions()), Some((122, 70)));
        let (screen_base, _) = lighting.screen_textures();
        assert_eq!(backend.surface_size(screen_base), Some((1920, 1080)));

        lighting.compute_buffers(&CoordLight { override_active: false }, Vec2::ZERO, false);
        assert_eq!(lighting.arena().map(|a| a.base().len()), Some(122 * 70));
    }

    #[test]
    fn empty_viewport_releases_until_restored() {
        let mut backend = RecordingBackend::new(1280, 720);
        let mut lighting = LightingPipeline::new(16, 1);
        let source = CoordLight { override_active: true };
        lighting.resize(&mut backend, 1280, 720);
        lighting.compute_buffers(&source, Vec2::ZERO, true);

        assert!(lighting.resize(&mut backend, 0, 0));
        assert!(!lighting.is_allocated());
        assert!(!lighting.override_computed());
        assert_eq!(backend.live_surfaces(), 0);
        assert!(!lighting.resize(&mut backend, 1280, 0));

        backend.take_commands();
        lighting.compute_buffers(&source, Vec2::ZERO, true);
        lighting.upload_buffers(&mut backend);
        lighting.transfer_to_screen_space(&mut backend);
        assert!(backend.commands().is_empty());

        assert!(lighting.resize(&mut backend, 1280, 720));
        assert_eq!(lighting.arena().map(|a| a.dimensions()), Some((82, 47)));
        assert_eq!(backend.live_surfaces(), 4);
        assert_eq!(lighting.allocations(), 2);
    }

    #[test]
    fn compute_maps_indices_to_tiles() {
        let mut backend = RecordingBackend::new(64, 64);
        let mut lighting = LightingPipeline::new(16, 1);
        lighting.resize(&mut backend, 64, 32);
        let origin = Vec2::new(40.0, -3.0);
        lighting.compute_buffers(&CoordLight { override_active: false }, origin, false);

        let arena = lighting.arena().unwrap();
        assert_eq!(arena.dimensions(), (6, 4));
        let top_left = lighting.top_left_tile(origin);
        assert_eq!(top_left, TilePos::new(1, -2));
        for (i, c) in arena.base().iter().enumerate() {
            let t = arena.tile_at_index(i, top_left);
            assert_eq!(*c, Color::rgb(t.x.rem_euclid(256) as u8, t.y.rem_euclid(256) as u8, 7));
        }
        assert!(arena.overrides().iter().all(|c| c.is_transparent()));
    }

    #[test]
    fn override_slot_follows_flag() {
        let mut backend = RecordingBackend::new(64, 64);
        let mut lighting = LightingPipeline::new(16, 1);
        lighting.resize(&mut backend, 64, 64);
        let source = CoordLight { override_active: true };
        lighting.compute_buffers(&source, Vec2::ZERO, true);
        assert!(lighting.override_computed());
        let arena = lighting.arena().unwrap();
        // Top-left tile is (-1, -1): odd column, no override.
        assert!(arena.overrides()[0].is_transparent());
        assert_eq!(arena.overrides()[1], Color::rgb(0, 255, 0));

        lighting.upload_buffers(&mut backend);
        let uploads = backend
            .commands()
            .iter()
            .filter(|(_, c)| matches!(c, DrawCommand::Upload(..)))
            .count();
        assert_eq!(uploads, 2);
    }

    #[test]
    fn override_transfer_only_when_computed() {
        let mut backend = RecordingBackend::new(64, 64);
        let mut lighting = LightingPipeline::new(16, 1);
        lighting.resize(&mut backend, 64, 64);
        let (screen_base, screen_override) = lighting.screen_textures();

        lighting.compute_buffers(&CoordLight { override_active: false }, Vec2::ZERO, false);
        lighting.upload_buffers(&mut backend);
        lighting.transfer_to_screen_space(&mut backend);
        assert_eq!(
            backend.commands_for(RenderTarget::Surface(screen_base)).count(),
            2
        );
        assert_eq!(
            backend
                .commands_for(RenderTarget::Surface(screen_override))
                .count(),
            0
        );
    }

    #[test]
    fn transfer_compensates_sub_tile_offset() {
        let mut backend = RecordingBackend::new(64, 64);
        let mut lighting = LightingPipeline::new(16, 1);
        lighting.resize(&mut backend, 64, 64);
        assert_eq!(lighting.screen_offset(Vec2::new(37.0, -5.0)), Vec2::new(-21.0, -27.0));

        let origin = Vec2::new(37.0, 0.0);
        lighting.compute_buffers(&CoordLight { override_active: false }, origin, false);
        lighting.upload_buffers(&mut backend);
        lighting.transfer_to_screen_space(&mut backend);

        // World pixel 48 (tile 3) sits at screen x = 48 - 37 = 11.
        let (screen_base, _) = lighting.screen_textures();
        let target = RenderTarget::Surface(screen_base);
        assert_eq!(backend.pixel(target, 11, 0), Some(Color::rgb(3, 0, 7)));
        assert_eq!(backend.pixel(target, 10, 0), Some(Color::rgb(2, 0, 7)));
    }

    #[test]
    fn dedicated_pool_gives_same_result() {
        let config = CacheConfig {
            worker_threads: 2,
            ..CacheConfig::default()
        };
        let mut backend = RecordingBackend::new(64, 64);
        let mut pooled = LightingPipeline::from_config(&config).unwrap();
        let mut global = LightingPipeline::new(16, 1);
        pooled.resize(&mut backend, 320, 200);
        global.resize(&mut backend, 320, 200);
        let source = CoordLight { override_active: true };
        pooled.compute_buffers(&source, Vec2::new(-100.0, 50.0), true);
        global.compute_buffers(&source, Vec2::new(-100.0, 50.0), true);
        assert_eq!(pooled.arena(), global.arena());
    }
}
