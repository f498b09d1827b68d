use std::time::Instant;

use tilecache_chunks::{CellPainter, ChunkCollection, FlatPainter, InvalidationQueue};
use tilecache_common::{CacheConfig, Camera, Color, ConfigError, LayerKind};
use tilecache_grid::GridIndexer;
use tilecache_lighting::{LightingError, LightingPipeline};
use tilecache_render::{DeferredQueue, DrawBackend, RenderTarget, ResourceQueue, ShaderPass};
use tilecache_world::{LightSource, TileSource};

use crate::debug::{self, DebugOverlays};
use crate::handle::RendererHandle;
use crate::stats::{FrameReport, FrameStats};
use crate::targets::{ActionTargets, TargetId};

#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Lighting(#[from] LightingError),
}

/// Render context for one world shown through one viewport.
///
/// Owns the three chunk layers, the lighting pipeline and the queues other
/// threads feed through a [`RendererHandle`]. A frame is
/// [`update`](Self::update) followed by the draw phase: either
/// [`draw`](Self::draw), or [`prepare_draw`](Self::prepare_draw), one
/// [`draw_layer`](Self::draw_layer) per layer in [`LayerKind::DRAW_ORDER`]
/// and [`finish_draw`](Self::finish_draw).
pub struct TileRenderer {
    config: CacheConfig,
    grid: GridIndexer,
    // Indexed by `layer_index`.
    layers: Vec<ChunkCollection>,
    lighting: LightingPipeline,
    painter: Box<dyn CellPainter>,
    resources: ResourceQueue,
    requests: DeferredQueue<TileRenderer>,
    invalidations: InvalidationQueue,
    debug: DebugOverlays,
    targets: ActionTargets,
    stats: FrameStats,
    camera: Option<Camera>,
    viewport: Option<(u32, u32)>,
    frame: u64,
    report: FrameReport,
    frame_start: Option<Instant>,
}

impl std::fmt::Debug for TileRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileRenderer")
            .field("config", &self.config)
            .field("viewport", &self.viewport)
            .field("frame", &self.frame)
            .field("lighting", &self.lighting)
            .field("debug", &self.debug)
            .finish()
    }
}

fn layer_index(kind: LayerKind) -> usize {
    match kind {
        LayerKind::SolidTiles => 0,
        LayerKind::NonSolidTiles => 1,
        LayerKind::Walls => 2,
    }
}

impl TileRenderer {
    pub fn new(config: CacheConfig) -> Result<Self, RendererError> {
        Self::with_painter(config, FlatPainter)
    }

    pub fn with_painter(
        config: CacheConfig,
        painter: impl CellPainter + 'static,
    ) -> Result<Self, RendererError> {
        config.validate()?;
        let grid = GridIndexer::from_config(&config);
        let layers = [LayerKind::SolidTiles, LayerKind::NonSolidTiles, LayerKind::Walls]
            .into_iter()
            .map(|kind| ChunkCollection::new(kind, grid))
            .collect();
        let lighting = LightingPipeline::from_config(&config)?;
        tracing::info!(
            chunk_size = grid.chunk_size(),
            buffer = config.offscreen_buffer_chunks,
            edge_threshold = config.edge_threshold_tiles,
            "tile renderer created"
        );
        Ok(Self {
            debug: DebugOverlays::from_config(&config.debug),
            config,
            grid,
            layers,
            lighting,
            painter: Box::new(painter),
            resources: ResourceQueue::new(),
            requests: DeferredQueue::new(),
            invalidations: InvalidationQueue::new(),
            targets: ActionTargets::default(),
            stats: FrameStats::default(),
            camera: None,
            viewport: None,
            frame: 0,
            report: FrameReport::default(),
            frame_start: None,
        })
    }

    /// A cloneable, `Send` handle for notifying edits and submitting work
    /// from other threads.
    pub fn handle(&self) -> RendererHandle {
        RendererHandle::new(
            self.invalidations.clone(),
            self.requests.clone(),
            self.resources.clone(),
        )
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn grid(&self) -> &GridIndexer {
        &self.grid
    }

    pub fn layer(&self, kind: LayerKind) -> &ChunkCollection {
        &self.layers[layer_index(kind)]
    }

    pub fn lighting(&self) -> &LightingPipeline {
        &self.lighting
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn viewport(&self) -> Option<(u32, u32)> {
        self.viewport
    }

    pub fn debug(&self) -> &DebugOverlays {
        &self.debug
    }

    pub fn debug_mut(&mut self) -> &mut DebugOverlays {
        &mut self.debug
    }

    pub fn register_target(&mut self, name: impl Into<String>) -> TargetId {
        self.targets.register(name)
    }

    pub fn targets(&self) -> &ActionTargets {
        &self.targets
    }

    /// Queue a draw into a registered target; it runs during the next update.
    pub fn queue_target_action(
        &mut self,
        id: TargetId,
        action: impl FnOnce(&mut dyn DrawBackend) + Send + 'static,
    ) {
        self.targets.queue(id, action);
    }

    /// Update phase: run deferred work, apply pending edits, bring every
    /// layer's resident set in line with `camera` and compute lighting.
    pub fn update<B: DrawBackend + 'static>(
        &mut self,
        backend: &mut B,
        world: &dyn TileSource,
        lights: &dyn LightSource,
        camera: Camera,
    ) -> FrameReport {
        self.frame_start = Some(Instant::now());
        let mut report = FrameReport {
            frame: self.frame,
            ..FrameReport::default()
        };

        {
            let _span = tracing::info_span!("resident_update", frame = self.frame).entered();

            for request in self.requests.take_batch() {
                request(self);
                report.deferred_actions += 1;
            }
            let (width, height) = camera.size();
            self.resize(backend, width, height);
            report.deferred_actions += self.resources.drain(backend);

            let edge = self.config.edge_threshold_tiles as i32;
            report.dirty_marks = self.invalidations.apply(&self.grid, edge, &mut self.layers);

            let range = self
                .grid
                .visible_range(camera.pixel_rect(), self.config.offscreen_buffer_chunks as i32);
            for layer in &mut self.layers {
                layer.update_resident(backend, world, self.painter.as_ref(), range);
                report.add_layer(layer.take_stats(), layer.len());
            }

            report.deferred_actions += self.targets.execute(backend);
        }

        self.lighting
            .compute_buffers(lights, camera.origin, lights.dynamic_override_active());
        report.lighting_compute = self.lighting.last_compute();

        self.camera = Some(camera);
        self.report = report;
        report
    }

    /// Reallocate everything sized by the viewport. Returns false when the
    /// size is unchanged. A zero-area size releases those resources and the
    /// draw phase does nothing until a non-empty size arrives.
    pub fn resize(&mut self, backend: &mut dyn DrawBackend, width: u32, height: u32) -> bool {
        if self.viewport == Some((width, height)) {
            return false;
        }
        self.lighting.resize(backend, width, height);
        for layer in &mut self.layers {
            layer.resize(backend, width, height);
        }
        self.targets.resize(backend, width, height);
        self.viewport = Some((width, height));
        tracing::debug!(width, height, "viewport resized");
        true
    }

    fn has_area(&self) -> bool {
        matches!(self.viewport, Some((w, h)) if w > 0 && h > 0)
    }

    fn frame_camera(&self) -> Camera {
        let Some(camera) = self.camera else {
            panic!("draw phase entered before the first update");
        };
        camera
    }

    /// The lighting pass for one layer. Walls never take the override.
    ///
    /// # Panics
    /// Before the first update, or while the viewport has no area.
    pub fn light_pass(&self, kind: LayerKind) -> ShaderPass {
        let Some(composite) = self.layer(kind).composite_target() else {
            panic!(
                "{} layer has no composite target: drawn before the first update or at zero area",
                kind.name()
            );
        };
        let (base, override_light) = self.lighting.screen_textures();
        let apply = kind.applies_override() && self.lighting.override_computed();
        ShaderPass::light_map(composite, base, override_light, apply)
    }

    /// Upload the computed light and move it into screen space.
    pub fn prepare_draw(&mut self, backend: &mut dyn DrawBackend) {
        self.lighting.upload_buffers(backend);
        self.lighting.transfer_to_screen_space(backend);
    }

    /// Draw one layer to the screen: composite its chunks, relight the
    /// composite, then draw its animated cells on top. Returns the number of
    /// chunks composited.
    ///
    /// # Panics
    /// Before the first update.
    pub fn draw_layer(
        &mut self,
        backend: &mut dyn DrawBackend,
        world: &dyn TileSource,
        kind: LayerKind,
    ) -> usize {
        let camera = self.frame_camera();
        if !self.has_area() {
            return 0;
        }
        let _span = tracing::info_span!("layer_draw", layer = kind.name()).entered();
        let pass = self.light_pass(kind);

        let layer = &self.layers[layer_index(kind)];
        let composited = layer.composite_to_viewport(backend, &camera);
        backend.bind_target(RenderTarget::Screen);
        backend.shader_pass(&pass);
        self.report.animated_draws +=
            layer.draw_animated_overlay(backend, world, self.painter.as_ref(), &camera, self.frame);
        composited
    }

    /// Debug overlays and action targets over the finished layers, then
    /// close the frame.
    pub fn finish_draw(&mut self, backend: &mut dyn DrawBackend) -> FrameReport {
        let camera = self.frame_camera();
        backend.bind_target(RenderTarget::Screen);
        self.targets.draw(backend);
        if self.debug.light_map && self.lighting.is_allocated() {
            let (base, _) = self.lighting.screen_textures();
            debug::draw_light_map(backend, base);
        }
        if self.debug.chunk_borders {
            let solid = &self.layers[layer_index(LayerKind::SolidTiles)];
            debug::draw_chunk_borders(backend, &self.grid, solid.loaded_coords(), &camera);
        }

        let elapsed = self
            .frame_start
            .take()
            .map(|start| start.elapsed())
            .unwrap_or_default();
        let report = self.report;
        self.stats.finish(report, elapsed);
        self.frame += 1;
        report
    }

    /// The whole draw phase onto a cleared screen.
    pub fn draw(&mut self, backend: &mut dyn DrawBackend, world: &dyn TileSource) -> FrameReport {
        self.prepare_draw(backend);
        backend.bind_target(RenderTarget::Screen);
        backend.clear(Color::BLACK);
        for kind in LayerKind::DRAW_ORDER {
            self.draw_layer(backend, world, kind);
        }
        self.finish_draw(backend)
    }

    /// Forget every chunk at once, e.g. when the world is left. The chunk
    /// surfaces are released through the resource queue on the next update;
    /// pending edits for the old world are dropped.
    pub fn world_unload(&mut self) {
        self.invalidations.drain();
        let mut surfaces = Vec::new();
        for layer in &mut self.layers {
            surfaces.extend(layer.detach_all());
        }
        tracing::debug!(chunks = surfaces.len(), "world unloaded");
        self.resources.push(move |backend| {
            for surface in surfaces {
                backend.dispose_surface(surface);
            }
        });
    }

    /// Release every resource this renderer created. Pending requests are
    /// dropped; queued resource actions still run first.
    pub fn shutdown<B: DrawBackend + 'static>(&mut self, backend: &mut B) {
        self.requests.take_batch();
        self.invalidations.drain();
        self.resources.drain(backend);
        for layer in &mut self.layers {
            layer.dispose_all(backend);
        }
        self.lighting.dispose(backend);
        self.targets.dispose(backend);
        self.viewport = None;
        self.camera = None;
        tracing::info!(frames = self.frame, "tile renderer shut down");
    }
}
