use std::collections::BTreeMap;

use glam::Vec2;
use sha2::{Digest, Sha256};
use tilecache_common::{Color, PixelRect};

use crate::renderer::{DrawBackend, LIGHT_MAP_SHADER, RenderTarget, ShaderPass, SurfaceId};

/// One call made against a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear(Color),
    Sprite {
        source: SurfaceId,
        pos: Vec2,
        tint: Color,
        scale: f32,
    },
    FillRect(PixelRect, Color),
    Upload(SurfaceId, usize),
    ShaderPass(&'static str),
}

#[derive(Debug, Clone, Default)]
struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
}

impl Raster {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::TRANSPARENT; width as usize * height as usize],
        }
    }

    fn get(&self, x: i32, y: i32) -> Option<Color> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(self.pixels[y as usize * self.width as usize + x as usize])
    }

    fn blend_at(&mut self, x: i32, y: i32, src: Color) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let idx = y as usize * self.width as usize + x as usize;
        self.pixels[idx] = blend_over(self.pixels[idx], src);
    }

    fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.width.to_le_bytes());
        hasher.update(self.height.to_le_bytes());
        hasher.update(bytemuck::cast_slice::<Color, u8>(&self.pixels));
        format!("{:x}", hasher.finalize())
    }
}

/// Source-over alpha blending on 8-bit channels.
fn blend_over(dst: Color, src: Color) -> Color {
    match src.a {
        0 => dst,
        255 => src,
        a => {
            let a = a as u32;
            let inv = 255 - a;
            let mix = |s: u8, d: u8| ((s as u32 * a + d as u32 * inv + 127) / 255) as u8;
            Color::rgba(
                mix(src.r, dst.r),
                mix(src.g, dst.g),
                mix(src.b, dst.b),
                src.a.max(dst.a),
            )
        }
    }
}

fn modulate(c: Color, tint: Color) -> Color {
    let m = |a: u8, b: u8| ((a as u32 * b as u32 + 127) / 255) as u8;
    Color::rgba(m(c.r, tint.r), m(c.g, tint.g), m(c.b, tint.b), m(c.a, tint.a))
}

/// Software [`DrawBackend`]: rasterizes into CPU pixel buffers and records
/// every call.
///
/// Used headless and in tests, where surface contents are compared through
/// SHA-256 hashes.
#[derive(Debug)]
pub struct RecordingBackend {
    screen: Raster,
    surfaces: BTreeMap<SurfaceId, Raster>,
    next_id: u32,
    bound: RenderTarget,
    log: Vec<(RenderTarget, DrawCommand)>,
    created: usize,
    disposed: usize,
}

impl RecordingBackend {
    pub fn new(screen_width: u32, screen_height: u32) -> Self {
        Self {
            screen: Raster::new(screen_width, screen_height),
            surfaces: BTreeMap::new(),
            next_id: 1,
            bound: RenderTarget::Screen,
            log: Vec::new(),
            created: 0,
            disposed: 0,
        }
    }

    pub fn resize_screen(&mut self, width: u32, height: u32) {
        self.screen = Raster::new(width, height);
    }

    pub fn bound_target(&self) -> RenderTarget {
        self.bound
    }

    /// Number of surfaces currently allocated.
    pub fn live_surfaces(&self) -> usize {
        self.surfaces.len()
    }

    pub fn surfaces_created(&self) -> usize {
        self.created
    }

    pub fn surfaces_disposed(&self) -> usize {
        self.disposed
    }

    pub fn commands(&self) -> &[(RenderTarget, DrawCommand)] {
        &self.log
    }

    pub fn take_commands(&mut self) -> Vec<(RenderTarget, DrawCommand)> {
        std::mem::take(&mut self.log)
    }

    /// Commands recorded against one target.
    pub fn commands_for(&self, target: RenderTarget) -> impl Iterator<Item = &DrawCommand> {
        self.log
            .iter()
            .filter(move |(t, _)| *t == target)
            .map(|(_, c)| c)
    }

    /// Hex SHA-256 of a live surface's pixels.
    pub fn content_hash(&self, id: SurfaceId) -> Option<String> {
        self.surfaces.get(&id).map(Raster::hash)
    }

    pub fn screen_hash(&self) -> String {
        self.screen.hash()
    }

    pub fn pixel(&self, target: RenderTarget, x: i32, y: i32) -> Option<Color> {
        match target {
            RenderTarget::Screen => self.screen.get(x, y),
            RenderTarget::Surface(id) => self.surfaces.get(&id)?.get(x, y),
        }
    }

    fn record(&mut self, command: DrawCommand) {
        self.log.push((self.bound, command));
    }

    /// Run `f` against the bound raster with read access to every other
    /// surface.
    fn with_bound<R>(&mut self, f: impl FnOnce(&mut Raster, &BTreeMap<SurfaceId, Raster>) -> R) -> R {
        match self.bound {
            RenderTarget::Screen => f(&mut self.screen, &self.surfaces),
            RenderTarget::Surface(id) => {
                let Some(mut raster) = self.surfaces.remove(&id) else {
                    panic!("render target {id:?} is disposed");
                };
                let out = f(&mut raster, &self.surfaces);
                self.surfaces.insert(id, raster);
                out
            }
        }
    }

    fn light_map(target: &mut Raster, surfaces: &BTreeMap<SurfaceId, Raster>, pass: &ShaderPass) {
        let input = |name: &str| {
            let id = pass
                .texture_named(name)
                .unwrap_or_else(|| panic!("light_map pass is missing texture `{name}`"));
            surfaces
                .get(&id)
                .unwrap_or_else(|| panic!("light_map input `{name}` ({id:?}) is disposed"))
        };
        let layer = input("layer");
        let base = input("base");
        let overlay = input("override");
        let apply_override = pass.param_named("apply_override").unwrap_or(0.0) > 0.5;

        for y in 0..target.height as i32 {
            for x in 0..target.width as i32 {
                let Some(c) = layer.get(x, y).filter(|c| !c.is_transparent()) else {
                    continue;
                };
                let light = base.get(x, y).unwrap_or(Color::BLACK);
                let mut lit = modulate(c, Color::rgba(light.r, light.g, light.b, 255));
                if apply_override {
                    if let Some(o) = overlay.get(x, y).filter(|o| !o.is_transparent()) {
                        lit = Color::rgba(lit.r.max(o.r), lit.g.max(o.g), lit.b.max(o.b), lit.a);
                    }
                }
                target.blend_at(x, y, lit);
            }
        }
    }
}

impl DrawBackend for RecordingBackend {
    fn create_surface(&mut self, width: u32, height: u32) -> SurfaceId {
        let id = SurfaceId(self.next_id);
        self.next_id += 1;
        self.surfaces.insert(id, Raster::new(width, height));
        self.created += 1;
        tracing::trace!(?id, width, height, "surface created");
        id
    }

    fn dispose_surface(&mut self, id: SurfaceId) {
        if self.surfaces.remove(&id).is_some() {
            self.disposed += 1;
            tracing::trace!(?id, "surface disposed");
        }
        if self.bound == RenderTarget::Surface(id) {
            self.bound = RenderTarget::Screen;
        }
    }

    fn is_disposed(&self, id: SurfaceId) -> bool {
        !self.surfaces.contains_key(&id)
    }

    fn surface_size(&self, id: SurfaceId) -> Option<(u32, u32)> {
        self.surfaces.get(&id).map(|r| (r.width, r.height))
    }

    fn bind_target(&mut self, target: RenderTarget) {
        if let RenderTarget::Surface(id) = target {
            assert!(!self.is_disposed(id), "cannot bind disposed surface {id:?}");
        }
        self.bound = target;
    }

    fn clear(&mut self, color: Color) {
        self.record(DrawCommand::Clear(color));
        self.with_bound(|target, _| target.pixels.fill(color));
    }

    fn draw_sprite(&mut self, source: SurfaceId, pos: Vec2, tint: Color, scale: f32) {
        assert!(
            self.bound != RenderTarget::Surface(source),
            "surface {source:?} drawn into itself"
        );
        assert!(!self.is_disposed(source), "sprite source {source:?} is disposed");
        assert!(scale > 0.0, "sprite scale must be positive");
        self.record(DrawCommand::Sprite {
            source,
            pos,
            tint,
            scale,
        });

        self.with_bound(|target, surfaces| {
            let Some(src) = surfaces.get(&source) else {
                return;
            };
            let x0 = pos.x.floor() as i32;
            let y0 = pos.y.floor() as i32;
            let w = (src.width as f32 * scale).round() as i32;
            let h = (src.height as f32 * scale).round() as i32;

            let min_x = x0.max(0);
            let min_y = y0.max(0);
            let max_x = (x0 + w).min(target.width as i32);
            let max_y = (y0 + h).min(target.height as i32);

            for dy in min_y..max_y {
                let sy = ((dy - y0) as f32 / scale) as i32;
                for dx in min_x..max_x {
                    let sx = ((dx - x0) as f32 / scale) as i32;
                    if let Some(c) = src.get(sx, sy) {
                        target.blend_at(dx, dy, modulate(c, tint));
                    }
                }
            }
        });
    }

    fn fill_rect(&mut self, rect: PixelRect, color: Color) {
        self.record(DrawCommand::FillRect(rect, color));
        self.with_bound(|target, _| {
            for y in rect.y.max(0)..rect.bottom().min(target.height as i32) {
                for x in rect.x.max(0)..rect.right().min(target.width as i32) {
                    target.blend_at(x, y, color);
                }
            }
        });
    }

    fn upload(&mut self, id: SurfaceId, texels: &[Color]) {
        let Some(raster) = self.surfaces.get_mut(&id) else {
            panic!("upload into disposed surface {id:?}");
        };
        assert_eq!(
            texels.len(),
            raster.pixels.len(),
            "upload size does not match surface {id:?}"
        );
        raster.pixels.copy_from_slice(texels);
        self.log
            .push((RenderTarget::Surface(id), DrawCommand::Upload(id, texels.len())));
    }

    fn shader_pass(&mut self, pass: &ShaderPass) {
        self.record(DrawCommand::ShaderPass(pass.shader));
        match pass.shader {
            LIGHT_MAP_SHADER => self.with_bound(|target, surfaces| Self::light_map(target, surfaces, pass)),
            other => panic!("unknown shader `{other}`"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_and_hash_are_deterministic() {
        let mut a = RecordingBackend::new(8, 8);
        let mut b = RecordingBackend::new(8, 8);
        for backend in [&mut a, &mut b] {
            let s = backend.create_surface(4, 4);
            backend.bind_target(RenderTarget::Surface(s));
            backend.fill_rect(PixelRect::new(1, 1, 2, 2), Color::WHITE);
        }
        assert_eq!(a.content_hash(SurfaceId(1)), b.content_hash(SurfaceId(1)));
        assert_eq!(
            a.pixel(RenderTarget::Surface(SurfaceId(1)), 1, 1),
            Some(Color::WHITE)
        );
        assert_eq!(
            a.pixel(RenderTarget::Surface(SurfaceId(1)), 0, 0),
            Some(Color::TRANSPARENT)
        );
    }

    #[test]
    fn sprite_scales_with_nearest_sampling() {
        let mut backend = RecordingBackend::new(8, 8);
        let src = backend.create_surface(2, 1);
        backend.upload(src, &[Color::rgb(10, 0, 0), Color::rgb(0, 20, 0)]);
        backend.bind_target(RenderTarget::Screen);
        backend.draw_sprite(src, Vec2::new(-1.0, 0.0), Color::WHITE, 4.0);

        // Texel 0 spans x in [-1, 3), texel 1 spans [3, 7).
        assert_eq!(backend.pixel(RenderTarget::Screen, 0, 0), Some(Color::rgb(10, 0, 0)));
        assert_eq!(backend.pixel(RenderTarget::Screen, 2, 3), Some(Color::rgb(10, 0, 0)));
        assert_eq!(backend.pixel(RenderTarget::Screen, 3, 0), Some(Color::rgb(0, 20, 0)));
        assert_eq!(backend.pixel(RenderTarget::Screen, 7, 0), Some(Color::TRANSPARENT));
        assert_eq!(backend.pixel(RenderTarget::Screen, 0, 4), Some(Color::TRANSPARENT));
    }

    #[test]
    fn light_map_multiplies_and_overrides() {
        let mut backend = RecordingBackend::new(2, 1);
        let layer = backend.create_surface(2, 1);
        let base = backend.create_surface(2, 1);
        let overlay = backend.create_surface(2, 1);
        backend.upload(layer, &[Color::rgb(200, 200, 200), Color::rgb(200, 200, 200)]);
        backend.upload(base, &[Color::rgb(255, 0, 128), Color::rgb(255, 0, 128)]);
        backend.upload(overlay, &[Color::TRANSPARENT, Color::rgb(0, 250, 0)]);

        backend.bind_target(RenderTarget::Screen);
        backend.shader_pass(&ShaderPass::light_map(layer, base, overlay, false));
        assert_eq!(backend.pixel(RenderTarget::Screen, 1, 0), Some(Color::rgb(200, 0, 100)));

        backend.shader_pass(&ShaderPass::light_map(layer, base, overlay, true));
        assert_eq!(backend.pixel(RenderTarget::Screen, 0, 0), Some(Color::rgb(200, 0, 100)));
        assert_eq!(backend.pixel(RenderTarget::Screen, 1, 0), Some(Color::rgb(200, 250, 100)));
    }

    #[test]
    fn dispose_tracks_counts() {
        let mut backend = RecordingBackend::new(4, 4);
        let s = backend.create_surface(4, 4);
        assert!(!backend.is_disposed(s));
        backend.dispose_surface(s);
        backend.dispose_surface(s);
        assert!(backend.is_disposed(s));
        assert_eq!(backend.surfaces_created(), 1);
        assert_eq!(backend.surfaces_disposed(), 1);
        assert_eq!(backend.live_surfaces(), 0);
    }

    #[test]
    #[should_panic(expected = "disposed")]
    fn drawing_a_disposed_surface_panics() {
        let mut backend = RecordingBackend::new(4, 4);
        let s = backend.create_surface(4, 4);
        backend.dispose_surface(s);
        backend.draw_sprite(s, Vec2::ZERO, Color::WHITE, 1.0);
    }

    #[test]
    fn commands_are_attributed_to_bound_target() {
        let mut backend = RecordingBackend::new(4, 4);
        let s = backend.create_surface(4, 4);
        backend.bind_target(RenderTarget::Surface(s));
        backend.clear(Color::TRANSPARENT);
        backend.bind_target(RenderTarget::Screen);
        backend.fill_rect(PixelRect::new(0, 0, 1, 1), Color::YELLOW);

        assert_eq!(backend.commands_for(RenderTarget::Surface(s)).count(), 1);
        assert_eq!(backend.commands_for(RenderTarget::Screen).count(), 1);
        assert_eq!(backend.take_commands().len(), 2);
        assert!(backend.commands().is_empty());
    }
}
