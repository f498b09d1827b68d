use glam::Vec2;
use tilecache_common::{Camera, ChunkCoord, Color, DebugConfig, PixelRect};
use tilecache_grid::GridIndexer;
use tilecache_render::{DrawBackend, SurfaceId};

const BORDER_WIDTH: i32 = 2;

/// Runtime debug toggles, seeded from config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugOverlays {
    pub chunk_borders: bool,
    pub light_map: bool,
}

impl DebugOverlays {
    pub fn from_config(config: &DebugConfig) -> Self {
        Self {
            chunk_borders: config.chunk_borders,
            light_map: config.light_map,
        }
    }

    pub fn toggle_chunk_borders(&mut self) -> bool {
        self.chunk_borders = !self.chunk_borders;
        self.chunk_borders
    }

    pub fn toggle_light_map(&mut self) -> bool {
        self.light_map = !self.light_map;
        self.light_map
    }
}

/// Outline each chunk with yellow lines on the bound target. Returns the
/// number of chunks outlined.
pub(crate) fn draw_chunk_borders(
    backend: &mut dyn DrawBackend,
    grid: &GridIndexer,
    chunks: impl Iterator<Item = ChunkCoord>,
    camera: &Camera,
) -> usize {
    let view = camera.pixel_rect();
    let mut drawn = 0;
    for coord in chunks {
        let rect = grid.chunk_rect(coord);
        if !rect.intersects(&view) {
            continue;
        }
        let x = rect.x - view.x;
        let y = rect.y - view.y;
        let (w, h) = (rect.width, rect.height);
        for edge in [
            PixelRect::new(x, y, w, BORDER_WIDTH),
            PixelRect::new(x, y + h - BORDER_WIDTH, w, BORDER_WIDTH),
            PixelRect::new(x, y, BORDER_WIDTH, h),
            PixelRect::new(x + w - BORDER_WIDTH, y, BORDER_WIDTH, h),
        ] {
            backend.fill_rect(edge, Color::YELLOW);
        }
        drawn += 1;
    }
    drawn
}

/// Show the screen-space light texture unmodulated.
pub(crate) fn draw_light_map(backend: &mut dyn DrawBackend, light: SurfaceId) {
    backend.draw_sprite(light, Vec2::ZERO, Color::WHITE, 1.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilecache_render::{RecordingBackend, RenderTarget};

    #[test]
    fn toggles_flip() {
        let mut debug = DebugOverlays::from_config(&DebugConfig {
            chunk_borders: true,
            light_map: false,
        });
        assert!(!debug.toggle_chunk_borders());
        assert!(debug.toggle_light_map());
    }

    #[test]
    fn borders_are_two_pixels_wide() {
        let mut backend = RecordingBackend::new(640, 640);
        let grid = GridIndexer::new(16, 20);
        let camera = Camera::new(Vec2::ZERO, 640, 640);
        let drawn = draw_chunk_borders(
            &mut backend,
            &grid,
            [ChunkCoord::new(0, 0), ChunkCoord::new(9, 9)].into_iter(),
            &camera,
        );
        assert_eq!(drawn, 1);
        let at = |x, y| backend.pixel(RenderTarget::Screen, x, y);
        assert_eq!(at(0, 100), Some(Color::YELLOW));
        assert_eq!(at(1, 100), Some(Color::YELLOW));
        assert_eq!(at(2, 100), Some(Color::TRANSPARENT));
        assert_eq!(at(318, 5), Some(Color::YELLOW));
        assert_eq!(at(100, 319), Some(Color::YELLOW));
        assert_eq!(at(100, 317), Some(Color::TRANSPARENT));
    }
}
