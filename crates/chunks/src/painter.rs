use glam::Vec2;
use tilecache_common::{Color, LayerKind, PixelRect, TilePos};
use tilecache_render::DrawBackend;
use tilecache_world::{Tile, TileSource, Wall};

/// Rasterizes single cells. The cache decides when and where; the painter
/// decides what a cell looks like.
///
/// `at` is the top-left pixel of the cell in the currently bound target.
pub trait CellPainter: Send + Sync {
    fn paint_tile(
        &self,
        backend: &mut dyn DrawBackend,
        tile: &Tile,
        pos: TilePos,
        at: Vec2,
        tile_size: i32,
        tint: Color,
    );

    fn paint_wall(
        &self,
        backend: &mut dyn DrawBackend,
        wall: &Wall,
        pos: TilePos,
        at: Vec2,
        tile_size: i32,
        tint: Color,
    );

    /// Draw a cell excluded from the cache. Called every frame.
    #[allow(clippy::too_many_arguments)]
    fn paint_animated(
        &self,
        backend: &mut dyn DrawBackend,
        world: &dyn TileSource,
        layer: LayerKind,
        pos: TilePos,
        at: Vec2,
        tile_size: i32,
        _frame: u64,
    ) {
        if layer.is_wall() {
            let wall = world.wall(pos);
            self.paint_wall(backend, &wall, pos, at, tile_size, Color::WHITE);
        } else {
            let tile = world.tile(pos);
            self.paint_tile(backend, &tile, pos, at, tile_size, Color::WHITE);
        }
    }
}

/// Paints every cell as a flat square coloured by its type id.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatPainter;

impl FlatPainter {
    pub fn tile_color(type_id: u16, variant: u16) -> Color {
        let h = (type_id as u32).wrapping_mul(2_654_435_761);
        let shade = (variant % 3) as u8 * 12;
        Color::rgb(
            (h >> 24) as u8 | 0x40,
            ((h >> 16) as u8 | 0x40).saturating_sub(shade),
            ((h >> 8) as u8 | 0x40).saturating_sub(shade),
        )
    }

    pub fn wall_color(type_id: u16) -> Color {
        Self::tile_color(type_id.wrapping_add(0x100), 0).scaled(0.5)
    }

    fn cell_rect(at: Vec2, tile_size: i32) -> PixelRect {
        PixelRect::new(at.x.floor() as i32, at.y.floor() as i32, tile_size, tile_size)
    }
}

fn tinted(c: Color, tint: Color) -> Color {
    let m = |a: u8, b: u8| ((a as u32 * b as u32) / 255) as u8;
    Color::rgba(m(c.r, tint.r), m(c.g, tint.g), m(c.b, tint.b), m(c.a, tint.a))
}

impl CellPainter for FlatPainter {
    fn paint_tile(
        &self,
        backend: &mut dyn DrawBackend,
        tile: &Tile,
        _pos: TilePos,
        at: Vec2,
        tile_size: i32,
        tint: Color,
    ) {
        let color = Self::tile_color(tile.type_id, tile.frame.x / 18);
        backend.fill_rect(Self::cell_rect(at, tile_size), tinted(color, tint));
    }

    fn paint_wall(
        &self,
        backend: &mut dyn DrawBackend,
        wall: &Wall,
        _pos: TilePos,
        at: Vec2,
        tile_size: i32,
        tint: Color,
    ) {
        backend.fill_rect(
            Self::cell_rect(at, tile_size),
            tinted(Self::wall_color(wall.type_id), tint),
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn paint_animated(
        &self,
        backend: &mut dyn DrawBackend,
        world: &dyn TileSource,
        layer: LayerKind,
        pos: TilePos,
        at: Vec2,
        tile_size: i32,
        frame: u64,
    ) {
        // Slow pulse so animated cells are visibly live.
        let phase = (frame.wrapping_add((pos.x + pos.y) as u64) % 32) as f32 / 31.0;
        let level = (191.0 + 64.0 * phase) as u8;
        let tint = Color::rgb(level, level, level);
        if layer.is_wall() {
            self.paint_wall(backend, &world.wall(pos), pos, at, tile_size, tint);
        } else {
            self.paint_tile(backend, &world.tile(pos), pos, at, tile_size, tint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilecache_render::{RecordingBackend, RenderTarget};

    #[test]
    fn colors_are_opaque_and_distinct() {
        let a = FlatPainter::tile_color(1, 0);
        let b = FlatPainter::tile_color(2, 0);
        assert_eq!(a.a, 255);
        assert_ne!(a, b);
        assert_ne!(FlatPainter::wall_color(1), a);
    }

    #[test]
    fn tile_fills_its_cell() {
        let mut backend = RecordingBackend::new(32, 32);
        FlatPainter.paint_tile(
            &mut backend,
            &Tile::new(3),
            TilePos::new(0, 0),
            Vec2::new(16.0, 0.0),
            16,
            Color::WHITE,
        );
        let expected = FlatPainter::tile_color(3, 0);
        assert_eq!(backend.pixel(RenderTarget::Screen, 16, 0), Some(expected));
        assert_eq!(backend.pixel(RenderTarget::Screen, 31, 15), Some(expected));
        assert_eq!(backend.pixel(RenderTarget::Screen, 15, 0), Some(Color::TRANSPARENT));
    }
}
