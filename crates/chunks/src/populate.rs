use glam::Vec2;
use tilecache_common::{Color, LayerKind, TilePos};
use tilecache_render::DrawBackend;
use tilecache_world::{TileSource, VisibilityFlags};

use crate::painter::CellPainter;

/// How population treats one cell of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellClass {
    /// Nothing to draw for this layer.
    Empty,
    /// Redrawn every frame, never baked into the surface.
    Animated,
    /// Baked into the cached surface.
    Static,
}

/// Per-layer cell selection and draw routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerPopulator {
    Tiles { solid: bool },
    Walls,
}

impl LayerPopulator {
    pub fn for_layer(layer: LayerKind) -> Self {
        match layer {
            LayerKind::Walls => LayerPopulator::Walls,
            LayerKind::NonSolidTiles => LayerPopulator::Tiles { solid: false },
            LayerKind::SolidTiles => LayerPopulator::Tiles { solid: true },
        }
    }

    pub fn classify(&self, world: &dyn TileSource, x: i32, y: i32) -> CellClass {
        match *self {
            LayerPopulator::Tiles { solid } => {
                let tile = world.tile_at(x, y);
                if !tile.active || world.is_solid(tile.type_id) != solid {
                    CellClass::Empty
                } else if world.is_possibly_animated(tile.type_id, false) {
                    CellClass::Animated
                } else {
                    CellClass::Static
                }
            }
            LayerPopulator::Walls => {
                let wall = world.wall_at(x, y);
                if wall.is_empty() {
                    CellClass::Empty
                } else if world.is_possibly_animated(wall.type_id, true) {
                    CellClass::Animated
                } else {
                    CellClass::Static
                }
            }
        }
    }

    /// Tint applied to baked cells under the world's visibility flags, or
    /// `None` when the layer is hidden.
    pub fn visibility_tint(&self, flags: VisibilityFlags) -> Option<Color> {
        let hidden = match self {
            LayerPopulator::Tiles { .. } => flags.contains(VisibilityFlags::INVISIBLE_BLOCKS),
            LayerPopulator::Walls => flags.contains(VisibilityFlags::INVISIBLE_WALLS),
        };
        if hidden {
            None
        } else if flags.contains(VisibilityFlags::ECHO) {
            Some(Color::rgba(255, 255, 255, 128))
        } else {
            Some(Color::WHITE)
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn paint(
        &self,
        painter: &dyn CellPainter,
        backend: &mut dyn DrawBackend,
        world: &dyn TileSource,
        pos: TilePos,
        at: Vec2,
        tile_size: i32,
        tint: Color,
    ) {
        match self {
            LayerPopulator::Tiles { .. } => {
                painter.paint_tile(backend, &world.tile(pos), pos, at, tile_size, tint)
            }
            LayerPopulator::Walls => {
                painter.paint_wall(backend, &world.wall(pos), pos, at, tile_size, tint)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilecache_world::registry::ids;
    use tilecache_world::{ContentRegistry, Tile, TileWorld, Wall};

    fn world() -> TileWorld {
        let mut w = TileWorld::new(8, 8, ContentRegistry::standard());
        w.set_tile(0, 0, Tile::new(ids::STONE));
        w.set_tile(1, 0, Tile::new(ids::GRASS_PLANT));
        w.set_tile(2, 0, Tile::new(ids::TORCH));
        w.set_wall(3, 0, Wall::new(ids::DIRT_WALL));
        w.set_wall(4, 0, Wall::new(ids::WATERFALL_WALL));
        w
    }

    #[test]
    fn solid_and_non_solid_layers_split_tiles() {
        let w = world();
        let solid = LayerPopulator::for_layer(LayerKind::SolidTiles);
        let loose = LayerPopulator::for_layer(LayerKind::NonSolidTiles);
        assert_eq!(solid.classify(&w, 0, 0), CellClass::Static);
        assert_eq!(loose.classify(&w, 0, 0), CellClass::Empty);
        assert_eq!(solid.classify(&w, 1, 0), CellClass::Empty);
        assert_eq!(loose.classify(&w, 1, 0), CellClass::Static);
        assert_eq!(loose.classify(&w, 2, 0), CellClass::Animated);
        assert_eq!(loose.classify(&w, 5, 5), CellClass::Empty);
    }

    #[test]
    fn walls_use_wall_animation_flags() {
        let w = world();
        let walls = LayerPopulator::for_layer(LayerKind::Walls);
        assert_eq!(walls.classify(&w, 3, 0), CellClass::Static);
        assert_eq!(walls.classify(&w, 4, 0), CellClass::Animated);
        assert_eq!(walls.classify(&w, 0, 0), CellClass::Empty);
    }

    #[test]
    fn visibility_hides_matching_layer() {
        let walls = LayerPopulator::Walls;
        let tiles = LayerPopulator::Tiles { solid: true };
        let flags = VisibilityFlags::INVISIBLE_WALLS;
        assert_eq!(walls.visibility_tint(flags), None);
        assert_eq!(tiles.visibility_tint(flags), Some(Color::WHITE));
        assert_eq!(
            tiles.visibility_tint(VisibilityFlags::ECHO).map(|c| c.a),
            Some(128)
        );
    }
}
