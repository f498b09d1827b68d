use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tilecache_common::{Color, TilePos};

use crate::source::{LightSource, TileSource};
use crate::world::TileWorld;

bitflags! {
    /// Special-sight modes of the viewer. Any active mode turns on the
    /// override lighting buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SightModes: u8 {
        const DANGER = 1 << 0;
        const TREASURE = 1 << 1;
        const BIOME = 1 << 2;
    }
}

/// A radial light with linear falloff, measured in tiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    pub pos: TilePos,
    pub color: Color,
    pub radius: f32,
}

/// Ambient light plus point lights, and the viewer's sight modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightField {
    pub ambient: Color,
    pub lights: Vec<PointLight>,
    pub sight: SightModes,
}

impl Default for LightField {
    fn default() -> Self {
        Self {
            ambient: Color::rgb(40, 40, 48),
            lights: Vec::new(),
            sight: SightModes::empty(),
        }
    }
}

impl LightField {
    pub fn add_light(&mut self, pos: TilePos, color: Color, radius: f32) {
        self.lights.push(PointLight { pos, color, radius });
    }

    /// Ambient plus every light in range, saturating per channel.
    pub fn sample(&self, x: i32, y: i32) -> Color {
        self.lights.iter().fold(self.ambient, |acc, light| {
            let dx = (x - light.pos.x) as f32;
            let dy = (y - light.pos.y) as f32;
            let dist = (dx * dx + dy * dy).sqrt();
            if dist >= light.radius {
                acc
            } else {
                acc.saturating_add(light.color.scaled(1.0 - dist / light.radius))
            }
        })
    }
}

/// A [`LightSource`] reading light from a field and highlight content from a
/// world.
#[derive(Debug, Clone, Copy)]
pub struct WorldLighting<'a> {
    pub world: &'a TileWorld,
    pub field: &'a LightField,
}

impl<'a> WorldLighting<'a> {
    pub fn new(world: &'a TileWorld, field: &'a LightField) -> Self {
        Self { world, field }
    }
}

impl LightSource for WorldLighting<'_> {
    fn color_at(&self, x: i32, y: i32) -> Color {
        if !self.world.in_world(x, y) {
            return Color::BLACK;
        }
        self.field.sample(x, y)
    }

    fn dynamic_override_active(&self) -> bool {
        !self.field.sight.is_empty()
    }

    fn dynamic_override_at(&self, x: i32, y: i32, base: Color) -> Color {
        let tile = self.world.tile_at(x, y);
        if !tile.active {
            return Color::TRANSPARENT;
        }
        match self.world.registry().highlight(tile.type_id, self.field.sight) {
            // Never darker than what the tile already receives.
            Some(color) => Color::rgba(
                color.r.max(base.r),
                color.g.max(base.g),
                color.b.max(base.b),
                255,
            ),
            None => Color::TRANSPARENT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ids, ContentRegistry};
    use crate::source::Tile;

    fn small_world() -> TileWorld {
        let mut world = TileWorld::new(16, 16, ContentRegistry::standard());
        world.set_tile(3, 3, Tile::new(ids::ORE));
        world.set_tile(4, 3, Tile::new(ids::DIRT));
        world
    }

    #[test]
    fn point_light_falls_off() {
        let mut field = LightField {
            ambient: Color::BLACK,
            ..LightField::default()
        };
        field.add_light(TilePos::new(0, 0), Color::rgb(200, 100, 0), 4.0);
        assert_eq!(field.sample(0, 0), Color::rgb(200, 100, 0));
        assert_eq!(field.sample(2, 0), Color::rgb(100, 50, 0));
        assert_eq!(field.sample(4, 0), Color::BLACK);
    }

    #[test]
    fn outside_world_is_black() {
        let world = small_world();
        let field = LightField::default();
        let lighting = WorldLighting::new(&world, &field);
        assert_eq!(lighting.color_at(-1, 0), Color::BLACK);
        assert_eq!(lighting.color_at(0, 0), field.ambient);
    }

    #[test]
    fn override_follows_sight_modes() {
        let world = small_world();
        let mut field = LightField::default();
        let lighting = WorldLighting::new(&world, &field);
        assert!(!lighting.dynamic_override_active());

        field.sight = SightModes::DANGER;
        let lighting = WorldLighting::new(&world, &field);
        assert!(lighting.dynamic_override_active());
        let base = lighting.color_at(3, 3);
        assert_eq!(lighting.dynamic_override_at(3, 3, base), Color::rgb(255, 200, 48));
        assert_eq!(lighting.dynamic_override_at(4, 3, base), Color::TRANSPARENT);
        assert_eq!(lighting.dynamic_override_at(5, 5, base), Color::TRANSPARENT);
    }
}
