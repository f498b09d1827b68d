use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tilecache_common::Color;

use crate::lighting::SightModes;

/// Per-type content flags: solidity, animation and special-sight highlights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentRegistry {
    solid: BTreeSet<u16>,
    animated_tiles: BTreeSet<u16>,
    animated_walls: BTreeSet<u16>,
    highlights: BTreeMap<u16, Highlight>,
}

/// Colour a tile type shows under the given sight modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub modes: SightModes,
    pub color: Color,
}

/// Type ids used by [`ContentRegistry::standard`] and world generation.
pub mod ids {
    pub const DIRT: u16 = 1;
    pub const STONE: u16 = 2;
    pub const GRASS_PLANT: u16 = 3;
    pub const TORCH: u16 = 4;
    pub const ORE: u16 = 5;
    pub const CHEST: u16 = 6;

    pub const DIRT_WALL: u16 = 1;
    pub const WATERFALL_WALL: u16 = 2;
}

impl ContentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry matching the types [`crate::TileWorld::generate`] places.
    pub fn standard() -> Self {
        Self::new()
            .with_solid(ids::DIRT)
            .with_solid(ids::STONE)
            .with_solid(ids::ORE)
            .with_animated_tile(ids::TORCH)
            .with_animated_wall(ids::WATERFALL_WALL)
            .with_highlight(ids::ORE, SightModes::DANGER | SightModes::TREASURE, Color::rgb(255, 200, 40))
            .with_highlight(ids::CHEST, SightModes::TREASURE, Color::rgb(255, 230, 120))
    }

    pub fn with_solid(mut self, type_id: u16) -> Self {
        self.solid.insert(type_id);
        self
    }

    pub fn with_animated_tile(mut self, type_id: u16) -> Self {
        self.animated_tiles.insert(type_id);
        self
    }

    pub fn with_animated_wall(mut self, type_id: u16) -> Self {
        self.animated_walls.insert(type_id);
        self
    }

    pub fn with_highlight(mut self, type_id: u16, modes: SightModes, color: Color) -> Self {
        self.highlights.insert(type_id, Highlight { modes, color });
        self
    }

    pub fn is_solid(&self, type_id: u16) -> bool {
        self.solid.contains(&type_id)
    }

    pub fn is_possibly_animated(&self, type_id: u16, is_wall: bool) -> bool {
        if is_wall {
            self.animated_walls.contains(&type_id)
        } else {
            self.animated_tiles.contains(&type_id)
        }
    }

    /// Highlight colour for a tile type if any of `modes` reveals it.
    pub fn highlight(&self, type_id: u16, modes: SightModes) -> Option<Color> {
        self.highlights
            .get(&type_id)
            .filter(|h| h.modes.intersects(modes))
            .map(|h| h.color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn animation_is_tracked_per_kind() {
        let reg = ContentRegistry::new().with_animated_tile(7).with_animated_wall(9);
        assert!(reg.is_possibly_animated(7, false));
        assert!(!reg.is_possibly_animated(7, true));
        assert!(reg.is_possibly_animated(9, true));
        assert!(!reg.is_possibly_animated(9, false));
    }

    #[test]
    fn highlight_requires_matching_mode() {
        let reg = ContentRegistry::standard();
        assert!(reg.highlight(ids::CHEST, SightModes::TREASURE).is_some());
        assert!(reg.highlight(ids::CHEST, SightModes::DANGER).is_none());
        assert!(reg.highlight(ids::ORE, SightModes::DANGER | SightModes::BIOME).is_some());
        assert!(reg.highlight(ids::DIRT, SightModes::all()).is_none());
        assert!(reg.highlight(ids::ORE, SightModes::empty()).is_none());
    }

    #[test]
    fn standard_solidity() {
        let reg = ContentRegistry::standard();
        assert!(reg.is_solid(ids::STONE));
        assert!(!reg.is_solid(ids::TORCH));
        assert!(!reg.is_solid(ids::GRASS_PLANT));
    }
}
