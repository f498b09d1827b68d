use serde::{Deserialize, Serialize};
use tilecache_common::{Color, TilePos};

use crate::world::VisibilityFlags;

/// Source rectangle of a tile sprite in its texture atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FrameRect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl FrameRect {
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Foreground cell content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Tile {
    pub active: bool,
    pub type_id: u16,
    pub frame: FrameRect,
}

impl Tile {
    pub fn new(type_id: u16) -> Self {
        Self {
            active: true,
            type_id,
            frame: FrameRect::new(0, 0, 16, 16),
        }
    }

    pub fn with_frame(mut self, frame: FrameRect) -> Self {
        self.frame = frame;
        self
    }
}

/// Background cell content. Type 0 means no wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Wall {
    pub type_id: u16,
}

impl Wall {
    pub const NONE: Wall = Wall { type_id: 0 };

    pub fn new(type_id: u16) -> Self {
        Self { type_id }
    }

    pub fn is_empty(&self) -> bool {
        self.type_id == 0
    }
}

/// Read access to the tile grid.
pub trait TileSource {
    fn in_world(&self, x: i32, y: i32) -> bool;

    fn tile_at(&self, x: i32, y: i32) -> Tile;

    fn wall_at(&self, x: i32, y: i32) -> Wall;

    /// Content whose appearance may change frame to frame and so cannot be
    /// baked into a cached surface.
    fn is_possibly_animated(&self, type_id: u16, is_wall: bool) -> bool;

    fn is_solid(&self, type_id: u16) -> bool;

    fn visibility(&self) -> VisibilityFlags {
        VisibilityFlags::empty()
    }

    fn tile(&self, pos: TilePos) -> Tile {
        self.tile_at(pos.x, pos.y)
    }

    fn wall(&self, pos: TilePos) -> Wall {
        self.wall_at(pos.x, pos.y)
    }
}

/// Per-tile light colours. Queried concurrently by the lighting compute.
pub trait LightSource: Sync {
    fn color_at(&self, x: i32, y: i32) -> Color;

    /// Whether any special-sight mode is active for the viewer.
    fn dynamic_override_active(&self) -> bool;

    /// Override colour for a tile, transparent when nothing overrides it.
    fn dynamic_override_at(&self, x: i32, y: i32, base: Color) -> Color;
}
