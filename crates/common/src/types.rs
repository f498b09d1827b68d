use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Integer grid index of a chunk. One unit equals one chunk edge in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A cell position in the tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// RGBA8 colour, laid out the way GPU textures expect it.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable, Serialize, Deserialize,
)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const YELLOW: Self = Self::rgb(255, 255, 0);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    pub fn is_transparent(self) -> bool {
        self.a == 0
    }

    /// Normalised `[r, g, b, a]` for shader uniforms.
    pub fn to_f32_array(self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }

    /// Scale the colour channels, leaving alpha untouched.
    pub fn scaled(self, factor: f32) -> Self {
        let scale = |c: u8| (c as f32 * factor).round().clamp(0.0, 255.0) as u8;
        Self::rgba(scale(self.r), scale(self.g), scale(self.b), self.a)
    }

    /// Channel-wise saturating add, alpha is the max of both.
    pub fn saturating_add(self, other: Self) -> Self {
        Self::rgba(
            self.r.saturating_add(other.r),
            self.g.saturating_add(other.g),
            self.b.saturating_add(other.b),
            self.a.max(other.a),
        )
    }
}

/// Axis-aligned pixel rectangle, half-open on both axes: `[x, x + width)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// True when the two rectangles share at least one pixel.
    pub fn intersects(&self, other: &PixelRect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

/// The viewport into the world: top-left world pixel (sub-tile precision)
/// and size in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub origin: Vec2,
    pub width: u32,
    pub height: u32,
}

impl Camera {
    pub fn new(origin: Vec2, width: u32, height: u32) -> Self {
        Self {
            origin,
            width,
            height,
        }
    }

    /// Pixel-aligned world rectangle covered by the camera.
    pub fn pixel_rect(&self) -> PixelRect {
        PixelRect::new(
            self.origin.x.floor() as i32,
            self.origin.y.floor() as i32,
            self.width as i32,
            self.height as i32,
        )
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec2::ZERO, 1280, 720)
    }
}

/// The three cached render layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LayerKind {
    Walls,
    NonSolidTiles,
    SolidTiles,
}

impl LayerKind {
    /// Back-to-front order layers are composited in.
    pub const DRAW_ORDER: [LayerKind; 3] = [
        LayerKind::Walls,
        LayerKind::NonSolidTiles,
        LayerKind::SolidTiles,
    ];

    pub fn is_wall(self) -> bool {
        matches!(self, LayerKind::Walls)
    }

    /// Whether the lighting pass blends the override buffer over this layer.
    pub fn applies_override(self) -> bool {
        !self.is_wall()
    }

    pub fn name(self) -> &'static str {
        match self {
            LayerKind::Walls => "walls",
            LayerKind::NonSolidTiles => "non_solid_tiles",
            LayerKind::SolidTiles => "solid_tiles",
        }
    }
}

/// Why a cell was excluded from the static cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimatedKind {
    AnimatedTile,
}

/// A cell redrawn every frame instead of being baked into a chunk surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnimatedCell {
    pub pos: TilePos,
    pub kind: AnimatedKind,
}

impl AnimatedCell {
    pub fn tile(pos: TilePos) -> Self {
        Self {
            pos,
            kind: AnimatedKind::AnimatedTile,
        }
    }
}
