//! World data consumed by the tile cache: tiles, walls, content flags, edit
//! events and lighting.
//!
//! # Invariants
//! - Every mutation of a `TileWorld` goes through an explicit operation and
//!   produces a `TileEvent` when it changes something.
//! - Reads outside the world return empty cells, never panic.
//! - Light sources are `Sync`; the lighting compute reads them from many
//!   workers at once.

pub mod lighting;
pub mod registry;
pub mod source;
pub mod world;

pub use lighting::{LightField, PointLight, SightModes, WorldLighting};
pub use registry::ContentRegistry;
pub use source::{FrameRect, LightSource, Tile, TileSource, Wall};
pub use world::{TileEvent, TileWorld, VisibilityFlags};

pub fn crate_info() -> &'static str {
    "tilecache-world v0.1.0"
}
