//! wgpu implementation of the tile cache's draw backend.
//!
//! Surfaces are `Rgba8Unorm` textures. Sprites and fills go through one
//! textured-quad pipeline; the light-map pass is a full-screen triangle that
//! reads the layer composite and both screen-space light textures.
//!
//! # Invariants
//! - A surface is never sampled while it is the bound render target.
//! - Drawing from or into a disposed surface panics.
//! - Draw calls are submitted in the order they are issued.

mod gpu;
mod shaders;

pub use gpu::{GpuError, WgpuBackend};

pub fn crate_info() -> &'static str {
    "tilecache-render-wgpu v0.1.0"
}
