//! Draw backend interface for the tile cache, a software backend and the
//! deferred-action queue that marshals work onto the render thread.
//!
//! # Invariants
//! - Surfaces are created, bound, drawn and disposed only on the render
//!   thread; other threads go through a `DeferredQueue`.
//! - Drawing into or from a disposed surface panics.
//! - `RecordingBackend` output depends only on the calls made, so equal call
//!   sequences give equal content hashes.

mod queue;
mod recording;
mod renderer;

pub use queue::{Action, DeferredQueue};
pub use recording::{DrawCommand, RecordingBackend};
pub use renderer::{DrawBackend, LIGHT_MAP_SHADER, RenderTarget, ShaderPass, SurfaceId};

/// Actions that need the draw backend, run once per frame on the render
/// thread.
pub type ResourceQueue = DeferredQueue<dyn DrawBackend>;

pub fn crate_info() -> &'static str {
    "tilecache-render v0.1.0"
}
