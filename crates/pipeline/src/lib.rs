//! Per-viewport render context: the owning object that ties the three chunk
//! layers, the lighting pipeline and the cross-thread queues together and
//! drives them through one frame.
//!
//! A frame is `update` (deferred requests, resource actions, invalidations,
//! residency, action targets, lighting compute) followed by the draw phase
//! (lighting upload and transfer, one composited and relit pass per layer in
//! the order walls, non-solid tiles, solid tiles, then overlays).
//!
//! # Invariants
//! - Everything that touches the draw backend runs inside `update`, the draw
//!   phase or `shutdown`, on the thread that owns the renderer.
//! - Other threads only enqueue, through a `RendererHandle`.
//! - Viewport-sized resources are rebuilt together before the next compute.
//! - The wall layer is never relit with the override buffer.
//! - After `shutdown` no surface created by the renderer is alive.

mod debug;
mod handle;
mod renderer;
mod stats;
mod targets;

pub use debug::DebugOverlays;
pub use handle::RendererHandle;
pub use renderer::{RendererError, TileRenderer};
pub use stats::{FrameReport, FrameStats};
pub use targets::{ActionTargets, TargetAction, TargetId};

pub fn crate_info() -> &'static str {
    "tilecache-pipeline v0.1.0"
}
