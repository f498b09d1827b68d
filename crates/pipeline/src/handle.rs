use tilecache_chunks::{Invalidation, InvalidationQueue};
use tilecache_render::{DeferredQueue, DrawBackend, ResourceQueue};
use tilecache_world::{TileEvent, VisibilityFlags};

use crate::renderer::TileRenderer;
use crate::targets::TargetId;

/// Cross-thread entry point into a [`TileRenderer`].
///
/// Every method only enqueues; the effect happens during the renderer's next
/// update, in submission order within each queue.
#[derive(Debug, Clone)]
pub struct RendererHandle {
    invalidations: InvalidationQueue,
    requests: DeferredQueue<TileRenderer>,
    resources: ResourceQueue,
}

impl RendererHandle {
    pub(crate) fn new(
        invalidations: InvalidationQueue,
        requests: DeferredQueue<TileRenderer>,
        resources: ResourceQueue,
    ) -> Self {
        Self {
            invalidations,
            requests,
            resources,
        }
    }

    pub fn notify_tile_changed(&self, x: i32, y: i32) {
        self.invalidations.tile_changed(x, y);
    }

    pub fn notify_wall_changed(&self, x: i32, y: i32) {
        self.invalidations.wall_changed(x, y);
    }

    /// Every loaded chunk of every layer is repopulated.
    pub fn notify_visibility_changed(&self, flags: VisibilityFlags) {
        self.invalidations.visibility_changed(flags);
    }

    pub fn notify_event(&self, event: TileEvent) {
        self.invalidations.push(Invalidation::from(event));
    }

    pub fn request_world_unload(&self) {
        self.requests.push(|renderer| renderer.world_unload());
    }

    /// Run `action` with the draw backend on the render thread.
    pub fn run_on_resource_thread(
        &self,
        action: impl FnOnce(&mut (dyn DrawBackend + 'static)) + Send + 'static,
    ) {
        self.resources.push(action);
    }

    /// Run `action` against the renderer itself before its next update.
    pub fn run_on_renderer(&self, action: impl FnOnce(&mut TileRenderer) + Send + 'static) {
        self.requests.push(action);
    }

    pub fn queue_target_action(
        &self,
        id: TargetId,
        action: impl FnOnce(&mut dyn DrawBackend) + Send + 'static,
    ) {
        self.requests
            .push(move |renderer| renderer.queue_target_action(id, action));
    }

    /// Notifications and actions not yet consumed.
    pub fn pending(&self) -> usize {
        self.invalidations.len() + self.requests.len() + self.resources.len()
    }
}
