use glam::Vec2;
use tilecache_common::Color;
use tilecache_render::{DrawBackend, RenderTarget, SurfaceId};

/// A draw action run against a target during the update phase.
pub type TargetAction = Box<dyn FnOnce(&mut dyn DrawBackend) + Send>;

/// Index of a registered target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(usize);

struct ActionTarget {
    name: String,
    surface: Option<SurfaceId>,
    pending: Vec<TargetAction>,
}

/// Named screen-sized targets that collect draw actions during update and
/// are drawn over the frame afterwards.
///
/// A target is cleared and redrawn only in frames that queued actions for
/// it; otherwise it keeps its last content.
#[derive(Default)]
pub struct ActionTargets {
    targets: Vec<ActionTarget>,
    size: Option<(u32, u32)>,
}

impl std::fmt::Debug for ActionTargets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionTargets")
            .field("names", &self.targets.iter().map(|t| &t.name).collect::<Vec<_>>())
            .field("size", &self.size)
            .finish()
    }
}

impl ActionTargets {
    pub fn register(&mut self, name: impl Into<String>) -> TargetId {
        self.targets.push(ActionTarget {
            name: name.into(),
            surface: None,
            pending: Vec::new(),
        });
        TargetId(self.targets.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<TargetId> {
        self.targets.iter().position(|t| t.name == name).map(TargetId)
    }

    pub fn surface(&self, id: TargetId) -> Option<SurfaceId> {
        self.targets.get(id.0).and_then(|t| t.surface)
    }

    /// Queue an action for the next update. Unknown ids are ignored.
    pub fn queue(&mut self, id: TargetId, action: impl FnOnce(&mut dyn DrawBackend) + Send + 'static) {
        if let Some(target) = self.targets.get_mut(id.0) {
            target.pending.push(Box::new(action));
        }
    }

    /// Recreate every surface at the new size. At zero area the surfaces are
    /// released and queued actions wait for a usable size.
    pub fn resize(&mut self, backend: &mut dyn DrawBackend, width: u32, height: u32) {
        let usable = width > 0 && height > 0;
        self.size = usable.then_some((width, height));
        for target in &mut self.targets {
            if let Some(old) = target.surface.take() {
                backend.dispose_surface(old);
            }
            if usable {
                target.surface = Some(backend.create_surface(width, height));
            }
        }
    }

    /// Run queued actions into their targets. Returns how many ran.
    pub fn execute(&mut self, backend: &mut dyn DrawBackend) -> usize {
        let Some((width, height)) = self.size else {
            return 0;
        };
        let mut ran = 0;
        for target in &mut self.targets {
            if target.pending.is_empty() {
                continue;
            }
            let surface = *target
                .surface
                .get_or_insert_with(|| backend.create_surface(width, height));
            backend.bind_target(RenderTarget::Surface(surface));
            backend.clear(Color::TRANSPARENT);
            for action in target.pending.drain(..) {
                action(&mut *backend);
                ran += 1;
            }
        }
        ran
    }

    /// Draw every target over the bound target, in registration order.
    pub fn draw(&self, backend: &mut dyn DrawBackend) {
        for surface in self.targets.iter().filter_map(|t| t.surface) {
            backend.draw_sprite(surface, Vec2::ZERO, Color::WHITE, 1.0);
        }
    }

    pub fn dispose(&mut self, backend: &mut dyn DrawBackend) {
        for target in &mut self.targets {
            if let Some(surface) = target.surface.take() {
                backend.dispose_surface(surface);
            }
            target.pending.clear();
        }
        self.size = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilecache_common::PixelRect;
    use tilecache_render::RecordingBackend;

    #[test]
    fn actions_run_into_their_target() {
        let mut backend = RecordingBackend::new(32, 32);
        let mut targets = ActionTargets::default();
        let id = targets.register("markers");
        targets.resize(&mut backend, 32, 32);
        targets.queue(id, |b| b.fill_rect(PixelRect::new(0, 0, 4, 4), Color::YELLOW));

        assert_eq!(targets.execute(&mut backend), 1);
        let surface = targets.surface(id).unwrap();
        assert_eq!(backend.pixel(RenderTarget::Surface(surface), 1, 1), Some(Color::YELLOW));

        backend.bind_target(RenderTarget::Screen);
        targets.draw(&mut backend);
        assert_eq!(backend.pixel(RenderTarget::Screen, 1, 1), Some(Color::YELLOW));
        assert_eq!(targets.execute(&mut backend), 0);
    }

    #[test]
    fn resize_recreates_surfaces() {
        let mut backend = RecordingBackend::new(32, 32);
        let mut targets = ActionTargets::default();
        let id = targets.register("a");
        targets.register("b");
        targets.resize(&mut backend, 32, 32);
        let old = targets.surface(id).unwrap();
        targets.resize(&mut backend, 64, 48);
        assert!(backend.is_disposed(old));
        assert_eq!(backend.surface_size(targets.surface(id).unwrap()), Some((64, 48)));
        assert_eq!(backend.live_surfaces(), 2);
        assert_eq!(targets.find("b"), Some(TargetId(1)));

        targets.dispose(&mut backend);
        assert_eq!(backend.live_surfaces(), 0);
    }

    #[test]
    fn actions_wait_out_an_empty_viewport() {
        let mut backend = RecordingBackend::new(32, 32);
        let mut targets = ActionTargets::default();
        let id = targets.register("markers");
        targets.resize(&mut backend, 32, 32);
        targets.resize(&mut backend, 0, 0);
        assert_eq!(targets.surface(id), None);
        assert_eq!(backend.live_surfaces(), 0);

        targets.queue(id, |b| b.fill_rect(PixelRect::new(0, 0, 4, 4), Color::YELLOW));
        assert_eq!(targets.execute(&mut backend), 0);

        targets.resize(&mut backend, 32, 32);
        assert_eq!(targets.execute(&mut backend), 1);
        let surface = targets.surface(id).unwrap();
        assert_eq!(backend.pixel(RenderTarget::Surface(surface), 1, 1), Some(Color::YELLOW));
    }
}
