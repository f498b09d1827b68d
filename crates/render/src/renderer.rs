use glam::Vec2;
use tilecache_common::{Color, PixelRect};

/// Handle to an offscreen surface owned by a [`DrawBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u32);

/// Where draw calls land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    Screen,
    Surface(SurfaceId),
}

/// Shader used by the per-layer lighting pass.
pub const LIGHT_MAP_SHADER: &str = "light_map";

/// A full-screen shader pass over the bound target, with named texture and
/// scalar parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderPass {
    pub shader: &'static str,
    pub textures: Vec<(&'static str, SurfaceId)>,
    pub params: Vec<(&'static str, f32)>,
}

impl ShaderPass {
    pub fn new(shader: &'static str) -> Self {
        Self {
            shader,
            textures: Vec::new(),
            params: Vec::new(),
        }
    }

    pub fn texture(mut self, name: &'static str, id: SurfaceId) -> Self {
        self.textures.push((name, id));
        self
    }

    pub fn param(mut self, name: &'static str, value: f32) -> Self {
        self.params.push((name, value));
        self
    }

    /// Relight a layer composite: `layer * base`, then the override buffer
    /// on top when `apply_override` is set.
    pub fn light_map(
        layer: SurfaceId,
        base: SurfaceId,
        override_light: SurfaceId,
        apply_override: bool,
    ) -> Self {
        Self::new(LIGHT_MAP_SHADER)
            .texture("layer", layer)
            .texture("base", base)
            .texture("override", override_light)
            .param("apply_override", if apply_override { 1.0 } else { 0.0 })
    }

    pub fn texture_named(&self, name: &str) -> Option<SurfaceId> {
        self.textures
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, id)| *id)
    }

    pub fn param_named(&self, name: &str) -> Option<f32> {
        self.params
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }
}

/// Renderer-agnostic drawing interface. Every method runs on the render
/// thread.
///
/// Drawing into or from a disposed surface is an invariant violation and
/// implementations panic.
pub trait DrawBackend {
    /// Allocate a transparent offscreen surface.
    fn create_surface(&mut self, width: u32, height: u32) -> SurfaceId;

    fn dispose_surface(&mut self, id: SurfaceId);

    /// True once disposed, and for ids this backend never handed out.
    fn is_disposed(&self, id: SurfaceId) -> bool;

    fn surface_size(&self, id: SurfaceId) -> Option<(u32, u32)>;

    fn bind_target(&mut self, target: RenderTarget);

    fn clear(&mut self, color: Color);

    /// Draw a surface with its top-left at `pos`, modulated by `tint` and
    /// scaled uniformly.
    fn draw_sprite(&mut self, source: SurfaceId, pos: Vec2, tint: Color, scale: f32);

    fn fill_rect(&mut self, rect: PixelRect, color: Color);

    /// Replace a surface's texels, row-major. `texels.len()` must equal the
    /// surface area.
    fn upload(&mut self, id: SurfaceId, texels: &[Color]);

    fn shader_pass(&mut self, pass: &ShaderPass);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn light_map_pass_names_its_inputs() {
        let pass = ShaderPass::light_map(SurfaceId(1), SurfaceId(2), SurfaceId(3), false);
        assert_eq!(pass.shader, LIGHT_MAP_SHADER);
        assert_eq!(pass.texture_named("layer"), Some(SurfaceId(1)));
        assert_eq!(pass.texture_named("override"), Some(SurfaceId(3)));
        assert_eq!(pass.param_named("apply_override"), Some(0.0));
        assert_eq!(pass.texture_named("missing"), None);
    }
}
