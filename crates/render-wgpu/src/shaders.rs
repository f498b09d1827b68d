/// WGSL shader for textured, tinted quads in target pixel space. Fills use
/// the same pipeline with a 1x1 white texture.
pub const QUAD_WGSL: &str = r#"
struct Quad {
    // x, y, width, height in target pixels
    rect: vec4<f32>,
    target_size: vec4<f32>,
    tint: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> quad: Quad;
@group(0) @binding(1)
var source: texture_2d<f32>;
@group(0) @binding(2)
var source_sampler: sampler;

struct QuadOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_quad(@builtin(vertex_index) index: u32) -> QuadOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(0.0, 0.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(0.0, 1.0),
        vec2<f32>(0.0, 1.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(1.0, 1.0),
    );
    let corner = corners[index];
    let px = quad.rect.xy + corner * quad.rect.zw;
    let ndc = vec2<f32>(
        px.x / quad.target_size.x * 2.0 - 1.0,
        1.0 - px.y / quad.target_size.y * 2.0,
    );

    var out: QuadOutput;
    out.clip_position = vec4<f32>(ndc, 0.0, 1.0);
    out.uv = corner;
    return out;
}

@fragment
fn fs_quad(in: QuadOutput) -> @location(0) vec4<f32> {
    return textureSample(source, source_sampler, in.uv) * quad.tint;
}
"#;

/// WGSL shader relighting a layer composite: `layer * base`, then the
/// override light on top where it is set and enabled. Transparent layer
/// pixels are left untouched.
pub const LIGHT_MAP_WGSL: &str = r#"
struct LightParams {
    apply_override: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};

@group(0) @binding(0)
var<uniform> params: LightParams;
@group(0) @binding(1)
var layer_tex: texture_2d<f32>;
@group(0) @binding(2)
var base_tex: texture_2d<f32>;
@group(0) @binding(3)
var override_tex: texture_2d<f32>;

@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(3.0, -1.0),
        vec2<f32>(-1.0, 3.0),
    );
    return vec4<f32>(positions[index], 0.0, 1.0);
}

@fragment
fn fs_light_map(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
    let texel = vec2<i32>(position.xy);
    let layer = textureLoad(layer_tex, texel, 0);
    let base = textureLoad(base_tex, texel, 0);
    let over = textureLoad(override_tex, texel, 0);
    if (layer.a == 0.0) {
        discard;
    }
    var lit = vec4<f32>(layer.rgb * base.rgb, layer.a);
    if (params.apply_override > 0.5 && over.a > 0.0) {
        lit = vec4<f32>(max(lit.rgb, over.rgb), lit.a);
    }
    return lit;
}
"#;
