use std::collections::BTreeMap;

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use tilecache_common::{Color, PixelRect};
use tilecache_render::{DrawBackend, LIGHT_MAP_SHADER, RenderTarget, ShaderPass, SurfaceId};
use wgpu::util::DeviceExt;

use crate::shaders;

const SURFACE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("failed to request GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("texture readback failed: {0}")]
    Readback(String),
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct QuadUniform {
    rect: [f32; 4],
    target_size: [f32; 4],
    tint: [f32; 4],
}

impl QuadUniform {
    fn new(rect: [f32; 4], target: (u32, u32), tint: Color) -> Self {
        Self {
            rect,
            target_size: [target.0 as f32, target.1 as f32, 0.0, 0.0],
            tint: tint.to_f32_array(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct LightParams {
    apply_override: f32,
    _pad: [f32; 3],
}

struct GpuSurface {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl GpuSurface {
    fn new(device: &wgpu::Device, label: &str, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SURFACE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&Default::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width.max(1),
            height: self.height.max(1),
            depth_or_array_layers: 1,
        }
    }
}

fn texture_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// [`DrawBackend`] on a wgpu device. Every surface, the screen included,
/// is an `Rgba8Unorm` texture; each draw call records and submits its own
/// render pass.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    quad_pipeline: wgpu::RenderPipeline,
    quad_layout: wgpu::BindGroupLayout,
    light_pipeline: wgpu::RenderPipeline,
    light_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    white: GpuSurface,
    screen: GpuSurface,
    surfaces: BTreeMap<SurfaceId, GpuSurface>,
    bound: RenderTarget,
    next_id: u32,
    draw_calls: u64,
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("screen", &(self.screen.width, self.screen.height))
            .field("surfaces", &self.surfaces.len())
            .field("bound", &self.bound)
            .field("draw_calls", &self.draw_calls)
            .finish()
    }
}

impl WgpuBackend {
    /// Create a device without a window and render into an offscreen
    /// screen texture.
    pub fn headless(width: u32, height: u32) -> Result<Self, GpuError> {
        pollster::block_on(Self::request(width, height))
    }

    async fn request(width: u32, height: u32) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;
        let info = adapter.get_info();
        tracing::info!(name = %info.name, backend = ?info.backend, "GPU adapter selected");

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("tilecache_device"),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                    ..Default::default()
                },
                None,
            )
            .await?;
        Ok(Self::new(device, queue, width, height))
    }

    /// Wrap an existing device. `width`/`height` size the screen texture.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, width: u32, height: u32) -> Self {
        let quad_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("quad_bind_group_layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT),
                texture_entry(1, wgpu::ShaderStages::FRAGMENT),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let light_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("light_map_bind_group_layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                texture_entry(1, wgpu::ShaderStages::FRAGMENT),
                texture_entry(2, wgpu::ShaderStages::FRAGMENT),
                texture_entry(3, wgpu::ShaderStages::FRAGMENT),
            ],
        });

        let quad_pipeline = Self::create_pipeline(
            &device,
            "quad",
            &quad_layout,
            shaders::QUAD_WGSL,
            ("vs_quad", "fs_quad"),
        );
        let light_pipeline = Self::create_pipeline(
            &device,
            "light_map",
            &light_layout,
            shaders::LIGHT_MAP_WGSL,
            ("vs_fullscreen", "fs_light_map"),
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("nearest_sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let white = GpuSurface::new(&device, "white_texel", 1, 1);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &white.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&[Color::WHITE]),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            white.extent(),
        );
        let screen = GpuSurface::new(&device, "screen", width, height);

        Self {
            device,
            queue,
            quad_pipeline,
            quad_layout,
            light_pipeline,
            light_layout,
            sampler,
            white,
            screen,
            surfaces: BTreeMap::new(),
            bound: RenderTarget::Screen,
            next_id: 1,
            draw_calls: 0,
        }
    }

    fn create_pipeline(
        device: &wgpu::Device,
        label: &str,
        layout: &wgpu::BindGroupLayout,
        source: &str,
        entry_points: (&str, &str),
    ) -> wgpu::RenderPipeline {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[layout],
            push_constant_ranges: &[],
        });
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some(entry_points.0),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(entry_points.1),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: SURFACE_FORMAT,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: Default::default(),
            multiview: None,
            cache: None,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn live_surfaces(&self) -> usize {
        self.surfaces.len()
    }

    /// Render passes submitted so far.
    pub fn draw_calls(&self) -> u64 {
        self.draw_calls
    }

    pub fn resize_screen(&mut self, width: u32, height: u32) {
        self.screen = GpuSurface::new(&self.device, "screen", width, height);
    }

    fn surface(&self, id: SurfaceId) -> &GpuSurface {
        let Some(surface) = self.surfaces.get(&id) else {
            panic!("surface {id:?} is disposed");
        };
        surface
    }

    fn resolve(&self, target: RenderTarget) -> &GpuSurface {
        match target {
            RenderTarget::Screen => &self.screen,
            RenderTarget::Surface(id) => self.surface(id),
        }
    }

    fn assert_not_bound(&self, id: SurfaceId) {
        assert!(
            self.bound != RenderTarget::Surface(id),
            "surface {id:?} sampled while bound as the render target"
        );
    }

    fn run_pass(
        &self,
        label: &str,
        load: wgpu::LoadOp<wgpu::Color>,
        draw: impl FnOnce(&mut wgpu::RenderPass<'_>),
    ) {
        let target = self.resolve(self.bound);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            });
            draw(&mut pass);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn draw_quad(&mut self, texture: Option<SurfaceId>, rect: [f32; 4], tint: Color) {
        let target = self.resolve(self.bound);
        let uniform = QuadUniform::new(rect, (target.width, target.height), tint);
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("quad_uniform"),
                contents: bytemuck::bytes_of(&uniform),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let view = match texture {
            Some(id) => &self.surface(id).view,
            None => &self.white.view,
        };
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("quad_bind_group"),
            layout: &self.quad_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        self.run_pass("quad_pass", wgpu::LoadOp::Load, |pass| {
            pass.set_pipeline(&self.quad_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..6, 0..1);
        });
        self.draw_calls += 1;
    }

    fn pass_input(&self, pass: &ShaderPass, name: &str) -> &wgpu::TextureView {
        let Some(id) = pass.texture_named(name) else {
            panic!("{} pass is missing texture `{name}`", pass.shader);
        };
        self.assert_not_bound(id);
        &self.surface(id).view
    }

    fn light_map(&mut self, pass: &ShaderPass) {
        let params = LightParams {
            apply_override: pass.param_named("apply_override").unwrap_or(0.0),
            _pad: [0.0; 3],
        };
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("light_map_params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("light_map_bind_group"),
            layout: &self.light_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(self.pass_input(pass, "layer")),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(self.pass_input(pass, "base")),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(self.pass_input(pass, "override")),
                },
            ],
        });
        self.run_pass("light_map_pass", wgpu::LoadOp::Load, |rp| {
            rp.set_pipeline(&self.light_pipeline);
            rp.set_bind_group(0, &bind_group, &[]);
            rp.draw(0..3, 0..1);
        });
        self.draw_calls += 1;
    }

    /// Copy a target back to the CPU, row-major.
    pub fn read_pixels(&self, target: RenderTarget) -> Result<Vec<Color>, GpuError> {
        let surface = self.resolve(target);
        let unpadded = 4 * surface.width;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback"),
            size: padded as u64 * surface.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("readback") });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &surface.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(surface.height),
                },
            },
            surface.extent(),
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| GpuError::Readback("map callback never ran".into()))?
            .map_err(|e| GpuError::Readback(e.to_string()))?;

        let mut pixels = Vec::with_capacity((surface.width * surface.height) as usize);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks(padded as usize) {
                pixels.extend_from_slice(bytemuck::cast_slice(&row[..unpadded as usize]));
            }
        }
        buffer.unmap();
        Ok(pixels)
    }
}

impl DrawBackend for WgpuBackend {
    fn create_surface(&mut self, width: u32, height: u32) -> SurfaceId {
        let id = SurfaceId(self.next_id);
        self.next_id += 1;
        let surface = GpuSurface::new(&self.device, "chunk_surface", width, height);
        self.surfaces.insert(id, surface);
        tracing::trace!(?id, width, height, "surface created");
        id
    }

    fn dispose_surface(&mut self, id: SurfaceId) {
        if let Some(surface) = self.surfaces.remove(&id) {
            surface.texture.destroy();
            if self.bound == RenderTarget::Surface(id) {
                self.bound = RenderTarget::Screen;
            }
        }
    }

    fn is_disposed(&self, id: SurfaceId) -> bool {
        !self.surfaces.contains_key(&id)
    }

    fn surface_size(&self, id: SurfaceId) -> Option<(u32, u32)> {
        self.surfaces.get(&id).map(|s| (s.width, s.height))
    }

    fn bind_target(&mut self, target: RenderTarget) {
        if let RenderTarget::Surface(id) = target {
            self.surface(id);
        }
        self.bound = target;
    }

    fn clear(&mut self, color: Color) {
        let [r, g, b, a] = color.to_f32_array();
        let clear = wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: a as f64,
        };
        self.run_pass("clear_pass", wgpu::LoadOp::Clear(clear), |_| {});
        self.draw_calls += 1;
    }

    fn draw_sprite(&mut self, source: SurfaceId, pos: Vec2, tint: Color, scale: f32) {
        self.assert_not_bound(source);
        let (w, h) = {
            let s = self.surface(source);
            (s.width as f32 * scale, s.height as f32 * scale)
        };
        self.draw_quad(Some(source), [pos.x.floor(), pos.y.floor(), w, h], tint);
    }

    fn fill_rect(&mut self, rect: PixelRect, color: Color) {
        if rect.width <= 0 || rect.height <= 0 {
            return;
        }
        let rect = [
            rect.x as f32,
            rect.y as f32,
            rect.width as f32,
            rect.height as f32,
        ];
        self.draw_quad(None, rect, color);
    }

    fn upload(&mut self, id: SurfaceId, texels: &[Color]) {
        let surface = self.surface(id);
        assert_eq!(
            texels.len(),
            (surface.width * surface.height) as usize,
            "upload to {id:?} does not match its size"
        );
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &surface.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * surface.width),
                rows_per_image: Some(surface.height),
            },
            surface.extent(),
        );
    }

    fn shader_pass(&mut self, pass: &ShaderPass) {
        match pass.shader {
            LIGHT_MAP_SHADER => self.light_map(pass),
            other => panic!("unknown shader `{other}`"),
        }
    }
}
