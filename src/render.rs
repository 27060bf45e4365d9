//! Rendering.
//!
//! [`Renderer`] is what the controller needs from an engine. [`WgpuRenderer`]
//! implements it with a small forward renderer: the scene is drawn into an
//! offscreen target sized by the current pixel ratio and then stretched onto
//! the window surface, so lowering the ratio trades sharpness for fill rate.
//!
//! GPU copies of geometry and textures are created lazily on first use and
//! cached for the lifetime of the renderer.

use std::{collections::HashMap, iter, sync::Arc};

use anyhow::{Context as _, bail};
use winit::window::Window;

use crate::{
    camera::{CameraUniform, PerspectiveCamera},
    config::{Precision, RendererSettings},
    context::GpuContext,
    data_structures::{
        geometry::{Geometry, GeometryId},
        scene_graph::Scene,
        texture::{Texture, TextureId},
    },
    host::Viewport,
    pipelines::{
        blit::BlitPipeline,
        lit::{self, DrawUniform, LightsUniform, LitPipeline},
    },
    resources::texture::fit_texture,
};

pub trait Renderer {
    /// Logical size of the output surface.
    fn set_size(&mut self, viewport: Viewport);

    /// Resolution scale relative to the logical size.
    fn set_pixel_ratio(&mut self, ratio: f32);

    fn pixel_ratio(&self) -> f32;

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> anyhow::Result<()>;
}

pub fn depth_format(precision: Precision) -> wgpu::TextureFormat {
    match precision {
        Precision::Low => wgpu::TextureFormat::Depth16Unorm,
        Precision::Medium | Precision::High => wgpu::TextureFormat::Depth32Float,
    }
}

pub fn sample_count(settings: &RendererSettings) -> u32 {
    if settings.antialias { 4 } else { 1 }
}

/// Offscreen size for a logical viewport at the given ratio, at least 1x1 and
/// at most `max_dimension` per side.
pub fn scaled_size(viewport: Viewport, ratio: f32, max_dimension: u32) -> [u32; 2] {
    let scale =
        |extent: u32| ((extent as f32 * ratio).round() as u32).clamp(1, max_dimension.max(1));
    [scale(viewport.width), scale(viewport.height)]
}

fn srgb_to_linear(color: wgpu::Color) -> wgpu::Color {
    let channel = |c: f64| {
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    wgpu::Color {
        r: channel(color.r),
        g: channel(color.g),
        b: channel(color.b),
        a: color.a,
    }
}

struct GpuGeometry {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    count: u32,
}

impl GpuGeometry {
    fn new(device: &wgpu::Device, geometry: &Geometry) -> Self {
        use wgpu::util::DeviceExt;
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Vertex Buffer"),
            contents: bytemuck::cast_slice(&geometry.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Index Buffer"),
            contents: bytemuck::cast_slice(&geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            count: geometry.indices.len() as u32,
        }
    }
}

struct DrawSlot {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    /// Texture the bind group samples; `None` is the white fallback.
    texture: Option<(TextureId, u64)>,
}

struct RenderTarget {
    size: [u32; 2],
    color: Texture,
    /// Single-sampled copy of `color` when multisampling.
    resolve: Option<Texture>,
    depth: Texture,
    blit: wgpu::BindGroup,
}

pub struct WgpuRenderer {
    ctx: GpuContext,
    settings: RendererSettings,
    viewport: Viewport,
    pixel_ratio: f32,
    depth_format: wgpu::TextureFormat,
    /// Largest 2D texture side the device accepts.
    max_dimension: u32,
    lit: LitPipeline,
    blit: BlitPipeline,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    lights_buffer: wgpu::Buffer,
    lights_bind_group: wgpu::BindGroup,
    white: Texture,
    geometries: HashMap<GeometryId, GpuGeometry>,
    textures: HashMap<TextureId, (u64, Texture)>,
    /// Texture revisions that could not be uploaded.
    rejected: HashMap<TextureId, u64>,
    draws: Vec<DrawSlot>,
    target: Option<RenderTarget>,
}

impl WgpuRenderer {
    pub fn new(ctx: GpuContext, settings: &RendererSettings, viewport: Viewport) -> Self {
        let device = &ctx.device;
        let depth_format = depth_format(settings.precision);
        let lit = LitPipeline::new(
            device,
            ctx.config.format,
            depth_format,
            sample_count(settings),
        );
        let blit = BlitPipeline::new(device, ctx.config.format);

        let camera_buffer = lit::mk_buffer(device, "Camera Buffer", CameraUniform::new());
        let camera_bind_group = lit::mk_uniform_bind_group(
            device,
            &lit.camera_layout,
            &camera_buffer,
            "camera_bind_group",
        );
        let lights_buffer =
            lit::mk_buffer(device, "Lights Buffer", LightsUniform::from_lights(&[]));
        let lights_bind_group = lit::mk_uniform_bind_group(
            device,
            &lit.lights_layout,
            &lights_buffer,
            "lights_bind_group",
        );
        let white = Texture::create_white(device, &ctx.queue);
        let max_dimension = device.limits().max_texture_dimension_2d;

        log::info!(
            "Renderer ready: {}x{} surface ({:?}), {}x MSAA, {:?} depth, {max_dimension}px texture limit, shadows {}",
            ctx.config.width,
            ctx.config.height,
            ctx.config.format,
            sample_count(settings),
            depth_format,
            if settings.shadows { "requested" } else { "off" },
        );

        Self {
            ctx,
            settings: settings.clone(),
            viewport,
            pixel_ratio: 1.0,
            depth_format,
            max_dimension,
            lit,
            blit,
            camera_buffer,
            camera_bind_group,
            lights_buffer,
            lights_bind_group,
            white,
            geometries: HashMap::new(),
            textures: HashMap::new(),
            rejected: HashMap::new(),
            draws: Vec::new(),
            target: None,
        }
    }

    pub fn window(&self) -> &Arc<Window> {
        self.ctx.window()
    }

    pub fn target_size(&self) -> [u32; 2] {
        scaled_size(self.viewport, self.pixel_ratio, self.max_dimension)
    }

    fn ensure_target(&mut self) {
        let size = self.target_size();
        if self.target.as_ref().is_some_and(|target| target.size == size) {
            return;
        }
        let device = &self.ctx.device;
        let format = self.ctx.config.format;
        let samples = sample_count(&self.settings);
        let color = Texture::create_render_target(device, size, format, samples, "scene_color");
        let resolve = (samples > 1)
            .then(|| Texture::create_render_target(device, size, format, 1, "scene_resolve"));
        let depth =
            Texture::create_depth_texture(device, size, self.depth_format, samples, "scene_depth");
        let blit = self.blit.bind(device, resolve.as_ref().unwrap_or(&color));
        log::debug!("Render target resized to {}x{}", size[0], size[1]);
        self.target = Some(RenderTarget {
            size,
            color,
            resolve,
            depth,
            blit,
        });
    }

    /// Upload the texture behind `map` if it is loaded and newer than the cached copy.
    fn sync_texture(&mut self, scene: &Scene, map: Option<TextureId>) -> Option<(TextureId, u64)> {
        let id = map?;
        let (data, revision) = scene.textures.get(id)?;
        if self.rejected.get(&id) == Some(&revision) {
            return None;
        }
        let stale = self
            .textures
            .get(&id)
            .is_none_or(|(cached, _)| *cached != revision);
        if stale {
            let data = match fit_texture(data, self.max_dimension) {
                Ok(data) => data,
                Err(err) => {
                    log::error!("Cannot upload texture {}: {err:#}", data.label);
                    self.rejected.insert(id, revision);
                    return None;
                }
            };
            let texture = Texture::from_data(&self.ctx.device, &self.ctx.queue, &data);
            log::debug!("Uploaded texture {} ({}x{})", data.label, data.width, data.height);
            self.textures.insert(id, (revision, texture));
        }
        Some((id, revision))
    }

    fn sync_draw(&mut self, slot: usize, uniform: DrawUniform, texture: Option<(TextureId, u64)>) {
        let device = &self.ctx.device;
        let albedo = texture
            .and_then(|(id, _)| self.textures.get(&id))
            .map(|(_, texture)| texture)
            .unwrap_or(&self.white);

        if let Some(draw) = self.draws.get_mut(slot) {
            self.ctx
                .queue
                .write_buffer(&draw.buffer, 0, bytemuck::cast_slice(&[uniform]));
            if draw.texture != texture {
                draw.bind_group =
                    lit::mk_draw_bind_group(device, &self.lit.draw_layout, &draw.buffer, albedo);
                draw.texture = texture;
            }
        } else {
            let buffer = lit::mk_buffer(device, "Draw Buffer", uniform);
            let bind_group =
                lit::mk_draw_bind_group(device, &self.lit.draw_layout, &buffer, albedo);
            self.draws.push(DrawSlot {
                buffer,
                bind_group,
                texture,
            });
        }
    }
}

impl Renderer for WgpuRenderer {
    fn set_size(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        let size = self.ctx.window.inner_size();
        if size.width != self.ctx.config.width || size.height != self.ctx.config.height {
            self.ctx.reconfigure();
        }
    }

    fn set_pixel_ratio(&mut self, ratio: f32) {
        self.pixel_ratio = ratio;
    }

    fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> anyhow::Result<()> {
        self.ensure_target();

        let mut camera_uniform = CameraUniform::new();
        camera_uniform.update_view_proj(camera);
        self.ctx.queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::cast_slice(&[camera_uniform]),
        );
        let lights = LightsUniform::from_lights(&scene.lights());
        self.ctx
            .queue
            .write_buffer(&self.lights_buffer, 0, bytemuck::cast_slice(&[lights]));

        let meshes = scene.meshes();
        let mut batches = Vec::with_capacity(meshes.len());
        for (slot, (mesh, world)) in meshes.iter().enumerate() {
            let texture = self.sync_texture(scene, mesh.material.map());
            let geometry_id = mesh.geometry.id();
            if !self.geometries.contains_key(&geometry_id) {
                let gpu = GpuGeometry::new(&self.ctx.device, &mesh.geometry);
                self.geometries.insert(geometry_id, gpu);
            }
            self.sync_draw(slot, DrawUniform::new(*world, &mesh.material), texture);
            batches.push((geometry_id, slot));
        }

        let output = match self.ctx.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(output) => output,
            wgpu::CurrentSurfaceTexture::Suboptimal(output) => {
                log::debug!("Surface is suboptimal; presenting anyway");
                output
            }
            wgpu::CurrentSurfaceTexture::Lost | wgpu::CurrentSurfaceTexture::Outdated => {
                log::warn!("Surface lost or outdated; reconfiguring and skipping this frame");
                self.ctx.reconfigure();
                return Ok(());
            }
            wgpu::CurrentSurfaceTexture::Timeout | wgpu::CurrentSurfaceTexture::Occluded => {
                log::debug!("Surface unavailable; skipping this frame");
                return Ok(());
            }
            wgpu::CurrentSurfaceTexture::Validation => {
                bail!("Failed to acquire the next surface texture")
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let target = self.target.as_ref().context("Render target missing")?;

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.color.view,
                    depth_slice: None,
                    resolve_target: target.resolve.as_ref().map(|resolve| &resolve.view),
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(srgb_to_linear(scene.background)),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &target.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });
            pass.set_pipeline(&self.lit.pipeline);
            pass.set_bind_group(0, &self.camera_bind_group, &[]);
            pass.set_bind_group(1, &self.lights_bind_group, &[]);
            for (geometry_id, slot) in &batches {
                let (Some(geometry), Some(draw)) =
                    (self.geometries.get(geometry_id), self.draws.get(*slot))
                else {
                    continue;
                };
                pass.set_bind_group(2, &draw.bind_group, &[]);
                pass.set_vertex_buffer(0, geometry.vertex.slice(..));
                pass.set_index_buffer(geometry.index.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..geometry.count, 0, 0..1);
            }
        }
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Blit Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });
            self.blit.draw(&mut pass, &target.blit);
        }

        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}
