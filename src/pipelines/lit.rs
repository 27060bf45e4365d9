use cgmath::{Matrix, Matrix4, SquareMatrix};
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        geometry::ModelVertex,
        light::LightKind,
        material::Material,
        scene_graph::WorldLight,
        texture::Texture,
    },
    pipelines::{mk_render_pipeline, texture_layout_entries, uniform_layout_entry},
};

pub const MAX_POINT_LIGHTS: usize = 4;

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointLightRaw {
    /// `w` holds the range; zero is unlimited.
    position: [f32; 4],
    /// `w` holds the decay exponent.
    color: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightsUniform {
    ambient: [f32; 3],
    count: u32,
    point: [PointLightRaw; MAX_POINT_LIGHTS],
}

impl LightsUniform {
    pub fn from_lights(lights: &[WorldLight]) -> Self {
        let mut uniform = Self {
            ambient: [0.0; 3],
            count: 0,
            point: [PointLightRaw::default(); MAX_POINT_LIGHTS],
        };
        for world in lights {
            let radiance = world.light.radiance();
            match world.light.kind {
                LightKind::Ambient => {
                    for (sum, c) in uniform.ambient.iter_mut().zip(radiance) {
                        *sum += c;
                    }
                }
                LightKind::Point { range, decay } => {
                    let idx = uniform.count as usize;
                    if idx == MAX_POINT_LIGHTS {
                        log::warn!("More than {MAX_POINT_LIGHTS} point lights; extra lights are ignored");
                        continue;
                    }
                    let p = world.position;
                    uniform.point[idx] = PointLightRaw {
                        position: [p.x, p.y, p.z, range],
                        color: [radiance[0], radiance[1], radiance[2], decay],
                    };
                    uniform.count += 1;
                }
            }
        }
        uniform
    }

    pub fn point_count(&self) -> usize {
        self.count as usize
    }
}

/// Per-mesh transform and material parameters.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawUniform {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 4],
    color: [f32; 4],
    /// metalness, roughness, reflectivity, unused
    params: [f32; 4],
}

impl DrawUniform {
    pub fn new(world: Matrix4<f32>, material: &Material) -> Self {
        let normal = world
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or_else(Matrix4::identity);
        let (color, params) = match material {
            Material::Imported { base_color } => (*base_color, [0.0, 1.0, 0.5, 0.0]),
            Material::Physical(physical) => (
                [
                    physical.color.r as f32,
                    physical.color.g as f32,
                    physical.color.b as f32,
                    physical.color.a as f32,
                ],
                [
                    physical.metalness,
                    physical.roughness,
                    physical.reflectivity,
                    0.0,
                ],
            ),
        };
        Self {
            model: world.into(),
            normal: normal.into(),
            color,
            params,
        }
    }
}

pub fn mk_buffer<T: bytemuck::Pod>(device: &wgpu::Device, label: &str, uniform: T) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(&[uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

pub fn mk_uniform_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[uniform_layout_entry(0)],
        label: Some(label),
    })
}

pub fn mk_uniform_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
        label: Some(label),
    })
}

pub fn mk_draw_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let [texture, sampler] = texture_layout_entries(1);
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[uniform_layout_entry(0), texture, sampler],
        label: Some("draw_bind_group_layout"),
    })
}

pub fn mk_draw_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
    albedo: &Texture,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&albedo.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(&albedo.sampler),
            },
        ],
        label: Some("draw_bind_group"),
    })
}

/// Layouts of groups 0 (camera), 1 (lights) and 2 (draw) plus the pipeline.
pub struct LitPipeline {
    pub camera_layout: wgpu::BindGroupLayout,
    pub lights_layout: wgpu::BindGroupLayout,
    pub draw_layout: wgpu::BindGroupLayout,
    pub pipeline: wgpu::RenderPipeline,
}

impl LitPipeline {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
        sample_count: u32,
    ) -> Self {
        let camera_layout = mk_uniform_layout(device, "camera_bind_group_layout");
        let lights_layout = mk_uniform_layout(device, "lights_bind_group_layout");
        let draw_layout = mk_draw_layout(device);
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Lit Pipeline Layout"),
            bind_group_layouts: &[Some(&camera_layout), Some(&lights_layout), Some(&draw_layout)],
            immediate_size: 0,
        });
        let shader = wgpu::ShaderModuleDescriptor {
            label: Some("Lit Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("lit.wgsl").into()),
        };
        let pipeline = mk_render_pipeline(
            device,
            &layout,
            color_format,
            Some(depth_format),
            sample_count,
            Some(wgpu::Face::Back),
            &[ModelVertex::desc()],
            shader,
        );
        Self {
            camera_layout,
            lights_layout,
            draw_layout,
            pipeline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;
    use crate::data_structures::light::Light;
    use cgmath::Vector3;

    #[test]
    fn uniform_sizes_are_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<LightsUniform>() % 16, 0);
        assert_eq!(std::mem::size_of::<DrawUniform>() % 16, 0);
    }

    #[test]
    fn ambient_lights_are_summed_and_points_capped() {
        let config = SceneConfig::default();
        let ambient = Light::ambient(&config.ambient);
        let point = Light::point(&config.warm);
        let mut lights = vec![
            WorldLight {
                light: &ambient,
                position: Vector3::new(0.0, 0.0, 0.0),
            },
            WorldLight {
                light: &ambient,
                position: Vector3::new(0.0, 0.0, 0.0),
            },
        ];
        for i in 0..6 {
            lights.push(WorldLight {
                light: &point,
                position: Vector3::new(i as f32, 0.0, 0.0),
            });
        }
        let uniform = LightsUniform::from_lights(&lights);
        assert_eq!(uniform.point_count(), MAX_POINT_LIGHTS);
        let single = ambient.radiance()[0];
        assert!((uniform.ambient[0] - 2.0 * single).abs() < 1e-6);
        assert_eq!(uniform.point[3].position[0], 3.0);
        assert_eq!(uniform.point[0].position[3], 20.0);
    }
}
