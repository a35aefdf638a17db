//! Draws the scene graph: the textured model and the particle points.
//!
//! The same draw is issued once per pre-render target and once into the
//! chain's first color target, so uniforms are written once per frame by
//! [`SceneRenderer::prepare`] and [`SceneRenderer::render`] only records a
//! render pass.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::camera::CameraUniforms;
use crate::config::PointLightSettings;
use crate::gpu::mesh::PointVertex;
use crate::gpu::pipeline;
use crate::gpu::texture::GpuTexture;
use crate::model_asset::ModelData;
use crate::scene_graph::SceneGraph;

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct GpuPointLight {
    /// xyz position, w intensity.
    pub position: [f32; 4],
    /// rgb color, w cutoff distance.
    pub color: [f32; 4],
}

impl From<&PointLightSettings> for GpuPointLight {
    fn from(light: &PointLightSettings) -> Self {
        let [x, y, z] = light.position;
        let [r, g, b] = light.color;
        Self {
            position: [x, y, z, light.intensity],
            color: [r, g, b, light.distance],
        }
    }
}

/// Matches `SceneUniforms` in shader_scene.wgsl and shader_particles.wgsl.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct SceneUniforms {
    pub camera: CameraUniforms,
    pub model: [[f32; 4]; 4],
    pub lights: [GpuPointLight; 3],
    /// x ambient factor, yzw unused.
    pub ambient: [f32; 4],
    pub particle_color: [f32; 4],
}

impl SceneUniforms {
    pub fn from_scene(scene: &SceneGraph, particle_color: [f32; 4]) -> Self {
        let lights = &scene.lights;
        Self {
            camera: scene.camera.to_uniforms(),
            model: scene.model.transform().to_cols_array_2d(),
            lights: [
                GpuPointLight::from(&lights.back),
                GpuPointLight::from(&lights.fill),
                GpuPointLight::from(&lights.key),
            ],
            ambient: [lights.ambient, 0.0, 0.0, 0.0],
            particle_color,
        }
    }
}

pub struct SceneRenderer {
    model_pipeline: wgpu::RenderPipeline,
    particle_pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    particle_buffer: wgpu::Buffer,
    particle_count: u32,
    particle_color: [f32; 4],
    // Kept alive for the bind group.
    _skin: GpuTexture,
}

impl SceneRenderer {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        model: &ModelData,
        skin: GpuTexture,
        scene: &SceneGraph,
        particle_color: [f32; 4],
    ) -> Self {
        let uniforms = SceneUniforms::from_scene(scene, particle_color);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene Uniform Buffer"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Skin Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&skin.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let model_pipeline = pipeline::create_model_pipeline(device, &pipeline_layout, color_format);
        let particle_pipeline = pipeline::create_particle_pipeline(device, &pipeline_layout, color_format);

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Model Vertex Buffer"),
            contents: bytemuck::cast_slice(&model.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Model Index Buffer"),
            contents: bytemuck::cast_slice(&model.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let points = particle_vertices(scene);
        let particle_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Vertex Buffer"),
            size: (points.len().max(1) * std::mem::size_of::<PointVertex>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            model_pipeline,
            particle_pipeline,
            uniform_buffer,
            bind_group,
            vertex_buffer,
            index_buffer,
            index_count: model.indices.len() as u32,
            particle_buffer,
            particle_count: points.len() as u32,
            particle_color,
            _skin: skin,
        }
    }

    /// Upload this frame's camera, lights and particle positions.
    pub fn prepare(&self, queue: &wgpu::Queue, scene: &SceneGraph) {
        let uniforms = SceneUniforms::from_scene(scene, self.particle_color);
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let points = particle_vertices(scene);
        if !points.is_empty() {
            queue.write_buffer(&self.particle_buffer, 0, bytemuck::cast_slice(&points));
        }
    }

    /// Record one scene draw into `color_view` / `depth_view`.
    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, color_view: &wgpu::TextureView, depth_view: &wgpu::TextureView) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_bind_group(0, &self.bind_group, &[]);

        if self.index_count > 0 {
            render_pass.set_pipeline(&self.model_pipeline);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..self.index_count, 0, 0..1);
        }

        if self.particle_count > 0 {
            render_pass.set_pipeline(&self.particle_pipeline);
            render_pass.set_vertex_buffer(0, self.particle_buffer.slice(..));
            render_pass.draw(0..self.particle_count, 0..1);
        }
    }
}

fn particle_vertices(scene: &SceneGraph) -> Vec<PointVertex> {
    scene
        .particles
        .world_positions()
        .into_iter()
        .map(|position| PointVertex { position })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewerConfig;
    use crate::gpu::mesh::Vertex;
    use crate::post_processing::ViewportMetrics;

    fn scene() -> SceneGraph {
        let n = [0.0, 0.0, 1.0];
        let model = ModelData::new(
            vec![
                Vertex::new([-1.0, 0.0, 0.0], n, [0.0, 0.0]),
                Vertex::new([1.0, 0.0, 0.0], n, [1.0, 0.0]),
                Vertex::new([0.0, 4.0, 0.0], n, [0.5, 1.0]),
            ],
            vec![0, 1, 2],
        );
        SceneGraph::new(&model, &ViewerConfig::default(), &ViewportMetrics::new(640, 480))
    }

    #[test]
    fn test_uniform_layout_size() {
        assert_eq!(std::mem::size_of::<SceneUniforms>(), 288);
        assert_eq!(std::mem::size_of::<SceneUniforms>() % 16, 0);
    }

    #[test]
    fn test_uniforms_carry_model_offset_and_lights() {
        let scene = scene();
        let u = SceneUniforms::from_scene(&scene, [1.0; 4]);
        // Column 3 holds the translation.
        assert_eq!(u.model[3][1], -2.0);
        assert_eq!(u.lights[2].position, [5.0, 0.0, 0.0, scene.lights.key.intensity]);
        assert_eq!(u.lights[0].color[3], scene.lights.back.distance);
        assert_eq!(u.ambient[0], scene.lights.ambient);
    }

    #[test]
    fn test_particle_vertices_match_field() {
        let scene = scene();
        let points = particle_vertices(&scene);
        assert_eq!(points.len(), scene.particles.len());
        assert_eq!(points[0].position, scene.particles.world_positions()[0]);
    }
}
