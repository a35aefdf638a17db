//! GPU execution of the compositor chain.
//!
//! Owns every render target the [`Compositor`] describes, one pipeline and
//! uniform buffer per pass, and records a whole frame into one encoder:
//! scene pre-renders first, then each link in chain order.

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use wgpu::util::DeviceExt;

use crate::asset_store::AssetStore;
use crate::gpu::mesh::QUAD_VERTICES;
use crate::gpu::pipeline;
use crate::gpu::scene_renderer::SceneRenderer;
use crate::gpu::shaders;
use crate::gpu::texture::{GpuTexture, RenderTarget};
use crate::post_processing::{AuxInput, Compositor, EffectPass, PassKind, PassLink, PassOutput, TargetId, TargetSpec};

/// Uniform buffers are never smaller than one vec4.
const MIN_UNIFORM_SIZE: u64 = 16;

/// GPU resources for a single pass.
struct EffectResources {
    pipeline: wgpu::RenderPipeline,
    /// Layout for the input texture, sampler and aux textures (group 0).
    texture_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    /// Uniform bind group (group 1).
    bind_group: wgpu::BindGroup,
}

pub struct PassExecutor {
    format: wgpu::TextureFormat,
    targets: HashMap<TargetId, RenderTarget>,
    /// Preloaded images referenced by aux inputs, by manifest id.
    asset_textures: HashMap<String, GpuTexture>,
    effect_resources: HashMap<PassKind, EffectResources>,
    quad_vertex_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    white: GpuTexture,
}

impl PassExecutor {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        compositor: &Compositor,
        assets: &AssetStore,
    ) -> Self {
        let quad_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Fullscreen Quad Buffer"),
            contents: bytemuck::cast_slice(QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Post-Process Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let mut asset_textures = HashMap::new();
        for link in compositor.links() {
            for aux in &link.aux {
                let AuxInput::AssetTexture(id) = aux else { continue };
                if asset_textures.contains_key(id) {
                    continue;
                }
                match assets.texture(id) {
                    Some(data) => {
                        let texture = GpuTexture::upload(device, queue, data, &format!("Asset Texture {}", id));
                        asset_textures.insert(id.clone(), texture);
                    }
                    None => log::warn!("{} pass: no preloaded image '{}', binding white", link.kind, id),
                }
            }
        }

        let mut executor = Self {
            format,
            targets: HashMap::new(),
            asset_textures,
            effect_resources: HashMap::new(),
            quad_vertex_buffer,
            sampler,
            white: GpuTexture::white(device, queue),
        };

        executor.resize(device, compositor.target_specs());

        for link in compositor.links() {
            if link.kind == PassKind::Scene {
                continue;
            }
            let Some(pass) = compositor.pass(link.kind) else { continue };
            match executor.create_effect_resources(device, pass, link) {
                Ok(resources) => {
                    executor.effect_resources.insert(link.kind, resources);
                }
                Err(e) => log::error!("Failed to create pipeline for pass '{}': {:#}", link.kind, e),
            }
        }

        executor
    }

    fn create_effect_resources(
        &self,
        device: &wgpu::Device,
        pass: &dyn EffectPass,
        link: &PassLink,
    ) -> Result<EffectResources> {
        let kind = pass.kind();
        let source = shaders::source(kind).ok_or_else(|| anyhow!("no shader for pass '{}'", kind))?;

        let mut entries = vec![
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: float_texture(),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ];
        for (i, aux) in link.aux.iter().enumerate() {
            let ty = match aux {
                AuxInput::Depth(_) => wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Depth,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                AuxInput::Color(_) | AuxInput::AssetTexture(_) => float_texture(),
            };
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 2 + i as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty,
                count: None,
            });
        }

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("Pass Texture Bind Group Layout: {}", kind)),
            entries: &entries,
        });
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("Pass Uniform Bind Group Layout: {}", kind)),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("Pass Pipeline Layout: {}", kind)),
            bind_group_layouts: &[&texture_layout, &uniform_layout],
            push_constant_ranges: &[],
        });
        let pipeline = pipeline::create_fullscreen_pipeline(
            device,
            &pipeline_layout,
            self.format,
            &format!("Pass {}", kind),
            source,
        );

        let bytes = pass.uniform_bytes();
        let size = (bytes.len() as u64).max(MIN_UNIFORM_SIZE);
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("Pass Uniform Buffer: {}", kind)),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("Pass Uniform Bind Group: {}", kind)),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        Ok(EffectResources {
            pipeline,
            texture_layout,
            uniform_buffer,
            bind_group,
        })
    }

    /// Reallocate targets whose spec changed; drop targets no longer listed.
    pub fn resize(&mut self, device: &wgpu::Device, specs: &[TargetSpec]) {
        self.targets.retain(|id, _| specs.iter().any(|s| s.id == *id));
        for spec in specs {
            if self.targets.get(&spec.id).is_some_and(|t| t.spec == *spec) {
                continue;
            }
            log::debug!("Allocating {} at {}x{}", spec.id.label(), spec.width, spec.height);
            self.targets.insert(spec.id, RenderTarget::new(device, *spec, self.format));
        }
    }

    pub fn target(&self, id: TargetId) -> Option<&RenderTarget> {
        self.targets.get(&id)
    }

    pub fn has_pass(&self, kind: PassKind) -> bool {
        self.effect_resources.contains_key(&kind)
    }

    /// Record one frame. `scene` must already be prepared for this frame.
    pub fn render_frame(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        compositor: &Compositor,
        scene: &SceneRenderer,
        output_view: &wgpu::TextureView,
    ) -> Result<()> {
        for id in compositor.frame_plan().pre_renders {
            self.render_scene_into(encoder, scene, id)?;
        }

        for link in compositor.links() {
            if link.kind == PassKind::Scene {
                let PassOutput::Target(id) = link.output else {
                    return Err(anyhow!("scene pass cannot present directly"));
                };
                self.render_scene_into(encoder, scene, id)?;
                continue;
            }

            let Some(pass) = compositor.pass(link.kind) else { continue };
            let Some(resources) = self.effect_resources.get(&link.kind) else {
                log::warn!("No resources for pass: {}", link.kind);
                continue;
            };

            let bytes = pass.uniform_bytes();
            if !bytes.is_empty() {
                queue.write_buffer(&resources.uniform_buffer, 0, &bytes);
            }

            let output = match link.output {
                PassOutput::Screen => output_view,
                PassOutput::Target(id) => &self.target_or_err(id)?.color_view,
            };
            let texture_bind_group = self.texture_bind_group(device, link, resources)?;
            self.render_effect(encoder, output, link.kind, resources, &texture_bind_group);
        }
        Ok(())
    }

    fn render_scene_into(&self, encoder: &mut wgpu::CommandEncoder, scene: &SceneRenderer, id: TargetId) -> Result<()> {
        let target = self.target_or_err(id)?;
        let depth = target
            .depth_view()
            .with_context(|| format!("{} has no depth attachment", id.label()))?;
        scene.render(encoder, &target.color_view, depth);
        Ok(())
    }

    fn target_or_err(&self, id: TargetId) -> Result<&RenderTarget> {
        self.targets
            .get(&id)
            .with_context(|| format!("{} was never allocated", id.label()))
    }

    fn texture_bind_group(
        &self,
        device: &wgpu::Device,
        link: &PassLink,
        resources: &EffectResources,
    ) -> Result<wgpu::BindGroup> {
        let input = link
            .input
            .with_context(|| format!("{} pass has no chain input", link.kind))?;
        let input_view = &self.target_or_err(input)?.color_view;

        let mut aux_views = Vec::with_capacity(link.aux.len());
        for aux in &link.aux {
            let view = match aux {
                AuxInput::Color(id) => &self.target_or_err(*id)?.color_view,
                AuxInput::Depth(id) => self
                    .target_or_err(*id)?
                    .depth_view()
                    .with_context(|| format!("{} has no depth attachment", id.label()))?,
                AuxInput::AssetTexture(id) => self
                    .asset_textures
                    .get(id)
                    .map(|t| &t.view)
                    .unwrap_or(&self.white.view),
            };
            aux_views.push(view);
        }

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(input_view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
        ];
        for (i, view) in aux_views.into_iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }

        Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("Pass Texture Bind Group: {}", link.kind)),
            layout: &resources.texture_layout,
            entries: &entries,
        }))
    }

    fn render_effect(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        output: &wgpu::TextureView,
        kind: PassKind,
        resources: &EffectResources,
        texture_bind_group: &wgpu::BindGroup,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&format!("Effect Pass: {}", kind)),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(&resources.pipeline);
        render_pass.set_bind_group(0, texture_bind_group, &[]);
        render_pass.set_bind_group(1, &resources.bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.quad_vertex_buffer.slice(..));
        render_pass.draw(0..QUAD_VERTICES.len() as u32, 0..1);
    }
}

fn float_texture() -> wgpu::BindingType {
    wgpu::BindingType::Texture {
        sample_type: wgpu::TextureSampleType::Float { filterable: true },
        view_dimension: wgpu::TextureViewDimension::D2,
        multisampled: false,
    }
}
