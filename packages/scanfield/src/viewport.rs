//! The running viewer: scene state, compositor and GPU resources bound to one
//! device, driven one frame at a time.

use anyhow::{Context, Result};

use crate::asset_store::AssetStore;
use crate::config::ViewerConfig;
use crate::gpu::post_processor::PassExecutor;
use crate::gpu::scene_renderer::SceneRenderer;
use crate::gpu::texture::GpuTexture;
use crate::post_processing::{Compositor, ViewportMetrics};
use crate::scene_graph::SceneGraph;

pub struct Viewport {
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: ViewerConfig,
    scene: SceneGraph,
    compositor: Compositor,
    scene_renderer: SceneRenderer,
    executor: PassExecutor,
}

impl Viewport {
    /// Build the scene and the compositor chain from a fully loaded store.
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        format: wgpu::TextureFormat,
        assets: &AssetStore,
        config: ViewerConfig,
        metrics: ViewportMetrics,
    ) -> Result<Self> {
        let model = assets.model().context("asset store has no character model")?;
        let skin_data = assets
            .model_texture()
            .context("asset store has no model texture")?;

        let scene = SceneGraph::new(model, &config, &metrics);
        let compositor = Compositor::from_config(&config, metrics).context("failed to build compositor chain")?;

        let skin = GpuTexture::upload(&device, &queue, skin_data, "Skin Texture");
        let scene_renderer = SceneRenderer::new(&device, format, model, skin, &scene, config.particles.color);
        let executor = PassExecutor::new(&device, &queue, format, &compositor, assets);

        log::info!(
            "Viewport ready at {}x{} ({:?})",
            metrics.width,
            metrics.height,
            format
        );

        Ok(Self {
            device,
            queue,
            config,
            scene,
            compositor,
            scene_renderer,
            executor,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn metrics(&self) -> ViewportMetrics {
        self.compositor.metrics()
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// Resize to a drawing buffer of `width` x `height` physical pixels.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let metrics = ViewportMetrics::new(width, height);
        self.scene.on_resize(&metrics);
        self.compositor.on_resize(metrics)?;
        self.executor.resize(&self.device, self.compositor.target_specs());
        Ok(())
    }

    /// Pointer click in physical pixels.
    pub fn click(&mut self, x: f32, y: f32) -> Result<()> {
        self.compositor.on_click(x, y)
    }

    /// Advance the particle field and every pass by `dt` seconds.
    pub fn update(&mut self, dt: f32) -> Result<()> {
        self.scene.update(dt);
        self.compositor.update(dt)
    }

    /// Record and submit one frame into `view`.
    pub fn render(&self, view: &wgpu::TextureView) -> Result<()> {
        self.scene_renderer.prepare(&self.queue, &self.scene);

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });
        self.executor.render_frame(
            &self.device,
            &self.queue,
            &mut encoder,
            &self.compositor,
            &self.scene_renderer,
            view,
        )?;
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    pub fn tick(&mut self, dt: f32, view: &wgpu::TextureView) -> Result<()> {
        self.update(dt)?;
        self.render(view)
    }

    pub fn dispose(&mut self) -> Result<()> {
        log::info!("Disposing viewport");
        self.compositor.dispose()
    }
}
