//! Render targets and uploaded textures.

use crate::asset_store::TextureData;
use crate::post_processing::TargetSpec;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// A sampled RGBA texture created from decoded image data.
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl GpuTexture {
    pub fn upload(device: &wgpu::Device, queue: &wgpu::Queue, data: &TextureData, label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: data.width.max(1),
            height: data.height.max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        if data.width > 0 && data.height > 0 {
            queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &data.rgba,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * data.width),
                    rows_per_image: Some(data.height),
                },
                size,
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    /// 1x1 white texture for optional bindings.
    pub fn white(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let data = TextureData {
            width: 1,
            height: 1,
            rgba: vec![255; 4],
        };
        Self::upload(device, queue, &data, "White Texture")
    }
}

/// A color target with an optional sampled depth attachment.
pub struct RenderTarget {
    pub spec: TargetSpec,
    pub color: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    pub depth: Option<(wgpu::Texture, wgpu::TextureView)>,
}

impl RenderTarget {
    pub fn new(device: &wgpu::Device, spec: TargetSpec, format: wgpu::TextureFormat) -> Self {
        let label = spec.id.label();
        let size = wgpu::Extent3d {
            width: spec.width.max(1),
            height: spec.height.max(1),
            depth_or_array_layers: 1,
        };

        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());

        let depth = spec.with_depth.then(|| {
            let texture = create_depth_texture(device, size, &format!("{} Depth", label));
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            (texture, view)
        });

        Self {
            spec,
            color,
            color_view,
            depth,
        }
    }

    pub fn depth_view(&self) -> Option<&wgpu::TextureView> {
        self.depth.as_ref().map(|(_, view)| view)
    }
}

pub fn create_depth_texture(device: &wgpu::Device, size: wgpu::Extent3d, label: &str) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    })
}
