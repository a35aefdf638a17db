use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::asset_source::FsAssetSource;
use crate::asset_store::AssetStore;
use crate::config::ViewerConfig;
use crate::manifest::{AssetManifest, ManifestFile};
use crate::post_processing::ViewportMetrics;
use crate::preloader::Preloader;
use crate::progress::LogProgressIndicator;
use crate::viewport::Viewport;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where assets and settings come from.
#[derive(Args)]
struct Source {
    /// Directory mirroring the site's public root (model/, textures/, images)
    #[arg(long)]
    assets: PathBuf,

    /// Manifest JSON; defaults to <assets>/manifest.json, or no images
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Viewer config JSON; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render frames to disk without a window
    Render {
        #[command(flatten)]
        source: Source,

        /// Output directory for frames
        #[arg(long)]
        out: PathBuf,

        /// Number of frames to render
        #[arg(long, default_value_t = 120)]
        frames: u32,

        /// Frames per second
        #[arg(long, default_value_t = 60.0)]
        fps: f32,

        /// Output width
        #[arg(long, default_value_t = 800)]
        width: u32,

        /// Output height
        #[arg(long, default_value_t = 600)]
        height: u32,

        /// Click at X,Y (pixels) before the first frame; repeatable
        #[arg(long, value_parser = parse_point)]
        click: Vec<(f32, f32)>,
    },
    /// Open an interactive window
    View {
        #[command(flatten)]
        source: Source,

        /// Initial window width
        #[arg(long, default_value_t = 1280)]
        width: u32,

        /// Initial window height
        #[arg(long, default_value_t = 720)]
        height: u32,
    },
}

fn parse_point(s: &str) -> Result<(f32, f32), String> {
    let (x, y) = s.split_once(',').ok_or_else(|| format!("expected X,Y, got '{}'", s))?;
    let x = x.trim().parse::<f32>().map_err(|e| e.to_string())?;
    let y = y.trim().parse::<f32>().map_err(|e| e.to_string())?;
    Ok((x, y))
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            source,
            out,
            frames,
            fps,
            width,
            height,
            click,
        } => pollster::block_on(render_offline(source, out, frames, fps, width, height, click)),
        Commands::View { source, width, height } => view(source, width, height),
    }
}

fn load_manifest(source: &Source) -> Result<AssetManifest> {
    let path = source
        .manifest
        .clone()
        .unwrap_or_else(|| source.assets.join("manifest.json"));
    if path.exists() {
        ManifestFile::from_path(&path)?.into_manifest()
    } else if source.manifest.is_some() {
        Err(anyhow!("manifest {} not found", path.display()))
    } else {
        log::info!("No manifest at {}, loading the model only", path.display());
        AssetManifest::with_images(Vec::new())
    }
}

fn load_config(path: Option<&Path>) -> Result<ViewerConfig> {
    match path {
        Some(path) => ViewerConfig::from_path(path),
        None => Ok(ViewerConfig::default()),
    }
}

async fn preload(source: &Source) -> Result<AssetStore> {
    let manifest = load_manifest(source)?;
    log::info!(
        "Preloading {} items from {}",
        manifest.total_items(),
        source.assets.display()
    );
    Preloader::new(FsAssetSource::new(&source.assets), LogProgressIndicator)
        .on_loaded(|store| log::info!("Preloaded {} images", store.textures().len()))
        .load_all(&manifest)
        .await
}

async fn request_device(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'_>>,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue)> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: surface,
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| anyhow!("No adapter found"))?;

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor::default(), None)
        .await
        .context("failed to create device")?;
    Ok((adapter, device, queue))
}

async fn render_offline(
    source: Source,
    out_dir: PathBuf,
    frames: u32,
    fps: f32,
    width: u32,
    height: u32,
    clicks: Vec<(f32, f32)>,
) -> Result<()> {
    let config = load_config(source.config.as_deref())?;
    let store = preload(&source).await?;

    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let (_adapter, device, queue) = request_device(&instance, None).await?;

    let format = wgpu::TextureFormat::Rgba8UnormSrgb;
    let texture_desc = wgpu::TextureDescriptor {
        label: Some("Target Texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    };
    let texture = device.create_texture(&texture_desc);
    let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    // Rows are padded to 256 bytes for the copy.
    let unpadded_bytes_per_row = 4 * width;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

    let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Output Buffer"),
        size: (padded_bytes_per_row * height) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let metrics = ViewportMetrics::new(width, height);
    let mut viewport = Viewport::new(device, queue, format, &store, config, metrics)?;
    for (x, y) in clicks {
        viewport.click(x, y)?;
    }

    let dt = 1.0 / fps.max(1.0);
    log::info!("Rendering {} frames to {}", frames, out_dir.display());

    for i in 0..frames {
        viewport.tick(dt, &texture_view)?;

        let mut encoder = viewport
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Readback Encoder") });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &output_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            texture_desc.size,
        );
        viewport.queue().submit(Some(encoder.finish()));

        let buffer_slice = output_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |v| {
            let _ = tx.send(v);
        });
        viewport.device().poll(wgpu::Maintain::Wait);
        rx.recv()
            .context("readback channel closed")?
            .map_err(|e| anyhow!("failed to map readback buffer: {}", e))?;

        let data = buffer_slice.get_mapped_range();
        let mut unpadded = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        for row in 0..height {
            let start = (row * padded_bytes_per_row) as usize;
            unpadded.extend_from_slice(&data[start..start + unpadded_bytes_per_row as usize]);
        }
        drop(data);
        output_buffer.unmap();

        let frame_path = out_dir.join(format!("frame_{:05}.png", i));
        image::save_buffer(&frame_path, &unpadded, width, height, image::ColorType::Rgba8)
            .with_context(|| format!("failed to write {}", frame_path.display()))?;

        if i % 60 == 0 {
            log::info!("Frame {}/{}", i + 1, frames);
        }
    }

    viewport.dispose()?;
    log::info!("Done.");
    Ok(())
}

fn view(source: Source, width: u32, height: u32) -> Result<()> {
    use winit::dpi::PhysicalSize;
    use winit::event::{ElementState, Event, MouseButton, WindowEvent};
    use winit::event_loop::EventLoop;
    use winit::window::WindowBuilder;

    let config = load_config(source.config.as_deref())?;
    let store = pollster::block_on(preload(&source))?;

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("scanfield")
            .with_inner_size(PhysicalSize::new(width, height))
            .build(&event_loop)?,
    );

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let surface = instance
        .create_surface(window.clone())
        .context("failed to create surface")?;
    let (adapter, device, queue) = pollster::block_on(request_device(&instance, Some(&surface)))?;

    let caps = surface.get_capabilities(&adapter);
    let format = caps
        .formats
        .iter()
        .copied()
        .find(|f| f.is_srgb())
        .or_else(|| caps.formats.first().copied())
        .context("surface reports no formats")?;
    let size = window.inner_size();
    let mut surface_config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: wgpu::PresentMode::AutoVsync,
        alpha_mode: caps.alpha_modes[0],
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&device, &surface_config);

    let metrics = ViewportMetrics::new(surface_config.width, surface_config.height);
    let mut viewport = Viewport::new(device, queue, format, &store, config, metrics)?;

    let mut cursor = (0.0f32, 0.0f32);
    let mut last_frame = Instant::now();
    let mut failure: Option<anyhow::Error> = None;

    event_loop.run(|event, elwt| {
        let result = match event {
            Event::WindowEvent { event, window_id } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    elwt.exit();
                    Ok(())
                }
                WindowEvent::Resized(size) if size.width > 0 && size.height > 0 => {
                    surface_config.width = size.width;
                    surface_config.height = size.height;
                    surface.configure(viewport.device(), &surface_config);
                    viewport.resize(size.width, size.height)
                }
                WindowEvent::CursorMoved { position, .. } => {
                    cursor = (position.x as f32, position.y as f32);
                    Ok(())
                }
                WindowEvent::MouseInput {
                    state: ElementState::Pressed,
                    button: MouseButton::Left,
                    ..
                } => viewport.click(cursor.0, cursor.1),
                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_frame).as_secs_f32();
                    last_frame = now;
                    render_to_surface(&mut viewport, &surface, &surface_config, dt)
                }
                _ => Ok(()),
            },
            Event::AboutToWait => {
                window.request_redraw();
                Ok(())
            }
            _ => Ok(()),
        };

        if let Err(e) = result {
            log::error!("{:#}", e);
            failure = Some(e);
            elwt.exit();
        }
    })?;

    viewport.dispose()?;
    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn render_to_surface(
    viewport: &mut Viewport,
    surface: &wgpu::Surface<'_>,
    surface_config: &wgpu::SurfaceConfiguration,
    dt: f32,
) -> Result<()> {
    viewport.update(dt)?;
    match surface.get_current_texture() {
        Ok(output) => {
            let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
            viewport.render(&view)?;
            output.present();
        }
        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
            surface.configure(viewport.device(), surface_config);
        }
        Err(wgpu::SurfaceError::OutOfMemory) => {
            return Err(anyhow!("surface out of memory"));
        }
        Err(e) => log::warn!("Surface error: {:?}", e),
    }
    Ok(())
}
