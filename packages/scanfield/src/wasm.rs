use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, HtmlCanvasElement, HtmlElement, Request, RequestCredentials, RequestInit, RequestMode, Response};

use crate::asset_source::AssetSource;
use crate::asset_store::AssetStore;
use crate::config::ViewerConfig;
use crate::manifest::{AssetManifest, ManifestItem};
use crate::preloader::Preloader;
use crate::progress::{DigitSlot, ProgressDigits, ProgressIndicator};
use crate::viewport::Viewport;

const PRELOADER_SELECTOR: &str = "[data-ui=\"preloader\"]";
const PRELOADER_ASSETS_SELECTOR: &str = "[data-ui=\"preloader-assets\"] img";

fn js_error(e: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{:#}", e))
}

fn js_context(value: JsValue) -> anyhow::Error {
    anyhow!("{:?}", value)
}

fn document() -> Result<Document> {
    web_sys::window()
        .and_then(|w| w.document())
        .context("no document available")
}

// ============================================================================
// Asset fetching
// ============================================================================

/// Fetches assets over HTTP with the browser's `fetch`.
pub struct FetchAssetSource;

impl AssetSource for FetchAssetSource {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
        let window = web_sys::window().context("no window available")?;

        let init = RequestInit::new();
        init.set_method("GET");
        init.set_mode(RequestMode::Cors);
        init.set_credentials(RequestCredentials::SameOrigin);
        let request = Request::new_with_str_and_init(uri, &init).map_err(js_context)?;

        let response = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(js_context)
            .with_context(|| format!("fetch {} failed", uri))?;
        let response: Response = response.dyn_into().map_err(js_context)?;
        if !response.ok() {
            return Err(anyhow!("fetch {} returned HTTP {}", uri, response.status()));
        }

        let buffer = JsFuture::from(response.array_buffer().map_err(js_context)?)
            .await
            .map_err(js_context)?;
        Ok(js_sys::Uint8Array::new(&buffer).to_vec())
    }
}

/// Collect image entries from the preloader's `<img data-id data-src>` list.
pub fn manifest_from_dom(document: &Document) -> Result<AssetManifest> {
    let nodes = document
        .query_selector_all(PRELOADER_ASSETS_SELECTOR)
        .map_err(js_context)?;

    let mut images = Vec::with_capacity(nodes.length() as usize);
    for i in 0..nodes.length() {
        let Some(element) = nodes.item(i).and_then(|n| n.dyn_into::<web_sys::Element>().ok()) else {
            continue;
        };
        let id = element.get_attribute("data-id").unwrap_or_default();
        let src = element.get_attribute("data-src").unwrap_or_default();
        images.push(ManifestItem::image(id, src));
    }

    AssetManifest::with_images(images)
}

// ============================================================================
// Progress
// ============================================================================

/// Writes `--progress` on the three preloader digit elements.
pub struct DomProgressIndicator {
    digits: [(DigitSlot, HtmlElement); 3],
}

impl DomProgressIndicator {
    /// Fails if any of the digit elements is missing.
    pub fn from_document(document: &Document) -> Result<Self> {
        let find = |slot: DigitSlot| -> Result<(DigitSlot, HtmlElement)> {
            let selector = format!("[data-ui=\"{}\"]", slot.data_ui());
            let element = document
                .query_selector(&selector)
                .map_err(js_context)?
                .with_context(|| format!("progress element {} not found", selector))?
                .dyn_into::<HtmlElement>()
                .map_err(|_| anyhow!("progress element {} is not an HTMLElement", selector))?;
            Ok((slot, element))
        };
        let [a, b, c] = DigitSlot::ALL;
        Ok(Self {
            digits: [find(a)?, find(b)?, find(c)?],
        })
    }
}

impl ProgressIndicator for DomProgressIndicator {
    fn show(&mut self, digits: ProgressDigits) -> Result<()> {
        for (slot, element) in &self.digits {
            element
                .style()
                .set_property("--progress", &digits.get(*slot).to_string())
                .map_err(js_context)?;
        }
        Ok(())
    }
}

// ============================================================================
// Viewport binding
// ============================================================================

#[wasm_bindgen]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}

#[wasm_bindgen]
pub struct WasmViewport {
    inner: Rc<RefCell<ViewportContext>>,
}

struct ViewportContext {
    viewport: Viewport,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

#[wasm_bindgen]
impl WasmViewport {
    /// Resize from CSS pixels and the device pixel ratio.
    pub fn resize(&self, css_width: f32, css_height: f32, device_pixel_ratio: f32) -> Result<(), JsValue> {
        let mut inner = self.inner.borrow_mut();
        let ctx = &mut *inner;

        let ratio = ctx.viewport.config().pixel_ratio(device_pixel_ratio);
        let width = (css_width * ratio).round() as u32;
        let height = (css_height * ratio).round() as u32;
        if width == 0 || height == 0 {
            return Ok(());
        }

        ctx.viewport.resize(width, height).map_err(js_error)?;
        ctx.config.width = width;
        ctx.config.height = height;
        ctx.surface.configure(ctx.viewport.device(), &ctx.config);
        Ok(())
    }

    /// Click position in CSS pixels.
    pub fn click(&self, css_x: f32, css_y: f32, device_pixel_ratio: f32) -> Result<(), JsValue> {
        let mut inner = self.inner.borrow_mut();
        let ratio = inner.viewport.config().pixel_ratio(device_pixel_ratio);
        inner.viewport.click(css_x * ratio, css_y * ratio).map_err(js_error)
    }

    /// Advance by `dt` seconds and draw. Call from the host's animation frame loop.
    pub fn tick(&self, dt: f32) -> Result<(), JsValue> {
        let mut inner = self.inner.borrow_mut();
        let ctx = &mut *inner;

        ctx.viewport.update(dt).map_err(js_error)?;

        match ctx.surface.get_current_texture() {
            Ok(output) => {
                let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
                ctx.viewport.render(&view).map_err(js_error)?;
                output.present();
            }
            Err(wgpu::SurfaceError::Lost) => {
                ctx.surface.configure(ctx.viewport.device(), &ctx.config);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Surface out of memory");
            }
            Err(e) => {
                log::warn!("Surface error: {:?}", e);
            }
        }
        Ok(())
    }

    pub fn dispose(&self) -> Result<(), JsValue> {
        self.inner.borrow_mut().viewport.dispose().map_err(js_error)
    }
}

/// Preload every asset listed in the page, then build the viewport on `canvas`.
///
/// `config_json` may be empty for defaults.
#[wasm_bindgen]
pub async fn create_viewport(canvas: HtmlCanvasElement, config_json: String) -> Result<WasmViewport, JsValue> {
    init_panic_hook();

    let config = if config_json.trim().is_empty() {
        ViewerConfig::default()
    } else {
        ViewerConfig::from_json_str(&config_json).map_err(js_error)?
    };

    let document = document().map_err(js_error)?;
    let manifest = manifest_from_dom(&document).map_err(js_error)?;
    let indicator = DomProgressIndicator::from_document(&document).map_err(js_error)?;

    let preloader_document = document.clone();
    let store: AssetStore = Preloader::new(FetchAssetSource, indicator)
        .on_loaded(move |store| {
            log::info!("Preloaded {} images", store.textures().len());
            if let Ok(Some(element)) = preloader_document.query_selector(PRELOADER_SELECTOR) {
                element.remove();
            }
        })
        .load_all(&manifest)
        .await
        .map_err(js_error)?;

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        dx12_shader_compiler: Default::default(),
        flags: wgpu::InstanceFlags::default(),
        gles_minor_version: wgpu::Gles3MinorVersion::Automatic,
    });

    let target = wgpu::SurfaceTarget::Canvas(canvas.clone());
    let surface = instance
        .create_surface(target)
        .map_err(|e| JsValue::from_str(&format!("Failed to create surface: {}", e)))?;

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::None,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| JsValue::from_str("Failed to find an appropriate adapter"))?;

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
                memory_hints: Default::default(),
            },
            None,
        )
        .await
        .map_err(|e| JsValue::from_str(&format!("Failed to create device: {}", e)))?;

    let surface_caps = surface.get_capabilities(&adapter);
    let surface_format = surface_caps
        .formats
        .iter()
        .copied()
        .find(|f: &wgpu::TextureFormat| f.is_srgb())
        .or_else(|| surface_caps.formats.first().copied())
        .ok_or_else(|| JsValue::from_str("Surface reports no formats"))?;

    let config_surface = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format: surface_format,
        width: canvas.width().max(1),
        height: canvas.height().max(1),
        present_mode: surface_caps.present_modes[0],
        alpha_mode: surface_caps.alpha_modes[0],
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&device, &config_surface);

    let metrics = crate::post_processing::ViewportMetrics::new(config_surface.width, config_surface.height);
    let viewport = Viewport::new(device, queue, surface_format, &store, config, metrics).map_err(js_error)?;

    Ok(WasmViewport {
        inner: Rc::new(RefCell::new(ViewportContext {
            viewport,
            surface,
            config: config_surface,
        })),
    })
}
