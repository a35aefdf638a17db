//! In-memory fixtures shared by the integration tests.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use anyhow::{anyhow, Result};
use scanfield::asset_source::AssetSource;
use scanfield::manifest::{AssetManifest, ManifestItem, MODEL_PATH, MODEL_TEXTURE_PATH};

/// Encode a solid-colour PNG.
pub fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("encode png");
    bytes.into_inner()
}

/// A binary glTF holding one triangle spanning y = 0..2.
pub fn triangle_glb() -> Vec<u8> {
    let positions: [[f32; 3]; 3] = [[-1.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 2.0, 0.0]];
    let mut bin: Vec<u8> = positions
        .iter()
        .flatten()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    let bin_len = bin.len();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let json = format!(
        concat!(
            r#"{{"asset":{{"version":"2.0"}},"scene":0,"scenes":[{{"nodes":[0]}}],"#,
            r#""nodes":[{{"mesh":0}}],"meshes":[{{"primitives":[{{"attributes":{{"POSITION":0}}}}]}}],"#,
            r#""accessors":[{{"bufferView":0,"componentType":5126,"count":3,"type":"VEC3","#,
            r#""min":[-1.0,0.0,0.0],"max":[1.0,2.0,0.0]}}],"#,
            r#""bufferViews":[{{"buffer":0,"byteOffset":0,"byteLength":{len}}}],"#,
            r#""buffers":[{{"byteLength":{len}}}]}}"#
        ),
        len = bin_len
    );
    let mut json = json.into_bytes();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }

    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"JSON");
    glb.extend_from_slice(&json);
    glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"BIN\0");
    glb.extend_from_slice(&bin);
    glb
}

/// Future that returns `Pending` a fixed number of times before completing.
pub struct YieldNow {
    remaining: usize,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.remaining == 0 {
            return Poll::Ready(());
        }
        self.remaining -= 1;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

pub fn yield_times(n: usize) -> YieldNow {
    YieldNow { remaining: n }
}

/// Serves bytes from a map, optionally failing or stalling per URI.
#[derive(Default)]
pub struct MemoryAssetSource {
    files: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    delays: HashMap<String, usize>,
    fetches: Cell<usize>,
}

impl MemoryAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, uri: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(uri.to_string(), bytes);
        self
    }

    pub fn failing(mut self, uri: &str) -> Self {
        self.failing.insert(uri.to_string());
        self
    }

    /// Make `uri` yield `polls` times before resolving.
    pub fn delayed(mut self, uri: &str, polls: usize) -> Self {
        self.delays.insert(uri.to_string(), polls);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }
}

impl AssetSource for MemoryAssetSource {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
        self.fetches.set(self.fetches.get() + 1);
        yield_times(self.delays.get(uri).copied().unwrap_or(0)).await;
        if self.failing.contains(uri) {
            return Err(anyhow!("HTTP 404 for {}", uri));
        }
        self.files
            .get(uri)
            .cloned()
            .ok_or_else(|| anyhow!("no fixture for {}", uri))
    }
}

pub fn image_uri(i: usize) -> String {
    format!("/images/{}.png", i)
}

/// A source with `images` small PNGs, the model and the model texture.
pub fn standard_source(images: usize) -> MemoryAssetSource {
    let mut source = MemoryAssetSource::new()
        .with_file(MODEL_PATH, triangle_glb())
        .with_file(MODEL_TEXTURE_PATH, png_bytes(4, 4, [200, 120, 40, 255]));
    for i in 0..images {
        source = source.with_file(&image_uri(i), png_bytes(2, 2, [i as u8, 0, 0, 255]));
    }
    source
}

pub fn standard_manifest(images: usize) -> AssetManifest {
    let items = (0..images)
        .map(|i| ManifestItem::image(i.to_string(), image_uri(i)))
        .collect();
    AssetManifest::with_images(items).expect("valid manifest")
}
