//! Loaded asset snapshot.
//!
//! The store is written exactly once, by the preloader, through
//! [`AssetStoreBuilder`]. Everything downstream receives the finished
//! [`AssetStore`] by reference and can only read from it, so a partially
//! populated store is never observable.

use std::collections::HashMap;

use anyhow::{Context, Result};

use crate::model_asset::ModelData;

/// Key under which the character model is published.
pub const CHARACTER_MODEL_KEY: &str = "character";
/// Key under which the character's baked texture is published.
pub const SKIN_TEXTURE_KEY: &str = "skin";

/// A decoded RGBA8 image.
#[derive(Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 rows, top row first.
    pub rgba: Vec<u8>,
}

impl std::fmt::Debug for TextureData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureData")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}

impl TextureData {
    /// Decode PNG or JPEG bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes).context("failed to decode image bytes")?;
        let rgba = image.to_rgba8();
        Ok(Self {
            width: rgba.width(),
            height: rgba.height(),
            rgba: rgba.into_raw(),
        })
    }
}

/// Immutable snapshot of every preloaded asset.
#[derive(Debug, Clone, Default)]
pub struct AssetStore {
    textures: HashMap<String, TextureData>,
    model_textures: HashMap<String, TextureData>,
    models: HashMap<String, ModelData>,
}

impl AssetStore {
    pub fn builder() -> AssetStoreBuilder {
        AssetStoreBuilder::default()
    }

    /// UI images keyed by their manifest id.
    pub fn textures(&self) -> &HashMap<String, TextureData> {
        &self.textures
    }

    pub fn model_textures(&self) -> &HashMap<String, TextureData> {
        &self.model_textures
    }

    pub fn models(&self) -> &HashMap<String, ModelData> {
        &self.models
    }

    pub fn texture(&self, id: &str) -> Option<&TextureData> {
        self.textures.get(id)
    }

    /// The character model.
    pub fn model(&self) -> Option<&ModelData> {
        self.models.get(CHARACTER_MODEL_KEY)
    }

    /// The character model's texture.
    pub fn model_texture(&self) -> Option<&TextureData> {
        self.model_textures.get(SKIN_TEXTURE_KEY)
    }

    /// True when nothing has been published.
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty() && self.model_textures.is_empty() && self.models.is_empty()
    }
}

/// Single-writer staging area for an [`AssetStore`].
#[derive(Debug, Default)]
pub struct AssetStoreBuilder {
    textures: HashMap<String, TextureData>,
    model_textures: HashMap<String, TextureData>,
    models: HashMap<String, ModelData>,
}

impl AssetStoreBuilder {
    pub fn set_textures(&mut self, textures: HashMap<String, TextureData>) -> &mut Self {
        self.textures = textures;
        self
    }

    pub fn set_model_textures(&mut self, model_textures: HashMap<String, TextureData>) -> &mut Self {
        self.model_textures = model_textures;
        self
    }

    pub fn set_models(&mut self, models: HashMap<String, ModelData>) -> &mut Self {
        self.models = models;
        self
    }

    /// Freeze the staged maps into a read-only store.
    pub fn build(self) -> AssetStore {
        AssetStore {
            textures: self.textures,
            model_textures: self.model_textures,
            models: self.models,
        }
    }
}
