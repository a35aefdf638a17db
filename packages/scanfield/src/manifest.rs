//! Asset manifest: the list of things the preloader must fetch.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Well-known location of the character model.
pub const MODEL_PATH: &str = "/model/character.glb";
/// Well-known location of the character's baked texture.
pub const MODEL_TEXTURE_PATH: &str = "/textures/baked.jpg";

/// What an item decodes into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Image,
    Model,
    ModelTexture,
}

/// One entry of the manifest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestItem {
    /// Identifier, unique among items of the same kind. Images are published
    /// under this key.
    pub id: String,
    pub kind: AssetKind,
    /// URI or path handed to the asset source.
    pub source: String,
}

impl ManifestItem {
    pub fn image(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: AssetKind::Image,
            source: source.into(),
        }
    }

    pub fn model(source: impl Into<String>) -> Self {
        Self {
            id: crate::asset_store::CHARACTER_MODEL_KEY.to_string(),
            kind: AssetKind::Model,
            source: source.into(),
        }
    }

    pub fn model_texture(source: impl Into<String>) -> Self {
        Self {
            id: crate::asset_store::SKIN_TEXTURE_KEY.to_string(),
            kind: AssetKind::ModelTexture,
            source: source.into(),
        }
    }
}

/// A validated, immutable list of items.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetManifest {
    items: Vec<ManifestItem>,
}

impl AssetManifest {
    /// Validate and freeze a list of items.
    ///
    /// Requires exactly one model and one model texture, non-empty ids and
    /// sources, and ids that are unique within each kind.
    pub fn new(items: Vec<ManifestItem>) -> Result<Self> {
        let mut seen = HashSet::new();
        for item in &items {
            if item.id.is_empty() {
                bail!("manifest item with source '{}' has an empty id", item.source);
            }
            if item.source.is_empty() {
                bail!("manifest item '{}' has an empty source", item.id);
            }
            if !seen.insert((item.kind, item.id.as_str())) {
                bail!("duplicate {:?} id '{}' in manifest", item.kind, item.id);
            }
        }

        for kind in [AssetKind::Model, AssetKind::ModelTexture] {
            let count = items.iter().filter(|i| i.kind == kind).count();
            if count != 1 {
                bail!("manifest must contain exactly one {:?} item, found {}", kind, count);
            }
        }

        Ok(Self { items })
    }

    /// The standard manifest: the given images plus the well-known model and
    /// model texture paths.
    pub fn with_images(images: Vec<ManifestItem>) -> Result<Self> {
        let mut items = images;
        items.push(ManifestItem::model(MODEL_PATH));
        items.push(ManifestItem::model_texture(MODEL_TEXTURE_PATH));
        Self::new(items)
    }

    pub fn items(&self) -> &[ManifestItem] {
        &self.items
    }

    pub fn image_count(&self) -> usize {
        self.items.iter().filter(|i| i.kind == AssetKind::Image).count()
    }

    /// Total number of weight-1 items: every image plus the model and its texture.
    pub fn total_items(&self) -> usize {
        self.image_count() + 2
    }
}

// ============================================================================
// On-disk manifest (native builds)
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub id: String,
    pub src: String,
}

/// JSON manifest used by the CLI, mirroring the DOM's `data-id`/`data-src`
/// image list plus the two fixed model paths.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManifestFile {
    #[serde(default)]
    pub images: Vec<ImageEntry>,
    #[serde(default = "default_model_path")]
    pub model: String,
    #[serde(default = "default_model_texture_path")]
    pub model_texture: String,
}

fn default_model_path() -> String {
    MODEL_PATH.to_string()
}

fn default_model_texture_path() -> String {
    MODEL_TEXTURE_PATH.to_string()
}

impl ManifestFile {
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse manifest {}", path.display()))
    }

    pub fn into_manifest(self) -> Result<AssetManifest> {
        let mut items: Vec<ManifestItem> = self
            .images
            .into_iter()
            .map(|entry| ManifestItem::image(entry.id, entry.src))
            .collect();
        items.push(ManifestItem::model(self.model));
        items.push(ManifestItem::model_texture(self.model_texture));
        AssetManifest::new(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_items_counts_model_and_texture() {
        let manifest = AssetManifest::with_images(vec![
            ManifestItem::image("0", "/images/a.png"),
            ManifestItem::image("1", "/images/b.png"),
            ManifestItem::image("2", "/images/font.png"),
        ])
        .unwrap();
        assert_eq!(manifest.image_count(), 3);
        assert_eq!(manifest.total_items(), 5);
        assert_eq!(manifest.items().len(), 5);
    }

    #[test]
    fn test_duplicate_image_id_rejected() {
        let result = AssetManifest::with_images(vec![
            ManifestItem::image("0", "/a.png"),
            ManifestItem::image("0", "/b.png"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_same_id_different_kind_allowed() {
        // An image may share its id with the model key; ids are per kind.
        let result = AssetManifest::with_images(vec![ManifestItem::image("character", "/a.png")]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_missing_model_rejected() {
        let result = AssetManifest::new(vec![ManifestItem::model_texture("/t.jpg")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_source_rejected() {
        assert!(AssetManifest::with_images(vec![ManifestItem::image("0", "")]).is_err());
    }

    #[test]
    fn test_manifest_file_defaults_paths() {
        let file: ManifestFile =
            serde_json::from_str(r#"{ "images": [{ "id": "2", "src": "textures/font.png" }] }"#).unwrap();
        assert_eq!(file.model, MODEL_PATH);
        let manifest = file.into_manifest().unwrap();
        assert_eq!(manifest.total_items(), 3);
    }
}
