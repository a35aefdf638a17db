//! Concurrent asset preloading.
//!
//! Every manifest item gets its own future; all of them are polled together
//! with [`try_join_all`]. Each success bumps a shared counter and pushes the
//! new percentage to the progress indicator. The first failure drops the
//! remaining futures and fails the whole batch, so a store is only ever
//! published complete.

use std::cell::RefCell;
use std::collections::HashMap;

use anyhow::{Context, Result};
use futures::future::try_join_all;

use crate::asset_source::AssetSource;
use crate::asset_store::{AssetStore, TextureData};
use crate::manifest::{AssetKind, AssetManifest, ManifestItem};
use crate::model_asset::ModelData;
use crate::progress::{LoadProgress, ProgressDigits, ProgressIndicator};

/// Callback invoked once with the finished store.
pub type OnLoaded = Box<dyn FnOnce(&AssetStore)>;

/// A decoded manifest item, tagged with where it goes in the store.
#[derive(Debug)]
pub enum LoadedItem {
    Image { id: String, texture: TextureData },
    Model { id: String, model: ModelData },
    ModelTexture { id: String, texture: TextureData },
}

/// Counter plus its presentation, shared by every in-flight item.
struct Tracker<P> {
    progress: LoadProgress,
    indicator: P,
}

impl<P: ProgressIndicator> Tracker<P> {
    fn advance(&mut self) -> Result<()> {
        self.progress.advance()?;
        let digits = ProgressDigits::from_percent(self.progress.percent());
        self.indicator.show(digits)
    }
}

/// Loads an [`AssetManifest`] into an [`AssetStore`].
///
/// `load_all` consumes the preloader, so the completion callback can fire at
/// most once.
pub struct Preloader<S, P> {
    source: S,
    indicator: P,
    on_loaded: Option<OnLoaded>,
}

impl<S: AssetSource, P: ProgressIndicator> Preloader<S, P> {
    pub fn new(source: S, indicator: P) -> Self {
        Self {
            source,
            indicator,
            on_loaded: None,
        }
    }

    /// Register the completion callback. Replaces any previous one.
    pub fn on_loaded(mut self, callback: impl FnOnce(&AssetStore) + 'static) -> Self {
        self.on_loaded = Some(Box::new(callback));
        self
    }

    /// Fetch and decode every item concurrently.
    ///
    /// On success the store is built, the callback runs, and the store is
    /// returned. On failure nothing is published and the callback is dropped
    /// without running.
    pub async fn load_all(self, manifest: &AssetManifest) -> Result<AssetStore> {
        let Preloader {
            source,
            indicator,
            on_loaded,
        } = self;

        let total = manifest.total_items();
        log::info!("Preloading {} assets ({} images)", total, manifest.image_count());

        let tracker = RefCell::new(Tracker {
            progress: LoadProgress::new(total),
            indicator,
        });

        let loads = manifest
            .items()
            .iter()
            .map(|item| load_item(&source, item, &tracker));
        let loaded = try_join_all(loads).await?;

        let store = assemble(loaded);
        log::info!("All {} assets loaded", tracker.borrow().progress.loaded_count());

        if let Some(callback) = on_loaded {
            callback(&store);
        }
        Ok(store)
    }
}

async fn load_item<S: AssetSource, P: ProgressIndicator>(
    source: &S,
    item: &ManifestItem,
    tracker: &RefCell<Tracker<P>>,
) -> Result<LoadedItem> {
    let loaded = match fetch_and_decode(source, item).await {
        Ok(loaded) => loaded,
        Err(err) => {
            log::error!("Failed to load asset '{}' from {}: {:#}", item.id, item.source, err);
            return Err(err.context(format!("asset '{}' ({})", item.id, item.source)));
        }
    };

    // Never held across an await.
    tracker.borrow_mut().advance()?;
    Ok(loaded)
}

async fn fetch_and_decode<S: AssetSource>(source: &S, item: &ManifestItem) -> Result<LoadedItem> {
    let bytes = source.fetch(&item.source).await?;
    let id = item.id.clone();
    let loaded = match item.kind {
        AssetKind::Image => LoadedItem::Image {
            id,
            texture: TextureData::decode(&bytes)?,
        },
        AssetKind::ModelTexture => LoadedItem::ModelTexture {
            id,
            texture: TextureData::decode(&bytes)?,
        },
        AssetKind::Model => LoadedItem::Model {
            id,
            model: ModelData::from_glb(&bytes).context("failed to decode model")?,
        },
    };
    Ok(loaded)
}

fn assemble(items: Vec<LoadedItem>) -> AssetStore {
    let mut textures = HashMap::new();
    let mut model_textures = HashMap::new();
    let mut models = HashMap::new();

    for item in items {
        match item {
            LoadedItem::Image { id, texture } => {
                textures.insert(id, texture);
            }
            LoadedItem::ModelTexture { id, texture } => {
                model_textures.insert(id, texture);
            }
            LoadedItem::Model { id, model } => {
                models.insert(id, model);
            }
        }
    }

    let mut builder = AssetStore::builder();
    builder
        .set_textures(textures)
        .set_model_textures(model_textures)
        .set_models(models);
    builder.build()
}
