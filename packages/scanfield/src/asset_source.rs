//! Byte sources the preloader fetches from.

use anyhow::Result;

/// Something that can turn a manifest URI into bytes.
///
/// Futures are not required to be `Send`; on wasm they wrap JS promises.
#[allow(async_fn_in_trait)]
pub trait AssetSource {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>>;
}

impl<T: AssetSource + ?Sized> AssetSource for &T {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
        (**self).fetch(uri).await
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::FsAssetSource;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::path::{Path, PathBuf};

    use anyhow::{Context, Result};

    use super::AssetSource;

    /// Reads assets from a directory that mirrors the site's public root.
    ///
    /// A URI like `/model/character.glb` resolves to `<root>/model/character.glb`.
    #[derive(Debug, Clone)]
    pub struct FsAssetSource {
        root: PathBuf,
    }

    impl FsAssetSource {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self { root: root.into() }
        }

        pub fn root(&self) -> &Path {
            &self.root
        }

        pub fn resolve(&self, uri: &str) -> PathBuf {
            self.root.join(uri.trim_start_matches('/'))
        }
    }

    impl AssetSource for FsAssetSource {
        async fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
            let path = self.resolve(uri);
            std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_resolve_strips_leading_slash() {
            let source = FsAssetSource::new("/srv/public");
            assert_eq!(
                source.resolve("/model/character.glb"),
                PathBuf::from("/srv/public/model/character.glb")
            );
            assert_eq!(source.resolve("img/a.png"), PathBuf::from("/srv/public/img/a.png"));
        }

        #[test]
        fn test_missing_file_is_error() {
            let source = FsAssetSource::new(std::env::temp_dir());
            let result = pollster::block_on(source.fetch("/scanfield-definitely-missing.bin"));
            assert!(result.is_err());
        }
    }
}
