use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// Path of a portrait file inside an asset source
pub fn portrait_asset(file_name: &str) -> String {
    format!("portraits/{}", file_name)
}

/// Default portrait path for a character id
pub fn portrait_path(character_id: &str) -> String {
    portrait_asset(&format!("{}.png", character_id))
}

/// Where template portraits come from. Implementations block; callers that
/// need async run them on a blocking thread.
pub trait AssetSource: Send + Sync {
    /// Fetch the raw bytes of an asset. `Ok(None)` means the asset does not exist.
    fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>>;
}

/// Assets laid out on disk under a root directory
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetSource for DirectorySource {
    fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let full = self.root.join(path);
        if !full.exists() {
            debug!("Asset missing: {}", full.display());
            return Ok(None);
        }
        let bytes =
            std::fs::read(&full).with_context(|| format!("Failed to read {}", full.display()))?;
        Ok(Some(bytes))
    }
}

/// Assets held in memory, keyed by path
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    assets: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: Vec<u8>) {
        self.assets.insert(path.into(), bytes);
    }

    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        self.assets.remove(path)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl AssetSource for MemorySource {
    fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.assets.get(path).cloned())
    }
}
