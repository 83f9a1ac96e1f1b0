use crate::phash::PerceptualHash;
use crate::similarity::{center_crop, Prepared, StrategyKind};
use dcwc_capture::{decode_bytes, portrait_path, AssetSource};
use image::RgbaImage;
use parking_lot::RwLock;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Reference portrait for one character, with its hash computed up front
#[derive(Debug, Clone)]
pub struct Template {
    pub id: String,
    pub image: RgbaImage,
    /// Hash of the portrait region (see [`portrait_hash`])
    pub hash: PerceptualHash,
    prepared: [OnceLock<Prepared>; StrategyKind::ALL.len()],
}

impl Template {
    pub fn new(id: &str, image: RgbaImage) -> Self {
        let hash = portrait_hash(&image);
        Self {
            id: id.to_string(),
            image,
            hash,
            prepared: Default::default(),
        }
    }

    /// This portrait as `kind` compares it, computed on first use
    pub fn prepared(&self, kind: StrategyKind) -> &Prepared {
        self.prepared[kind.index()].get_or_init(|| kind.strategy().prepare(&self.image))
    }
}

/// Hash of the center crop, so frames and badges around a card do not move it
/// away from the bare portrait
pub fn portrait_hash(image: &RgbaImage) -> PerceptualHash {
    PerceptualHash::compute(&center_crop(image))
}

/// Character id -> template. Iterates in lexical id order.
/// Never mutated in place: every change produces a new library.
#[derive(Debug, Clone, Default)]
pub struct TemplateLibrary {
    templates: BTreeMap<String, Arc<Template>>,
}

impl TemplateLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from in-memory images; a repeated id keeps the last image
    pub fn from_images(images: impl IntoIterator<Item = (String, RgbaImage)>) -> Self {
        let templates = images
            .into_iter()
            .map(|(id, image)| {
                let template = Template::new(&id, image);
                (id, Arc::new(template))
            })
            .collect();
        Self { templates }
    }

    /// Fetch `portraits/{id}.png` for every id from `source` and decode in parallel.
    /// Missing or undecodable portraits are logged and left out.
    pub fn build(source: &dyn AssetSource, ids: &[String]) -> Self {
        let entries: Vec<(String, String)> = ids
            .iter()
            .map(|id| (id.clone(), portrait_path(id)))
            .collect();
        Self::build_from_paths(source, &entries)
    }

    /// Like [`TemplateLibrary::build`], with an explicit asset path per id
    pub fn build_from_paths(source: &dyn AssetSource, entries: &[(String, String)]) -> Self {
        let loaded: Vec<Template> = entries
            .par_iter()
            .filter_map(|(id, path)| load_template(source, id, path))
            .collect();

        let library = Self {
            templates: loaded
                .into_iter()
                .map(|t| (t.id.clone(), Arc::new(t)))
                .collect(),
        };

        info!("Template library built: {} of {} portraits", library.len(), entries.len());
        library
    }

    /// Prepare every template for `kind` up front, in parallel
    pub fn precompute(&self, kind: StrategyKind) {
        self.templates.par_iter().for_each(|(_, t)| {
            t.prepared(kind);
        });
        debug!("Prepared {} templates for {:?}", self.len(), kind);
    }

    /// Copy of this library with one template added or replaced
    pub fn with_template(&self, template: Template) -> Self {
        let mut templates = self.templates.clone();
        templates.insert(template.id.clone(), Arc::new(template));
        Self { templates }
    }

    /// Copy of this library without `id`
    pub fn without(&self, id: &str) -> Self {
        let mut templates = self.templates.clone();
        templates.remove(id);
        Self { templates }
    }

    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.get(id).map(|t| t.as_ref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.values().map(|t| t.as_ref())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

fn load_template(source: &dyn AssetSource, id: &str, path: &str) -> Option<Template> {
    let bytes = match source.fetch(path) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            debug!("No portrait for {} at {}", id, path);
            return None;
        }
        Err(e) => {
            warn!("Failed to fetch portrait for {}: {:#}", id, e);
            return None;
        }
    };

    match decode_bytes(&bytes) {
        Ok(image) => Some(Template::new(id, image)),
        Err(e) => {
            warn!("Failed to decode portrait for {}: {}", id, e);
            None
        }
    }
}

/// Shared handle to the current library. Readers take an `Arc` snapshot and
/// keep using it even if a rebuild swaps in a new library mid-batch.
#[derive(Debug, Default)]
pub struct TemplateCache {
    current: RwLock<Arc<TemplateLibrary>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library(library: TemplateLibrary) -> Self {
        Self {
            current: RwLock::new(Arc::new(library)),
        }
    }

    pub fn snapshot(&self) -> Arc<TemplateLibrary> {
        Arc::clone(&self.current.read())
    }

    /// Swap in a complete new library, returning the previous one
    pub fn replace(&self, library: TemplateLibrary) -> Arc<TemplateLibrary> {
        let next = Arc::new(library);
        let previous = std::mem::replace(&mut *self.current.write(), next);
        debug!("Template cache replaced ({} -> {} templates)", previous.len(), self.current.read().len());
        previous
    }

    /// Drop all templates; the next batch sees an empty library until a rebuild
    pub fn invalidate(&self) {
        let previous = self.replace(TemplateLibrary::new());
        info!("Template cache invalidated ({} templates dropped)", previous.len());
    }

    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }
}
