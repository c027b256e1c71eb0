//! Per-subset image cache with explicit invalidation

use crate::image::Image;

/// Identifies the configuration a cached image was computed for. Every
/// setter which can change cached results bumps `revision`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheKey {
    pub num_subsets: usize,
    pub revision: u64,
}

#[derive(Clone, Debug, Default)]
pub enum SubsetCache {
    #[default]
    Uninitialized,
    Valid { key: CacheKey, images: Vec<Option<Image>> },
    Stale,
}

impl SubsetCache {

    pub fn invalidate(&mut self) {
        if !matches!(self, Self::Uninitialized) { *self = Self::Stale }
    }

    pub fn get(&self, key: CacheKey, subset: usize) -> Option<&Image> {
        match self {
            Self::Valid { key: k, images } if *k == key => images.get(subset)?.as_ref(),
            _ => None,
        }
    }

    pub fn contains(&self, key: CacheKey, subset: usize) -> bool { self.get(key, subset).is_some() }

    /// Store the image of `subset`. Images cached under any other key are
    /// discarded first.
    pub fn insert(&mut self, key: CacheKey, subset: usize, image: Image) {
        if !matches!(self, Self::Valid { key: k, .. } if *k == key) {
            *self = Self::Valid { key, images: vec![None; key.num_subsets] };
        }
        if let Self::Valid { images, .. } = self { images[subset] = Some(image) }
    }

    /// Replace the cache with a full set of images
    pub fn install(&mut self, key: CacheKey, images: Vec<Image>) {
        debug_assert_eq!(images.len(), key.num_subsets);
        *self = Self::Valid { key, images: images.into_iter().map(Some).collect() };
    }
}
