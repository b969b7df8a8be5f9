//! Bounded LRU caches for decoded images.
//!
//! Two independent instances back the UI: a large one for filmstrip
//! thumbnails and a small one for viewing-pane previews. Both are owned and
//! mutated only by the interactive thread - the loader never touches them,
//! it just emits decoded frames - so the type carries no locking.
//!
//! Eviction is pure recency: `get`, `touch`, and `put` all count as a touch,
//! and overflow drops the least-recently-touched entry.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lru::LruCache;

use crate::decode::DecodedImage;

/// Entry budget for the thumbnail cache.
pub const THUMBNAIL_CACHE_CAPACITY: usize = 200;

/// Entry budget for the preview cache. Previews are an order of magnitude
/// larger per entry, hence the much smaller cap.
pub const PREVIEW_CACHE_CAPACITY: usize = 20;

/// A strictly bounded path-to-image map with LRU eviction.
pub struct ImageCache {
    entries: LruCache<PathBuf, DecodedImage>,
}

impl ImageCache {
    /// Create a cache holding at most `capacity` entries (floored at 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// The standard thumbnail-tier cache.
    pub fn thumbnails() -> Self {
        Self::with_capacity(THUMBNAIL_CACHE_CAPACITY)
    }

    /// The standard preview-tier cache.
    pub fn previews() -> Self {
        Self::with_capacity(PREVIEW_CACHE_CAPACITY)
    }

    /// Look up a decoded image, refreshing its recency on hit.
    pub fn get(&mut self, path: &Path) -> Option<&DecodedImage> {
        self.entries.get(path)
    }

    /// Insert or replace an entry, evicting the least-recently-touched one
    /// if the cache is full.
    pub fn put(&mut self, path: PathBuf, image: DecodedImage) {
        self.entries.put(path, image);
    }

    /// Refresh an entry's recency without reading it. Returns whether the
    /// path was present.
    pub fn touch(&mut self, path: &Path) -> bool {
        if self.entries.contains(path) {
            self.entries.promote(path);
            true
        } else {
            false
        }
    }

    /// Whether a path is cached, without refreshing recency.
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries this cache will hold.
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Drop every entry (folder change).
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
