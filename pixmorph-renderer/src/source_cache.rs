//! Decoded pixel storage addressed by [`SourceKey`].
//!
//! Layers and the editor only hold keys. The cache owns the pixels and
//! counts how many holders each key has, dropping the pixels when the last
//! holder releases it.

use std::collections::HashMap;

use pixmorph_core::SourceKey;

use crate::image::TextureData;

/// Entry in the source cache.
#[derive(Debug)]
struct CacheEntry {
    /// The decoded pixels.
    data: TextureData,
    /// Size in bytes.
    size_bytes: usize,
    /// Number of holders.
    ref_count: u32,
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of sources dropped after their last release.
    pub releases: u64,
    /// Total bytes loaded.
    pub bytes_loaded: u64,
}

/// Reference-counted store of decoded sources.
#[derive(Debug, Default)]
pub struct SourceCache {
    entries: HashMap<SourceKey, CacheEntry>,
    current_size: usize,
    stats: CacheStats,
}

impl SourceCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pixels under a fresh key with one holder.
    pub fn insert(&mut self, data: TextureData) -> SourceKey {
        let key = SourceKey::new();
        let size_bytes = data.data.len();

        self.current_size += size_bytes;
        self.stats.bytes_loaded += size_bytes as u64;
        tracing::debug!(
            "Cached source {key} ({}x{}, {size_bytes} bytes)",
            data.width,
            data.height
        );

        self.entries.insert(
            key,
            CacheEntry {
                data,
                size_bytes,
                ref_count: 1,
            },
        );
        key
    }

    /// Look up pixels for a key.
    pub fn get(&mut self, key: SourceKey) -> Option<&TextureData> {
        if let Some(entry) = self.entries.get_mut(&key) {
            self.stats.hits += 1;
            Some(&entry.data)
        } else {
            self.stats.misses += 1;
            None
        }
    }

    /// Look up pixels without touching statistics.
    #[must_use]
    pub fn peek(&self, key: SourceKey) -> Option<&TextureData> {
        self.entries.get(&key).map(|entry| &entry.data)
    }

    /// Add a holder to an existing key. Returns `false` if the key is unknown.
    pub fn retain(&mut self, key: SourceKey) -> bool {
        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.ref_count += 1;
                true
            }
            None => false,
        }
    }

    /// Drop one holder. The pixels are freed when no holders remain.
    ///
    /// Returns `true` if this call freed the pixels.
    pub fn release(&mut self, key: SourceKey) -> bool {
        let Some(entry) = self.entries.get_mut(&key) else {
            return false;
        };
        entry.ref_count = entry.ref_count.saturating_sub(1);
        if entry.ref_count > 0 {
            return false;
        }
        if let Some(entry) = self.entries.remove(&key) {
            self.current_size -= entry.size_bytes;
            self.stats.releases += 1;
            tracing::debug!("Released source {key}");
        }
        true
    }

    /// Number of holders for a key (0 if absent).
    #[must_use]
    pub fn ref_count(&self, key: SourceKey) -> u32 {
        self.entries.get(&key).map_or(0, |entry| entry.ref_count)
    }

    /// Check if a key is cached.
    #[must_use]
    pub fn contains(&self, key: SourceKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Get the current number of cached sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the current cache size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.current_size
    }

    /// Get cache statistics.
    #[must_use]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::SourceCache;
    use crate::image::create_solid_color;
    use pixmorph_core::SourceKey;

    #[test]
    fn test_cache_insert_and_get() {
        let mut cache = SourceCache::new();
        let key = cache.insert(create_solid_color(10, 10, [255, 0, 0, 255]));

        assert!(cache.contains(key));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size_bytes(), 400);
        assert_eq!(cache.get(key).map(|t| t.width), Some(10));
    }

    #[test]
    fn test_cache_miss() {
        let mut cache = SourceCache::new();
        assert!(cache.get(SourceKey::new()).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_release_frees_after_last_holder() {
        let mut cache = SourceCache::new();
        let key = cache.insert(create_solid_color(2, 2, [0, 0, 0, 255]));
        assert!(cache.retain(key));
        assert_eq!(cache.ref_count(key), 2);

        assert!(!cache.release(key));
        assert!(cache.contains(key));

        assert!(cache.release(key));
        assert!(!cache.contains(key));
        assert_eq!(cache.size_bytes(), 0);
        assert_eq!(cache.stats().releases, 1);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let mut cache = SourceCache::new();
        let key = SourceKey::new();
        assert!(!cache.retain(key));
        assert!(!cache.release(key));
        assert_eq!(cache.ref_count(key), 0);
    }

    #[test]
    fn test_cache_stats() {
        let mut cache = SourceCache::new();
        let a = cache.insert(create_solid_color(2, 2, [255, 0, 0, 255]));

        let _ = cache.get(a); // Hit
        let _ = cache.get(SourceKey::new()); // Miss
        let _ = cache.get(a); // Hit
        let _ = cache.peek(a); // Not counted

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.bytes_loaded, 16);
    }
}
