//! Content-addressable deduplication of shader modules.
//!
//! Modules are keyed by a hash of their SPIR-V words. The cache holds weak references only, so
//! it never keeps a module alive; a module removes its own entry when the last owner drops it.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tracing::{debug, warn};

use crate::module::ShaderModule;

/// Mixes `value` into `seed`. Order-sensitive, so permuted word sequences hash differently.
pub fn hash_combine(seed: u64, value: u64) -> u64 {
    seed ^ value
        .wrapping_add(0x9e37_79b9_7f4a_7c15)
        .wrapping_add(seed << 6)
        .wrapping_add(seed >> 2)
}

/// Hash of a SPIR-V word sequence used as the cache key.
pub fn content_hash(words: &[u32]) -> u64 {
    words
        .iter()
        .fold(words.len() as u64, |seed, &word| hash_combine(seed, u64::from(word)))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShaderCacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Lookups that found a different module under the same hash.
    pub collisions: u64,
    pub removals: u64,
}

#[derive(Debug, Default)]
pub(crate) struct CacheLookup {
    pub hit: Option<Arc<ShaderModule>>,
    pub upgraded: Vec<Arc<ShaderModule>>,
}

#[derive(Debug, Default)]
pub(crate) struct ShaderModuleCache {
    entries: HashMap<u64, Vec<Weak<ShaderModule>>>,
    stats: ShaderCacheStats,
}

impl ShaderModuleCache {
    /// Returns a live module whose words equal `words`, if any.
    ///
    /// Modules upgraded while comparing come back in [`CacheLookup::upgraded`]. The caller
    /// must release the cache lock before dropping them, since dropping the last reference to
    /// a module re-enters the cache.
    pub fn lookup(&mut self, hash: u64, words: &[u32]) -> CacheLookup {
        let mut lookup = CacheLookup::default();
        let Some(bucket) = self.entries.get(&hash) else {
            self.stats.misses += 1;
            return lookup;
        };

        for module in bucket.iter().filter_map(Weak::upgrade) {
            if module.spirv() == words {
                self.stats.hits += 1;
                debug!(hash, "shader module cache hit");
                lookup.hit = Some(module);
                return lookup;
            }
            lookup.upgraded.push(module);
        }

        if !lookup.upgraded.is_empty() {
            self.stats.collisions += 1;
            warn!(hash, "shader module content hash collision");
        }
        self.stats.misses += 1;
        lookup
    }

    pub fn insert(&mut self, hash: u64, module: &Arc<ShaderModule>) {
        self.entries
            .entry(hash)
            .or_default()
            .push(Arc::downgrade(module));
        debug!(hash, entries = self.len(), "shader module cached");
    }

    /// Drops the entry for the module at `module`. Called from the module's destructor, when
    /// its weak references can no longer be upgraded.
    pub fn remove(&mut self, hash: u64, module: *const ShaderModule) {
        let Some(bucket) = self.entries.get_mut(&hash) else {
            return;
        };
        let before = bucket.len();
        bucket.retain(|weak| weak.as_ptr() != module);
        if bucket.len() != before {
            self.stats.removals += 1;
            debug!(hash, "shader module removed from cache");
        }
        if bucket.is_empty() {
            self.entries.remove(&hash);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn stats(&self) -> ShaderCacheStats {
        self.stats
    }
}
