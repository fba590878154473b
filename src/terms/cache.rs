//! In-memory LRU of built term indexes.
//! Key: blake3 hash of (glossary fingerprint | lemma store fingerprint).

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use super::index::TermIndex;

pub struct IndexCache {
    inner: Mutex<LruCache<[u8; 32], Arc<TermIndex>>>,
}

impl IndexCache {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    pub fn compute_key(glossary_fingerprint: &[u8; 32], store_fingerprint: &[u8; 32]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(glossary_fingerprint);
        hasher.update(b"|");
        hasher.update(store_fingerprint);
        *hasher.finalize().as_bytes()
    }

    pub fn get(&self, key: &[u8; 32]) -> Option<Arc<TermIndex>> {
        self.inner.lock().get(key).cloned()
    }

    pub fn insert(&self, key: [u8; 32], index: Arc<TermIndex>) {
        self.inner.lock().put(key, index);
    }

    /// Cached index for `key`, or build one outside the lock and cache it.
    /// The flag is true on a cache hit.
    pub fn get_or_build(
        &self,
        key: [u8; 32],
        build: impl FnOnce() -> TermIndex,
    ) -> (Arc<TermIndex>, bool) {
        if let Some(index) = self.get(&key) {
            debug!("term index cache hit");
            return (index, true);
        }
        let index = Arc::new(build());
        self.insert(key, Arc::clone(&index));
        (index, false)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terms::glossary::{Glossary, HeaderMode};
    use crate::terms::lemma::LemmaStore;

    fn build(source: &str) -> TermIndex {
        let glossary = Glossary::from_rows([[source, "x"]], HeaderMode::Absent).unwrap();
        TermIndex::build(&glossary, Arc::new(LemmaStore::builtin()))
    }

    #[test]
    fn second_lookup_is_a_hit() {
        let cache = IndexCache::new(4);
        let key = IndexCache::compute_key(&[1; 32], &[2; 32]);
        let (first, hit) = cache.get_or_build(key, || build("shield"));
        assert!(!hit);
        let (second, hit) = cache.get_or_build(key, || panic!("should not rebuild"));
        assert!(hit);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = IndexCache::new(1);
        let a = IndexCache::compute_key(&[1; 32], &[0; 32]);
        let b = IndexCache::compute_key(&[2; 32], &[0; 32]);
        cache.get_or_build(a, || build("a"));
        cache.get_or_build(b, || build("b"));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&a).is_none());
        assert!(cache.get(&b).is_some());
    }

    #[test]
    fn key_depends_on_both_fingerprints() {
        let k1 = IndexCache::compute_key(&[1; 32], &[2; 32]);
        let k2 = IndexCache::compute_key(&[1; 32], &[3; 32]);
        assert_ne!(k1, k2);
    }

    #[test]
    fn zero_capacity_still_caches_one() {
        let cache = IndexCache::new(0);
        assert!(cache.is_empty());
        cache.get_or_build([0; 32], || build("a"));
        assert_eq!(cache.len(), 1);
    }
}
