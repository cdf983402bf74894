//! Content-addressed memoization for pure derivations (load, filter, encode).
//!
//! Keys are SHA-256 digests of everything a result depends on, so a cached
//! value can only be returned for byte-identical inputs.

use std::num::NonZeroUsize;

use lru::LruCache;

use sha2::{Digest, Sha256};

use crate::data::model::{CellValue, ColumnKind, Table};

pub type CacheKey = [u8; 32];

/// Incrementally hashes the inputs of one operation into a [`CacheKey`].
///
/// Every variable-length field is length-prefixed so that adjacent fields
/// cannot collide (`"ab" + "c"` vs `"a" + "bc"`).
pub struct KeyBuilder {
    hasher: Sha256,
}

impl KeyBuilder {
    /// Start a key for `operation`; different operations never share keys.
    pub fn new(operation: &str) -> Self {
        let mut builder = KeyBuilder {
            hasher: Sha256::new(),
        };
        builder.put_bytes(operation.as_bytes());
        builder
    }

    pub fn bytes(mut self, bytes: &[u8]) -> Self {
        self.put_bytes(bytes);
        self
    }

    pub fn str(self, s: &str) -> Self {
        self.bytes(s.as_bytes())
    }

    pub fn table(mut self, table: &Table) -> Self {
        self.hasher.update((table.n_cols() as u64).to_le_bytes());
        for col in table.columns() {
            self.put_bytes(col.name.as_bytes());
            self.hasher.update([match col.kind {
                ColumnKind::Integer => 0u8,
                ColumnKind::Float => 1,
                ColumnKind::Text => 2,
            }]);
            self.hasher.update((col.values.len() as u64).to_le_bytes());
            for value in &col.values {
                match value {
                    CellValue::Text(s) => {
                        self.hasher.update([0u8]);
                        self.put_bytes(s.as_bytes());
                    }
                    CellValue::Integer(i) => {
                        self.hasher.update([1u8]);
                        self.hasher.update(i.to_le_bytes());
                    }
                    CellValue::Float(f) => {
                        self.hasher.update([2u8]);
                        self.hasher.update(f.to_bits().to_le_bytes());
                    }
                    CellValue::Null => self.hasher.update([3u8]),
                }
            }
        }
        self
    }

    pub fn finish(self) -> CacheKey {
        let digest = self.hasher.finalize();
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        key
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update((bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }
}

/// Bounded LRU map from [`CacheKey`] to a cheaply clonable value.
///
/// A capacity of 0 disables caching: every lookup recomputes.
#[derive(Debug)]
pub struct MemoCache<V> {
    entries: Option<LruCache<CacheKey, V>>,
    hits: u64,
    misses: u64,
}

impl<V: Clone> MemoCache<V> {
    pub fn new(capacity: usize) -> Self {
        MemoCache {
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
            hits: 0,
            misses: 0,
        }
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    pub fn get_or_insert_with(&mut self, key: CacheKey, compute: impl FnOnce() -> V) -> V {
        let Some(entries) = self.entries.as_mut() else {
            self.misses += 1;
            return compute();
        };
        if let Some(value) = entries.get(&key) {
            self.hits += 1;
            return value.clone();
        }
        self.misses += 1;
        let value = compute();
        entries.put(key, value.clone());
        value
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |c| c.len())
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Column;

    fn table(ages: &[&str]) -> Table {
        Table::new(vec![Column::from_raw("age", ages)]).unwrap()
    }

    #[test]
    fn identical_inputs_share_a_key() {
        let a = KeyBuilder::new("filter").table(&table(&["30", "40"])).str("job").finish();
        let b = KeyBuilder::new("filter").table(&table(&["30", "40"])).str("job").finish();
        assert_eq!(a, b);
    }

    #[test]
    fn any_input_difference_changes_the_key() {
        let base = KeyBuilder::new("filter").table(&table(&["30", "40"])).finish();
        let other_value = KeyBuilder::new("filter").table(&table(&["30", "41"])).finish();
        let other_op = KeyBuilder::new("export").table(&table(&["30", "40"])).finish();
        assert_ne!(base, other_value);
        assert_ne!(base, other_op);

        let split_a = KeyBuilder::new("op").str("ab").str("c").finish();
        let split_b = KeyBuilder::new("op").str("a").str("bc").finish();
        assert_ne!(split_a, split_b);
    }

    #[test]
    fn computes_once_per_key() {
        let mut cache = MemoCache::new(4);
        let key = KeyBuilder::new("load").bytes(b"age;y").finish();
        let mut calls = 0;
        for _ in 0..3 {
            let v = cache.get_or_insert_with(key, || {
                calls += 1;
                42
            });
            assert_eq!(v, 42);
        }
        assert_eq!(calls, 1);
        assert_eq!(cache.stats(), (2, 1));
    }

    #[test]
    fn evicts_least_recently_used_when_full() {
        let mut cache = MemoCache::new(2);
        let keys: Vec<CacheKey> = (0..3u8)
            .map(|i| KeyBuilder::new("load").bytes(&[i]).finish())
            .collect();
        cache.get_or_insert_with(keys[0], || 0);
        cache.get_or_insert_with(keys[1], || 1);
        // Touch the first key so the second becomes the eviction candidate.
        assert_eq!(cache.get_or_insert_with(keys[0], || 99), 0);
        cache.get_or_insert_with(keys[2], || 2);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_or_insert_with(keys[0], || 99), 0);
        assert_eq!(cache.get_or_insert_with(keys[1], || 99), 99);
    }

    #[test]
    fn zero_capacity_never_stores() {
        let mut cache = MemoCache::new(0);
        let key = KeyBuilder::new("load").finish();
        cache.get_or_insert_with(key, || 1);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.get_or_insert_with(key, || 2), 2);
        assert_eq!(cache.stats(), (0, 2));
    }
}
