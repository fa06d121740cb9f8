//! Keyed cache of on-screen items, reconciled once per frame.
//!
//! A layout pass calls [`VisibleItemCache::add`] for every key it wants drawn
//! and then [`VisibleItemCache::flush`]. Items are built the first time their
//! key shows up, reused while the key keeps being requested, and dropped by
//! the first flush that did not see their key.

use std::collections::HashMap;
use std::hash::Hash;

struct Entry<V> {
    item: V,
    last_pass: u64,
}

pub struct VisibleItemCache<K, V> {
    items: HashMap<K, Entry<V>>,
    pass: u64,
    requested: usize,
}

impl<K, V> Default for VisibleItemCache<K, V> {
    fn default() -> Self {
        Self {
            items: HashMap::new(),
            pass: 0,
            requested: 0,
        }
    }
}

impl<K: Eq + Hash + Clone, V> VisibleItemCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request `key` for the current pass, building its item with `make` if
    /// it is not cached. `make` may decline by returning `None`, in which
    /// case nothing is cached and `None` is returned.
    pub fn add<F>(&mut self, key: K, make: F) -> Option<&mut V>
    where
        F: FnOnce(&K) -> Option<V>,
    {
        let pass = self.pass;
        let (entry, newly_requested) = match self.items.entry(key) {
            std::collections::hash_map::Entry::Occupied(occupied) => {
                let entry = occupied.into_mut();
                let newly_requested = entry.last_pass != pass;
                (entry, newly_requested)
            }
            std::collections::hash_map::Entry::Vacant(vacant) => {
                let item = make(vacant.key())?;
                (
                    vacant.insert(Entry {
                        item,
                        last_pass: pass,
                    }),
                    true,
                )
            }
        };
        entry.last_pass = pass;
        if newly_requested {
            self.requested += 1;
        }
        Some(&mut entry.item)
    }

    /// Drop every item not requested since the previous flush and start a new
    /// pass. Returns the number of items dropped.
    pub fn flush(&mut self) -> usize {
        let pass = self.pass;
        let before = self.items.len();
        self.items.retain(|_, entry| entry.last_pass == pass);
        assert_eq!(
            self.items.len(),
            self.requested,
            "visible item cache out of sync with requested keys"
        );
        self.pass += 1;
        self.requested = 0;
        before - self.items.len()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.items.get(key).map(|e| &e.item)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.items.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.items.keys()
    }

    /// Drop everything, e.g. when the font or scale changed.
    pub fn clear(&mut self) {
        self.items.clear();
        self.requested = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declined_construction_caches_nothing() {
        let mut cache: VisibleItemCache<u32, String> = VisibleItemCache::new();
        assert!(cache.add(1, |_| None).is_none());
        assert!(!cache.contains(&1));
        assert_eq!(cache.flush(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn repeated_add_is_idempotent() {
        let mut cache: VisibleItemCache<&str, usize> = VisibleItemCache::new();
        let mut built = 0;
        for _ in 0..3 {
            cache.add("a", |_| {
                built += 1;
                Some(built)
            });
        }
        assert_eq!(built, 1);
        assert_eq!(cache.flush(), 0);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.flush(), 1);
        assert!(cache.is_empty());
    }
}
