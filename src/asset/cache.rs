use std::collections::HashMap;
use std::sync::Arc;

/// Name-keyed store of shared assets.
///
/// The cache holds one strong reference to each entry. An entry is
/// evictable once that is the only reference left, i.e. nothing outside the
/// cache still uses it.
pub struct AssetCache<T> {
    items: HashMap<String, Arc<T>>,
}

impl<T> AssetCache<T> {
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
        }
    }

    /// Stores `item` under `name`, replacing any previous entry.
    pub fn insert(&mut self, name: impl Into<String>, item: T) -> Arc<T> {
        let item = Arc::new(item);
        self.items.insert(name.into(), Arc::clone(&item));
        item
    }

    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.items.get(name).cloned()
    }

    pub fn get_or_insert_with<E>(
        &mut self,
        name: &str,
        load: impl FnOnce() -> Result<T, E>,
    ) -> Result<Arc<T>, E> {
        if let Some(item) = self.items.get(name) {
            return Ok(Arc::clone(item));
        }
        let item = load()?;
        Ok(self.insert(name, item))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    /// Holders of `name` outside the cache; `None` if it is not cached.
    pub fn external_holders(&self, name: &str) -> Option<usize> {
        self.items
            .get(name)
            .map(|item| Arc::strong_count(item) - 1)
    }

    pub fn is_evictable(&self, name: &str) -> bool {
        self.external_holders(name) == Some(0)
    }

    /// Drops every entry nothing else refers to. Returns how many went.
    pub fn evict_unused(&mut self) -> usize {
        let before = self.items.len();
        self.items.retain(|name, item| {
            let keep = Arc::strong_count(item) > 1;
            if !keep {
                log::debug!("Evicting unused asset '{}'", name);
            }
            keep
        });
        before - self.items.len()
    }

    /// Empties the cache. Returns how many entries were still held elsewhere.
    pub fn clear(&mut self) -> usize {
        let held = self
            .items
            .values()
            .filter(|item| Arc::strong_count(item) > 1)
            .count();
        self.items.clear();
        held
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for AssetCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
