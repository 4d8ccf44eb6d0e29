//! Selection store
//!
//! Boolean "selected" flag per item identity. A store is seeded with every
//! identity selected whenever its backing list is replaced.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionStore<K: Eq + Hash> {
    flags: HashMap<K, bool>,
}

impl<K: Eq + Hash> Default for SelectionStore<K> {
    fn default() -> Self {
        Self {
            flags: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> SelectionStore<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store over `ids` with every identity selected
    pub fn all_selected<I: IntoIterator<Item = K>>(ids: I) -> Self {
        let mut store = Self::new();
        store.reseed(ids);
        store
    }

    /// Replace the backing identities; every one starts selected
    pub fn reseed<I: IntoIterator<Item = K>>(&mut self, ids: I) {
        self.flags = ids.into_iter().map(|id| (id, true)).collect();
    }

    /// Flip one identity. Unknown identities start from unselected.
    pub fn toggle(&mut self, id: &K) -> bool {
        let flag = self.flags.entry(id.clone()).or_insert(false);
        *flag = !*flag;
        *flag
    }

    pub fn set(&mut self, id: K, selected: bool) {
        self.flags.insert(id, selected);
    }

    pub fn select_all<'a, I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        for id in ids {
            self.flags.insert(id.clone(), true);
        }
    }

    /// Deselect everything, keeping the identities known
    pub fn clear(&mut self) {
        for flag in self.flags.values_mut() {
            *flag = false;
        }
    }

    /// Forget every identity
    pub fn reset(&mut self) {
        self.flags.clear();
    }

    pub fn is_selected(&self, id: &K) -> bool {
        self.flags.get(id).copied().unwrap_or(false)
    }

    pub fn selected_count(&self) -> usize {
        self.flags.values().filter(|f| **f).count()
    }

    pub fn has_selection(&self) -> bool {
        self.flags.values().any(|f| *f)
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Subsequence of `items` whose identity is selected, in `items` order
    pub fn selected<'a, T, F>(&self, items: &'a [T], id_of: F) -> Vec<&'a T>
    where
        F: Fn(&T) -> K,
    {
        items
            .iter()
            .filter(|item| self.is_selected(&id_of(item)))
            .collect()
    }
}
