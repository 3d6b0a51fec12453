//! Compiled field tables plus the set of classes currently mid-compilation.
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tracing::trace;

use crate::class::ClassId;
use crate::descriptor::TypeDescriptor;

/// Field name to shared descriptor. Descriptor `Arc`s are shared across every
/// class that inherits or imports the same definition.
pub type FieldTable = IndexMap<String, Arc<TypeDescriptor>>;

#[derive(Debug, Default)]
pub struct SchemaCache {
    tables: IndexMap<ClassId, Arc<FieldTable>>,
    locks: IndexSet<ClassId>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, class: &ClassId) -> Option<Arc<FieldTable>> {
        let table = self.tables.get(class).cloned();
        if table.is_some() {
            trace!(%class, "schema cache hit");
        }
        table
    }

    pub fn contains(&self, class: &ClassId) -> bool {
        self.tables.contains_key(class)
    }

    /// Replaces any previous table wholesale.
    pub fn put(&mut self, class: ClassId, table: Arc<FieldTable>) {
        self.tables.insert(class, table);
    }

    /// Drops one table; used when rolling back a failed compilation.
    pub fn erase(&mut self, class: &ClassId) -> bool {
        self.tables.shift_remove(class).is_some()
    }

    pub fn is_locked(&self, class: &ClassId) -> bool {
        self.locks.contains(class)
    }

    pub fn lock(&mut self, class: ClassId) {
        self.locks.insert(class);
    }

    /// Callers must only release identities they locked themselves.
    pub fn unlock(&mut self, class: &ClassId) {
        self.locks.shift_remove(class);
    }

    pub fn locked(&self) -> impl Iterator<Item = &ClassId> {
        self.locks.iter()
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassId> {
        self.tables.keys()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Erases every compiled table and returns how many there were.
    pub fn clear(&mut self) -> usize {
        let count = self.tables.len();
        self.tables.clear();
        self.locks.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Primitive;

    #[test]
    fn put_get_and_clear() {
        let mut cache = SchemaCache::new();
        let mut table = FieldTable::new();
        table.insert("id".into(), Arc::new(TypeDescriptor::primitive(Primitive::Int)));
        cache.put(ClassId::new("A"), Arc::new(table));
        cache.put(ClassId::new("B"), Arc::new(FieldTable::new()));

        let a = cache.get(&ClassId::new("A")).unwrap();
        assert!(Arc::ptr_eq(&a, &cache.get(&ClassId::new("A")).unwrap()));
        assert_eq!(cache.clear(), 2);
        assert!(cache.get(&ClassId::new("A")).is_none());
        assert_eq!(cache.clear(), 0);
    }

    #[test]
    fn locks_are_a_set() {
        let mut cache = SchemaCache::new();
        let a = ClassId::new("A");
        cache.lock(a.clone());
        cache.lock(a.clone());
        assert!(cache.is_locked(&a));
        cache.unlock(&a);
        assert!(!cache.is_locked(&a));
        assert_eq!(cache.locked().count(), 0);
    }
}
