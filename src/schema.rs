//! The shared context every [`LazyObject`] is bound to: the class registry and
//! the compiled-table cache behind a single mutex.
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::cache::{FieldTable, SchemaCache};
use crate::class::{ClassId, ClassRegistry};
use crate::compiler;
use crate::error::{Result, SchemaError};
use crate::object::LazyObject;
use crate::value::Map;

#[derive(Debug)]
pub struct Schema {
    registry: ClassRegistry,
    cache: Mutex<SchemaCache>,
    require_full_validation: bool,
}

impl Schema {
    pub fn new(registry: ClassRegistry) -> Arc<Self> {
        Self::builder(registry).build()
    }

    pub fn builder(registry: ClassRegistry) -> SchemaBuilder {
        SchemaBuilder {
            registry,
            require_full_validation: false,
        }
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// Whether [`Schema::instantiate`] validates the full tree up front.
    pub fn requires_full_validation(&self) -> bool {
        self.require_full_validation
    }

    /// Compiled table for `class`, compiling it on first use.
    ///
    /// Compilation runs entirely under the cache lock, so another thread can
    /// never observe a half-built lock set.
    pub fn table(&self, class: &ClassId) -> Result<Arc<FieldTable>, SchemaError> {
        let mut cache = self.cache.lock();
        if let Some(table) = cache.get(class) {
            return Ok(table);
        }
        compiler::compile(&self.registry, &mut cache, class)
    }

    /// Compiles `class` without instantiating anything.
    pub fn compile(&self, class: &ClassId) -> Result<(), SchemaError> {
        self.table(class).map(|_| ())
    }

    pub fn is_compiled(&self, class: &ClassId) -> bool {
        self.cache.lock().contains(class)
    }

    /// Drops every compiled table; live objects keep the tables they hold.
    pub fn clear_cache(&self) -> usize {
        let count = self.cache.lock().clear();
        debug!(count, "cleared schema cache");
        count
    }

    /// Runs `f` against the cache, for diagnostics.
    pub fn with_cache<R>(&self, f: impl FnOnce(&SchemaCache) -> R) -> R {
        f(&self.cache.lock())
    }

    pub fn instantiate(self: &Arc<Self>, class: impl Into<ClassId>, data: Map) -> Result<LazyObject> {
        LazyObject::with_validation(self, class, data, self.require_full_validation)
    }
}

pub struct SchemaBuilder {
    registry: ClassRegistry,
    require_full_validation: bool,
}

impl SchemaBuilder {
    pub fn require_full_validation(mut self, strict: bool) -> Self {
        self.require_full_validation = strict;
        self
    }

    pub fn build(self) -> Arc<Schema> {
        Arc::new(Schema {
            registry: self.registry,
            cache: Mutex::new(SchemaCache::new()),
            require_full_validation: self.require_full_validation,
        })
    }
}
