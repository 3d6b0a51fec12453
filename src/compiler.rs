//! Turns class declarations into flattened, shared field tables.
//!
//! One [`SchemaCompiler`] exists per compilation attempt. It replays the
//! target's ancestor chain root-first, merging declared fields and imported
//! tables into a working table and caching every ancestor as it is finished.
//! Imports recurse into nested (non-root) compilers. Classes referenced by
//! object-typed fields are only collected on the way down and compiled by the
//! root invocation once the whole chain is settled and unlocked, so classes
//! that merely share an ancestor and point at each other never trip the
//! circular-reference check.
//!
//! The root invocation is all-or-nothing: on any failure every table cached
//! during the call is erased again and every lock taken is released.
use std::sync::Arc;

use indexmap::IndexSet;
use tracing::{debug, trace, warn};

use crate::cache::{FieldTable, SchemaCache};
use crate::class::{ClassId, ClassRegistry, Declaration};
use crate::descriptor::TypeDescriptor;
use crate::error::SchemaError;

/// Compiles `class` (and everything it depends on) into `cache`.
///
/// A no-op returning the cached table when `class` is already compiled. On
/// failure `cache` is left exactly as it was before the call.
pub fn compile(
    registry: &ClassRegistry,
    cache: &mut SchemaCache,
    class: &ClassId,
) -> Result<Arc<FieldTable>, SchemaError> {
    SchemaCompiler::new(registry, &mut *cache, class.clone(), true)
        .run()
        .map_err(|failure| failure.error)?;
    cache
        .get(class)
        .ok_or_else(|| SchemaError::bad_schema(class, "class missing from cache after compilation"))
}

/// Bookkeeping a nested compiler hands back to its caller.
#[derive(Debug, Default)]
struct Outcome {
    compiled: IndexSet<ClassId>,
    pending: IndexSet<ClassId>,
}

/// A failed compilation still reports what it cached, so the root can undo it.
#[derive(Debug)]
struct Failure {
    error: SchemaError,
    compiled: IndexSet<ClassId>,
}

struct SchemaCompiler<'a> {
    registry: &'a ClassRegistry,
    cache: &'a mut SchemaCache,
    class: ClassId,
    is_root: bool,
    working: FieldTable,
    /// Locks taken by this invocation and not yet released.
    own_locks: IndexSet<ClassId>,
    /// Every class cached during this invocation, including by nested compilers.
    compiled: IndexSet<ClassId>,
    /// Classes named by object-typed fields that were not compiled when seen.
    pending: IndexSet<ClassId>,
}

impl<'a> SchemaCompiler<'a> {
    fn new(
        registry: &'a ClassRegistry,
        cache: &'a mut SchemaCache,
        class: ClassId,
        is_root: bool,
    ) -> Self {
        Self {
            registry,
            cache,
            class,
            is_root,
            working: FieldTable::new(),
            own_locks: IndexSet::new(),
            compiled: IndexSet::new(),
            pending: IndexSet::new(),
        }
    }

    fn run(mut self) -> Result<Outcome, Failure> {
        if self.cache.contains(&self.class) {
            return Ok(Outcome::default());
        }
        if self.is_root {
            debug!(class = %self.class, "compiling class");
        }

        if let Err(error) = self.compile_chain() {
            return Err(self.fail(error));
        }
        if !self.cache.contains(&self.class) {
            let error = SchemaError::bad_schema(&self.class, "class missing from cache after compilation");
            return Err(self.fail(error));
        }

        if !self.is_root {
            return Ok(Outcome {
                compiled: std::mem::take(&mut self.compiled),
                pending: std::mem::take(&mut self.pending),
            });
        }

        if let Err(error) = self.resolve_pending() {
            let error = SchemaError::PropertyClassFailed {
                class: self.class.clone(),
                source: Box::new(error),
            };
            return Err(self.fail(error));
        }
        debug!(class = %self.class, newly_compiled = self.compiled.len(), "class compiled");
        Ok(Outcome {
            compiled: std::mem::take(&mut self.compiled),
            pending: IndexSet::new(),
        })
    }

    fn compile_chain(&mut self) -> Result<(), SchemaError> {
        let registry = self.registry;
        let chain = registry.ancestor_chain(&self.class)?;

        if let Some(ancestor) = chain.iter().find(|a| self.cache.is_locked(a)) {
            return Err(SchemaError::CircularReference {
                class: ancestor.clone(),
                reference: self.class.clone(),
            });
        }
        for ancestor in &chain {
            if !self.cache.contains(ancestor) {
                self.cache.lock(ancestor.clone());
                self.own_locks.insert(ancestor.clone());
            }
        }

        for ancestor in &chain {
            if let Some(table) = self.cache.get(ancestor) {
                self.working = FieldTable::clone(&table);
                continue;
            }
            let decl = registry
                .get(ancestor)
                .ok_or_else(|| SchemaError::bad_schema(ancestor, "class is not registered"))?;
            for declaration in decl.declarations() {
                match declaration {
                    Declaration::Field { name, definition } => {
                        self.declare_field(ancestor, name, definition)?
                    }
                    Declaration::Import(reference) => self.import(ancestor, &chain, reference)?,
                }
            }

            self.cache
                .put(ancestor.clone(), Arc::new(self.working.clone()));
            self.compiled.insert(ancestor.clone());
            if self.own_locks.shift_remove(ancestor) {
                self.cache.unlock(ancestor);
            }
            trace!(class = %ancestor, fields = self.working.len(), "cached field table");
        }
        Ok(())
    }

    fn declare_field(
        &mut self,
        owner: &ClassId,
        name: &str,
        definition: &str,
    ) -> Result<(), SchemaError> {
        if name.is_empty() {
            return Err(SchemaError::bad_schema(owner, "field names must not be empty"));
        }
        let descriptor = TypeDescriptor::parse(definition, self.registry, owner).map_err(|e| {
            SchemaError::BadDefinition {
                class: owner.clone(),
                field: name.to_string(),
                definition: definition.to_string(),
                reason: e.reason,
            }
        })?;

        if let Some(target) = descriptor.object_class() {
            if !self.cache.contains(target) {
                self.pending.insert(target.clone());
            }
        }
        // An identical redefinition keeps the inherited instance.
        if self.working.get(name).is_some_and(|existing| **existing == descriptor) {
            return Ok(());
        }
        self.working.insert(name.to_string(), Arc::new(descriptor));
        Ok(())
    }

    fn import(
        &mut self,
        owner: &ClassId,
        chain: &[ClassId],
        reference: &str,
    ) -> Result<(), SchemaError> {
        let target = self.registry.resolve(reference, owner).ok_or_else(|| {
            SchemaError::bad_schema(
                owner,
                format!("import {reference:?} does not name a registered schema class"),
            )
        })?;
        if target == *owner || chain.contains(&target) || self.cache.is_locked(&target) {
            return Err(SchemaError::CircularReference {
                class: owner.clone(),
                reference: target,
            });
        }

        if !self.cache.contains(&target) {
            let nested = SchemaCompiler::new(self.registry, &mut *self.cache, target.clone(), false);
            match nested.run() {
                Ok(outcome) => {
                    self.compiled.extend(outcome.compiled);
                    self.pending.extend(outcome.pending);
                }
                Err(failure) => {
                    self.compiled.extend(failure.compiled);
                    return Err(SchemaError::ImportFailed {
                        class: owner.clone(),
                        target,
                        source: Box::new(failure.error),
                    });
                }
            }
        }

        let table = self
            .cache
            .get(&target)
            .ok_or_else(|| SchemaError::bad_schema(&target, "imported class missing from cache"))?;
        for (name, descriptor) in table.iter() {
            self.working.insert(name.clone(), Arc::clone(descriptor));
        }
        Ok(())
    }

    /// Root only: compile every class discovered through object-typed fields,
    /// including whatever those classes discover in turn.
    fn resolve_pending(&mut self) -> Result<(), SchemaError> {
        while !self.pending.is_empty() {
            let batch = std::mem::take(&mut self.pending);
            for class in batch {
                if self.cache.contains(&class) {
                    continue;
                }
                let nested = SchemaCompiler::new(self.registry, &mut *self.cache, class, false);
                match nested.run() {
                    Ok(outcome) => {
                        self.compiled.extend(outcome.compiled);
                        self.pending.extend(outcome.pending);
                    }
                    Err(failure) => {
                        self.compiled.extend(failure.compiled);
                        return Err(failure.error);
                    }
                }
            }
        }
        Ok(())
    }

    fn fail(&mut self, error: SchemaError) -> Failure {
        for class in self.own_locks.drain(..) {
            self.cache.unlock(&class);
        }
        if self.is_root {
            for class in &self.compiled {
                self.cache.erase(class);
            }
            warn!(
                class = %self.class,
                rolled_back = self.compiled.len(),
                %error,
                "compilation failed"
            );
        }
        Failure {
            error,
            compiled: std::mem::take(&mut self.compiled),
        }
    }
}
