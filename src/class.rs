//! Class declarations: identities, declared field maps and the registry that
//! resolves references between them.
//!
//! A class never introspects itself. Everything the compiler needs (its
//! parent, the entries it declares, its post-init hook) is written down in a
//! [`ClassDecl`] and looked up through the [`ClassRegistry`].
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::SchemaError;
use crate::object::LazyObject;

/// Name of the root class every schema-bound class descends from.
pub const ROOT_CLASS: &str = "LazyObject";

static CLASS_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*$").unwrap()
});

/// Dotted class path, e.g. `App.Models.User`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(Arc<str>);

impl ClassId {
    pub fn new(path: impl AsRef<str>) -> Self {
        ClassId(Arc::from(path.as_ref()))
    }

    pub fn root() -> Self {
        ClassId::new(ROOT_CLASS)
    }

    pub fn is_root(&self) -> bool {
        &*self.0 == ROOT_CLASS
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Everything before the last dot, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.0.rsplit_once('.').map(|(ns, _)| ns)
    }

    pub fn short_name(&self) -> &str {
        self.0.rsplit_once('.').map_or(&*self.0, |(_, name)| name)
    }

    pub fn is_valid_path(path: &str) -> bool {
        CLASS_PATH.is_match(path)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

impl From<&str> for ClassId {
    fn from(s: &str) -> Self {
        ClassId::new(s)
    }
}

impl From<String> for ClassId {
    fn from(s: String) -> Self {
        ClassId(Arc::from(s))
    }
}

impl From<&ClassId> for ClassId {
    fn from(id: &ClassId) -> Self {
        id.clone()
    }
}

impl serde::Serialize for ClassId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl Borrow<str> for ClassId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One entry of a class's own field map, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    /// `name => "type definition"`
    Field { name: String, definition: String },
    /// Merge another class's whole compiled table.
    Import(String),
}

/// Hook run after data has been assigned to an instance.
pub type InitHook = Arc<dyn Fn(&mut LazyObject) -> anyhow::Result<()> + Send + Sync>;

#[derive(Clone)]
pub struct ClassDecl {
    id: ClassId,
    parent: Option<String>,
    declarations: Vec<Declaration>,
    on_init: Option<InitHook>,
}

impl ClassDecl {
    pub fn new(id: impl Into<ClassId>) -> Self {
        Self {
            id: id.into(),
            parent: None,
            declarations: Vec::new(),
            on_init: None,
        }
    }

    /// Parent class reference, resolved like any other class reference.
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, definition: impl Into<String>) -> Self {
        self.declarations.push(Declaration::Field {
            name: name.into(),
            definition: definition.into(),
        });
        self
    }

    pub fn import(mut self, reference: impl Into<String>) -> Self {
        self.declarations.push(Declaration::Import(reference.into()));
        self
    }

    pub fn declaration(mut self, declaration: Declaration) -> Self {
        self.declarations.push(declaration);
        self
    }

    pub fn on_init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut LazyObject) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_init = Some(Arc::new(hook));
        self
    }

    pub fn id(&self) -> &ClassId {
        &self.id
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Entries declared by this class itself. Empty means "inherit unchanged".
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn init_hook(&self) -> Option<&InitHook> {
        self.on_init.as_ref()
    }
}

impl fmt::Debug for ClassDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDecl")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("declarations", &self.declarations)
            .field("on_init", &self.on_init.is_some())
            .finish()
    }
}

/// All classes known to one schema, keyed by identity.
#[derive(Debug, Clone)]
pub struct ClassRegistry {
    classes: IndexMap<ClassId, ClassDecl>,
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassRegistry {
    /// A registry holding only the root class.
    pub fn new() -> Self {
        let mut classes = IndexMap::new();
        classes.insert(ClassId::root(), ClassDecl::new(ClassId::root()));
        Self { classes }
    }

    pub fn register(&mut self, decl: ClassDecl) -> Result<&mut Self, SchemaError> {
        if !ClassId::is_valid_path(decl.id.as_str()) {
            return Err(SchemaError::bad_schema(&decl.id, "invalid class path"));
        }
        if self.classes.contains_key(&decl.id) {
            return Err(SchemaError::bad_schema(&decl.id, "class is already registered"));
        }
        self.classes.insert(decl.id.clone(), decl);
        Ok(self)
    }

    /// Builder-style variant of [`ClassRegistry::register`].
    pub fn with(mut self, decl: ClassDecl) -> Result<Self, SchemaError> {
        self.register(decl)?;
        Ok(self)
    }

    pub fn get(&self, id: &ClassId) -> Option<&ClassDecl> {
        self.classes.get(id)
    }

    pub fn contains(&self, id: &ClassId) -> bool {
        self.classes.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ClassId> {
        self.classes.keys()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Resolves a class reference written inside `from`'s declarations.
    ///
    /// `\Abs.Path` is absolute. Otherwise the reference is tried relative to
    /// `from`'s namespace first, then as an absolute path. The root sentinel
    /// resolves from anywhere.
    pub fn resolve(&self, reference: &str, from: &ClassId) -> Option<ClassId> {
        let reference = reference.trim();
        if let Some(absolute) = reference.strip_prefix('\\') {
            return self.lookup(absolute);
        }
        if reference == ROOT_CLASS {
            return Some(ClassId::root());
        }
        if let Some(ns) = from.namespace() {
            if let Some(id) = self.lookup(&format!("{ns}.{reference}")) {
                return Some(id);
            }
        }
        self.lookup(reference)
    }

    fn lookup(&self, path: &str) -> Option<ClassId> {
        if !ClassId::is_valid_path(path) {
            return None;
        }
        self.classes.get_key_value(path).map(|(id, _)| id.clone())
    }

    /// Linear ancestry of `id`, root first and `id` last.
    pub fn ancestor_chain(&self, id: &ClassId) -> Result<Vec<ClassId>, SchemaError> {
        let mut chain = IndexSet::new();
        let mut current = id.clone();
        loop {
            let decl = self
                .classes
                .get(&current)
                .ok_or_else(|| SchemaError::bad_schema(&current, "class is not registered"))?;
            if !chain.insert(current.clone()) {
                return Err(SchemaError::bad_schema(id, "inheritance chain loops back on itself"));
            }
            if current.is_root() {
                break;
            }
            current = match decl.parent() {
                None => ClassId::root(),
                Some(parent) => self.resolve(parent, &current).ok_or_else(|| {
                    SchemaError::bad_schema(&current, format!("unknown parent class {parent:?}"))
                })?,
            };
        }
        let mut chain: Vec<ClassId> = chain.into_iter().collect();
        chain.reverse();
        Ok(chain)
    }

    /// The `on_init` hook `class` runs: its own, else the nearest ancestor's.
    pub fn init_hook(&self, class: &ClassId) -> Option<InitHook> {
        let chain = self.ancestor_chain(class).ok()?;
        chain
            .iter()
            .rev()
            .find_map(|id| self.classes.get(id).and_then(|decl| decl.on_init.clone()))
    }

    /// Single-inheritance subtype test; imports do not count.
    pub fn is_a(&self, class: &ClassId, ancestor: &ClassId) -> bool {
        if class == ancestor || ancestor.is_root() {
            return self.contains(class);
        }
        self.ancestor_chain(class)
            .map(|chain| chain.contains(ancestor))
            .unwrap_or(false)
    }
}
