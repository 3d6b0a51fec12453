//! JSON manifest describing a set of classes, so schemas can live in files.
//!
//! ```json
//! { "classes": {
//!     "App.User": { "fields": [["id", "int"], ["friends", "User[]"]] },
//!     "App.Admin": { "extends": "User", "fields": ["\\App.Audited"] }
//! } }
//! ```
//!
//! A field entry is a `[name, type]` pair; a bare string imports a class.
use std::path::Path;

use anyhow::Context;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_path_to_error::Segment;

use crate::class::{ClassDecl, ClassRegistry, Declaration};
use crate::error::SchemaError;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub classes: IndexMap<String, ClassEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassEntry {
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldEntry {
    Field(String, String),
    Import(String),
}

impl From<FieldEntry> for Declaration {
    fn from(entry: FieldEntry) -> Self {
        match entry {
            FieldEntry::Field(name, definition) => Declaration::Field { name, definition },
            FieldEntry::Import(reference) => Declaration::Import(reference),
        }
    }
}

impl Manifest {
    pub fn parse(src: &str) -> Result<Self, SchemaError> {
        let de = &mut serde_json::Deserializer::from_str(src);
        serde_path_to_error::deserialize(de).map_err(|err| {
            let class = match err.path().iter().nth(1) {
                Some(Segment::Map { key }) => key.clone(),
                _ => "<manifest>".to_string(),
            };
            let path = err.path().to_string();
            SchemaError::bad_schema(class, format!("at JSON path {path} → {}", err.into_inner()))
        })
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read schema manifest {}", path.display()))?;
        Self::parse(&src).with_context(|| format!("invalid schema manifest {}", path.display()))
    }

    pub fn into_registry(self) -> Result<ClassRegistry, SchemaError> {
        let mut registry = ClassRegistry::new();
        for (id, entry) in self.classes {
            let mut decl = ClassDecl::new(id);
            if let Some(parent) = entry.extends {
                decl = decl.extends(parent);
            }
            for field in entry.fields {
                decl = decl.declaration(field.into());
            }
            registry.register(decl)?;
        }
        Ok(registry)
    }
}
