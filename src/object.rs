//! The per-instance data container.
//!
//! A [`LazyObject`] pairs raw decoded data with its class's compiled field
//! table. Nothing is converted up front: each field is validated and coerced
//! the moment it is read or written, and nested objects are only built from
//! their raw subtrees when that specific field is touched.
pub mod analysis;

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::trace;

use crate::cache::FieldTable;
use crate::class::ClassId;
use crate::codec;
use crate::convert::{Direction, ValueConverter};
use crate::descriptor::TypeDescriptor;
use crate::error::{LazyError, Result};
use crate::schema::Schema;
use crate::value::{Map, Value};

pub use analysis::ClassAnalysis;
use analysis::join_path;

/// Pseudo-descriptor for fields present in the data but never declared.
static UNDEFINED: Lazy<Arc<TypeDescriptor>> = Lazy::new(|| Arc::new(TypeDescriptor::any()));

static NULL: Value = Value::Null;

#[derive(Clone)]
pub struct LazyObject {
    schema: Arc<Schema>,
    class: ClassId,
    table: Arc<FieldTable>,
    data: Map,
}

impl LazyObject {
    pub fn new(schema: &Arc<Schema>, class: impl Into<ClassId>, data: Map) -> Result<Self> {
        Self::with_validation(schema, class, data, false)
    }

    /// Like [`LazyObject::new`]; with `require_full_validation` the whole tree
    /// is analyzed right away and any problem fails construction.
    pub fn with_validation(
        schema: &Arc<Schema>,
        class: impl Into<ClassId>,
        data: Map,
        require_full_validation: bool,
    ) -> Result<Self> {
        let class = class.into();
        let table = schema.table(&class)?;
        let mut object = Self {
            schema: Arc::clone(schema),
            class,
            table,
            data: Map::new(),
        };
        object.assign(data)?;
        if require_full_validation {
            object.validate()?;
        }
        Ok(object)
    }

    /// Decodes `text` and binds the resulting JSON object to `class`.
    pub fn from_json_str(schema: &Arc<Schema>, class: impl Into<ClassId>, text: &str) -> Result<Self> {
        match codec::decode_str(text)? {
            Value::Map(data) => Self::new(schema, class, data),
            Value::Array(items) if items.is_empty() => Self::new(schema, class, Map::new()),
            other => Err(LazyError::Decode {
                path: ".".to_string(),
                message: format!("expected a JSON object, found {}", other.kind_name()),
            }),
        }
    }

    pub fn class(&self) -> &ClassId {
        &self.class
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// The compiled table shared by every instance of this class.
    pub fn table(&self) -> &Arc<FieldTable> {
        &self.table
    }

    /// Raw view of the data; entries may or may not be converted yet.
    pub fn data(&self) -> &Map {
        &self.data
    }

    pub fn into_data(self) -> Map {
        self.data
    }

    /// Replaces all data, then runs the class's `on_init` hook.
    pub fn assign(&mut self, data: Map) -> Result<()> {
        self.data = data;
        self.run_init_hook()
    }

    fn run_init_hook(&mut self) -> Result<()> {
        let Some(hook) = self.schema.registry().init_hook(&self.class) else {
            return Ok(());
        };
        hook(self).map_err(|error| match error.downcast::<LazyError>() {
            Ok(error) => error,
            Err(other) => LazyError::UserInit {
                class: self.class.clone(),
                message: format!("{other:#}"),
            },
        })
    }

    /// Descriptor for `name`: declared, else untyped if present in the data.
    pub fn field_descriptor(&self, name: &str) -> Result<Arc<TypeDescriptor>> {
        if let Some(descriptor) = self.table.get(name) {
            return Ok(Arc::clone(descriptor));
        }
        if self.data.contains_key(name) {
            return Ok(Arc::clone(&UNDEFINED));
        }
        Err(LazyError::NoSuchField {
            class: self.class.clone(),
            field: name.to_string(),
        })
    }

    /// Converts the stored value in place and returns it. Declared fields
    /// without data read as null.
    pub fn get(&mut self, name: &str) -> Result<&Value> {
        let descriptor = self.field_descriptor(name)?;
        match self.data.get_mut(name) {
            Some(slot) => {
                ValueConverter::new(&self.schema, name, &descriptor, Direction::Materialize)
                    .convert(slot)?;
                Ok(&*slot)
            }
            None => Ok(&NULL),
        }
    }

    /// Reads an object-typed field and hands out the nested object for
    /// further access. `None` when the field is null, absent or not an object.
    pub fn get_object_mut(&mut self, name: &str) -> Result<Option<&mut LazyObject>> {
        self.get(name)?;
        Ok(self.data.get_mut(name).and_then(Value::as_object_mut))
    }

    /// Direct handle into the raw slot, created as null if missing.
    ///
    /// The current value is converted first, but anything written through
    /// the handle is not validated until the field is next read or analyzed.
    pub fn get_raw_mut(&mut self, name: &str) -> Result<&mut Value> {
        let descriptor = self.field_descriptor(name)?;
        let slot = self.data.entry(name.to_string()).or_insert(Value::Null);
        ValueConverter::new(&self.schema, name, &descriptor, Direction::Materialize)
            .convert(slot)?;
        Ok(slot)
    }

    /// Validates and stores `value`. Nothing is stored when validation fails.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self> {
        let descriptor = self.field_descriptor(name)?;
        let mut value = value.into();
        ValueConverter::new(&self.schema, name, &descriptor, Direction::Accept)
            .convert(&mut value)?;
        trace!(class = %self.class, field = name, "set field");
        self.data.insert(name.to_string(), value);
        Ok(self)
    }

    /// Declared by the class or present in the data.
    pub fn has(&self, name: &str) -> bool {
        self.has_declared(name) || self.has_data(name)
    }

    pub fn has_declared(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn has_data(&self, name: &str) -> bool {
        self.data.contains_key(name)
    }

    pub fn is_truthy(&self, name: &str) -> bool {
        self.data.get(name).is_some_and(Value::is_truthy)
    }

    /// Removes the data only; a declared field stays declared.
    pub fn unset(&mut self, name: &str) -> &mut Self {
        self.data.shift_remove(name);
        self
    }

    /// Converts every stored field and reports undeclared fields and
    /// conversion failures. Keeps going past individual failures.
    pub fn analyze(&mut self, recursive: bool) -> ClassAnalysis {
        let mut report = ClassAnalysis::new();
        self.analyze_into(recursive, "", &mut report);
        report
    }

    fn analyze_into(&mut self, recursive: bool, prefix: &str, report: &mut ClassAnalysis) {
        let names: Vec<String> = self.data.keys().cloned().collect();
        for name in names {
            let path = join_path(prefix, &name);
            let declared = self.table.get(&name).cloned();
            if declared.is_none() {
                report.add_missing(&self.class, &path);
            }
            let descriptor = declared.unwrap_or_else(|| Arc::clone(&UNDEFINED));
            let Some(slot) = self.data.get_mut(&name) else {
                continue;
            };
            let converted = ValueConverter::new(&self.schema, &name, &descriptor, Direction::Materialize)
                .convert(slot);
            if let Err(error) = converted {
                report.add_bad(&self.class, &path, error.to_string());
                continue;
            }
            if recursive && descriptor.is_object_type() {
                analyze_nested(slot, descriptor.array_depth(), &path, report);
            }
        }
    }

    /// Fails with the full analysis summary if anything is wrong anywhere.
    pub fn validate(&mut self) -> Result<()> {
        let report = self.analyze(true);
        if report.has_problems() {
            return Err(LazyError::Validation {
                class: self.class.clone(),
                summary: report.summary(),
            });
        }
        Ok(())
    }

    /// Plain copy of the data with every nested object flattened back into a
    /// map. Fails if any field anywhere in the tree does not convert.
    pub fn export(&self) -> Result<Value> {
        let mut copy = self.clone();
        let report = copy.analyze(false);
        if report.has_bad_definitions() {
            return Err(LazyError::ExportFailure {
                class: self.class.clone(),
                message: report.summary(),
            });
        }
        let mut out = Map::with_capacity(copy.data.len());
        for (name, value) in copy.data {
            let value = export_value(value).map_err(|error| LazyError::ExportFailure {
                class: self.class.clone(),
                message: format!("field {name:?}: {error}"),
            })?;
            out.insert(name, value);
        }
        Ok(Value::Map(out))
    }
}

fn analyze_nested(value: &mut Value, depth: u32, path: &str, report: &mut ClassAnalysis) {
    match value {
        Value::Object(object) if depth == 0 => object.analyze_into(true, path, report),
        Value::Array(items) if depth > 0 => {
            for (i, item) in items.iter_mut().enumerate() {
                analyze_nested(item, depth - 1, &format!("{path}[{i}]"), report);
            }
        }
        _ => {}
    }
}

fn export_value(value: Value) -> Result<Value> {
    Ok(match value {
        Value::Object(object) => object.export()?,
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(export_value)
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Map(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| Ok((k, export_value(v)?)))
                .collect::<Result<Map>>()?,
        ),
        other => other,
    })
}

impl fmt::Debug for LazyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyObject")
            .field("class", &self.class)
            .field("data", &self.data)
            .finish()
    }
}

impl PartialEq for LazyObject {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && self.data == other.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{ClassDecl, ClassRegistry};
    use crate::error::ConvertError;
    use serde_json::json;

    fn schema() -> Arc<Schema> {
        let registry = ClassRegistry::new()
            .with(
                ClassDecl::new("User")
                    .field("id", "int")
                    .field("name", "string")
                    .field("tags", "string[]")
                    .field("friend", "User")
                    .field("active", "bool"),
            )
            .unwrap();
        Schema::new(registry)
    }

    fn user(value: serde_json::Value) -> LazyObject {
        match Value::from(value) {
            Value::Map(data) => LazyObject::new(&schema(), "User", data).unwrap(),
            other => panic!("not an object: {other:?}"),
        }
    }

    #[test]
    fn get_converts_in_place() {
        let mut u = user(json!({"id": "5", "tags": ["a", "b"]}));
        assert_eq!(u.get("id").unwrap(), &Value::Int(5));
        assert_eq!(u.data()["id"], Value::Int(5));
        assert_eq!(u.get("name").unwrap(), &Value::Null);
        assert!(matches!(u.get("nope"), Err(LazyError::NoSuchField { .. })));
    }

    #[test]
    fn undeclared_fields_are_untyped() {
        let mut u = user(json!({"extra": {"k": [1, 2]}}));
        assert!(u.has("extra"));
        assert!(!u.has_declared("extra"));
        assert!(u.get("extra").unwrap().as_map().is_some());
        u.set("extra", 3).unwrap();
        assert!(u.set("undeclared", 1).is_err());
    }

    #[test]
    fn failed_set_leaves_data_untouched() {
        let mut u = user(json!({"tags": ["x"]}));
        let err = u.set("tags", "not an array").unwrap_err();
        assert!(matches!(err, LazyError::Convert(_)));
        assert_eq!(u.data()["tags"], Value::from(json!(["x"])));
    }

    #[test]
    fn unset_keeps_declaration() {
        let mut u = user(json!({"id": 1, "extra": 2}));
        u.unset("id").unset("extra");
        assert!(u.has("id"));
        assert!(!u.has_data("id"));
        assert!(!u.has("extra"));
    }

    #[test]
    fn truthiness_reads_raw_data() {
        let u = user(json!({"active": "0", "name": "x"}));
        assert!(!u.is_truthy("active"));
        assert!(u.is_truthy("name"));
        assert!(!u.is_truthy("id"));
    }

    #[test]
    fn raw_handle_writes_are_caught_on_next_read() {
        let mut u = user(json!({"id": 1}));
        *u.get_raw_mut("id").unwrap() = Value::from(json!([1, 2]));
        assert!(matches!(u.get("id"), Err(LazyError::Convert(_))));
        assert_eq!(u.get_raw_mut("name").unwrap(), &mut Value::Null);
        assert!(u.has_data("name"));
    }

    #[test]
    fn analyze_reports_missing_and_bad() {
        let mut u = user(json!({"id": [1], "friend": {"id": "x", "zzz": 1}, "other": 1}));
        let report = u.analyze(true);
        let class = ClassId::new("User");
        let missing = &report.missing_definitions[&class];
        assert!(missing.contains("other"));
        assert!(missing.contains("friend.zzz"));
        assert!(report.bad_definitions[&class].contains_key("id"));
        assert_eq!(u.get("friend").unwrap().as_object().unwrap().data()["id"], Value::Int(0));
    }

    #[test]
    fn strict_construction_fails_on_problems() {
        let data = match Value::from(json!({"id": 1, "surprise": true})) {
            Value::Map(m) => m,
            _ => unreachable!(),
        };
        let err = LazyObject::with_validation(&schema(), "User", data, true).unwrap_err();
        assert!(matches!(err, LazyError::Validation { .. }));
    }

    #[test]
    fn export_flattens_nested_objects() {
        let mut u = user(json!({"id": "7", "friend": {"id": "8", "friend": null}}));
        u.get("friend").unwrap();
        let exported = u.export().unwrap();
        assert_eq!(
            exported,
            Value::from(json!({"id": 7, "friend": {"id": 8, "friend": null}}))
        );
        let mut bad = user(json!({"friend": {"tags": "nope"}}));
        bad.get("friend").unwrap();
        assert!(matches!(bad.export(), Err(LazyError::ExportFailure { .. })));
    }

    #[test]
    fn init_hook_runs_on_construction_and_assign() {
        let registry = ClassRegistry::new()
            .with(ClassDecl::new("Counter").field("n", "int").on_init(|o| {
                if !o.has_data("n") {
                    o.set("n", 0)?;
                }
                Ok(())
            }))
            .and_then(|r| {
                r.with(ClassDecl::new("Broken").on_init(|_| anyhow::bail!("nope")))
            })
            .unwrap();
        let schema = Schema::new(registry);
        let mut counter = LazyObject::new(&schema, "Counter", Map::new()).unwrap();
        assert_eq!(counter.get("n").unwrap(), &Value::Int(0));
        counter.assign(Map::new()).unwrap();
        assert_eq!(counter.data()["n"], Value::Int(0));

        let err = LazyObject::new(&schema, "Broken", Map::new()).unwrap_err();
        assert!(matches!(err, LazyError::UserInit { .. }));
    }

    #[test]
    fn hook_errors_from_the_object_pass_through() {
        let registry = ClassRegistry::new()
            .with(ClassDecl::new("Counter").field("n", "int").on_init(|o| {
                o.set("n", vec![Value::Int(1)])?;
                Ok(())
            }))
            .unwrap();
        let schema = Schema::new(registry);
        let err = LazyObject::new(&schema, "Counter", Map::new()).unwrap_err();
        assert!(
            matches!(err, LazyError::Convert(ConvertError::ShapeMismatch { .. })),
            "{err:?}"
        );
    }

    #[test]
    fn into_data_keeps_converted_entries() {
        let mut u = user(json!({"id": "3", "name": 4}));
        u.get("id").unwrap();
        let data = u.into_data();
        assert_eq!(data["id"], Value::Int(3));
        assert_eq!(data["name"], Value::Int(4));
    }
}
