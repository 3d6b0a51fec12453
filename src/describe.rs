//! Human and machine readable descriptions of compiled classes.
use std::collections::VecDeque;

use indexmap::IndexSet;
use serde_json::{json, Value};

use crate::class::ClassId;
use crate::descriptor::{BaseType, Primitive, TypeDescriptor};
use crate::error::SchemaError;
use crate::schema::Schema;

/// JSON Schema for `class`. Every referenced class, the root one included,
/// lands in `$defs` exactly once.
pub fn json_schema(schema: &Schema, class: &ClassId) -> Result<Value, SchemaError> {
    let mut seen: IndexSet<ClassId> = IndexSet::new();
    let mut queue = VecDeque::from([class.clone()]);
    let mut defs = serde_json::Map::new();

    while let Some(current) = queue.pop_front() {
        if !seen.insert(current.clone()) {
            continue;
        }
        let table = schema.table(&current)?;
        let mut props = serde_json::Map::new();
        for (name, descriptor) in table.iter() {
            if let Some(target) = descriptor.object_class() {
                if !seen.contains(target) {
                    queue.push_back(target.clone());
                }
            }
            props.insert(name.clone(), field_schema(descriptor));
        }
        let mut def = json!({ "type": "object", "properties": props });
        if let Some(parent) = schema.registry().get(&current).and_then(|d| d.parent()) {
            def["description"] = Value::from(format!("extends {parent}"));
        }
        defs.insert(current.to_string(), def);
    }

    Ok(json!({
        "title": class.to_string(),
        "$ref": def_ref(class),
        "$defs": defs,
    }))
}

fn def_ref(class: &ClassId) -> String {
    format!("#/$defs/{class}")
}

fn nullable(inner: Value) -> Value {
    json!({ "oneOf": [inner, { "type": "null" }] })
}

/// Null is legal at the field and at every array level.
fn field_schema(descriptor: &TypeDescriptor) -> Value {
    let base = match descriptor.base() {
        BaseType::Any => json!({}),
        BaseType::Primitive(kind) => nullable(primitive_schema(*kind)),
        BaseType::Object(class) => nullable(json!({ "$ref": def_ref(class) })),
    };
    (0..descriptor.array_depth()).fold(base, |items, _| {
        nullable(json!({ "type": "array", "items": items }))
    })
}

fn primitive_schema(kind: Primitive) -> Value {
    match kind {
        Primitive::Bool => json!({ "type": "boolean" }),
        Primitive::Int => json!({ "type": "integer" }),
        Primitive::Float => json!({ "type": "number" }),
        Primitive::String => json!({ "type": "string" }),
    }
}

/// `name  type` lines, names padded to a common width.
pub fn text_table(schema: &Schema, class: &ClassId) -> Result<String, SchemaError> {
    let table = schema.table(class)?;
    let width = table.keys().map(|name| name.chars().count()).max().unwrap_or(0);
    let mut out = format!("{class}\n");
    for (name, descriptor) in table.iter() {
        out.push_str(&format!("  {name:<width$}  {descriptor}\n"));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{ClassDecl, ClassRegistry};

    fn schema() -> std::sync::Arc<Schema> {
        let registry = ClassRegistry::new()
            .with(
                ClassDecl::new("App.User")
                    .field("id", "int")
                    .field("friends", "User[]")
                    .field("meta", ""),
            )
            .unwrap();
        Schema::new(registry)
    }

    #[test]
    fn json_schema_defs_and_nullability() {
        let schema = schema();
        let doc = json_schema(&schema, &ClassId::new("App.User")).unwrap();
        assert_eq!(doc["$ref"], "#/$defs/App.User");
        let defs = doc["$defs"].as_object().unwrap();
        assert_eq!(defs.len(), 1);

        let props = &defs["App.User"]["properties"];
        assert_eq!(props["id"], json!({ "oneOf": [{ "type": "integer" }, { "type": "null" }] }));
        assert_eq!(props["meta"], json!({}));
        assert_eq!(
            props["friends"]["oneOf"][0]["items"]["oneOf"][0]["$ref"],
            "#/$defs/App.User"
        );
    }

    #[test]
    fn text_table_aligns_types() {
        let schema = schema();
        let text = text_table(&schema, &ClassId::new("App.User")).unwrap();
        assert_eq!(
            text,
            "App.User\n  id       int\n  friends  \\App.User[]\n  meta     any\n"
        );
    }
}
