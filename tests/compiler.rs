use std::sync::Arc;

use json_lazybind::{ClassDecl, ClassId, ClassRegistry, Schema, SchemaError};

fn schema(decls: Vec<ClassDecl>) -> Arc<Schema> {
    let mut registry = ClassRegistry::new();
    for decl in decls {
        registry.register(decl).unwrap();
    }
    Schema::new(registry)
}

fn id(s: &str) -> ClassId {
    ClassId::new(s)
}

#[test]
fn compiling_twice_is_a_cache_hit() {
    let schema = schema(vec![ClassDecl::new("App.User").field("id", "int")]);
    let first = schema.table(&id("App.User")).unwrap();
    let cached = schema.with_cache(|c| c.len());

    schema.compile(&id("App.User")).unwrap();
    let second = schema.table(&id("App.User")).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(schema.with_cache(|c| c.len()), cached);
    assert_eq!(schema.with_cache(|c| c.locked().count()), 0);
}

#[test]
fn identical_redefinition_shares_the_parent_descriptor() {
    let schema = schema(vec![
        ClassDecl::new("Base").field("tags", "string[]").field("id", "int"),
        ClassDecl::new("Child")
            .extends("Base")
            .field("tags", "STRING[]")
            .field("id", "float"),
    ]);
    let child = schema.table(&id("Child")).unwrap();
    let base = schema.table(&id("Base")).unwrap();

    assert!(Arc::ptr_eq(&child["tags"], &base["tags"]));
    assert!(!Arc::ptr_eq(&child["id"], &base["id"]));
    assert_eq!(child["id"].to_string(), "float");
}

#[test]
fn circular_import_is_rejected_and_rolled_back() {
    let schema = schema(vec![
        ClassDecl::new("A").field("a", "int").import("B"),
        ClassDecl::new("B").field("b", "int").import("A"),
    ]);
    for class in ["A", "B"] {
        let err = schema.compile(&id(class)).unwrap_err();
        assert!(
            matches!(err.root_cause(), SchemaError::CircularReference { .. }),
            "{err}"
        );
        schema.with_cache(|cache| {
            assert_eq!(cache.locked().count(), 0);
            assert!(!cache.contains(&id("A")));
            assert!(!cache.contains(&id("B")));
        });
    }
}

#[test]
fn importing_a_subclass_of_the_importer_is_circular() {
    let schema = schema(vec![
        ClassDecl::new("A").field("a", "int").import("B"),
        ClassDecl::new("B").extends("A").field("b", "int"),
    ]);
    let err = schema.compile(&id("A")).unwrap_err();
    assert_eq!(
        err.root_cause(),
        &SchemaError::CircularReference {
            class: id("A"),
            reference: id("B"),
        }
    );
    assert!(matches!(err, SchemaError::ImportFailed { .. }));
    schema.with_cache(|cache| {
        assert!(cache.is_empty());
        assert_eq!(cache.locked().count(), 0);
    });
}

#[test]
fn chained_imports_merge_every_table() {
    let schema = schema(vec![
        ClassDecl::new("A").field("a", "int"),
        ClassDecl::new("B").import("A").field("b", "int"),
        ClassDecl::new("C").import("B").import("A").field("c", "int"),
        ClassDecl::new("D").import("C").field("d", "int"),
    ]);
    let d = schema.table(&id("D")).unwrap();
    assert_eq!(d.keys().collect::<Vec<_>>(), ["a", "b", "c", "d"]);
    for class in ["A", "B", "C", "D"] {
        assert!(schema.is_compiled(&id(class)), "{class}");
    }
    let a = schema.table(&id("A")).unwrap();
    assert!(Arc::ptr_eq(&a["a"], &d["a"]));
}

#[test]
fn deep_failure_rolls_back_the_whole_attempt() {
    let schema = schema(vec![
        ClassDecl::new("X").field("x", "int").import("Y"),
        ClassDecl::new("Y").field("z", "Z"),
        ClassDecl::new("Z").field("broken", "int[]]"),
    ]);
    let err = schema.compile(&id("X")).unwrap_err();
    match err.root_cause() {
        SchemaError::BadDefinition { class, field, .. } => {
            assert_eq!(class, &id("Z"));
            assert_eq!(field, "broken");
        }
        other => panic!("unexpected root cause {other:?}"),
    }
    assert!(err.to_string().contains("broken"));
    for class in ["X", "Y", "Z"] {
        assert!(!schema.is_compiled(&id(class)), "{class} left in cache");
    }
    assert_eq!(schema.with_cache(|c| c.locked().count()), 0);
}

#[test]
fn references_resolve_relative_then_absolute() {
    let schema = schema(vec![
        ClassDecl::new("Shared"),
        ClassDecl::new("App.Shared"),
        ClassDecl::new("App.User")
            .field("near", "Shared")
            .field("far", "\\Shared")
            .field("other", "Lib.Thing"),
        ClassDecl::new("Lib.Thing"),
    ]);
    let table = schema.table(&id("App.User")).unwrap();
    assert_eq!(table["near"].to_string(), "\\App.Shared");
    assert_eq!(table["far"].to_string(), "\\Shared");
    assert_eq!(table["other"].to_string(), "\\Lib.Thing");
}

#[test]
fn unknown_field_class_is_a_bad_definition() {
    let schema = schema(vec![ClassDecl::new("A").field("b", "Missing")]);
    let err = schema.compile(&id("A")).unwrap_err();
    assert!(matches!(err, SchemaError::BadDefinition { .. }));
    assert!(schema.with_cache(|c| c.is_empty()));
}

#[test]
fn clearing_the_cache_keeps_live_tables() {
    let schema = schema(vec![ClassDecl::new("A").field("a", "int")]);
    let table = schema.table(&id("A")).unwrap();
    assert!(schema.clear_cache() >= 1);
    assert!(!schema.is_compiled(&id("A")));
    assert_eq!(table["a"].to_string(), "int");
    let again = schema.table(&id("A")).unwrap();
    assert!(!Arc::ptr_eq(&table, &again));
}
