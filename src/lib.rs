//! Runtime schema compiler and lazy data binding for JSON-like trees.
//!
//! Classes are declared as plain data in a [`ClassRegistry`]: a parent, an
//! ordered list of fields (`name => "type[]"`) and imports of other classes.
//! A [`Schema`] compiles each class on first use into a flat field table and
//! caches it; a [`LazyObject`] binds raw decoded data to that table and only
//! converts a field when it is read or written.
//!
//! ```
//! use json_lazybind::{ClassDecl, ClassRegistry, LazyObject, Schema, Value};
//!
//! let registry = ClassRegistry::new()
//!     .with(ClassDecl::new("App.User").field("id", "int").field("friends", "User[]"))
//!     .unwrap();
//! let schema = Schema::new(registry);
//! let mut user = LazyObject::from_json_str(&schema, "App.User", r#"{"id": "7"}"#).unwrap();
//! assert_eq!(user.get("id").unwrap(), &Value::Int(7));
//! ```
pub mod accessor;
pub mod cache;
pub mod class;
pub mod cli;
pub mod codec;
pub mod compiler;
pub mod convert;
pub mod describe;
pub mod descriptor;
pub mod error;
pub mod jq_exec;
pub mod manifest;
pub mod object;
pub mod schema;
pub mod value;

pub use accessor::AccessorKind;
pub use cache::{FieldTable, SchemaCache};
pub use class::{ClassDecl, ClassId, ClassRegistry, Declaration, ROOT_CLASS};
pub use descriptor::{BaseType, Primitive, TypeDescriptor};
pub use error::{ConvertError, DefinitionError, LazyError, Result, SchemaError};
pub use manifest::Manifest;
pub use object::{ClassAnalysis, LazyObject};
pub use schema::Schema;
pub use value::{Map, Opaque, Value};
