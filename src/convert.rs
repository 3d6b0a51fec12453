//! Validates and converts one field value against its [`TypeDescriptor`].
//!
//! Conversion happens in place and runs on every read and every write, so a
//! slot corrupted through [`LazyObject::get_raw_mut`] is caught on the next
//! access. Object-typed values are materialized one level at a time: building
//! a nested object never converts that object's own fields.
//!
//! [`LazyObject::get_raw_mut`]: crate::LazyObject::get_raw_mut
use std::sync::Arc;

use tracing::trace;

use crate::class::ClassId;
use crate::descriptor::{BaseType, Primitive, TypeDescriptor};
use crate::error::ConvertError;
use crate::object::LazyObject;
use crate::schema::Schema;
use crate::value::{scalar, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Stored raw data on its way out to a reader; raw maps become objects.
    Materialize,
    /// A caller-supplied value on its way into storage; objects must already exist.
    Accept,
}

pub struct ValueConverter<'a> {
    schema: &'a Arc<Schema>,
    field: &'a str,
    descriptor: &'a TypeDescriptor,
    direction: Direction,
}

impl<'a> ValueConverter<'a> {
    pub fn new(
        schema: &'a Arc<Schema>,
        field: &'a str,
        descriptor: &'a TypeDescriptor,
        direction: Direction,
    ) -> Self {
        Self {
            schema,
            field,
            descriptor,
            direction,
        }
    }

    pub fn convert(&self, value: &mut Value) -> Result<(), ConvertError> {
        self.convert_level(value, self.descriptor.array_depth())
    }

    fn convert_level(&self, value: &mut Value, remaining: u32) -> Result<(), ConvertError> {
        if value.is_null() {
            return Ok(());
        }
        if remaining > 0 {
            return self.convert_array(value, remaining);
        }
        match self.descriptor.base() {
            BaseType::Any => self.check_any(value),
            BaseType::Primitive(kind) => self.coerce(value, *kind),
            BaseType::Object(class) => match self.direction {
                Direction::Materialize => self.materialize_object(value, class),
                Direction::Accept => self.accept_object(value, class),
            },
        }
    }

    fn convert_array(&self, value: &mut Value, remaining: u32) -> Result<(), ConvertError> {
        let level = self.descriptor.array_depth() - remaining + 1;
        if let Value::Map(map) = value {
            if let Err((index, key)) = Value::list_keys(map) {
                return Err(ConvertError::KeySequence {
                    field: self.field.to_string(),
                    level,
                    index,
                    key,
                });
            }
            let items = std::mem::take(map).into_values().collect();
            *value = Value::Array(items);
        }
        match value {
            Value::Array(items) => items
                .iter_mut()
                .try_for_each(|item| self.convert_level(item, remaining - 1)),
            other => Err(self.shape_mismatch(format!("an array at level {level}"), other)),
        }
    }

    fn check_any(&self, value: &Value) -> Result<(), ConvertError> {
        match value {
            Value::Array(_) | Value::Map(_) if self.descriptor.array_depth() > 0 => Err(self
                .shape_mismatch(
                    format!("a scalar or null inside {}", self.descriptor),
                    value,
                )),
            _ => self.check_untyped_tree(value),
        }
    }

    /// Untyped trees may nest arrays and maps freely, but only around scalars.
    fn check_untyped_tree(&self, value: &Value) -> Result<(), ConvertError> {
        match value {
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_) => {
                Ok(())
            }
            Value::Array(items) => items.iter().try_for_each(|v| self.check_untyped_tree(v)),
            Value::Map(map) => map.values().try_for_each(|v| self.check_untyped_tree(v)),
            Value::Object(_) | Value::Opaque(_) => Err(ConvertError::IllegalAnyValue {
                field: self.field.to_string(),
                found: value.kind_name(),
            }),
        }
    }

    fn coerce(&self, value: &mut Value, kind: Primitive) -> Result<(), ConvertError> {
        let already = matches!(
            (kind, &*value),
            (Primitive::Bool, Value::Bool(_))
                | (Primitive::Int, Value::Int(_))
                | (Primitive::Float, Value::Float(_))
                | (Primitive::String, Value::String(_))
        );
        if already {
            return Ok(());
        }
        if value.is_sequence() {
            return Err(self.shape_mismatch(kind.keyword().to_string(), value));
        }
        match scalar::coerce(value, kind) {
            Some(coerced) => {
                *value = coerced;
                Ok(())
            }
            None => Err(ConvertError::CoercionFailure {
                field: self.field.to_string(),
                kind,
                found: value.kind_name(),
            }),
        }
    }

    fn materialize_object(&self, value: &mut Value, class: &ClassId) -> Result<(), ConvertError> {
        let data = match value {
            Value::Object(object) => return self.check_instance(object, class),
            Value::Map(map) => map.clone(),
            Value::Array(items) if items.is_empty() => Default::default(),
            other @ Value::Array(_) => {
                return Err(self.shape_mismatch(format!("an object of class {class}"), other));
            }
            other => {
                return Err(ConvertError::TypeMismatch {
                    field: self.field.to_string(),
                    expected: class.clone(),
                    found: other.kind_name().to_string(),
                });
            }
        };
        let object = LazyObject::new(self.schema, class, data).map_err(|e| {
            ConvertError::NestedConstruction {
                field: self.field.to_string(),
                class: class.clone(),
                message: e.to_string(),
            }
        })?;
        trace!(field = self.field, %class, "materialized nested object");
        *value = Value::Object(Box::new(object));
        Ok(())
    }

    fn accept_object(&self, value: &Value, class: &ClassId) -> Result<(), ConvertError> {
        match value {
            Value::Object(object) => self.check_instance(object, class),
            other => Err(ConvertError::TypeMismatch {
                field: self.field.to_string(),
                expected: class.clone(),
                found: other.kind_name().to_string(),
            }),
        }
    }

    fn check_instance(&self, object: &LazyObject, class: &ClassId) -> Result<(), ConvertError> {
        if self.schema.registry().is_a(object.class(), class) {
            return Ok(());
        }
        Err(ConvertError::TypeMismatch {
            field: self.field.to_string(),
            expected: class.clone(),
            found: format!("instance of {}", object.class()),
        })
    }

    fn shape_mismatch(&self, expected: String, found: &Value) -> ConvertError {
        ConvertError::ShapeMismatch {
            field: self.field.to_string(),
            expected,
            found: found.kind_name(),
        }
    }
}
