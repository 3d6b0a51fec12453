//! Error taxonomy shared by the compiler, the converter and the data container.
use crate::class::ClassId;
use crate::descriptor::Primitive;

/// Failures while turning class declarations into compiled field tables.
///
/// Wrapping variants (`ImportFailed`, `PropertyClassFailed`) carry the inner
/// error verbatim so the first problem found anywhere in the graph stays visible.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("bad schema for class {class}: {reason}")]
    BadSchema { class: String, reason: String },

    #[error("bad definition for {class}::{field} ({definition:?}): {reason}")]
    BadDefinition {
        class: ClassId,
        field: String,
        definition: String,
        reason: String,
    },

    #[error("circular reference between {class} and {reference}")]
    CircularReference { class: ClassId, reference: ClassId },

    #[error("class {class} failed to import {target}: {source}")]
    ImportFailed {
        class: ClassId,
        target: ClassId,
        #[source]
        source: Box<SchemaError>,
    },

    #[error("class {class} references a class that failed to compile: {source}")]
    PropertyClassFailed {
        class: ClassId,
        #[source]
        source: Box<SchemaError>,
    },
}

impl SchemaError {
    pub(crate) fn bad_schema(class: impl ToString, reason: impl Into<String>) -> Self {
        SchemaError::BadSchema {
            class: class.to_string(),
            reason: reason.into(),
        }
    }

    /// Unwraps `ImportFailed`/`PropertyClassFailed` layers down to the original problem.
    pub fn root_cause(&self) -> &SchemaError {
        match self {
            SchemaError::ImportFailed { source, .. }
            | SchemaError::PropertyClassFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// A single malformed type definition string.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid type definition {definition:?}: {reason}")]
pub struct DefinitionError {
    pub definition: String,
    pub reason: String,
}

impl DefinitionError {
    pub(crate) fn new(definition: &str, reason: impl Into<String>) -> Self {
        Self {
            definition: definition.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failures raised while validating a value against a field's descriptor.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConvertError {
    #[error("field {field:?}: expected {expected}, found {found}")]
    ShapeMismatch {
        field: String,
        expected: String,
        found: &'static str,
    },

    #[error("field {field:?}: array level {level} has key {key:?} where index {index} was expected")]
    KeySequence {
        field: String,
        level: u32,
        index: usize,
        key: String,
    },

    #[error("field {field:?}: cannot coerce {found} to {kind}")]
    CoercionFailure {
        field: String,
        kind: Primitive,
        found: &'static str,
    },

    #[error("field {field:?}: expected an instance of {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: ClassId,
        found: String,
    },

    #[error("field {field:?}: failed to construct {class}: {message}")]
    NestedConstruction {
        field: String,
        class: ClassId,
        message: String,
    },

    #[error("field {field:?}: untyped values may not contain {found}")]
    IllegalAnyValue { field: String, found: &'static str },
}

/// Top level error for everything a [`crate::LazyObject`] can report.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LazyError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error("class {class} has no field {field:?}")]
    NoSuchField { class: ClassId, field: String },

    #[error("cannot export {class}: {message}")]
    ExportFailure { class: ClassId, message: String },

    #[error("{class} failed validation:\n{summary}")]
    Validation { class: ClassId, summary: String },

    #[error("on_init hook of {class} failed: {message}")]
    UserInit { class: ClassId, message: String },

    #[error("class {class} has no accessor {name:?}")]
    UnknownAccessor { class: ClassId, name: String },

    #[error("accessor {accessor:?} takes {expected} argument(s), got {got}")]
    BadArguments {
        accessor: String,
        expected: usize,
        got: usize,
    },

    #[error("at JSON path {path} → {message}")]
    Decode { path: String, message: String },
}

pub type Result<T, E = LazyError> = std::result::Result<T, E>;
