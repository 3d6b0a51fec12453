//! Parsed field type definitions.
//!
//! Grammar: `<base>([])*` where `<base>` is empty, `any`/`mixed`, a primitive
//! keyword, or a class reference (`Name`, `Ns.Name`, `\Abs.Name`).
use std::fmt;

use crate::class::{ClassId, ClassRegistry};
use crate::error::DefinitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    Int,
    Float,
    String,
}

impl Primitive {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Some(Primitive::Bool),
            "int" | "integer" => Some(Primitive::Int),
            "float" | "double" => Some(Primitive::Float),
            "string" => Some(Primitive::String),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::Int => "int",
            Primitive::Float => "float",
            Primitive::String => "string",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BaseType {
    /// Untyped: scalars, null, or (at depth 0) nested arrays of those.
    Any,
    Primitive(Primitive),
    Object(ClassId),
}

/// Immutable, structurally comparable type of one field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    base: BaseType,
    array_depth: u32,
}

impl TypeDescriptor {
    pub fn new(base: BaseType, array_depth: u32) -> Self {
        Self { base, array_depth }
    }

    pub fn any() -> Self {
        Self::new(BaseType::Any, 0)
    }

    pub fn primitive(kind: Primitive) -> Self {
        Self::new(BaseType::Primitive(kind), 0)
    }

    pub fn object(class: impl Into<ClassId>) -> Self {
        Self::new(BaseType::Object(class.into()), 0)
    }

    pub fn array_of(mut self, depth: u32) -> Self {
        self.array_depth = depth;
        self
    }

    /// Parses `definition` as written inside class `from`.
    pub fn parse(
        definition: &str,
        registry: &ClassRegistry,
        from: &ClassId,
    ) -> Result<Self, DefinitionError> {
        let mut base = definition.trim();
        let mut array_depth = 0u32;
        while let Some(rest) = base.strip_suffix("[]") {
            base = rest;
            array_depth += 1;
        }
        if base.contains(['[', ']']) {
            return Err(DefinitionError::new(definition, "malformed array brackets"));
        }

        let base = match base.to_ascii_lowercase().as_str() {
            "" | "any" | "mixed" => BaseType::Any,
            word => match Primitive::from_keyword(word) {
                Some(kind) => BaseType::Primitive(kind),
                None => BaseType::Object(resolve_class(definition, base, registry, from)?),
            },
        };
        Ok(Self { base, array_depth })
    }

    pub fn base(&self) -> &BaseType {
        &self.base
    }

    pub fn array_depth(&self) -> u32 {
        self.array_depth
    }

    pub fn is_object_type(&self) -> bool {
        matches!(self.base, BaseType::Object(_))
    }

    pub fn object_class(&self) -> Option<&ClassId> {
        match &self.base {
            BaseType::Object(class) => Some(class),
            _ => None,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self.base, BaseType::Any)
    }
}

fn resolve_class(
    definition: &str,
    reference: &str,
    registry: &ClassRegistry,
    from: &ClassId,
) -> Result<ClassId, DefinitionError> {
    if !ClassId::is_valid_path(reference.trim_start_matches('\\')) {
        return Err(DefinitionError::new(
            definition,
            "not a primitive type or class path",
        ));
    }
    registry.resolve(reference, from).ok_or_else(|| {
        DefinitionError::new(
            definition,
            format!("class {reference:?} is not a registered schema class"),
        )
    })
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.base {
            BaseType::Any => f.write_str("any")?,
            BaseType::Primitive(kind) => f.write_str(kind.keyword())?,
            BaseType::Object(class) => write!(f, "\\{class}")?,
        }
        for _ in 0..self.array_depth {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassDecl;

    fn registry() -> ClassRegistry {
        ClassRegistry::new()
            .with(ClassDecl::new("Foo.Bar"))
            .and_then(|r| r.with(ClassDecl::new("Foo.Baz")))
            .unwrap()
    }

    fn parse(s: &str) -> Result<TypeDescriptor, DefinitionError> {
        TypeDescriptor::parse(s, &registry(), &ClassId::new("Foo.Baz"))
    }

    #[test]
    fn parses_primitives_and_depth() {
        assert_eq!(parse("int").unwrap(), TypeDescriptor::primitive(Primitive::Int));
        assert_eq!(
            parse(" Float[] ").unwrap(),
            TypeDescriptor::primitive(Primitive::Float).array_of(1)
        );
        assert_eq!(parse("boolean").unwrap().to_string(), "bool");
    }

    #[test]
    fn empty_any_and_mixed_are_untyped() {
        assert_eq!(parse("").unwrap(), TypeDescriptor::any());
        assert_eq!(parse("any").unwrap(), TypeDescriptor::any());
        assert_eq!(parse("mixed[]").unwrap(), TypeDescriptor::any().array_of(1));
        assert_eq!(parse("[][]").unwrap(), TypeDescriptor::any().array_of(2));
    }

    #[test]
    fn class_references_resolve() {
        let d = parse("Bar[][]").unwrap();
        assert_eq!(d.object_class(), Some(&ClassId::new("Foo.Bar")));
        assert_eq!(d.array_depth(), 2);
        assert_eq!(d.to_string(), "\\Foo.Bar[][]");
        assert_eq!(parse("LazyObject").unwrap(), TypeDescriptor::object(ClassId::root()));
    }

    #[test]
    fn malformed_definitions_fail() {
        for bad in ["int[", "int]", "int[]]", "int[ ]", "[]int", "Nope", "in t", "Foo..Bar"] {
            assert!(parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn display_round_trips() {
        for s in ["int", "float[]", "\\Foo.Bar[][]", "", "any", "any[]", "string[][][]"] {
            let d = parse(s).unwrap();
            assert_eq!(parse(&d.to_string()).unwrap(), d, "{s:?}");
        }
    }
}
