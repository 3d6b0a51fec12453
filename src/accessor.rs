//! Accessor names (`getUserName`, `setUserName`, ...) and the dispatch shim
//! that maps them back onto [`LazyObject`] fields.
use std::fmt;

use crate::error::{LazyError, Result};
use crate::object::LazyObject;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorKind {
    Get,
    Set,
    Has,
    Is,
    Unset,
}

impl AccessorKind {
    pub const ALL: [AccessorKind; 5] = [
        AccessorKind::Get,
        AccessorKind::Set,
        AccessorKind::Has,
        AccessorKind::Is,
        AccessorKind::Unset,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            AccessorKind::Get => "get",
            AccessorKind::Set => "set",
            AccessorKind::Has => "has",
            AccessorKind::Is => "is",
            AccessorKind::Unset => "unset",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            AccessorKind::Set => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for AccessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// `user_name` -> `UserName`. Leading underscores are kept: `_id` -> `_Id`.
pub fn function_case(field: &str) -> String {
    let body = field.trim_start_matches('_');
    let mut result = String::with_capacity(field.len());
    result.push_str(&field[..field.len() - body.len()]);

    let mut capitalize_next = true;
    for c in body.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }
    result
}

/// Best-effort inverse of [`function_case`]: `UserName` -> `user_name`,
/// `HTMLParser` -> `html_parser`.
pub fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut result = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
                _ => false,
            };
            if boundary {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

pub fn accessor_name(field: &str, kind: AccessorKind) -> String {
    format!("{}{}", kind.prefix(), function_case(field))
}

/// Splits `identifier` into its kind and FunctionCase suffix. The suffix must
/// not start lowercase, so `isolate` or `settle` are not accessors.
pub fn parse_accessor(identifier: &str) -> Option<(AccessorKind, &str)> {
    AccessorKind::ALL.into_iter().find_map(|kind| {
        let suffix = identifier.strip_prefix(kind.prefix())?;
        let first = suffix.chars().next()?;
        (!first.is_lowercase()).then_some((kind, suffix))
    })
}

impl LazyObject {
    /// Field addressed by an accessor suffix: the snake-case spelling first,
    /// then any declared or present field whose FunctionCase matches.
    pub fn resolve_accessor_field(&self, suffix: &str) -> Option<String> {
        let candidate = snake_case(suffix);
        if self.has(&candidate) {
            return Some(candidate);
        }
        self.table()
            .keys()
            .chain(self.data().keys())
            .find(|name| function_case(name) == suffix)
            .cloned()
    }

    /// Dispatches `getX`/`setX`/`hasX`/`isX`/`unsetX` style calls.
    ///
    /// `set` returns null; `has` and `is` return booleans.
    pub fn call(&mut self, identifier: &str, args: Vec<Value>) -> Result<Value> {
        let unknown = || LazyError::UnknownAccessor {
            class: self.class().clone(),
            name: identifier.to_string(),
        };
        let Some((kind, suffix)) = parse_accessor(identifier) else {
            return Err(unknown());
        };
        let Some(field) = self.resolve_accessor_field(suffix) else {
            return Err(unknown());
        };
        if args.len() != kind.arity() {
            return Err(LazyError::BadArguments {
                accessor: identifier.to_string(),
                expected: kind.arity(),
                got: args.len(),
            });
        }

        match kind {
            AccessorKind::Get => self.get(&field).cloned(),
            AccessorKind::Set => {
                let value = args.into_iter().next().unwrap_or_default();
                self.set(&field, value)?;
                Ok(Value::Null)
            }
            AccessorKind::Has => Ok(Value::Bool(self.has(&field))),
            AccessorKind::Is => Ok(Value::Bool(self.is_truthy(&field))),
            AccessorKind::Unset => {
                self.unset(&field);
                Ok(Value::Null)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{ClassDecl, ClassRegistry};
    use crate::schema::Schema;
    use crate::value::Map;

    #[test]
    fn function_case_capitalizes_segments() {
        assert_eq!(function_case("user_name"), "UserName");
        assert_eq!(function_case("_id"), "_Id");
        assert_eq!(function_case("camelCase"), "CamelCase");
        assert_eq!(function_case("a__b"), "AB");
    }

    #[test]
    fn snake_case_splits_on_case_changes() {
        assert_eq!(snake_case("UserName"), "user_name");
        assert_eq!(snake_case("_Id"), "_id");
        assert_eq!(snake_case("HTMLParser"), "html_parser");
        assert_eq!(snake_case("Item2Count"), "item2_count");
    }

    #[test]
    fn accessor_names_split_into_kind_and_suffix() {
        assert_eq!(parse_accessor("getUserName"), Some((AccessorKind::Get, "UserName")));
        assert_eq!(parse_accessor("unset_Id"), Some((AccessorKind::Unset, "_Id")));
        assert_eq!(parse_accessor("isolate"), None);
        assert_eq!(parse_accessor("get"), None);
        assert_eq!(accessor_name("user_name", AccessorKind::Has), "hasUserName");
    }

    #[test]
    fn call_dispatches_to_fields() {
        let registry = ClassRegistry::new()
            .with(
                ClassDecl::new("User")
                    .field("user_name", "string")
                    .field("isAdmin", "bool"),
            )
            .unwrap();
        let schema = Schema::new(registry);
        let mut user = LazyObject::new(&schema, "User", Map::new()).unwrap();

        user.call("setUserName", vec![Value::Int(42)]).unwrap();
        assert_eq!(user.call("getUserName", vec![]).unwrap(), Value::from("42"));
        assert_eq!(user.call("hasIsAdmin", vec![]).unwrap(), Value::Bool(true));
        user.call("setIsAdmin", vec![Value::from("yes")]).unwrap();
        assert_eq!(user.call("isIsAdmin", vec![]).unwrap(), Value::Bool(true));
        user.call("unsetUserName", vec![]).unwrap();
        assert!(!user.has_data("user_name"));

        assert!(matches!(
            user.call("getNope", vec![]),
            Err(LazyError::UnknownAccessor { .. })
        ));
        assert!(matches!(
            user.call("setUserName", vec![]),
            Err(LazyError::BadArguments { expected: 1, got: 0, .. })
        ));
    }
}

#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_snake_case_inverts_function_case(
            field in "[a-z]{2}[a-z0-9]{0,4}(_[a-z]{2}[a-z0-9]{0,4}){0,3}"
        ) {
            prop_assert_eq!(snake_case(&function_case(&field)), field);
        }

        #[test]
        fn prop_accessor_names_parse_back(
            field in "_?[a-z][a-z0-9_]{0,10}",
            index in 0usize..5,
        ) {
            let kind = AccessorKind::ALL[index];
            let name = accessor_name(&field, kind);
            let (parsed, suffix) = parse_accessor(&name).unwrap();
            prop_assert_eq!(parsed, kind);
            prop_assert_eq!(suffix, function_case(&field));
        }
    }
}
