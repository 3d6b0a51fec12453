//! Scalar casting rules used when coercing a value to a primitive field type.
use once_cell::sync::Lazy;
use regex::Regex;

use super::Value;
use crate::descriptor::Primitive;

static NUMERIC_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:[eE][+-]?[0-9]+)?").unwrap()
});

/// Casts a scalar to `kind`. Returns `None` for anything that is not a scalar.
pub fn coerce(value: &Value, kind: Primitive) -> Option<Value> {
    if !value.is_scalar() {
        return None;
    }
    Some(match kind {
        Primitive::Bool => Value::Bool(value.is_truthy()),
        Primitive::Int => Value::Int(to_int(value)),
        Primitive::Float => Value::Float(to_float(value)),
        Primitive::String => Value::String(to_string(value)),
    })
}

fn to_int(value: &Value) -> i64 {
    match value {
        Value::Bool(b) => *b as i64,
        Value::Int(i) => *i,
        // `as` saturates and maps NaN to zero.
        Value::Float(f) => *f as i64,
        Value::String(s) => parse_int_prefix(s),
        _ => 0,
    }
}

fn to_float(value: &Value) -> f64 {
    match value {
        Value::Bool(b) => *b as i64 as f64,
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        Value::String(s) => numeric_prefix(s)
            .and_then(|p| p.parse::<f64>().ok())
            .unwrap_or(0.0),
        _ => 0.0,
    }
}

fn to_string(value: &Value) -> String {
    match value {
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::String(s) => s.clone(),
        _ => String::new(),
    }
}

fn numeric_prefix(s: &str) -> Option<&str> {
    NUMERIC_PREFIX
        .find(s.trim_start())
        .map(|m| m.as_str())
}

fn parse_int_prefix(s: &str) -> i64 {
    let Some(prefix) = numeric_prefix(s) else {
        return 0;
    };
    if prefix.contains(['.', 'e', 'E']) {
        return prefix.parse::<f64>().map(|f| f as i64).unwrap_or(0);
    }
    prefix
        .parse::<i64>()
        .unwrap_or_else(|_| prefix.parse::<f64>().map(|f| f as i64).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_to_numbers_use_leading_prefix() {
        assert_eq!(coerce(&"5".into(), Primitive::Int), Some(Value::Int(5)));
        assert_eq!(coerce(&" 12abc".into(), Primitive::Int), Some(Value::Int(12)));
        assert_eq!(coerce(&"abc".into(), Primitive::Int), Some(Value::Int(0)));
        assert_eq!(coerce(&"1e3".into(), Primitive::Int), Some(Value::Int(1000)));
        assert_eq!(coerce(&"-2.75".into(), Primitive::Float), Some(Value::Float(-2.75)));
        assert_eq!(coerce(&".5x".into(), Primitive::Float), Some(Value::Float(0.5)));
    }

    #[test]
    fn numbers_and_bools_to_strings() {
        assert_eq!(coerce(&Value::Float(5.0), Primitive::String), Some("5".into()));
        assert_eq!(coerce(&Value::Float(1.25), Primitive::String), Some("1.25".into()));
        assert_eq!(coerce(&Value::Bool(true), Primitive::String), Some("1".into()));
        assert_eq!(coerce(&Value::Bool(false), Primitive::String), Some("".into()));
    }

    #[test]
    fn floats_truncate_and_saturate() {
        assert_eq!(coerce(&Value::Float(-3.9), Primitive::Int), Some(Value::Int(-3)));
        assert_eq!(coerce(&Value::Float(f64::NAN), Primitive::Int), Some(Value::Int(0)));
        assert_eq!(coerce(&Value::Float(1e300), Primitive::Int), Some(Value::Int(i64::MAX)));
    }

    #[test]
    fn containers_are_not_scalars() {
        assert_eq!(coerce(&Value::Array(vec![]), Primitive::Bool), None);
        assert_eq!(coerce(&Value::Null, Primitive::Int), None);
    }
}
