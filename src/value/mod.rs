//! Dynamically-typed values flowing through filter expressions and feature properties.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::hash::{Hash, Hasher};

/// A dynamically-typed value.
///
/// Equality and hashing follow the canonical JSON form (see [`Value::canonical`]),
/// so `Int(1)` and `Double(1.0)` compare equal while `String("1")` does not.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

/// Variant tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Double,
    String,
    Array,
    Object,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Double(_) => ValueKind::Double,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for null, arrays and objects, which have no scalar text form.
    pub fn is_composite_or_null(&self) -> bool {
        matches!(self, Value::Null | Value::Array(_) | Value::Object(_))
    }

    /// Numeric view of ints and doubles.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Look up a key of an object value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Plain text of a scalar: strings unquoted, numbers and booleans as in the
    /// canonical form. `None` for null, arrays and objects.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::String(s) => Some(Cow::Borrowed(s)),
            Value::Bool(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
            Value::Int(i) => Some(Cow::Owned(i.to_string())),
            Value::Double(d) => Some(Cow::Owned(format_double(*d))),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Canonical serialized form: compact JSON, object keys sorted, doubles in
    /// shortest round-trip notation without a trailing `.0`.
    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// Parse a JSON document into a value.
    pub fn from_json_str(text: &str) -> Result<Value, serde_json::Error> {
        serde_json::from_str::<serde_json::Value>(text).map(Value::from)
    }

    fn write_canonical(&self, out: &mut impl Write) -> fmt::Result {
        match self {
            Value::Null => out.write_str("null"),
            Value::Bool(b) => out.write_str(if *b { "true" } else { "false" }),
            Value::Int(i) => write!(out, "{i}"),
            Value::Double(d) => out.write_str(&format_double(*d)),
            Value::String(s) => write_json_string(out, s),
            Value::Array(items) => {
                out.write_char('[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.write_char(',')?;
                    }
                    item.write_canonical(out)?;
                }
                out.write_char(']')
            }
            Value::Object(map) => {
                out.write_char('{')?;
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        out.write_char(',')?;
                    }
                    write_json_string(out, key)?;
                    out.write_char(':')?;
                    item.write_canonical(out)?;
                }
                out.write_char('}')
            }
        }
    }
}

fn format_double(d: f64) -> String {
    if d.is_finite() {
        // Display never uses exponent notation and drops the `.0` of integral values.
        format!("{d}")
    } else {
        "null".to_string()
    }
}

fn write_json_string(out: &mut impl Write, s: &str) -> fmt::Result {
    out.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => out.write_str("\\\"")?,
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            '\r' => out.write_str("\\r")?,
            '\t' => out.write_str("\\t")?,
            c if (c as u32) < 0x20 => write!(out, "\\u{:04x}", c as u32)?,
            c => out.write_char(c)?,
        }
    }
    out.write_char('"')
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_canonical(f)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            _ => self.canonical() == other.canonical(),
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            Value::Double(d) => serde_json::Number::from_f64(d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Object(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(value: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn canonical_form_sorts_keys_and_trims_doubles() {
        let value = Value::from_json_str(r#"{"b": [1, 2.5, "x"], "a": 3.0, "c": null}"#).unwrap();
        assert_eq!(value.canonical(), r#"{"a":3,"b":[1,2.5,"x"],"c":null}"#);
    }

    #[test]
    fn integral_double_equals_int() {
        assert_eq!(Value::Int(1), Value::Double(1.0));
        assert_eq!(hash_of(&Value::Int(1)), hash_of(&Value::Double(1.0)));
        assert_ne!(Value::Int(1), Value::Double(1.5));
        assert_ne!(Value::Int(1), Value::from("1"));
    }

    #[test]
    fn structural_equality_of_composites() {
        let a = Value::Array(vec![Value::Int(1), Value::from("x")]);
        let b = Value::from_json_str(r#"[1, "x"]"#).unwrap();
        assert_eq!(a, b);

        let o1: Value = [("k", Value::Int(1)), ("j", Value::Bool(true))].into_iter().collect();
        let o2: Value = [("j", Value::Bool(true)), ("k", Value::Int(1))].into_iter().collect();
        assert_eq!(o1, o2);
        assert_eq!(hash_of(&o1), hash_of(&o2));
    }

    #[test]
    fn text_form_of_scalars() {
        assert_eq!(Value::from("abc").as_text().as_deref(), Some("abc"));
        assert_eq!(Value::Bool(false).as_text().as_deref(), Some("false"));
        assert_eq!(Value::Int(-7).as_text().as_deref(), Some("-7"));
        assert_eq!(Value::Double(0.25).as_text().as_deref(), Some("0.25"));
        assert!(Value::Null.as_text().is_none());
        assert!(Value::Array(vec![]).as_text().is_none());
    }

    #[test]
    fn strings_are_escaped_in_canonical_form() {
        assert_eq!(Value::from("a\"b\n").canonical(), r#""a\"b\n""#);
    }

    #[test]
    fn json_round_trip_keeps_integers() {
        let json = serde_json::json!({"n": 5, "f": 0.5, "big": 18446744073709551615u64});
        let value = Value::from(json);
        assert!(matches!(value.get("n"), Some(Value::Int(5))));
        assert!(matches!(value.get("f"), Some(Value::Double(_))));
        assert!(matches!(value.get("big"), Some(Value::Double(_))));
        let back: serde_json::Value = value.into();
        assert_eq!(back["n"], serde_json::json!(5));
    }
}
