//! value representation
//!
//! The ini2yaml output model contains the following data types
//! - boolean (true/false)
//! - integer (i64)
//! - decimal (f64, including `.inf` and `.nan`)
//! - string (utf-8)
//! - quoted string (a string that plain yaml readers would turn into a boolean, see [Value::string])
//! - date (ISO 8601 without timezone)
//! - array (nested arrays are matrices)
//!
//! Additionally there are three value kinds that only exist between evaluation and output:
//! - [Value::Reference]: a dotted path that still has to be resolved
//! - [Value::Shared]: a resolved reference, pointing at a slot of the [Namespace]
//! - [Value::Deferred]: a reference that could not be resolved and is emitted as a `${path}` placeholder
//!
//! There is no `null`. A field without a value is simply absent.
use crate::namespace::Namespace;
use crate::path::Path;
use chrono::NaiveDateTime;
use serde::{
    ser::{Error as _, SerializeSeq},
    Serialize, Serializer,
};

/// Layout of date literals produced by the normalizer
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Index of a slot in a [Namespace]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub(crate) usize);

/// All possible value types
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Quoted(String),
    Date(NaiveDateTime),
    Array(Vec<Value>),
    Reference(Path),
    Shared(Handle),
    Deferred(Path),
}

impl Value {
    /// Build a string value, tagging words that yaml 1.1 readers coerce to booleans
    ///
    /// Only `on` and `off` (any case) are tagged, those are the words instrument configurations
    /// actually use as switch settings.
    pub fn string(s: impl Into<String>) -> Self {
        let s = s.into();
        if is_reserved_word(&s) {
            Value::Quoted(s)
        } else {
            Value::String(s)
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Quoted(s) => Some(s),
            _ => None,
        }
    }

    /// Empty strings and empty arrays may be replaced by a field default
    pub fn is_empty_like(&self) -> bool {
        match self {
            Value::String(s) | Value::Quoted(s) => s.trim().is_empty(),
            Value::Array(a) => a.is_empty(),
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::String(_) | Value::Quoted(_) => "string",
            Value::Date(_) => "date",
            Value::Array(_) => "array",
            Value::Reference(_) => "reference",
            Value::Shared(_) => "shared value",
            Value::Deferred(_) => "deferred reference",
        }
    }

    /// True if the value (or any element) is an unresolved [Value::Reference]
    pub fn has_references(&self) -> bool {
        match self {
            Value::Reference(_) => true,
            Value::Array(a) => a.iter().any(Value::has_references),
            _ => false,
        }
    }

    /// Text rendering used by `str(...)` and `&` concatenation
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Boolean(b) => Some(b.to_string()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Decimal(d) => Some(format_decimal(*d)),
            Value::String(s) | Value::Quoted(s) => Some(s.clone()),
            Value::Date(d) => Some(d.format(DATE_FORMAT).to_string()),
            _ => None,
        }
    }
}

pub(crate) fn is_reserved_word(s: &str) -> bool {
    s.eq_ignore_ascii_case("on") || s.eq_ignore_ascii_case("off")
}

fn format_decimal(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        if d > 0.0 { "Inf" } else { "-Inf" }.to_string()
    } else {
        d.to_string()
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::string(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Decimal(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Self::Date(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

/// Serialize a scalar (or array of scalars)
///
/// Shared values can only be serialized together with their namespace, see [Resolved].
impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Decimal(value) => serializer.serialize_f64(*value),
            Value::String(value) | Value::Quoted(value) => serializer.serialize_str(value),
            Value::Date(value) => serializer.collect_str(&value.format(DATE_FORMAT)),
            Value::Array(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Reference(path) | Value::Deferred(path) => {
                serializer.collect_str(&format_args!("${{{path}}}"))
            }
            Value::Shared(handle) => Err(S::Error::custom(format!(
                "shared value #{} serialized without its namespace",
                handle.0
            ))),
        }
    }
}

/// A value paired with the namespace its [Value::Shared] handles point into
///
/// Serializing inlines shared values. Formats without aliasing (json) get a copy at every use.
#[derive(derive_new::new)]
pub struct Resolved<'a> {
    value: &'a Value,
    namespace: &'a Namespace,
}

impl Serialize for Resolved<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.value {
            Value::Shared(handle) => Resolved::new(self.namespace.get(*handle), self.namespace)
                .serialize(serializer),
            Value::Array(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(&Resolved::new(element, self.namespace))?;
                }
                ser.end()
            }
            other => other.serialize(serializer),
        }
    }
}
