//! Runtime value model.
//!
//! One tagged union for every value a template can touch. `Safe` is the
//! string subtype that bypasses HTML escaping and survives filters that claim
//! safe output. `Undefined` carries the name it was looked up under and
//! renders empty unless the environment runs in strict mode.
//!
//! The spec's two dict flavors collapse into one string-keyed map; non-string
//! keys are stringified on insertion, matching item lookup semantics.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::environment::FunctionFn;

pub type Kwargs = BTreeMap<String, Value>;

/// Capability surface of host objects exposed to templates.
pub trait Object: Send + Sync {
    fn attribute(&self, name: &str) -> Option<Value>;

    fn repr(&self) -> String {
        "<object>".to_string()
    }
}

#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A string that bypasses HTML escaping.
    Safe(String),
    /// A missing variable or attribute, carrying the name it was looked up
    /// under. Renders empty.
    Undefined(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Func(Arc<FunctionFn>),
    Time(DateTime<Utc>),
    Object(Arc<dyn Object>),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Int(v) => write!(f, "Int({v})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::Str(v) => write!(f, "Str({v:?})"),
            Value::Safe(v) => write!(f, "Safe({v:?})"),
            Value::Undefined(name) => write!(f, "Undefined({name:?})"),
            Value::List(v) => f.debug_tuple("List").field(v).finish(),
            Value::Map(v) => f.debug_tuple("Map").field(v).finish(),
            Value::Func(_) => write!(f, "Func"),
            Value::Time(t) => write!(f, "Time({t})"),
            Value::Object(o) => write!(f, "Object({})", o.repr()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b))
            | (Value::Safe(a), Value::Safe(b))
            | (Value::Str(a), Value::Safe(b))
            | (Value::Safe(a), Value::Str(b)) => a == b,
            (Value::Undefined(_), Value::Undefined(_)) => true,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Func(a), Value::Func(b)) => Arc::ptr_eq(a, b),
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Value {
        Value::List(v)
    }
}

/// A number after coercion: integer arithmetic stays integral, everything
/// else is promoted to `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub fn as_f64(self) -> f64 {
        match self {
            Num::Int(v) => v as f64,
            Num::Float(v) => v,
        }
    }
}

impl Value {
    pub fn undefined() -> Value {
        Value::Undefined(String::new())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined(_))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null | Value::Undefined(_) => false,
            Value::Bool(v) => *v,
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Str(s) | Value::Safe(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Func(_) | Value::Time(_) | Value::Object(_) => true,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::Float(_) => "number",
            Value::Str(_) => "string",
            Value::Safe(_) => "safe string",
            Value::Undefined(_) => "undefined",
            Value::List(_) => "list",
            Value::Map(_) => "dict",
            Value::Func(_) => "callable",
            Value::Time(_) => "time",
            Value::Object(_) => "object",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Safe(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Num> {
        match self {
            Value::Int(v) => Some(Num::Int(*v)),
            Value::Float(v) => Some(Num::Float(*v)),
            Value::Bool(v) => Some(Num::Int(*v as i64)),
            _ => None,
        }
    }

    /// The output form: `null`/`undefined` are empty, booleans spell
    /// `true`/`false`, numbers use their canonical decimal form, containers
    /// use a JSON-like inspect form.
    pub fn stringify(&self) -> String {
        match self {
            Value::Null | Value::Undefined(_) => String::new(),
            Value::Bool(true) => "true".to_string(),
            Value::Bool(false) => "false".to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => format_float(*v),
            Value::Str(s) | Value::Safe(s) => s.clone(),
            Value::List(_) | Value::Map(_) => {
                serde_json::to_string(&self.to_json()).unwrap_or_default()
            }
            Value::Func(_) => "<function>".to_string(),
            Value::Time(t) => t.to_rfc3339_opts(SecondsFormat::Secs, true),
            Value::Object(o) => o.repr(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Undefined(_) => serde_json::Value::Null,
            Value::Bool(v) => (*v).into(),
            Value::Int(v) => (*v).into(),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) | Value::Safe(s) => s.clone().into(),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Func(_) => "<function>".into(),
            Value::Time(t) => t.to_rfc3339_opts(SecondsFormat::Secs, true).into(),
            Value::Object(o) => o.repr().into(),
        }
    }
}

pub fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

/// Equality with numeric promotion: an `Int` equals a `Float` when their
/// promoted values match.
pub fn value_eq(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
        return match (x, y) {
            (Num::Int(i), Num::Int(j)) => i == j,
            _ => x.as_f64() == y.as_f64(),
        };
    }
    a == b
}

/// Ordering for comparisons: numbers (with promotion) and strings only.
pub fn value_cmp(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
        return match (x, y) {
            (Num::Int(i), Num::Int(j)) => Some(i.cmp(&j)),
            _ => x.as_f64().partial_cmp(&y.as_f64()),
        };
    }
    match (a.as_str(), b.as_str()) {
        (Some(x), Some(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
