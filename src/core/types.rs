use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of an object inside its document.
pub type ObjectId = u64;

/// Field name → value map carried by every object, patch and filter.
pub type Fields = BTreeMap<String, Value>;

/// Largest magnitude at which every integral f64 is exactly an i64.
const EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// Dynamically typed field value.
///
/// Serialized untagged so document files read as plain JSON objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Canonical string form used as the inverted-index key.
    ///
    /// Integers and integral floats share the same digit string (`1` and
    /// `1.0` both give `"1"`); other floats use the shortest round-trip
    /// decimal form. Text is taken verbatim, so `Text("1")` and
    /// `Integer(1)` land in the same bucket.
    pub fn canonical(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < EXACT_FLOAT_INT {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::Text(s) => s.clone(),
        }
    }

    /// Equality under the canonical form, the rule filters and lookups share.
    pub fn matches(&self, other: &Value) -> bool {
        self.canonical() == other.canonical()
    }

    /// Numeric view used for object-id comparisons.
    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Value::Integer(i) if *i >= 0 => Some(*i as ObjectId),
            Value::Float(f) if f.is_finite() && f.fract() == 0.0 && *f >= 0.0 && *f < EXACT_FLOAT_INT => {
                Some(*f as ObjectId)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

/// Build a `Fields` map from `(name, value)` pairs.
pub fn fields<K, V, I>(pairs: I) -> Fields
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}
