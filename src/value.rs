use std::fmt;

use indexmap::IndexMap;

use crate::interp::{ValueKind, value_kind};

/// A fully-resolved configuration value.
///
/// This is what reads hand back to callers: interpolation expressions have
/// been substituted and the `???` sentinel has been rejected. The raw stored
/// form of a leaf is [`Scalar`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// A value of a schema-declared enum type, e.g. `Color.BLUE`.
    Enum { ty: String, variant: String },
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

impl Value {
    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Enum { .. } => "enum",
            Value::Array(_) => "list",
            Value::Object(_) => "mapping",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        if let Value::Object(items) = self {
            Some(items)
        } else {
            None
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        if let Value::Array(items) = self {
            Some(items)
        } else {
            None
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Enum { ty, variant } => write!(f, "{}.{}", ty, variant),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(items) => {
                write!(f, "{{")?;
                for (i, (k, v)) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
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

/// The payload stored in a scalar leaf.
///
/// Besides the concrete kinds this includes the two "not a value yet"
/// states: the `???` sentinel and an unresolved `${...}` expression kept
/// verbatim as its source string.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Enum { ty: String, variant: String },
    /// The `???` sentinel: a value that must be supplied before reads succeed.
    Missing,
    /// An unresolved interpolation expression, stored verbatim.
    Expr(String),
}

impl Scalar {
    /// Classify an incoming string: `???` becomes [`Scalar::Missing`], a
    /// string containing `${...}` becomes [`Scalar::Expr`], anything else is
    /// a plain string. Classification happens on every string assignment so
    /// expressions are never eagerly resolved or type-checked.
    pub fn classify(s: &str) -> Scalar {
        match value_kind(s) {
            ValueKind::Missing => Scalar::Missing,
            ValueKind::Interpolation | ValueKind::StrInterpolation => Scalar::Expr(s.to_string()),
            ValueKind::Plain => Scalar::Str(s.to_string()),
        }
    }

    /// Wrap a scalar-shaped [`Value`]. Strings are classified; containers
    /// are rejected by the caller before this point.
    pub(crate) fn from_value(value: &Value) -> Option<Scalar> {
        match value {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Int(n) => Some(Scalar::Int(*n)),
            Value::Float(n) => Some(Scalar::Float(*n)),
            Value::String(s) => Some(Scalar::classify(s)),
            Value::Enum { ty, variant } => Some(Scalar::Enum {
                ty: ty.clone(),
                variant: variant.clone(),
            }),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// The concrete value, if this scalar holds one.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Scalar::Null => Some(Value::Null),
            Scalar::Bool(b) => Some(Value::Bool(*b)),
            Scalar::Int(n) => Some(Value::Int(*n)),
            Scalar::Float(n) => Some(Value::Float(*n)),
            Scalar::Str(s) => Some(Value::String(s.clone())),
            Scalar::Enum { ty, variant } => Some(Value::Enum {
                ty: ty.clone(),
                variant: variant.clone(),
            }),
            Scalar::Missing | Scalar::Expr(_) => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) => "int",
            Scalar::Float(_) => "float",
            Scalar::Str(_) => "string",
            Scalar::Enum { .. } => "enum",
            Scalar::Missing => "???",
            Scalar::Expr(_) => "interpolation",
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Scalar::Missing)
    }

    pub fn is_expr(&self) -> bool {
        matches!(self, Scalar::Expr(_))
    }
}

/// Decode an untyped string into the most specific primitive it spells:
/// bool, int, float, null, else string. Used by the dotlist loader and the
/// built-in `env` resolver.
pub(crate) fn decode_primitive(s: &str) -> Value {
    let lower = s.to_lowercase();
    if lower == "true" {
        return Value::Bool(true);
    }
    if lower == "false" {
        return Value::Bool(false);
    }
    if lower == "null" || s == "~" {
        return Value::Null;
    }
    if let Ok(n) = s.parse::<i64>() {
        return Value::Int(n);
    }
    if let Ok(n) = s.parse::<f64>() {
        return Value::Float(n);
    }
    Value::String(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_missing() {
        assert_eq!(Scalar::classify("???"), Scalar::Missing);
    }

    #[test]
    fn test_classify_expr_kept_verbatim() {
        let s = "ftp://${host}/path";
        assert_eq!(Scalar::classify(s), Scalar::Expr(s.to_string()));
    }

    #[test]
    fn test_classify_plain() {
        assert_eq!(Scalar::classify("hello"), Scalar::Str("hello".into()));
    }

    #[test]
    fn test_decode_primitive() {
        assert_eq!(decode_primitive("true"), Value::Bool(true));
        assert_eq!(decode_primitive("False"), Value::Bool(false));
        assert_eq!(decode_primitive("10"), Value::Int(10));
        assert_eq!(decode_primitive("1.5"), Value::Float(1.5));
        assert_eq!(decode_primitive("null"), Value::Null);
        assert_eq!(decode_primitive("8080x"), Value::String("8080x".into()));
    }

    #[test]
    fn test_display_mixed() {
        assert_eq!(Value::Int(80).to_string(), "80");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(
            Value::Enum {
                ty: "Color".into(),
                variant: "BLUE".into()
            }
            .to_string(),
            "Color.BLUE"
        );
    }
}
