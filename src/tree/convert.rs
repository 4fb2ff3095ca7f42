use std::collections::HashMap;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use super::*;

impl TryFrom<Value> for String {
    type Error = StrataError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(StrataError::type_mismatch("", "string", other.type_name())),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = StrataError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(StrataError::type_mismatch("", "bool", other.type_name())),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = StrataError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Int(n) => Ok(n),
            other => Err(StrataError::type_mismatch("", "int", other.type_name())),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = StrataError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Float(n) => Ok(n),
            Value::Int(n) => Ok(n as f64),
            other => Err(StrataError::type_mismatch("", "float", other.type_name())),
        }
    }
}

impl TryFrom<Value> for f32 {
    type Error = StrataError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        f64::try_from(value).map(|n| n as f32)
    }
}

macro_rules! int_try_from {
    ($ty:ty) => {
        impl TryFrom<Value> for $ty {
            type Error = StrataError;

            fn try_from(value: Value) -> Result<Self, Self::Error> {
                match value {
                    Value::Int(n) => <$ty>::try_from(n).map_err(|_| StrataError::TypeMismatch {
                        path: String::new(),
                        expected: stringify!($ty).to_string(),
                        got: format!("{}", n),
                        hint: Some(format!("Number {} is out of range for {}", n, stringify!($ty))),
                        code: Some(401),
                    }),
                    other => Err(StrataError::type_mismatch(
                        "",
                        stringify!($ty),
                        other.type_name(),
                    )),
                }
            }
        }
    };
}

int_try_from!(i32);
int_try_from!(u8);
int_try_from!(u16);
int_try_from!(u32);
int_try_from!(u64);
int_try_from!(usize);

impl<T> TryFrom<Value> for Vec<T>
where
    T: TryFrom<Value, Error = StrataError>,
{
    type Error = StrataError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Array(items) => items.into_iter().map(T::try_from).collect(),
            other => Err(StrataError::type_mismatch("", "list", other.type_name())),
        }
    }
}

impl<T> TryFrom<Value> for Option<T>
where
    T: TryFrom<Value, Error = StrataError>,
{
    type Error = StrataError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(None),
            v => Ok(Some(T::try_from(v)?)),
        }
    }
}

impl TryFrom<Value> for IndexMap<String, Value> {
    type Error = StrataError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(items) => Ok(items),
            other => Err(StrataError::type_mismatch("", "mapping", other.type_name())),
        }
    }
}

impl TryFrom<Value> for HashMap<String, String> {
    type Error = StrataError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(items) => items
                .into_iter()
                .map(|(k, v)| Ok((k, String::try_from(v)?)))
                .collect(),
            other => Err(StrataError::type_mismatch("", "mapping", other.type_name())),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Enum { .. } => serializer.serialize_str(&self.to_string()),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(items) => {
                let mut map = serializer.serialize_map(Some(items.len()))?;
                for (k, v) in items {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

/// Convert a parsed JSON container into a [`Value`].
pub(crate) fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::Array(items.iter().map(json_to_value).collect()),
        serde_json::Value::Object(items) => Value::Object(
            items
                .iter()
                .map(|(k, v)| (k.clone(), json_to_value(v)))
                .collect(),
        ),
    }
}

pub(crate) fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(n) => serde_json::Value::from(*n),
        Value::Float(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Enum { .. } => serde_json::Value::String(value.to_string()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Object(items) => serde_json::Value::Object(
            items
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
    }
}

impl ConfigTree {
    /// Build a tree from an already-parsed JSON-shaped container. Strings
    /// are classified: `???` becomes the missing sentinel and `${...}`
    /// content stays an unresolved expression.
    pub fn from_json(json: &serde_json::Value) -> Self {
        Self::from_value(json_to_value(json))
    }

    /// Copy the tree into a plain nested container.
    ///
    /// With `resolve` false, every scalar's raw stored form is copied:
    /// interpolation expressions verbatim, the missing sentinel as `"???"`.
    /// With `resolve` true, expressions are resolved first and resolution
    /// failures propagate; `???` still serializes as `"???"` so partially
    /// populated trees remain dumpable.
    pub fn to_plain(&self, resolve: bool) -> Result<serde_json::Value, StrataError> {
        self.plain_node(self.root, resolve)
    }

    fn plain_node(&self, id: NodeId, resolve: bool) -> Result<serde_json::Value, StrataError> {
        match &self.nodes[id].kind {
            NodeKind::Mapping(items) => {
                let mut out = serde_json::Map::with_capacity(items.len());
                for (key, &child) in items {
                    out.insert(key.clone(), self.plain_node(child, resolve)?);
                }
                Ok(serde_json::Value::Object(out))
            }
            NodeKind::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                for &child in items {
                    out.push(self.plain_node(child, resolve)?);
                }
                Ok(serde_json::Value::Array(out))
            }
            NodeKind::Scalar(scalar) => match scalar {
                Scalar::Missing => Ok(serde_json::Value::String("???".into())),
                Scalar::Expr(src) => {
                    if resolve {
                        let mut active = Vec::new();
                        let value = self.resolve_node(id, &mut active)?;
                        Ok(value_to_json(&value))
                    } else {
                        Ok(serde_json::Value::String(src.clone()))
                    }
                }
                concrete => {
                    let value = concrete.to_value().expect("concrete scalar");
                    Ok(value_to_json(&value))
                }
            },
        }
    }
}
