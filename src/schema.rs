use indexmap::IndexMap;

use crate::error::StrataError;
use crate::tree::{ConfigTree, Flag, join_path};
use crate::value::{Scalar, Value};

/// A schema-declared enum type: a name plus its legal variants.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: String,
    pub variants: Vec<String>,
}

impl EnumType {
    pub fn new(name: &str, variants: &[&str]) -> Self {
        EnumType {
            name: name.to_string(),
            variants: variants.iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// The primitive kinds a declared type can name.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Any,
    Int,
    Float,
    Bool,
    Str,
    Enum(EnumType),
}

impl TypeKind {
    pub(crate) fn describe(&self) -> String {
        match self {
            TypeKind::Any => "Any".into(),
            TypeKind::Int => "int".into(),
            TypeKind::Float => "float".into(),
            TypeKind::Bool => "bool".into(),
            TypeKind::Str => "str".into(),
            TypeKind::Enum(e) => e.name.clone(),
        }
    }

    /// Convert an incoming value to this kind's canonical form.
    ///
    /// Missing (`???`) and unresolved expressions always pass through
    /// unconverted; they are checked again at resolution time. Widening
    /// conversions succeed (`"42"` to int, int to float); anything else is a
    /// type mismatch naming the path, declared type and received type.
    pub(crate) fn convert(
        &self,
        value: &Value,
        optional: bool,
        path: &str,
    ) -> Result<Scalar, StrataError> {
        if let Value::String(s) = value {
            match Scalar::classify(s) {
                passthrough @ (Scalar::Missing | Scalar::Expr(_)) => return Ok(passthrough),
                _ => {}
            }
        }
        if value.is_null() {
            if optional {
                return Ok(Scalar::Null);
            }
            return Err(StrataError::TypeMismatch {
                path: path.to_string(),
                expected: self.describe(),
                got: "null".into(),
                hint: Some("The field is not optional".into()),
                code: Some(401),
            });
        }

        let mismatch = || StrataError::type_mismatch(path, &self.describe(), value.type_name());

        match self {
            TypeKind::Any => Scalar::from_value(value).ok_or_else(mismatch),
            TypeKind::Int => match value {
                Value::Int(n) => Ok(Scalar::Int(*n)),
                Value::String(s) => s.trim().parse::<i64>().map(Scalar::Int).map_err(|_| {
                    StrataError::type_mismatch(path, "int", &format!("'{}'", s))
                }),
                _ => Err(mismatch()),
            },
            TypeKind::Float => match value {
                Value::Float(n) => Ok(Scalar::Float(*n)),
                Value::Int(n) => Ok(Scalar::Float(*n as f64)),
                Value::String(s) => s.trim().parse::<f64>().map(Scalar::Float).map_err(|_| {
                    StrataError::type_mismatch(path, "float", &format!("'{}'", s))
                }),
                _ => Err(mismatch()),
            },
            TypeKind::Bool => match value {
                Value::Bool(b) => Ok(Scalar::Bool(*b)),
                Value::Int(n) => Ok(Scalar::Bool(*n != 0)),
                Value::String(s) => {
                    if let Ok(n) = s.trim().parse::<i64>() {
                        return Ok(Scalar::Bool(n != 0));
                    }
                    match s.to_lowercase().as_str() {
                        "yes" | "y" | "on" | "true" => Ok(Scalar::Bool(true)),
                        "no" | "n" | "off" | "false" => Ok(Scalar::Bool(false)),
                        _ => Err(StrataError::type_mismatch(path, "bool", &format!("'{}'", s))),
                    }
                }
                _ => Err(mismatch()),
            },
            TypeKind::Str => match value {
                Value::String(s) => Ok(Scalar::Str(s.clone())),
                Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Enum { .. } => {
                    Ok(Scalar::Str(value.to_string()))
                }
                _ => Err(mismatch()),
            },
            TypeKind::Enum(enum_type) => convert_enum(enum_type, value, path),
        }
    }
}

fn convert_enum(enum_type: &EnumType, value: &Value, path: &str) -> Result<Scalar, StrataError> {
    let variant = match value {
        Value::Enum { ty, variant } if *ty == enum_type.name => Some(variant.clone()),
        Value::String(s) => {
            let name = s
                .strip_prefix(&format!("{}.", enum_type.name))
                .unwrap_or(s.as_str());
            Some(name.to_string())
        }
        Value::Int(n) => usize::try_from(*n)
            .ok()
            .and_then(|i| enum_type.variants.get(i).cloned()),
        _ => None,
    };
    match variant {
        Some(v) if enum_type.variants.contains(&v) => Ok(Scalar::Enum {
            ty: enum_type.name.clone(),
            variant: v,
        }),
        _ => Err(StrataError::TypeMismatch {
            path: path.to_string(),
            expected: enum_type.name.clone(),
            got: value.to_string(),
            hint: Some(format!("Expected one of: {}", enum_type.variants.join(", "))),
            code: Some(401),
        }),
    }
}

/// The type constraint bound to a node by schema binding. Checked on every
/// subsequent assignment and merge.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclaredType {
    Value { kind: TypeKind, optional: bool },
    List { element: TypeKind, optional: bool },
    Dict { element: TypeKind, optional: bool },
}

impl DeclaredType {
    pub(crate) fn describe(&self) -> String {
        let (inner, optional) = match self {
            DeclaredType::Value { kind, optional } => (kind.describe(), *optional),
            DeclaredType::List { element, optional } => {
                (format!("List[{}]", element.describe()), *optional)
            }
            DeclaredType::Dict { element, optional } => {
                (format!("Dict[str, {}]", element.describe()), *optional)
            }
        };
        if optional {
            format!("Optional[{}]", inner)
        } else {
            inner
        }
    }
}

/// One field of a schema: name, declared type, default.
///
/// A `None` default is the `???` sentinel for value/list/dict fields; for
/// nested fields it means "the nested schema's own defaults".
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
    pub optional: bool,
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Value(TypeKind),
    List(TypeKind),
    Dict(TypeKind),
    Nested(Schema),
}

impl Field {
    pub fn value(name: &str, kind: TypeKind) -> Self {
        Field {
            name: name.to_string(),
            ty: FieldType::Value(kind),
            optional: false,
            default: None,
        }
    }

    pub fn list(name: &str, element: TypeKind) -> Self {
        Field {
            name: name.to_string(),
            ty: FieldType::List(element),
            optional: false,
            default: None,
        }
    }

    pub fn dict(name: &str, element: TypeKind) -> Self {
        Field {
            name: name.to_string(),
            ty: FieldType::Dict(element),
            optional: false,
            default: None,
        }
    }

    pub fn nested(name: &str, schema: Schema) -> Self {
        Field {
            name: name.to_string(),
            ty: FieldType::Nested(schema),
            optional: false,
            default: None,
        }
    }

    /// Permit null in addition to the declared type.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// An ordered, named list of typed fields, optionally frozen.
///
/// # Examples
/// ```
/// use strata_cfg::{ConfigTree, Field, Schema, TypeKind, Value};
///
/// let schema = Schema::new("Server")
///     .field(Field::value("host", TypeKind::Str).default("localhost"))
///     .field(Field::value("port", TypeKind::Int).default(80));
/// let tree = ConfigTree::structured(&schema).unwrap();
/// assert_eq!(tree.get::<i64>("port").unwrap(), 80);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub name: String,
    pub fields: Vec<Field>,
    pub frozen: bool,
}

impl Schema {
    pub fn new(name: &str) -> Self {
        Schema {
            name: name.to_string(),
            fields: Vec::new(),
            frozen: false,
        }
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// A frozen schema binds the read-only flag onto its mapping.
    pub fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }
}

impl ConfigTree {
    /// Bind a schema into a type-enforcing tree.
    ///
    /// Every child carries its declared type; schema-bound mappings are
    /// struct-closed so unknown keys are rejected on both read and write.
    pub fn structured(schema: &Schema) -> Result<ConfigTree, StrataError> {
        let mut tree = ConfigTree::new();
        let root = tree.root;
        bind_fields(&mut tree, root, schema, "")?;
        tree.node_mut_flags(root, Flag::Struct, Some(true));
        if schema.frozen {
            tree.node_mut_flags(root, Flag::ReadOnly, Some(true));
        }
        Ok(tree)
    }
}

fn bind_fields(
    tree: &mut ConfigTree,
    map_id: usize,
    schema: &Schema,
    path: &str,
) -> Result<(), StrataError> {
    for field in &schema.fields {
        let child_path = join_path(path, &field.name);
        let child = bind_field(tree, field, &child_path)?;
        tree.attach_key(map_id, &field.name, child);
    }
    Ok(())
}

fn bind_field(tree: &mut ConfigTree, field: &Field, path: &str) -> Result<usize, StrataError> {
    match &field.ty {
        FieldType::Value(kind) => {
            let declared = DeclaredType::Value {
                kind: kind.clone(),
                optional: field.optional,
            };
            bind_leaf(tree, &declared, field, path)
        }
        FieldType::List(element) => {
            let declared = DeclaredType::List {
                element: element.clone(),
                optional: field.optional,
            };
            bind_leaf(tree, &declared, field, path)
        }
        FieldType::Dict(element) => {
            let declared = DeclaredType::Dict {
                element: element.clone(),
                optional: field.optional,
            };
            bind_leaf(tree, &declared, field, path)
        }
        FieldType::Nested(sub) => {
            let sub_tree_id = tree.alloc_mapping();
            bind_fields(tree, sub_tree_id, sub, path)?;
            tree.node_mut_flags(sub_tree_id, Flag::Struct, Some(true));
            if sub.frozen {
                tree.node_mut_flags(sub_tree_id, Flag::ReadOnly, Some(true));
            }
            match &field.default {
                None => {}
                Some(Value::Object(items)) => {
                    apply_instance(tree, sub_tree_id, sub, items, path)?;
                }
                Some(other) => {
                    return Err(StrataError::SchemaError {
                        message: format!(
                            "default for nested field '{}' must be a mapping, got {}",
                            path,
                            other.type_name()
                        ),
                        hint: None,
                        code: Some(402),
                    });
                }
            }
            Ok(sub_tree_id)
        }
    }
}

/// A value/list/dict field: default `None` binds the `???` sentinel.
fn bind_leaf(
    tree: &mut ConfigTree,
    declared: &DeclaredType,
    field: &Field,
    path: &str,
) -> Result<usize, StrataError> {
    match &field.default {
        None => Ok(tree.alloc_missing(declared.clone())),
        Some(value) => tree.build_declared(value, Some(declared), path),
    }
}

/// Populate a nested schema mapping from an instance's field values,
/// enforcing each field's declared type. Unknown keys are rejected: the
/// nested mapping is struct-closed.
fn apply_instance(
    tree: &mut ConfigTree,
    map_id: usize,
    schema: &Schema,
    items: &IndexMap<String, Value>,
    path: &str,
) -> Result<(), StrataError> {
    for (key, value) in items {
        let Some(field) = schema.fields.iter().find(|f| f.name == *key) else {
            return Err(StrataError::StructAccess {
                path: path.to_string(),
                key: key.clone(),
                hint: Some(format!("'{}' is not a field of schema {}", key, schema.name)),
                code: Some(102),
            });
        };
        let child_path = join_path(path, key);
        let instance_field = Field {
            default: Some(value.clone()),
            ..field.clone()
        };
        let child = bind_field(tree, &instance_field, &child_path)?;
        tree.attach_key(map_id, key, child);
    }
    Ok(())
}
