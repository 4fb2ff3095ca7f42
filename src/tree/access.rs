use super::*;
use crate::interp;

impl ConfigTree {
    /// Get a typed value at a dotted path.
    ///
    /// Interpolation expressions are resolved on every read, never at
    /// assignment or merge time, so forward references work once the
    /// referenced node is populated.
    ///
    /// # Examples
    /// ```
    /// use serde_json::json;
    /// use strata_cfg::ConfigTree;
    ///
    /// let tree = ConfigTree::from_json(&json!({
    ///     "server": {"port": 80},
    ///     "client": {"server_port": "${server.port}"},
    /// }));
    /// let port: i64 = tree.get("client.server_port").unwrap();
    /// assert_eq!(port, 80);
    /// ```
    ///
    /// # Errors
    /// Returns an error if the value is missing (`???`), cannot be
    /// converted to `T`, or its interpolation fails to resolve.
    pub fn get<T>(&self, path: &str) -> Result<T, StrataError>
    where
        T: TryFrom<Value, Error = StrataError>,
    {
        T::try_from(self.get_value(path)?)
    }

    /// Get an optional typed value: `None` when the key is absent (or null)
    /// in a non-struct mapping.
    pub fn get_optional<T>(&self, path: &str) -> Result<Option<T>, StrataError>
    where
        T: TryFrom<Value, Error = StrataError>,
    {
        match self.get_value(path)? {
            Value::Null => Ok(None),
            value => Ok(Some(T::try_from(value)?)),
        }
    }

    /// Get a value with a fallback default.
    pub fn get_or<T>(&self, path: &str, default: T) -> T
    where
        T: TryFrom<Value, Error = StrataError>,
    {
        self.get(path).unwrap_or(default)
    }

    /// Resolve the node at `path` to a plain value.
    ///
    /// An unknown key under a non-struct mapping reads as [`Value::Null`]
    /// ("no value"), which is distinct from the `???` sentinel ("value
    /// required, not yet supplied") that fails with
    /// [`StrataError::MissingValue`].
    pub fn get_value(&self, path: &str) -> Result<Value, StrataError> {
        match self.node_at(path)? {
            None => Ok(Value::Null),
            Some(id) => {
                let mut active = Vec::new();
                self.resolve_node(id, &mut active)
            }
        }
    }

    /// Keys of the mapping at `path`, in insertion order.
    pub fn get_keys(&self, path: &str) -> Result<Vec<String>, StrataError> {
        let id = self.require_node(path)?;
        match &self.nodes[id].kind {
            NodeKind::Mapping(items) => Ok(items.keys().cloned().collect()),
            other => Err(StrataError::type_mismatch(
                path,
                "mapping",
                match other {
                    NodeKind::Sequence(_) => "list",
                    _ => "scalar",
                },
            )),
        }
    }

    /// Number of entries in the container at `path`.
    pub fn len(&self, path: &str) -> Result<usize, StrataError> {
        let id = self.require_node(path)?;
        match &self.nodes[id].kind {
            NodeKind::Mapping(items) => Ok(items.len()),
            NodeKind::Sequence(items) => Ok(items.len()),
            NodeKind::Scalar(_) => Err(StrataError::type_mismatch(path, "container", "scalar")),
        }
    }

    /// Whether `path` exists and resolves to a concrete value. A node
    /// holding `???` does not count as contained.
    pub fn has(&self, path: &str) -> bool {
        match self.node_at(path) {
            Ok(Some(id)) => {
                let mut active = Vec::new();
                self.resolve_node(id, &mut active).is_ok()
            }
            _ => false,
        }
    }

    /// Resolve a node recursively: containers resolve every child, scalars
    /// resolve their interpolation and fail on `???`. `active` carries the
    /// node-reference paths currently on the resolution stack.
    pub(crate) fn resolve_node(
        &self,
        id: NodeId,
        active: &mut Vec<String>,
    ) -> Result<Value, StrataError> {
        match &self.nodes[id].kind {
            NodeKind::Mapping(items) => {
                let mut out = IndexMap::with_capacity(items.len());
                for (key, &child) in items {
                    out.insert(key.clone(), self.resolve_node(child, active)?);
                }
                Ok(Value::Object(out))
            }
            NodeKind::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                for &child in items {
                    out.push(self.resolve_node(child, active)?);
                }
                Ok(Value::Array(out))
            }
            NodeKind::Scalar(scalar) => match scalar {
                Scalar::Missing => Err(StrataError::missing(&self.path_of(id))),
                Scalar::Expr(src) => {
                    let path = self.path_of(id);
                    let resolved = interp::resolve_expr(self, src, &path, active)?;
                    self.check_resolved(id, resolved, &path)
                }
                concrete => Ok(concrete.to_value().expect("concrete scalar")),
            },
        }
    }

    /// Late type check: a value produced by interpolation must still honor
    /// the node's declared type, shape and element type included.
    fn check_resolved(
        &self,
        id: NodeId,
        resolved: Value,
        path: &str,
    ) -> Result<Value, StrataError> {
        match &self.nodes[id].declared {
            Some(declared) => validate_resolved(declared, resolved, path),
            None => Ok(resolved),
        }
    }
}

fn validate_resolved(
    declared: &DeclaredType,
    resolved: Value,
    path: &str,
) -> Result<Value, StrataError> {
    match declared {
        DeclaredType::Value { kind, optional } => {
            if *kind == TypeKind::Any {
                return Ok(resolved);
            }
            let converted = kind.convert(&resolved, *optional, path)?;
            converted
                .to_value()
                .ok_or_else(|| StrataError::missing(path))
        }
        DeclaredType::List { element, optional } => match resolved {
            Value::Null if *optional => Ok(Value::Null),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    let elem_path = join_path(path, &i.to_string());
                    out.push(convert_resolved_element(element, item, &elem_path)?);
                }
                Ok(Value::Array(out))
            }
            other => Err(StrataError::type_mismatch(
                path,
                &declared.describe(),
                other.type_name(),
            )),
        },
        DeclaredType::Dict { element, optional } => match resolved {
            Value::Null if *optional => Ok(Value::Null),
            Value::Object(items) => {
                let mut out = IndexMap::with_capacity(items.len());
                for (key, item) in items {
                    let elem_path = join_path(path, &key);
                    let converted = convert_resolved_element(element, item, &elem_path)?;
                    out.insert(key, converted);
                }
                Ok(Value::Object(out))
            }
            other => Err(StrataError::type_mismatch(
                path,
                &declared.describe(),
                other.type_name(),
            )),
        },
    }
}

fn convert_resolved_element(
    element: &TypeKind,
    value: Value,
    path: &str,
) -> Result<Value, StrataError> {
    if *element == TypeKind::Any {
        return Ok(value);
    }
    let converted = element.convert(&value, true, path)?;
    converted
        .to_value()
        .ok_or_else(|| StrataError::missing(path))
}
