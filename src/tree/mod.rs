use indexmap::IndexMap;

use crate::error::StrataError;
use crate::schema::{DeclaredType, TypeKind};
use crate::value::{Scalar, Value};

mod access;
mod convert;
mod dotlist;
mod flags;
mod merge;

pub use flags::Flag;
pub use merge::merge;

pub(crate) type NodeId = usize;

/// Explicit per-node flag overrides. `None` means "inherit from the parent".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct OwnFlags {
    pub read_only: Option<bool>,
    pub struct_: Option<bool>,
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Mapping(IndexMap<String, NodeId>),
    Sequence(Vec<NodeId>),
    Scalar(Scalar),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    /// Non-owning back-reference into the arena; `None` for the root.
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
    pub flags: OwnFlags,
    pub declared: Option<DeclaredType>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Node {
            parent: None,
            kind,
            flags: OwnFlags::default(),
            declared: None,
        }
    }
}

/// Structural view of a node, for consumers that serialize the tree
/// themselves. Scalars expose their raw stored form: unresolved
/// interpolation expressions stay verbatim and are never eagerly resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeView {
    Mapping(Vec<String>),
    Sequence(usize),
    Scalar(Scalar),
}

/// A hierarchical configuration tree.
///
/// Nodes live in an arena and refer to each other by index, so parent
/// back-references never own anything and teardown is trivial. Every tree
/// has exactly one root; removed subtrees simply become unreachable.
#[derive(Debug, Clone)]
pub struct ConfigTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigTree {
    /// An empty mapping root.
    pub fn new() -> Self {
        ConfigTree {
            nodes: vec![Node::new(NodeKind::Mapping(IndexMap::new()))],
            root: 0,
        }
    }

    /// Build a tree from an already-parsed generic container.
    ///
    /// Strings are classified on the way in: `???` becomes the missing
    /// sentinel and `${...}` content is kept as an unresolved expression.
    pub fn from_value(value: Value) -> Self {
        let mut tree = ConfigTree {
            nodes: Vec::new(),
            root: 0,
        };
        tree.root = tree.build_freeform(&value);
        tree
    }

    pub(crate) fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub(crate) fn alloc_mapping(&mut self) -> NodeId {
        self.alloc(Node::new(NodeKind::Mapping(IndexMap::new())))
    }

    pub(crate) fn alloc_missing(&mut self, declared: DeclaredType) -> NodeId {
        let id = self.alloc(Node::new(NodeKind::Scalar(Scalar::Missing)));
        self.nodes[id].declared = Some(declared);
        id
    }

    /// Attach a detached node under `map_id` by key, replacing any previous
    /// entry with that key.
    pub(crate) fn attach_key(&mut self, map_id: NodeId, key: &str, child: NodeId) {
        self.nodes[child].parent = Some(map_id);
        if let NodeKind::Mapping(items) = &mut self.nodes[map_id].kind {
            items.insert(key.to_string(), child);
        }
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// The dotted path of a node, for error messages.
    pub(crate) fn path_of(&self, id: NodeId) -> String {
        let mut segments: Vec<String> = Vec::new();
        let mut cur = id;
        while let Some(parent) = self.nodes[cur].parent {
            match &self.nodes[parent].kind {
                NodeKind::Mapping(items) => {
                    if let Some((key, _)) = items.iter().find(|&(_, &c)| c == cur) {
                        segments.push(key.clone());
                    }
                }
                NodeKind::Sequence(items) => {
                    if let Some(pos) = items.iter().position(|&c| c == cur) {
                        segments.push(pos.to_string());
                    }
                }
                NodeKind::Scalar(_) => {}
            }
            cur = parent;
        }
        segments.reverse();
        segments.join(".")
    }

    // -- Path walking --

    /// Lenient read walk. Unknown keys under a non-struct mapping yield
    /// `Ok(None)`; under a struct mapping they fail. Sequence segments must
    /// be integer indices.
    pub(crate) fn node_at(&self, path: &str) -> Result<Option<NodeId>, StrataError> {
        if path.trim().is_empty() {
            return Ok(Some(self.root));
        }
        let mut cur = self.root;
        for seg in path.split('.') {
            match &self.nodes[cur].kind {
                NodeKind::Mapping(items) => match items.get(seg) {
                    Some(&child) => cur = child,
                    None => {
                        if self.effective_flag(cur, Flag::Struct) {
                            return Err(StrataError::StructAccess {
                                path: self.path_of(cur),
                                key: seg.to_string(),
                                hint: Some(
                                    "The mapping is struct-flagged; only existing keys are accessible"
                                        .into(),
                                ),
                                code: Some(102),
                            });
                        }
                        return Ok(None);
                    }
                },
                NodeKind::Sequence(items) => {
                    let idx: usize = seg.parse().map_err(|_| StrataError::PathNotFound {
                        path: path.to_string(),
                        hint: Some("Sequence segments must be integer indices".into()),
                        code: Some(104),
                    })?;
                    match items.get(idx) {
                        Some(&child) => cur = child,
                        None => return Ok(None),
                    }
                }
                NodeKind::Scalar(_) => return Ok(None),
            }
        }
        Ok(Some(cur))
    }

    /// Strict walk used by interpolation node-references: any miss is `None`.
    pub(crate) fn strict_node_at(&self, path: &str) -> Option<NodeId> {
        let mut cur = self.root;
        for seg in path.split('.') {
            match &self.nodes[cur].kind {
                NodeKind::Mapping(items) => cur = *items.get(seg)?,
                NodeKind::Sequence(items) => {
                    let idx: usize = seg.parse().ok()?;
                    cur = *items.get(idx)?;
                }
                NodeKind::Scalar(_) => return None,
            }
        }
        Some(cur)
    }

    /// Structural shape of the node at `path`, for external serializers.
    pub fn view(&self, path: &str) -> Result<NodeView, StrataError> {
        let id = self
            .node_at(path)?
            .ok_or_else(|| StrataError::PathNotFound {
                path: path.to_string(),
                hint: None,
                code: Some(104),
            })?;
        Ok(match &self.nodes[id].kind {
            NodeKind::Mapping(items) => NodeView::Mapping(items.keys().cloned().collect()),
            NodeKind::Sequence(items) => NodeView::Sequence(items.len()),
            NodeKind::Scalar(s) => NodeView::Scalar(s.clone()),
        })
    }

    /// Raw stored scalar at `path`, without resolving it.
    pub fn raw(&self, path: &str) -> Result<Scalar, StrataError> {
        match self.view(path)? {
            NodeView::Scalar(s) => Ok(s),
            other => Err(StrataError::type_mismatch(
                path,
                "scalar",
                match other {
                    NodeView::Mapping(_) => "mapping",
                    _ => "list",
                },
            )),
        }
    }

    // -- Construction --

    /// Build a freeform (untyped) subtree. Detached: the caller attaches it.
    pub(crate) fn build_freeform(&mut self, value: &Value) -> NodeId {
        match value {
            Value::Object(items) => {
                let id = self.alloc(Node::new(NodeKind::Mapping(IndexMap::new())));
                for (key, v) in items {
                    let child = self.build_freeform(v);
                    self.nodes[child].parent = Some(id);
                    if let NodeKind::Mapping(m) = &mut self.nodes[id].kind {
                        m.insert(key.clone(), child);
                    }
                }
                id
            }
            Value::Array(items) => {
                let id = self.alloc(Node::new(NodeKind::Sequence(Vec::new())));
                for v in items {
                    let child = self.build_freeform(v);
                    self.nodes[child].parent = Some(id);
                    if let NodeKind::Sequence(s) = &mut self.nodes[id].kind {
                        s.push(child);
                    }
                }
                id
            }
            scalar => {
                let payload = Scalar::from_value(scalar).expect("non-container value");
                self.alloc(Node::new(NodeKind::Scalar(payload)))
            }
        }
    }

    /// Build a subtree under an optional declared type, converting scalars
    /// and typing container elements. Detached; errors leave only
    /// unreachable arena slots behind, never a half-attached subtree.
    pub(crate) fn build_declared(
        &mut self,
        value: &Value,
        declared: Option<&DeclaredType>,
        path: &str,
    ) -> Result<NodeId, StrataError> {
        let id = match declared {
            None => self.build_freeform(value),
            Some(DeclaredType::Value { kind, optional }) => {
                let payload = kind.convert(value, *optional, path)?;
                self.alloc(Node::new(NodeKind::Scalar(payload)))
            }
            Some(decl @ DeclaredType::List { element, optional }) => match value {
                Value::Array(items) => {
                    let id = self.alloc(Node::new(NodeKind::Sequence(Vec::new())));
                    for (i, item) in items.iter().enumerate() {
                        let elem_path = join_path(path, &i.to_string());
                        let elem_decl = element_declared(element);
                        let child = self.build_declared(item, elem_decl.as_ref(), &elem_path)?;
                        self.nodes[child].parent = Some(id);
                        if let NodeKind::Sequence(s) = &mut self.nodes[id].kind {
                            s.push(child);
                        }
                    }
                    id
                }
                other => self.build_declared_scalar(other, decl, *optional, path)?,
            },
            Some(decl @ DeclaredType::Dict { element, optional }) => match value {
                Value::Object(items) => {
                    let id = self.alloc(Node::new(NodeKind::Mapping(IndexMap::new())));
                    // Dict-typed mappings accept arbitrary keys even when an
                    // enclosing schema mapping is struct-closed.
                    self.nodes[id].flags.struct_ = Some(false);
                    for (key, item) in items {
                        let elem_path = join_path(path, key);
                        let elem_decl = element_declared(element);
                        let child = self.build_declared(item, elem_decl.as_ref(), &elem_path)?;
                        self.nodes[child].parent = Some(id);
                        if let NodeKind::Mapping(m) = &mut self.nodes[id].kind {
                            m.insert(key.clone(), child);
                        }
                    }
                    id
                }
                other => self.build_declared_scalar(other, decl, *optional, path)?,
            },
        };
        self.nodes[id].declared = declared.cloned();
        Ok(id)
    }

    /// A non-container value assigned where a container type is declared:
    /// only null (when optional), `???` and unresolved expressions pass.
    fn build_declared_scalar(
        &mut self,
        value: &Value,
        declared: &DeclaredType,
        optional: bool,
        path: &str,
    ) -> Result<NodeId, StrataError> {
        let payload = match value {
            Value::Null if optional => Scalar::Null,
            Value::String(s) => match Scalar::classify(s) {
                s @ (Scalar::Missing | Scalar::Expr(_)) => s,
                _ => {
                    return Err(StrataError::type_mismatch(
                        path,
                        &declared.describe(),
                        value.type_name(),
                    ));
                }
            },
            other => {
                return Err(StrataError::type_mismatch(
                    path,
                    &declared.describe(),
                    other.type_name(),
                ));
            }
        };
        Ok(self.alloc(Node::new(NodeKind::Scalar(payload))))
    }

    // -- Mutation --

    /// Assign a value at a dotted path, creating intermediate mappings as
    /// needed. Honors effective read-only and struct flags and any declared
    /// types; a failing call leaves the tree exactly as it was.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<(), StrataError> {
        let value = value.into();
        if path.trim().is_empty() {
            return Err(StrataError::PathNotFound {
                path: path.to_string(),
                hint: Some("Cannot assign to the tree root".into()),
                code: Some(104),
            });
        }
        let segments: Vec<&str> = path.split('.').collect();

        // Walk the existing prefix; `anchor` is the deepest existing
        // container, `rest` the segments still to create below it.
        let mut anchor = self.root;
        let mut first_new = 0;
        let mut replaced_mid_scalar = false;
        for (i, seg) in segments.iter().enumerate() {
            first_new = i;
            match self.step_for_write(anchor, seg, path)? {
                Some(child) if i + 1 == segments.len() => {
                    // Final segment exists: overwrite in place.
                    return self.overwrite(child, &value);
                }
                Some(child) => match &self.nodes[child].kind {
                    NodeKind::Mapping(_) | NodeKind::Sequence(_) => anchor = child,
                    NodeKind::Scalar(_) => {
                        // Descending through a scalar: only allowed when the
                        // slot is freeform or dict-typed, by replacing it.
                        match &self.nodes[child].declared {
                            None | Some(DeclaredType::Dict { .. }) => {
                                replaced_mid_scalar = true;
                                anchor = child;
                                first_new = i + 1;
                                break;
                            }
                            Some(decl) => {
                                return Err(StrataError::type_mismatch(
                                    &self.path_of(child),
                                    &decl.describe(),
                                    "mapping",
                                ));
                            }
                        }
                    }
                },
                None => break,
            }
        }

        // Flag checks cover everything below the anchor via inheritance.
        if self.effective_flag(anchor, Flag::ReadOnly) {
            return Err(StrataError::ReadOnly {
                path: self.path_of(anchor),
                hint: None,
                code: Some(101),
            });
        }
        if !replaced_mid_scalar {
            if self.effective_flag(anchor, Flag::Struct) {
                return Err(StrataError::StructAccess {
                    path: self.path_of(anchor),
                    key: segments[first_new].to_string(),
                    hint: Some("Cannot add new keys to a struct mapping".into()),
                    code: Some(102),
                });
            }
            if matches!(self.nodes[anchor].kind, NodeKind::Sequence(_)) {
                return Err(StrataError::PathNotFound {
                    path: path.to_string(),
                    hint: Some("Sequences cannot be extended by assignment".into()),
                    code: Some(104),
                });
            }
        }

        // Declared element type of the anchor constrains what may be created.
        let rest = &segments[first_new..];
        let elem_decl = match &self.nodes[anchor].declared {
            Some(DeclaredType::Dict { element, .. }) if *element != TypeKind::Any => {
                if rest.len() > 1 {
                    return Err(StrataError::type_mismatch(
                        &join_path(&self.path_of(anchor), rest[0]),
                        &element.describe(),
                        "mapping",
                    ));
                }
                element_declared(element)
            }
            _ => None,
        };

        // Build the leaf (and any intermediate chain) detached, then attach.
        let leaf_path = path.to_string();
        let leaf = self.build_declared(&value, elem_decl.as_ref(), &leaf_path)?;
        let mut child = leaf;
        for seg in rest[1..].iter().rev() {
            let mut items = IndexMap::new();
            items.insert(seg.to_string(), child);
            let mapping = self.alloc(Node::new(NodeKind::Mapping(items)));
            self.nodes[child].parent = Some(mapping);
            child = mapping;
        }

        if replaced_mid_scalar {
            // The scalar at `anchor` becomes a mapping holding the chain.
            let mut items = IndexMap::new();
            items.insert(rest[0].to_string(), child);
            let wrapper = self.alloc(Node::new(NodeKind::Mapping(items)));
            self.nodes[child].parent = Some(wrapper);
            self.adopt(anchor, wrapper);
        } else {
            self.nodes[child].parent = Some(anchor);
            let key = rest[0].to_string();
            if let NodeKind::Mapping(items) = &mut self.nodes[anchor].kind {
                items.insert(key, child);
            }
        }
        Ok(())
    }

    /// Walk one step during a write. Struct violations surface here so the
    /// failing key is reported against its own mapping.
    fn step_for_write(
        &self,
        cur: NodeId,
        seg: &str,
        full_path: &str,
    ) -> Result<Option<NodeId>, StrataError> {
        match &self.nodes[cur].kind {
            NodeKind::Mapping(items) => Ok(items.get(seg).copied()),
            NodeKind::Sequence(items) => {
                let idx: usize = seg.parse().map_err(|_| StrataError::PathNotFound {
                    path: full_path.to_string(),
                    hint: Some("Sequence segments must be integer indices".into()),
                    code: Some(104),
                })?;
                match items.get(idx) {
                    Some(&child) => Ok(Some(child)),
                    None => Err(StrataError::PathNotFound {
                        path: full_path.to_string(),
                        hint: Some(format!("Index {} is out of bounds", idx)),
                        code: Some(104),
                    }),
                }
            }
            NodeKind::Scalar(_) => Ok(None),
        }
    }

    /// Overwrite an existing node's value in place, keeping its own flags
    /// and declared type. All checks run before any mutation.
    fn overwrite(&mut self, id: NodeId, value: &Value) -> Result<(), StrataError> {
        if self.effective_flag(id, Flag::ReadOnly) {
            return Err(StrataError::ReadOnly {
                path: self.path_of(id),
                hint: None,
                code: Some(101),
            });
        }
        let declared = self.nodes[id].declared.clone();
        let path = self.path_of(id);
        let built = self.build_declared(value, declared.as_ref(), &path)?;
        self.adopt(id, built);
        Ok(())
    }

    /// Move the subtree rooted at `built` onto `target`, reparenting its
    /// direct children. The old payload of `target` becomes unreachable.
    fn adopt(&mut self, target: NodeId, built: NodeId) {
        let kind = std::mem::replace(&mut self.nodes[built].kind, NodeKind::Scalar(Scalar::Null));
        match &kind {
            NodeKind::Mapping(items) => {
                for &c in items.values() {
                    self.nodes[c].parent = Some(target);
                }
            }
            NodeKind::Sequence(items) => {
                for &c in items {
                    self.nodes[c].parent = Some(target);
                }
            }
            NodeKind::Scalar(_) => {}
        }
        self.nodes[target].kind = kind;
    }

    /// Remove the key or element at `path`. Deletion is a write-class
    /// operation: it fails under an effective read-only flag.
    pub fn remove(&mut self, path: &str) -> Result<(), StrataError> {
        let id = self
            .node_at(path)?
            .ok_or_else(|| StrataError::PathNotFound {
                path: path.to_string(),
                hint: None,
                code: Some(104),
            })?;
        let parent = self.nodes[id].parent.ok_or_else(|| StrataError::PathNotFound {
            path: path.to_string(),
            hint: Some("Cannot remove the tree root".into()),
            code: Some(104),
        })?;
        if self.effective_flag(parent, Flag::ReadOnly) {
            return Err(StrataError::ReadOnly {
                path: self.path_of(parent),
                hint: None,
                code: Some(101),
            });
        }
        match &mut self.nodes[parent].kind {
            NodeKind::Mapping(items) => {
                let key = items
                    .iter()
                    .find(|&(_, &c)| c == id)
                    .map(|(k, _)| k.clone());
                if let Some(key) = key {
                    items.shift_remove(&key);
                }
            }
            NodeKind::Sequence(items) => {
                items.retain(|&c| c != id);
            }
            NodeKind::Scalar(_) => {}
        }
        self.nodes[id].parent = None;
        Ok(())
    }
}

/// Declared type for elements of a typed container. `Any` elements stay
/// freeform so nested containers remain legal.
pub(crate) fn element_declared(element: &TypeKind) -> Option<DeclaredType> {
    if *element == TypeKind::Any {
        None
    } else {
        Some(DeclaredType::Value {
            kind: element.clone(),
            optional: true,
        })
    }
}

pub(crate) fn join_path(base: &str, seg: &str) -> String {
    if base.is_empty() {
        seg.to_string()
    } else {
        format!("{}.{}", base, seg)
    }
}

#[cfg(test)]
mod tests;
