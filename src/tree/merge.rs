use super::*;

/// Merge a base tree with any number of override trees, left to right.
///
/// Always produces a new tree; the inputs are never mutated. `merge(&[t])`
/// is a deep copy of `t`, and `merge(&[])` is an empty tree.
pub fn merge(trees: &[&ConfigTree]) -> Result<ConfigTree, StrataError> {
    match trees.split_first() {
        None => Ok(ConfigTree::new()),
        Some((base, others)) => base.merge_with(others),
    }
}

impl ConfigTree {
    /// Deep-merge `others` over `self` into a new tree.
    ///
    /// Mapping keys take the union (base order first, new override keys
    /// appended); sequences are replaced wholesale; a base-side `???` is
    /// replaceable by anything its declared type accepts. If the base's
    /// effective read-only flag is set the merge fails up front, before any
    /// work is done.
    pub fn merge_with(&self, others: &[&ConfigTree]) -> Result<ConfigTree, StrataError> {
        if self.effective_flag(self.root, Flag::ReadOnly) {
            return Err(StrataError::ReadOnly {
                path: String::new(),
                hint: Some("The merge base is read-only".into()),
                code: Some(101),
            });
        }
        let mut result = self.clone();
        for over in others {
            result = merge_pair(&result, over)?;
        }
        Ok(result)
    }
}

fn merge_pair(base: &ConfigTree, over: &ConfigTree) -> Result<ConfigTree, StrataError> {
    let mut out = ConfigTree {
        nodes: Vec::new(),
        root: 0,
    };
    out.root = merge_nodes(base, base.root, over, over.root, &mut out, "")?;
    Ok(out)
}

fn merge_nodes(
    base: &ConfigTree,
    bid: NodeId,
    over: &ConfigTree,
    oid: NodeId,
    out: &mut ConfigTree,
    path: &str,
) -> Result<NodeId, StrataError> {
    let base_kind = &base.node(bid).kind;
    let over_kind = &over.node(oid).kind;

    match (base_kind, over_kind) {
        (NodeKind::Mapping(bm), NodeKind::Mapping(om)) => {
            let id = out.alloc_mapping();
            out.nodes[id].flags = base.node(bid).flags;
            let declared = base
                .node(bid)
                .declared
                .clone()
                .or_else(|| over.node(oid).declared.clone());
            out.nodes[id].declared = declared.clone();

            let elem_decl = match &declared {
                Some(DeclaredType::Dict { element, .. }) => element_declared(element),
                _ => None,
            };

            // Base keys first, in base order; recurse where both sides
            // have the key.
            for (key, &bc) in bm {
                let child_path = join_path(path, key);
                let child = match om.get(key) {
                    Some(&oc) => merge_nodes(base, bc, over, oc, out, &child_path)?,
                    None => copy_into(base, bc, out),
                };
                out.attach_key(id, key, child);
            }
            // Then override-only keys, in override order.
            for (key, &oc) in om {
                if bm.contains_key(key) {
                    continue;
                }
                let child_path = join_path(path, key);
                let child = match &elem_decl {
                    Some(decl) => typed_copy(over, oc, out, decl, &child_path)?,
                    None => copy_into(over, oc, out),
                };
                out.attach_key(id, key, child);
            }
            Ok(id)
        }
        // Every other pairing replaces the base node with the override,
        // validated against the base's declared type when it has one.
        _ => replace_with_over(base, bid, over, oid, out, path),
    }
}

fn replace_with_over(
    base: &ConfigTree,
    bid: NodeId,
    over: &ConfigTree,
    oid: NodeId,
    out: &mut ConfigTree,
    path: &str,
) -> Result<NodeId, StrataError> {
    match base.node(bid).declared.clone() {
        Some(declared) => {
            let id = typed_copy(over, oid, out, &declared, path)?;
            out.nodes[id].flags = base.node(bid).flags;
            Ok(id)
        }
        None => Ok(copy_into(over, oid, out)),
    }
}

/// Copy an override subtree under a declared type, converting scalars and
/// rejecting incompatible shapes. Failures surface as merge conflicts.
fn typed_copy(
    over: &ConfigTree,
    oid: NodeId,
    out: &mut ConfigTree,
    declared: &DeclaredType,
    path: &str,
) -> Result<NodeId, StrataError> {
    let raw = raw_value(over, oid);
    out.build_declared(&raw, Some(declared), path)
        .map_err(|err| match err {
            StrataError::TypeMismatch { path, expected, got, .. } => StrataError::MergeConflict {
                path,
                base: expected,
                incoming: got,
                hint: None,
                code: Some(501),
            },
            other => other,
        })
}

/// Deep copy preserving kinds, own flags and declared types.
fn copy_into(src: &ConfigTree, sid: NodeId, out: &mut ConfigTree) -> NodeId {
    let src_node = src.node(sid);
    let id = match &src_node.kind {
        NodeKind::Mapping(items) => {
            let id = out.alloc_mapping();
            for (key, &child) in items {
                let copied = copy_into(src, child, out);
                out.attach_key(id, key, copied);
            }
            id
        }
        NodeKind::Sequence(items) => {
            let id = out.alloc(Node::new(NodeKind::Sequence(Vec::new())));
            for &child in items {
                let copied = copy_into(src, child, out);
                out.nodes[copied].parent = Some(id);
                if let NodeKind::Sequence(s) = &mut out.nodes[id].kind {
                    s.push(copied);
                }
            }
            id
        }
        NodeKind::Scalar(scalar) => out.alloc(Node::new(NodeKind::Scalar(scalar.clone()))),
    };
    out.nodes[id].flags = src_node.flags;
    out.nodes[id].declared = src_node.declared.clone();
    id
}

/// A subtree as a plain value with raw stored forms: expressions verbatim,
/// the missing sentinel as `"???"`. Re-classification on rebuild restores
/// both states exactly.
fn raw_value(tree: &ConfigTree, id: NodeId) -> Value {
    match &tree.node(id).kind {
        NodeKind::Mapping(items) => Value::Object(
            items
                .iter()
                .map(|(k, &c)| (k.clone(), raw_value(tree, c)))
                .collect(),
        ),
        NodeKind::Sequence(items) => {
            Value::Array(items.iter().map(|&c| raw_value(tree, c)).collect())
        }
        NodeKind::Scalar(scalar) => match scalar {
            Scalar::Missing => Value::String("???".into()),
            Scalar::Expr(src) => Value::String(src.clone()),
            concrete => concrete.to_value().expect("concrete scalar"),
        },
    }
}
