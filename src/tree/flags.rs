use super::*;

/// The two inheritable node flags.
///
/// `ReadOnly` forbids any mutation of a node and, by inheritance, its
/// descendants. `Struct` forbids creating (or reading) keys a mapping has
/// not seen before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    ReadOnly,
    Struct,
}

impl ConfigTree {
    /// Set (or clear, with `None`) a node's own flag override. Descendants
    /// are not touched; they inherit through effective-flag lookup.
    pub fn set_flag(&mut self, path: &str, flag: Flag, value: Option<bool>) -> Result<(), StrataError> {
        let id = self.require_node(path)?;
        self.node_mut_flags(id, flag, value);
        Ok(())
    }

    /// The effective flag at `path`: the nearest explicit override walking
    /// up to the root, else `false`.
    pub fn flag(&self, path: &str, flag: Flag) -> Result<bool, StrataError> {
        let id = self.require_node(path)?;
        Ok(self.effective_flag(id, flag))
    }

    pub(crate) fn node_mut_flags(&mut self, id: NodeId, flag: Flag, value: Option<bool>) {
        match flag {
            Flag::ReadOnly => self.nodes[id].flags.read_only = value,
            Flag::Struct => self.nodes[id].flags.struct_ = value,
        }
    }

    pub(crate) fn own_flag(&self, id: NodeId, flag: Flag) -> Option<bool> {
        match flag {
            Flag::ReadOnly => self.nodes[id].flags.read_only,
            Flag::Struct => self.nodes[id].flags.struct_,
        }
    }

    pub(crate) fn effective_flag(&self, id: NodeId, flag: Flag) -> bool {
        let mut cur = Some(id);
        while let Some(node) = cur {
            if let Some(explicit) = self.own_flag(node, flag) {
                return explicit;
            }
            cur = self.nodes[node].parent;
        }
        false
    }

    /// Run `f` with the read-only flag suspended at `path`, regardless of
    /// how it was inherited. The prior explicit state is restored on every
    /// exit path, including when `f` fails.
    pub fn with_read_write<T>(
        &mut self,
        path: &str,
        f: impl FnOnce(&mut Self) -> Result<T, StrataError>,
    ) -> Result<T, StrataError> {
        self.with_forced_flag(path, Flag::ReadOnly, f)
    }

    /// Run `f` with the struct flag suspended at `path`, so new keys may be
    /// created in an otherwise closed mapping.
    pub fn with_open_struct<T>(
        &mut self,
        path: &str,
        f: impl FnOnce(&mut Self) -> Result<T, StrataError>,
    ) -> Result<T, StrataError> {
        self.with_forced_flag(path, Flag::Struct, f)
    }

    fn with_forced_flag<T>(
        &mut self,
        path: &str,
        flag: Flag,
        f: impl FnOnce(&mut Self) -> Result<T, StrataError>,
    ) -> Result<T, StrataError> {
        let id = self.require_node(path)?;
        let prior = self.own_flag(id, flag);
        self.node_mut_flags(id, flag, Some(false));
        let result = f(self);
        // The arena never reuses slots, so restoring through `id` is safe
        // even if `f` removed the node from its parent.
        self.node_mut_flags(id, flag, prior);
        result
    }

    pub(crate) fn require_node(&self, path: &str) -> Result<NodeId, StrataError> {
        self.node_at(path)?.ok_or_else(|| StrataError::PathNotFound {
            path: path.to_string(),
            hint: None,
            code: Some(104),
        })
    }
}
