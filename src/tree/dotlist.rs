use super::*;
use crate::value::decode_primitive;

impl ConfigTree {
    /// Build a tree from `key.path=value` entries, typically CLI overrides.
    ///
    /// Values go through primitive decoding, so `port=8080` stores an int
    /// and `debug=true` a bool. An entry without `=` stores null.
    ///
    /// # Examples
    /// ```
    /// use strata_cfg::ConfigTree;
    ///
    /// let tree = ConfigTree::from_dotlist(&["server.port=8080", "debug=true"]).unwrap();
    /// assert_eq!(tree.get::<i64>("server.port").unwrap(), 8080);
    /// assert_eq!(tree.get::<bool>("debug").unwrap(), true);
    /// ```
    pub fn from_dotlist<S: AsRef<str>>(entries: &[S]) -> Result<Self, StrataError> {
        let mut tree = ConfigTree::new();
        tree.merge_dotlist(entries)?;
        Ok(tree)
    }

    /// Apply `key.path=value` entries to this tree in order. Each entry is a
    /// normal assignment, so flags and declared types are enforced and later
    /// entries win over earlier ones.
    pub fn merge_dotlist<S: AsRef<str>>(&mut self, entries: &[S]) -> Result<(), StrataError> {
        for entry in entries {
            let entry = entry.as_ref();
            match entry.split_once('=') {
                Some((key, raw)) => self.set(key.trim(), decode_primitive(raw.trim()))?,
                None => self.set(entry.trim(), Value::Null)?,
            }
        }
        Ok(())
    }
}
