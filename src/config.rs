//! Flat keyed configuration with sub-block lookup and merging.

#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

/// Separator between block levels in a configuration key.
pub const BLOCK_SEP: &str = ":";

/// A string-keyed configuration store.
///
/// Keys are flat, with [`BLOCK_SEP`]-separated path components; a sub-block
/// is the view of every key under one path prefix with the prefix stripped.
/// Keys may be marked read-only, after which writes to them are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigBlock {
    values: BTreeMap<String, String>,
    read_only: BTreeSet<String>,
}

impl ConfigBlock {
    /// An empty configuration.
    pub fn new() -> Self {
        ConfigBlock::default()
    }

    /// Look up a value by exact key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Set a value. Ignored if the key is read-only.
    pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if self.read_only.contains(&key) {
            return;
        }
        self.values.insert(key, value.into());
    }

    /// Mark a key read-only. Later writes to it are ignored.
    pub fn mark_read_only(&mut self, key: impl Into<String>) {
        self.read_only.insert(key.into());
    }

    /// Whether a key has been marked read-only.
    pub fn is_read_only(&self, key: &str) -> bool {
        self.read_only.contains(key)
    }

    /// The sub-block under `prefix`, with the prefix stripped from keys.
    ///
    /// Read-only marks under the prefix carry over. An unknown prefix
    /// yields an empty block.
    pub fn subblock(&self, prefix: &str) -> ConfigBlock {
        let mut block = ConfigBlock::new();
        let full_prefix = format!("{}{}", prefix, BLOCK_SEP);
        for (key, value) in &self.values {
            if let Some(stripped) = key.strip_prefix(&full_prefix) {
                block.values.insert(stripped.to_string(), value.clone());
            }
        }
        for key in &self.read_only {
            if let Some(stripped) = key.strip_prefix(&full_prefix) {
                block.read_only.insert(stripped.to_string());
            }
        }
        block
    }

    /// Merge another block into this one. The other block's values win,
    /// except for keys this block has marked read-only.
    pub fn merge(&mut self, other: ConfigBlock) {
        for (key, value) in other.values {
            if self.read_only.contains(&key) {
                continue;
            }
            self.values.insert(key, value);
        }
        self.read_only.extend(other.read_only);
    }

    /// Number of keys in this block.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether this block has no keys.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
