//! Valve Data Format (VDF) decoding — text and binary variants share one
//! value type (spec §3, §4.1).

mod binary;
mod text;

pub use binary::{BinaryVdfReader, decode_binary};
pub use text::decode_text;

use crate::error::VdfError;
use std::collections::BTreeMap;

/// A VDF value. Maps preserve insertion order via `Vec<(String, VdfValue)>`
/// rather than a hash map — duplicate keys overwrite during parsing, but
/// downstream consumers still see keys in first-write order.
#[derive(Debug, Clone, PartialEq)]
pub enum VdfValue {
    Str(String),
    Int32(i32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Map(VdfMap),
}

/// An ordered string-keyed map. Backed by a `Vec` of pairs (not a
/// `BTreeMap`/`HashMap`) so insertion order is preserved exactly, which
/// matters for re-serialization round-tripping and for launch-option
/// ordering in C3.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VdfMap {
    entries: Vec<(String, VdfValue)>,
}

impl VdfMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key, overwriting any existing value for that key in place
    /// (duplicate keys overwrite, per spec §4.1).
    pub fn insert(&mut self, key: impl Into<String>, value: VdfValue) {
        let key = key.into();
        if let Some(existing) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            existing.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&VdfValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VdfValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Children whose keys parse as non-negative integers, in ascending
    /// numeric order. Used by C3 to walk `launch.<n>` slots in order
    /// regardless of how they were inserted.
    pub fn numeric_children(&self) -> Vec<(u32, &VdfValue)> {
        let mut out: BTreeMap<u32, &VdfValue> = BTreeMap::new();
        for (k, v) in &self.entries {
            if let Ok(n) = k.parse::<u32>() {
                out.insert(n, v);
            }
        }
        out.into_iter().collect()
    }
}

impl VdfValue {
    pub fn as_map(&self) -> Option<&VdfMap> {
        match self {
            VdfValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            VdfValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Dotted-path lookup (spec §4.1): `"root.sub.field"` splits on `.`
    /// and walks nested maps. Returns `None` on any missing segment or a
    /// non-map encountered before the path is exhausted.
    pub fn query(&self, path: &str) -> Option<&VdfValue> {
        let mut current = self;
        for segment in path.split('.') {
            current = current.as_map()?.get(segment)?;
        }
        Some(current)
    }
}

/// Parse a text VDF document (manifests, library folders, login users).
pub fn parse_text(input: &[u8]) -> Result<VdfMap, VdfError> {
    decode_text(input)
}

/// Parse a whole binary VDF payload into an owned map. Used by C3 once
/// positioned at the start of a target entry's payload bytes.
pub fn parse_binary(input: &[u8]) -> Result<VdfMap, VdfError> {
    decode_binary(input)
}

/// Canonical re-serialization, used only to test the text-VDF round-trip
/// invariant (spec §8). Not part of the public contract — a general-purpose
/// VDF writer is explicitly out of scope.
#[cfg(test)]
pub(crate) mod text_test_helpers {
    use super::{VdfMap, VdfValue};
    use std::fmt::Write;

    pub fn to_canonical(map: &VdfMap) -> String {
        let mut out = String::new();
        write_map(map, &mut out);
        out
    }

    fn write_map(map: &VdfMap, out: &mut String) {
        for (key, value) in map.iter() {
            write_string(key, out);
            out.push(' ');
            match value {
                VdfValue::Str(s) => write_string(s, out),
                VdfValue::Map(m) => {
                    out.push_str("{ ");
                    write_map(m, out);
                    out.push_str(" }");
                }
                VdfValue::Int32(i) => write!(out, "\"{i}\"").unwrap(),
                VdfValue::Int64(i) => write!(out, "\"{i}\"").unwrap(),
                VdfValue::UInt64(i) => write!(out, "\"{i}\"").unwrap(),
                VdfValue::Float32(f) => write!(out, "\"{f}\"").unwrap(),
            }
            out.push(' ');
        }
    }

    fn write_string(s: &str, out: &mut String) {
        out.push('"');
        for c in s.chars() {
            match c {
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\t' => out.push_str("\\t"),
                other => out.push(other),
            }
        }
        out.push('"');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_path_query() {
        let mut inner = VdfMap::new();
        inner.insert("field", VdfValue::Str("value".into()));
        let mut sub = VdfMap::new();
        sub.insert("sub", VdfValue::Map(inner));
        let root = VdfValue::Map(sub);

        assert_eq!(root.query("sub.field").and_then(|v| v.as_str()), Some("value"));
        assert!(root.query("sub.missing").is_none());
        assert!(root.query("missing.field").is_none());
    }

    #[test]
    fn numeric_children_sorted() {
        let mut m = VdfMap::new();
        m.insert("10", VdfValue::Str("ten".into()));
        m.insert("2", VdfValue::Str("two".into()));
        m.insert("notnumeric", VdfValue::Str("skip".into()));
        let children = m.numeric_children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].0, 2);
        assert_eq!(children[1].0, 10);
    }

    #[test]
    fn duplicate_key_overwrites() {
        let mut m = VdfMap::new();
        m.insert("k", VdfValue::Str("first".into()));
        m.insert("k", VdfValue::Str("second".into()));
        assert_eq!(m.len(), 1);
        assert_eq!(m.get("k").and_then(|v| v.as_str()), Some("second"));
    }
}
