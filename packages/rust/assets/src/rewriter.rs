//! Reference rewriter.
//!
//! Rebuilds a document with every string that appears as a key of the
//! [`ReplacementMap`] swapped for its externalized path. Everything else is
//! copied as-is, so an empty map yields a deep copy of the input.

use std::collections::HashMap;

use serde_json::Value;

/// Raw reference text → externalized path.
///
/// Keyed by the reference text rather than the digest: two different texts
/// decoding to the same bytes get two entries pointing at one path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplacementMap(HashMap<String, String>);

impl ReplacementMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `raw` to `path`, returning the previous path if any.
    pub fn insert(&mut self, raw: impl Into<String>, path: impl Into<String>) -> Option<String> {
        self.0.insert(raw.into(), path.into())
    }

    pub fn get(&self, raw: &str) -> Option<&str> {
        self.0.get(raw).map(String::as_str)
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.0.contains_key(raw)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Rewrite `document` using `map`. The input is left untouched.
pub fn rewrite(document: &Value, map: &ReplacementMap) -> Value {
    rewrite_counted(document, map).0
}

/// Like [`rewrite`], also returning the number of substitutions made.
pub fn rewrite_counted(document: &Value, map: &ReplacementMap) -> (Value, usize) {
    if map.is_empty() {
        return (document.clone(), 0);
    }
    let mut count = 0;
    let rewritten = rewrite_value(document, map, &mut count);
    (rewritten, count)
}

fn rewrite_value(value: &Value, map: &ReplacementMap, count: &mut usize) -> Value {
    match value {
        Value::String(s) => match map.get(s) {
            Some(path) => {
                *count += 1;
                Value::String(path.to_string())
            }
            None => value.clone(),
        },
        Value::Object(entries) => Value::Object(
            entries
                .iter()
                .map(|(key, child)| (key.clone(), rewrite_value(child, map, count)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| rewrite_value(item, map, count))
                .collect(),
        ),
        Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
    }
}
