//! Reference scanner.
//!
//! Walks an arbitrary JSON tree and yields every field whose name is a
//! recognized reference field and whose value is a string starting with
//! `data:`. Value shape beyond the prefix is left to the decoder.

use serde_json::Value;

/// Prefix every embedded reference starts with.
pub const REFERENCE_PREFIX: &str = "data:";

// ---------------------------------------------------------------------------
// ReferenceFields
// ---------------------------------------------------------------------------

/// Field names eligible to hold embedded references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceFields(Vec<String>);

impl ReferenceFields {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|name| name == key)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }
}

impl Default for ReferenceFields {
    fn default() -> Self {
        Self::new(["audioUrl", "imageUrl"])
    }
}

// ---------------------------------------------------------------------------
// ValuePath
// ---------------------------------------------------------------------------

/// One step from a container to a child.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Location of a value inside a document, rendered as `a.b[2].c`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ValuePath(Vec<PathSegment>);

impl ValuePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    fn key(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.to_string()));
        Self(segments)
    }

    fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }
}

impl std::fmt::Display for ValuePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{key}")?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scanning
// ---------------------------------------------------------------------------

/// A reference located by the scanner. Borrows from the scanned document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundReference<'a> {
    /// Name of the field holding the reference.
    pub field: &'a str,
    /// The full reference text, prefix included.
    pub raw: &'a str,
    /// Where the field sits in the document.
    pub path: ValuePath,
}

enum Pending<'a> {
    Visit(ValuePath, &'a Value),
    Found(FoundReference<'a>),
}

/// Lazy iterator over the references in a document, in document order.
pub struct References<'a> {
    fields: &'a ReferenceFields,
    stack: Vec<Pending<'a>>,
}

/// Scan `document` for embedded references under any of `fields`.
///
/// Never mutates the document. Reference-named fields holding non-strings or
/// strings without the `data:` prefix are skipped silently.
pub fn scan<'a>(document: &'a Value, fields: &'a ReferenceFields) -> References<'a> {
    References {
        fields,
        stack: vec![Pending::Visit(ValuePath::root(), document)],
    }
}

impl<'a> References<'a> {
    fn expand(&mut self, path: &ValuePath, value: &'a Value) {
        let mut children: Vec<Pending<'a>> = Vec::new();

        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    match child {
                        Value::String(s)
                            if self.fields.contains(key) && s.starts_with(REFERENCE_PREFIX) =>
                        {
                            children.push(Pending::Found(FoundReference {
                                field: key,
                                raw: s,
                                path: path.key(key),
                            }));
                        }
                        Value::Object(_) | Value::Array(_) => {
                            children.push(Pending::Visit(path.key(key), child));
                        }
                        _ => {}
                    }
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    if matches!(child, Value::Object(_) | Value::Array(_)) {
                        children.push(Pending::Visit(path.index(i), child));
                    }
                }
            }
            _ => {}
        }

        // Reversed so the first child is popped first.
        self.stack.extend(children.into_iter().rev());
    }
}

impl<'a> Iterator for References<'a> {
    type Item = FoundReference<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(pending) = self.stack.pop() {
            match pending {
                Pending::Found(found) => return Some(found),
                Pending::Visit(path, value) => self.expand(&path, value),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collect(doc: &Value) -> Vec<(String, String, String)> {
        let fields = ReferenceFields::default();
        scan(doc, &fields)
            .map(|r| (r.field.to_string(), r.raw.to_string(), r.path.to_string()))
            .collect()
    }

    #[test]
    fn finds_nested_references_in_document_order() {
        let doc = json!({
            "intro": { "audioUrl": "data:audio/mpeg;base64,AAAA" },
            "steps": [
                { "type": "message", "imageUrl": "data:image/png;base64,BBBB" },
                { "nested": [ { "audioUrl": "data:audio/wav;base64,CCCC" } ] }
            ],
            "imageUrl": "data:image/gif;base64,DDDD"
        });

        let found = collect(&doc);
        let paths: Vec<&str> = found.iter().map(|(_, _, p)| p.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "intro.audioUrl",
                "steps[0].imageUrl",
                "steps[1].nested[0].audioUrl",
                "imageUrl",
            ]
        );
        assert_eq!(found[1].0, "imageUrl");
        assert_eq!(found[1].1, "data:image/png;base64,BBBB");
    }

    #[test]
    fn skips_already_external_and_non_string_values() {
        let doc = json!({
            "a": { "audioUrl": "/assets/deployed/abc.mp3" },
            "b": { "imageUrl": 42 },
            "c": { "imageUrl": null },
            "d": { "audioUrl": { "data:": "not a string" } }
        });
        assert!(collect(&doc).is_empty());
    }

    #[test]
    fn ignores_unrecognized_field_names() {
        let doc = json!({ "videoUrl": "data:video/mp4;base64,AAAA" });
        assert!(collect(&doc).is_empty());

        let fields = ReferenceFields::new(["videoUrl"]);
        assert_eq!(scan(&doc, &fields).count(), 1);
    }

    #[test]
    fn malformed_value_is_still_reported() {
        // Shape is validated by the decoder, not here.
        let doc = json!({ "x": { "imageUrl": "data:garbage" } });
        assert_eq!(collect(&doc).len(), 1);
    }

    #[test]
    fn bare_strings_in_arrays_are_not_references() {
        let doc = json!({ "audioUrl": ["data:audio/mpeg;base64,AAAA"] });
        assert!(collect(&doc).is_empty());
    }

    #[test]
    fn scan_is_lazy() {
        let doc = json!({
            "a": { "audioUrl": "data:audio/mpeg;base64,AAAA" },
            "b": { "audioUrl": "data:audio/mpeg;base64,BBBB" }
        });
        let fields = ReferenceFields::default();
        let first = scan(&doc, &fields).next().expect("one reference");
        assert_eq!(first.path.to_string(), "a.audioUrl");
    }

    #[test]
    fn root_array_paths_render() {
        let doc = json!([{ "imageUrl": "data:image/png;base64,AAAA" }]);
        let found = collect(&doc);
        assert_eq!(found[0].2, "[0].imageUrl");
    }
}
