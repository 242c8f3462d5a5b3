//! Catalog merger.
//!
//! Folds processed documents into one `id → scenario` mapping. A document
//! is either a scenario itself (it has both `id` and `title`) or a wrapper
//! whose first such child is the scenario. Repeated identities keep the
//! first-seen entry and are reported.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::summary::RunWarning;

/// Field holding a scenario's identity.
pub const ID_FIELD: &str = "id";

/// Field every scenario must carry alongside its identity.
pub const TITLE_FIELD: &str = "title";

/// One processed document on its way into the catalog.
#[derive(Debug, Clone)]
pub struct CatalogInput {
    /// Where the document came from (file name), for reports.
    pub source: String,
    pub document: Value,
}

/// The merged, identity-keyed collection of scenarios.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    entries: Map<String, Value>,
    sources: HashMap<String, String>,
}

impl Catalog {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.entries.get(id)
    }

    /// Source document of an entry.
    pub fn source_of(&self, id: &str) -> Option<&str> {
        self.sources.get(id).map(String::as_str)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The catalog as a JSON mapping, ready to be written out.
    pub fn to_value(&self) -> Value {
        Value::Object(self.entries.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.entries)
    }
}

/// Catalog plus everything the merge had to skip or drop.
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    pub catalog: Catalog,
    pub warnings: Vec<RunWarning>,
}

/// Merge documents into a catalog. Never fails; problems become warnings.
pub fn merge(inputs: impl IntoIterator<Item = CatalogInput>) -> MergeReport {
    let mut report = MergeReport::default();

    for CatalogInput { source, document } in inputs {
        let Some(entry) = extract_entry(document) else {
            debug!(document = %source, "no scenario entry found");
            report.warnings.push(RunWarning::NotACatalogEntry {
                document: source,
                reason: format!("no object with both '{ID_FIELD}' and '{TITLE_FIELD}'"),
            });
            continue;
        };

        let Some(id) = identity_key(&entry) else {
            debug!(document = %source, "scenario identity is not a string or number");
            report.warnings.push(RunWarning::NotACatalogEntry {
                document: source,
                reason: format!("'{ID_FIELD}' must be a string or number"),
            });
            continue;
        };

        if let Some(kept_from) = report.catalog.sources.get(&id) {
            warn!(%id, kept = %kept_from, dropped = %source, "duplicate scenario id, keeping first");
            report.warnings.push(RunWarning::IdentityCollision {
                id,
                kept_from: kept_from.clone(),
                dropped_from: source,
            });
            continue;
        }

        report.catalog.sources.insert(id.clone(), source);
        report.catalog.entries.insert(id, entry);
    }

    report
}

/// Pick the scenario object out of a document.
fn extract_entry(document: Value) -> Option<Value> {
    let Value::Object(map) = document else {
        return None;
    };

    if is_scenario(&map) {
        return Some(Value::Object(map));
    }

    map.into_iter()
        .map(|(_, child)| child)
        .find(|child| child.as_object().is_some_and(is_scenario))
}

fn is_scenario(map: &Map<String, Value>) -> bool {
    map.contains_key(ID_FIELD) && map.contains_key(TITLE_FIELD)
}

fn identity_key(entry: &Value) -> Option<String> {
    match entry.get(ID_FIELD)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
