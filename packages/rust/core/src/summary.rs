//! Run summary and warnings handed to the reporting layer.
//!
//! Everything here is plain data. Formatting is the caller's job.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use assetdeploy_assets::StoredAsset;
use assetdeploy_shared::{MediaType, RunId};

/// A recoverable problem recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    /// A reference could not be decoded; its text was left in place.
    SkippedReference {
        document: String,
        field: String,
        path: String,
        error_kind: String,
        error: String,
    },
    /// A decoded asset could not be written; its reference was left in place.
    UnresolvedReference {
        document: String,
        field: String,
        path: String,
        error: String,
    },
    /// A document could not be read or parsed.
    SkippedDocument { document: String, error: String },
    /// A document has no usable `id`/`title` entry and was left out of the catalog.
    NotACatalogEntry { document: String, reason: String },
    /// Two documents share an identity; the first one was kept.
    IdentityCollision {
        id: String,
        kept_from: String,
        dropped_from: String,
    },
}

/// Overall result of a run that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// No warnings.
    Clean,
    /// Output was written but some items were skipped.
    Degraded,
}

/// File count and byte total for one media type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MediaTotals {
    pub files: usize,
    pub bytes: u64,
}

/// Structured result of a deployment run.
#[derive(Debug, Clone, Serialize)]
pub struct DeploySummary {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Merged catalog file.
    pub output_path: PathBuf,
    /// Asset directory.
    pub assets_dir: PathBuf,
    /// Input documents discovered.
    pub documents_found: usize,
    /// Input documents read and parsed successfully.
    pub documents_processed: usize,
    /// Entries in the merged catalog.
    pub catalog_entries: usize,
    /// Distinct assets (by digest) in the store.
    pub distinct_assets: usize,
    /// Asset files actually written during this run.
    pub files_written: usize,
    /// Reference values replaced across all documents.
    pub rewrites: usize,
    /// Totals by media type.
    pub media: BTreeMap<MediaType, MediaTotals>,
    /// Length of the reference text that was externalized.
    pub reference_text_bytes: usize,
    /// Length of the paths that replaced it.
    pub externalized_path_bytes: usize,
    pub warnings: Vec<RunWarning>,
}

impl DeploySummary {
    pub fn outcome(&self) -> RunOutcome {
        if self.warnings.is_empty() {
            RunOutcome::Clean
        } else {
            RunOutcome::Degraded
        }
    }

    /// Sum of all persisted asset sizes.
    pub fn total_asset_bytes(&self) -> u64 {
        self.media.values().map(|t| t.bytes).sum()
    }

    /// Percentage by which externalization shrank the reference text.
    pub fn size_reduction_pct(&self) -> Option<f64> {
        if self.reference_text_bytes == 0 {
            return None;
        }
        let before = self.reference_text_bytes as f64;
        let after = self.externalized_path_bytes as f64;
        Some((before - after) / before * 100.0)
    }
}

/// Aggregate per-media-type totals from a store snapshot.
pub fn media_totals(assets: &[StoredAsset]) -> BTreeMap<MediaType, MediaTotals> {
    let mut totals: BTreeMap<MediaType, MediaTotals> = BTreeMap::new();
    for asset in assets {
        let entry = totals.entry(asset.media_type).or_default();
        entry.files += 1;
        entry.bytes += asset.size_bytes as u64;
    }
    totals
}
