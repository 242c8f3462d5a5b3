//! Deploy orchestration for assetdeploy.
//!
//! Ties the asset building blocks into one run: per-document processing,
//! catalog merging, and the summary handed back to the caller.

pub mod catalog;
pub mod pipeline;
pub mod summary;

pub use catalog::{Catalog, CatalogInput, MergeReport, merge};
pub use pipeline::{
    ProgressReporter, SilentProgress, deploy, deploy_with_store, discover_documents,
};
pub use summary::{DeploySummary, MediaTotals, RunOutcome, RunWarning, media_totals};
