//! End-to-end deploy pipeline: documents → scan → decode → store → rewrite → merge → catalog.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use assetdeploy_assets::{
    Asset, AssetStore, FsAssetStore, PutStatus, ReferenceFields, ReplacementMap, StoreLayout,
    decode, rewrite_counted, scan,
};
use assetdeploy_shared::{AssetDeployError, DecodeError, DeployConfig, Result, RunId};

use crate::catalog::{self, CatalogInput};
use crate::summary::{DeploySummary, RunWarning, media_totals};

/// Extension of input documents.
const DOCUMENT_EXTENSION: &str = "json";

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a document has been processed (or skipped).
    fn document_processed(&self, name: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, summary: &DeploySummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn document_processed(&self, _name: &str, _current: usize, _total: usize) {}
    fn done(&self, _summary: &DeploySummary) {}
}

/// Run the full deploy pipeline against the on-disk asset store.
///
/// 1. Clean the asset directory (if requested)
/// 2. Open the store
/// 3. Process every input document
/// 4. Merge into a catalog and write it out
#[instrument(skip_all, fields(input = %config.input_dir.display(), assets = %config.assets_dir.display()))]
pub async fn deploy(
    config: &DeployConfig,
    progress: &dyn ProgressReporter,
) -> Result<DeploySummary> {
    // Checked before `clean` so a bad config never wipes the asset directory.
    config.validate()?;

    if config.clean {
        progress.phase("Cleaning asset directory");
        FsAssetStore::clean(&config.assets_dir)?;
    }

    let store = FsAssetStore::open(&config.assets_dir, StoreLayout::from(config))?;
    deploy_with_store(config, Arc::new(store), progress).await
}

/// Run the pipeline with a caller-supplied store.
///
/// The store's digest index spans every document of the run, so identical
/// bytes are persisted once no matter which documents carry them. Per-item
/// failures become warnings; [`AssetDeployError::is_fatal`] decides what
/// aborts the run.
///
/// Documents are read and decoded concurrently, but assets are stored and
/// documents rewritten one document at a time in file-name order. The same
/// input therefore always yields the same filenames, and no asset is written
/// once a fatal error has been seen.
pub async fn deploy_with_store(
    config: &DeployConfig,
    store: Arc<dyn AssetStore>,
    progress: &dyn ProgressReporter,
) -> Result<DeploySummary> {
    config.validate()?;

    let run_id = RunId::new();
    let started_at = Utc::now();

    info!(%run_id, output = %config.output_path.display(), "starting deployment");

    // --- Phase 1: Discover documents ---
    progress.phase("Discovering documents");
    let paths = discover_documents(&config.input_dir)?;
    if paths.is_empty() {
        return Err(AssetDeployError::NoInputDocuments {
            dir: config.input_dir.clone(),
        });
    }
    info!(count = paths.len(), "found input documents");

    // --- Phase 2: Process documents ---
    progress.phase("Processing documents");
    let fields = Arc::new(ReferenceFields::new(config.reference_fields.iter().cloned()));
    let semaphore = Arc::new(Semaphore::new(config.concurrency as usize));

    let handles: Vec<JoinHandle<Result<PreparedDocument>>> = paths
        .iter()
        .cloned()
        .map(|path| {
            tokio::spawn(prepare_job(
                path,
                Arc::clone(&fields),
                Arc::clone(&semaphore),
            ))
        })
        .collect();

    let total = handles.len();
    let mut outcomes: Vec<DocumentOutcome> = Vec::with_capacity(total);
    let mut handles = handles.into_iter();
    let mut failure = None;

    // Committed in input order, so asset naming and the catalog's first-seen
    // order follow file names regardless of which job finishes first.
    for handle in handles.by_ref() {
        match commit_job(handle, Arc::clone(&store), Arc::clone(&fields)).await {
            Ok(outcome) => {
                progress.document_processed(&outcome.name, outcomes.len() + 1, total);
                outcomes.push(outcome);
            }
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    if let Some(e) = failure {
        for pending in handles {
            pending.abort();
        }
        warn!(error = %e, "aborting deployment");
        return Err(e);
    }

    let mut warnings: Vec<RunWarning> = Vec::new();
    let mut inputs: Vec<CatalogInput> = Vec::new();
    let mut rewrites = 0;
    let mut files_written = 0;
    let mut reference_text_bytes = 0;
    let mut externalized_path_bytes = 0;

    for outcome in outcomes {
        rewrites += outcome.rewrites;
        files_written += outcome.files_written;
        reference_text_bytes += outcome.reference_text_bytes;
        externalized_path_bytes += outcome.externalized_path_bytes;
        warnings.extend(outcome.warnings);
        if let Some(document) = outcome.document {
            inputs.push(CatalogInput {
                source: outcome.name,
                document,
            });
        }
    }

    let documents_processed = inputs.len();
    if documents_processed == 0 {
        return Err(AssetDeployError::NoInputDocuments {
            dir: config.input_dir.clone(),
        });
    }

    // --- Phase 3: Merge ---
    progress.phase("Merging catalog");
    let report = catalog::merge(inputs);
    warnings.extend(report.warnings);
    let catalog_entries = report.catalog.len();

    // --- Phase 4: Write output ---
    progress.phase("Writing catalog");
    write_output(&config.output_path, &report.catalog.into_value())?;

    // --- Phase 5: Summarize ---
    let stored = store.stored_assets();
    let summary = DeploySummary {
        run_id,
        started_at,
        finished_at: Utc::now(),
        output_path: config.output_path.clone(),
        assets_dir: config.assets_dir.clone(),
        documents_found: total,
        documents_processed,
        catalog_entries,
        distinct_assets: stored.len(),
        files_written,
        rewrites,
        media: media_totals(&stored),
        reference_text_bytes,
        externalized_path_bytes,
        warnings,
    };

    progress.done(&summary);

    info!(
        run_id = %summary.run_id,
        documents = summary.documents_processed,
        entries = summary.catalog_entries,
        assets = summary.distinct_assets,
        rewrites = summary.rewrites,
        warnings = summary.warnings.len(),
        "deployment complete"
    );

    Ok(summary)
}

// ---------------------------------------------------------------------------
// Document discovery
// ---------------------------------------------------------------------------

/// List `*.json` files directly inside `dir`, sorted by file name.
pub fn discover_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| AssetDeployError::io(dir, e))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| AssetDeployError::io(dir, e))?.path();
        let is_document = path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(DOCUMENT_EXTENSION));
        if is_document {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}

// ---------------------------------------------------------------------------
// Per-document processing
// ---------------------------------------------------------------------------

/// A document read and decoded, not yet stored or rewritten.
#[derive(Debug)]
struct PreparedDocument {
    name: String,
    /// The parsed document, or `None` if it was skipped.
    document: Option<Value>,
    /// One decode result per scanned reference, in scan order.
    decoded: Vec<std::result::Result<Arc<Asset>, DecodeError>>,
    warnings: Vec<RunWarning>,
}

/// Everything one document contributes to the run.
#[derive(Debug, Default)]
struct DocumentOutcome {
    name: String,
    /// The rewritten document, or `None` if it was skipped.
    document: Option<Value>,
    rewrites: usize,
    files_written: usize,
    reference_text_bytes: usize,
    externalized_path_bytes: usize,
    warnings: Vec<RunWarning>,
}

async fn prepare_job(
    path: PathBuf,
    fields: Arc<ReferenceFields>,
    semaphore: Arc<Semaphore>,
) -> Result<PreparedDocument> {
    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|e| AssetDeployError::Task(e.to_string()))?;

    tokio::task::spawn_blocking(move || prepare_document(&path, &fields))
        .await
        .map_err(|e| AssetDeployError::Task(e.to_string()))
}

async fn commit_job(
    handle: JoinHandle<Result<PreparedDocument>>,
    store: Arc<dyn AssetStore>,
    fields: Arc<ReferenceFields>,
) -> Result<DocumentOutcome> {
    let prepared = handle
        .await
        .map_err(|e| AssetDeployError::Task(e.to_string()))??;

    tokio::task::spawn_blocking(move || commit_document(prepared, store.as_ref(), &fields))
        .await
        .map_err(|e| AssetDeployError::Task(e.to_string()))?
}

/// Read, parse, scan, and decode one document. Touches no store.
#[instrument(skip_all, fields(document = %path.display()))]
fn prepare_document(path: &Path, fields: &ReferenceFields) -> PreparedDocument {
    let name = document_name(path);

    let document = match read_document(path) {
        Ok(document) => document,
        Err(e) => {
            warn!(error = %e, "skipping document");
            return PreparedDocument {
                warnings: vec![RunWarning::SkippedDocument {
                    document: name.clone(),
                    error: e.to_string(),
                }],
                name,
                document: None,
                decoded: Vec::new(),
            };
        }
    };

    // Repeated reference text is decoded once.
    let mut cache: HashMap<&str, std::result::Result<Arc<Asset>, DecodeError>> = HashMap::new();
    let decoded: Vec<_> = scan(&document, fields)
        .map(|reference| {
            cache
                .entry(reference.raw)
                .or_insert_with(|| decode(reference.raw).map(Arc::new))
                .clone()
        })
        .collect();
    drop(cache);

    debug!(references = decoded.len(), "document decoded");

    PreparedDocument {
        name,
        document: Some(document),
        decoded,
        warnings: Vec::new(),
    }
}

/// Store a prepared document's assets and rewrite it.
///
/// Returns `Err` only for failures that must abort the run.
#[instrument(skip_all, fields(document = %prepared.name))]
fn commit_document(
    prepared: PreparedDocument,
    store: &dyn AssetStore,
    fields: &ReferenceFields,
) -> Result<DocumentOutcome> {
    let PreparedDocument {
        name,
        document,
        decoded,
        warnings,
    } = prepared;

    let mut outcome = DocumentOutcome {
        name: name.clone(),
        warnings,
        ..DocumentOutcome::default()
    };
    let Some(document) = document else {
        return Ok(outcome);
    };

    let mut replacements = ReplacementMap::new();

    // Scanning is deterministic, so this walks the same references in the
    // same order as `prepare_document`.
    for (reference, decoded) in scan(&document, fields).zip(decoded) {
        if let Some(public_path) = replacements.get(reference.raw) {
            outcome.reference_text_bytes += reference.raw.len();
            outcome.externalized_path_bytes += public_path.len();
            continue;
        }

        debug!(field = reference.field, path = %reference.path, chars = reference.raw.len(), "resolving reference");

        let put = decoded
            .map_err(AssetDeployError::from)
            .and_then(|asset| store.put(&asset));

        match put {
            Ok(put) => {
                if put.status == PutStatus::Written {
                    outcome.files_written += 1;
                }
                outcome.reference_text_bytes += reference.raw.len();
                outcome.externalized_path_bytes += put.public_path.len();
                replacements.insert(reference.raw, put.public_path);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(field = reference.field, path = %reference.path, error = %e, "leaving reference unresolved");
                outcome
                    .warnings
                    .push(reference_warning(&name, reference.field, &reference.path.to_string(), e));
            }
        }
    }

    let (rewritten, rewrites) = rewrite_counted(&document, &replacements);
    debug!(resolved = replacements.len(), rewrites, "document processed");

    outcome.rewrites = rewrites;
    outcome.document = Some(rewritten);
    Ok(outcome)
}

fn reference_warning(document: &str, field: &str, path: &str, error: AssetDeployError) -> RunWarning {
    match error {
        AssetDeployError::Decode(e) => RunWarning::SkippedReference {
            document: document.to_string(),
            field: field.to_string(),
            path: path.to_string(),
            error_kind: e.kind().to_string(),
            error: e.to_string(),
        },
        other => RunWarning::UnresolvedReference {
            document: document.to_string(),
            field: field.to_string(),
            path: path.to_string(),
            error: other.to_string(),
        },
    }
}

fn read_document(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| AssetDeployError::DocumentRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&content).map_err(|e| AssetDeployError::DocumentParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn document_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Write the merged catalog atomically (write to temp, then rename).
fn write_output(path: &Path, catalog: &Value) -> Result<()> {
    let mut json = serde_json::to_string_pretty(catalog).map_err(|e| {
        AssetDeployError::validation(format!("JSON serialization failed: {e}"))
    })?;
    json.push('\n');

    let file_name = path
        .file_name()
        .ok_or_else(|| AssetDeployError::validation("output path has no file name"))?
        .to_string_lossy()
        .to_string();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| AssetDeployError::OutputWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let temp = path.with_file_name(format!(".{file_name}.tmp"));
    std::fs::write(&temp, json).map_err(|e| AssetDeployError::OutputWrite {
        path: temp.clone(),
        source: e,
    })?;
    std::fs::rename(&temp, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp);
        AssetDeployError::OutputWrite {
            path: path.to_path_buf(),
            source: e,
        }
    })?;

    debug!(path = %path.display(), "wrote catalog");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetdeploy_assets::{MemoryAssetStore, encode_reference};
    use assetdeploy_shared::{AppConfig, MediaType};
    use serde_json::json;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "assetdeploy-pipeline-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_doc(dir: &Path, name: &str, doc: &Value) {
        std::fs::write(dir.join(name), serde_json::to_string(doc).unwrap()).unwrap();
    }

    fn process(path: &Path, store: &dyn AssetStore) -> Result<DocumentOutcome> {
        let fields = ReferenceFields::default();
        commit_document(prepare_document(path, &fields), store, &fields)
    }

    fn read_catalog(config: &DeployConfig) -> Value {
        serde_json::from_str(&std::fs::read_to_string(&config.output_path).unwrap()).unwrap()
    }

    #[test]
    fn discovery_lists_only_json_files_sorted() {
        let tmp = temp_dir();
        std::fs::write(tmp.join("b.json"), "{}").unwrap();
        std::fs::write(tmp.join("a.JSON"), "{}").unwrap();
        std::fs::write(tmp.join("notes.txt"), "").unwrap();
        std::fs::create_dir_all(tmp.join("nested.json")).unwrap();

        let names: Vec<String> = discover_documents(&tmp)
            .unwrap()
            .iter()
            .map(|p| document_name(p.as_path()))
            .collect();
        assert_eq!(names, ["a.JSON", "b.json"]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn document_is_rewritten_with_warnings() {
        let tmp = temp_dir();
        let good = encode_reference(b"tone", MediaType::AudioMpeg);
        write_doc(
            &tmp,
            "doc.json",
            &json!({
                "id": "d",
                "title": "D",
                "a": { "audioUrl": good },
                "b": { "audioUrl": good },
                "c": { "imageUrl": "data:image/bogus;base64,AAAA" }
            }),
        );

        let store = MemoryAssetStore::new(StoreLayout::default());
        let outcome = process(&tmp.join("doc.json"), &store).unwrap();

        let doc = outcome.document.unwrap();
        assert!(doc["a"]["audioUrl"].as_str().unwrap().starts_with("/assets/deployed/"));
        assert_eq!(doc["a"]["audioUrl"], doc["b"]["audioUrl"]);
        assert_eq!(doc["c"]["imageUrl"], "data:image/bogus;base64,AAAA");
        assert_eq!(outcome.rewrites, 2);
        assert_eq!(outcome.files_written, 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(matches!(
            &outcome.warnings[0],
            RunWarning::SkippedReference { error_kind, path, .. }
                if error_kind == "unsupported_media_type" && path == "c.imageUrl"
        ));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn unparseable_document_is_skipped() {
        let tmp = temp_dir();
        std::fs::write(tmp.join("broken.json"), "{ not json").unwrap();

        let store = MemoryAssetStore::new(StoreLayout::default());
        let outcome = process(&tmp.join("broken.json"), &store).unwrap();

        assert!(outcome.document.is_none());
        assert!(matches!(
            &outcome.warnings[0],
            RunWarning::SkippedDocument { document, .. } if document == "broken.json"
        ));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn write_output_creates_parents_atomically() {
        let tmp = temp_dir();
        let out = tmp.join("src/data/scenarios.json");

        write_output(&out, &json!({ "x": { "id": "x", "title": "X" } })).unwrap();

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written["x"]["title"], "X");
        for entry in std::fs::read_dir(out.parent().unwrap()).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().to_string();
            assert!(!name.starts_with('.'), "temp file left behind: {name}");
        }

        let _ = std::fs::remove_dir_all(&tmp);
    }

    fn fs_config(tmp: &Path) -> DeployConfig {
        let mut config = DeployConfig::from(&AppConfig::default());
        config.input_dir = tmp.join("input_json");
        config.output_path = tmp.join("src/data/scenarios.json");
        config.assets_dir = tmp.join("public/assets/deployed");
        std::fs::create_dir_all(&config.input_dir).unwrap();
        config
    }

    fn asset_files(config: &DeployConfig) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&config.assets_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn deploy_externalizes_audio_end_to_end() {
        let tmp = temp_dir();
        let config = fs_config(&tmp);
        let reference = encode_reference(b"ID3 fake mp3 payload", MediaType::AudioMpeg);
        write_doc(
            &config.input_dir,
            "demo.json",
            &json!({
                "id": "demo",
                "title": "Demo",
                "intro": { "audioUrl": reference }
            }),
        );

        let summary = deploy(&config, &SilentProgress).await.unwrap();

        assert_eq!(summary.outcome(), crate::summary::RunOutcome::Clean);
        assert_eq!(summary.documents_processed, 1);
        assert_eq!(summary.catalog_entries, 1);
        assert_eq!(summary.distinct_assets, 1);
        assert_eq!(summary.files_written, 1);
        assert_eq!(summary.rewrites, 1);

        let files = asset_files(&config);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with(".mp3"));
        assert_eq!(files[0].len(), 16 + ".mp3".len());
        assert_eq!(
            std::fs::read(config.assets_dir.join(&files[0])).unwrap(),
            b"ID3 fake mp3 payload"
        );

        let catalog: Value =
            serde_json::from_str(&std::fs::read_to_string(&config.output_path).unwrap()).unwrap();
        assert_eq!(
            catalog["demo"]["intro"]["audioUrl"],
            format!("/assets/deployed/{}", files[0])
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn deploy_deduplicates_across_documents_and_fields() {
        let tmp = temp_dir();
        let config = fs_config(&tmp);
        let image = encode_reference(b"\x89PNG shared", MediaType::ImagePng);
        write_doc(
            &config.input_dir,
            "a.json",
            &json!({ "id": "a", "title": "A", "step": { "imageUrl": image } }),
        );
        // The field name alone makes a value eligible, whatever it holds.
        write_doc(
            &config.input_dir,
            "b.json",
            &json!({ "id": "b", "title": "B", "steps": [{ "audioUrl": image }] }),
        );

        let summary = deploy(&config, &SilentProgress).await.unwrap();

        assert_eq!(summary.distinct_assets, 1);
        assert_eq!(summary.files_written, 1);
        assert_eq!(summary.rewrites, 2);
        assert_eq!(asset_files(&config).len(), 1);

        let catalog: Value =
            serde_json::from_str(&std::fs::read_to_string(&config.output_path).unwrap()).unwrap();
        let path = catalog["a"]["step"]["imageUrl"].as_str().unwrap();
        assert!(path.ends_with(".png"));
        assert_eq!(catalog["b"]["steps"][0]["audioUrl"], path);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn deploy_degrades_on_bad_items() {
        let tmp = temp_dir();
        let config = fs_config(&tmp);
        write_doc(
            &config.input_dir,
            "01-first.json",
            &json!({ "id": "dup", "title": "First", "x": { "imageUrl": "data:image/bogus;base64,AAAA" } }),
        );
        write_doc(
            &config.input_dir,
            "02-second.json",
            &json!({ "id": "dup", "title": "Second" }),
        );
        std::fs::write(config.input_dir.join("03-broken.json"), "{ nope").unwrap();

        let summary = deploy(&config, &SilentProgress).await.unwrap();

        assert_eq!(summary.outcome(), crate::summary::RunOutcome::Degraded);
        assert_eq!(summary.documents_found, 3);
        assert_eq!(summary.documents_processed, 2);
        assert_eq!(summary.catalog_entries, 1);
        assert_eq!(summary.warnings.len(), 3);
        assert!(summary.warnings.iter().any(|w| matches!(w, RunWarning::SkippedReference { .. })));
        assert!(summary.warnings.iter().any(|w| matches!(w, RunWarning::SkippedDocument { .. })));
        assert!(summary.warnings.iter().any(|w| matches!(
            w,
            RunWarning::IdentityCollision { kept_from, .. } if kept_from == "01-first.json"
        )));

        let catalog: Value =
            serde_json::from_str(&std::fs::read_to_string(&config.output_path).unwrap()).unwrap();
        assert_eq!(catalog["dup"]["title"], "First");
        assert_eq!(catalog["dup"]["x"]["imageUrl"], "data:image/bogus;base64,AAAA");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn deploy_with_clean_removes_stale_assets() {
        let tmp = temp_dir();
        let mut config = fs_config(&tmp);
        config.clean = true;
        std::fs::create_dir_all(&config.assets_dir).unwrap();
        std::fs::write(config.assets_dir.join("stale.mp3"), b"old").unwrap();
        write_doc(&config.input_dir, "plain.json", &json!({ "id": "p", "title": "P" }));

        let summary = deploy(&config, &SilentProgress).await.unwrap();

        assert_eq!(summary.distinct_assets, 0);
        assert!(asset_files(&config).is_empty());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    /// Memory store that fails every `put` of one particular payload.
    struct FaultyStore {
        inner: MemoryAssetStore,
        poison: Vec<u8>,
        fatal: bool,
    }

    impl FaultyStore {
        fn new(poison: &[u8], fatal: bool) -> Self {
            Self {
                inner: MemoryAssetStore::new(StoreLayout::default()),
                poison: poison.to_vec(),
                fatal,
            }
        }
    }

    impl AssetStore for FaultyStore {
        fn put(&self, asset: &Asset) -> Result<assetdeploy_assets::PutOutcome> {
            if asset.bytes() != self.poison.as_slice() {
                return self.inner.put(asset);
            }
            if self.fatal {
                Err(AssetDeployError::StoreIntegrity {
                    filename: "deadbeef.png".into(),
                    existing: "a".into(),
                    incoming: "b".into(),
                })
            } else {
                Err(AssetDeployError::StoreWrite {
                    path: "public/assets/deployed/deadbeef.png".into(),
                    source: std::io::Error::other("disk full"),
                })
            }
        }

        fn stored_assets(&self) -> Vec<assetdeploy_assets::StoredAsset> {
            self.inner.stored_assets()
        }
    }

    #[tokio::test]
    async fn fatal_store_error_aborts_without_output() {
        let tmp = temp_dir();
        let config = fs_config(&tmp);
        let image = encode_reference(b"png", MediaType::ImagePng);
        write_doc(
            &config.input_dir,
            "a.json",
            &json!({ "id": "a", "title": "A", "imageUrl": image }),
        );
        for name in ["b.json", "c.json", "d.json"] {
            let other = encode_reference(name.as_bytes(), MediaType::ImageGif);
            write_doc(
                &config.input_dir,
                name,
                &json!({ "id": name, "title": name, "imageUrl": other }),
            );
        }

        let store = Arc::new(FaultyStore::new(b"png", true));
        let err = deploy_with_store(&config, store.clone(), &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, AssetDeployError::StoreIntegrity { .. }));
        assert!(!config.output_path.exists());
        // Documents after the failing one never reach the store.
        assert_eq!(store.inner.file_count(), 0);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn failed_asset_write_leaves_reference_in_place() {
        let tmp = temp_dir();
        let config = fs_config(&tmp);
        let image = encode_reference(b"unwritable", MediaType::ImagePng);
        let audio = encode_reference(b"fine", MediaType::AudioWav);
        write_doc(
            &config.input_dir,
            "a.json",
            &json!({
                "id": "a",
                "title": "A",
                "x": { "imageUrl": image },
                "y": { "audioUrl": audio }
            }),
        );

        let store = Arc::new(FaultyStore::new(b"unwritable", false));
        let summary = deploy_with_store(&config, store, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.outcome(), crate::summary::RunOutcome::Degraded);
        assert_eq!(summary.rewrites, 1);
        assert_eq!(summary.warnings.len(), 1);
        assert!(matches!(
            &summary.warnings[0],
            RunWarning::UnresolvedReference { document, field, path, .. }
                if document == "a.json" && field == "imageUrl" && path == "x.imageUrl"
        ));

        let catalog = read_catalog(&config);
        assert_eq!(catalog["a"]["x"]["imageUrl"], image.as_str());
        assert!(
            catalog["a"]["y"]["audioUrl"]
                .as_str()
                .unwrap()
                .starts_with("/assets/deployed/")
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn shared_bytes_are_named_by_first_document() {
        let tmp = temp_dir();
        let config = fs_config(&tmp);
        let bytes = b"same pixels, two labels";
        write_doc(
            &config.input_dir,
            "a.json",
            &json!({ "id": "a", "title": "A", "imageUrl": encode_reference(bytes, MediaType::ImagePng) }),
        );
        write_doc(
            &config.input_dir,
            "b.json",
            &json!({ "id": "b", "title": "B", "imageUrl": encode_reference(bytes, MediaType::ImageGif) }),
        );

        for _ in 0..8 {
            let store = Arc::new(MemoryAssetStore::new(StoreLayout::default()));
            let summary = deploy_with_store(&config, store, &SilentProgress)
                .await
                .unwrap();

            let catalog = read_catalog(&config);
            let path = catalog["a"]["imageUrl"].as_str().unwrap();
            assert!(path.ends_with(".png"), "{path}");
            assert_eq!(catalog["b"]["imageUrl"], path);
            assert_eq!(summary.media.keys().collect::<Vec<_>>(), [&MediaType::ImagePng]);
        }

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn zero_concurrency_is_rejected() {
        let tmp = temp_dir();
        let mut config = fs_config(&tmp);
        config.concurrency = 0;
        write_doc(&config.input_dir, "a.json", &json!({ "id": "a", "title": "A" }));

        let store = Arc::new(MemoryAssetStore::new(StoreLayout::default()));
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            deploy_with_store(&config, store, &SilentProgress),
        )
        .await
        .expect("deploy should not hang");

        assert!(matches!(result, Err(AssetDeployError::Config { .. })));
        assert!(!config.output_path.exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn empty_input_directory_is_fatal() {
        let tmp = temp_dir();
        let mut config = DeployConfig::from(&AppConfig::default());
        config.input_dir = tmp.join("input");
        config.output_path = tmp.join("out.json");
        std::fs::create_dir_all(&config.input_dir).unwrap();

        let store = Arc::new(MemoryAssetStore::new(StoreLayout::default()));
        let err = deploy_with_store(&config, store, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, AssetDeployError::NoInputDocuments { .. }));
        assert!(!config.output_path.exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
