//! Content-addressable asset store.
//!
//! Assets are keyed by the SHA-256 of their decoded bytes and persisted as
//! `<digest prefix><extension>`. Each unique digest is written at most once
//! per run: the digest index is checked and updated inside one critical
//! section, so concurrent `put` calls for unseen content cannot race into
//! two writes.
//!
//! ```text
//! <assets_dir>/
//! ├── 2cf24dba5fb0a30e.mp3
//! ├── 486ea46224d1bb4f.png
//! └── ...
//! ```

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info, instrument};

use assetdeploy_shared::{AssetDeployError, AssetDigest, DeployConfig, MediaType, Result};

use crate::decoder::Asset;

/// Probe file used to check that the store directory is writable.
const WRITE_PROBE: &str = ".assetdeploy-write-probe";

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// How assets are named on disk and referenced from documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    public_prefix: String,
    digest_len: usize,
}

impl StoreLayout {
    pub fn new(public_prefix: impl Into<String>, digest_len: usize) -> Self {
        let public_prefix = public_prefix.into().trim_end_matches('/').to_string();
        Self {
            public_prefix,
            digest_len,
        }
    }

    /// Deterministic filename for an asset.
    pub fn filename(&self, asset: &Asset) -> String {
        format!(
            "{}{}",
            asset.digest().prefix(self.digest_len),
            asset.extension()
        )
    }

    /// Public path written into rewritten documents.
    pub fn public_path(&self, filename: &str) -> String {
        format!("{}/{filename}", self.public_prefix)
    }
}

impl Default for StoreLayout {
    fn default() -> Self {
        Self::new("/assets/deployed", 16)
    }
}

impl From<&DeployConfig> for StoreLayout {
    fn from(config: &DeployConfig) -> Self {
        Self::new(config.public_prefix.clone(), config.digest_len)
    }
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// Metadata for one persisted asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredAsset {
    pub digest: AssetDigest,
    pub media_type: MediaType,
    pub filename: String,
    pub public_path: String,
    pub size_bytes: usize,
}

/// What a `put` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PutStatus {
    /// Bytes were written to a new file.
    Written,
    /// The digest was already in the index; no I/O happened.
    Deduplicated,
    /// A file with identical content already existed on disk.
    Adopted,
}

/// Result of a successful `put`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOutcome {
    pub public_path: String,
    pub filename: String,
    pub status: PutStatus,
}

/// Run-scoped digest → asset table with a reverse filename index.
#[derive(Debug, Default)]
pub struct DigestIndex {
    entries: Vec<StoredAsset>,
    by_digest: HashMap<AssetDigest, usize>,
    by_filename: HashMap<String, usize>,
}

impl DigestIndex {
    pub fn get(&self, digest: &AssetDigest) -> Option<&StoredAsset> {
        self.by_digest.get(digest).map(|&i| &self.entries[i])
    }

    /// Fail if `filename` is already claimed by a different digest.
    pub fn check_filename(&self, filename: &str, digest: &AssetDigest) -> Result<()> {
        match self.by_filename.get(filename) {
            Some(&i) if &self.entries[i].digest != digest => {
                Err(AssetDeployError::StoreIntegrity {
                    filename: filename.to_string(),
                    existing: self.entries[i].digest.to_string(),
                    incoming: digest.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    pub fn insert(&mut self, stored: StoredAsset) {
        let i = self.entries.len();
        self.by_digest.insert(stored.digest.clone(), i);
        self.by_filename.insert(stored.filename.clone(), i);
        self.entries.push(stored);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[StoredAsset] {
        &self.entries
    }
}

/// Shared `put` algorithm: dedup check, integrity check, persist, insert.
///
/// The index lock is held across `persist`.
fn put_indexed<F>(
    index: &Mutex<DigestIndex>,
    layout: &StoreLayout,
    asset: &Asset,
    persist: F,
) -> Result<PutOutcome>
where
    F: FnOnce(&str) -> Result<PutStatus>,
{
    let mut index = index.lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(existing) = index.get(asset.digest()) {
        debug!(file = %existing.filename, "duplicate asset, reusing");
        return Ok(PutOutcome {
            public_path: existing.public_path.clone(),
            filename: existing.filename.clone(),
            status: PutStatus::Deduplicated,
        });
    }

    let filename = layout.filename(asset);
    index.check_filename(&filename, asset.digest())?;

    let status = persist(&filename)?;
    let public_path = layout.public_path(&filename);

    index.insert(StoredAsset {
        digest: asset.digest().clone(),
        media_type: asset.media_type(),
        filename: filename.clone(),
        public_path: public_path.clone(),
        size_bytes: asset.len(),
    });

    Ok(PutOutcome {
        public_path,
        filename,
        status,
    })
}

// ---------------------------------------------------------------------------
// AssetStore
// ---------------------------------------------------------------------------

/// Persists decoded assets at most once per digest.
pub trait AssetStore: Send + Sync {
    /// Store an asset and return its public path. Idempotent per digest.
    fn put(&self, asset: &Asset) -> Result<PutOutcome>;

    /// Snapshot of every asset stored during this run, in insertion order.
    fn stored_assets(&self) -> Vec<StoredAsset>;
}

// ---------------------------------------------------------------------------
// Filesystem store
// ---------------------------------------------------------------------------

/// Asset store backed by a directory on disk.
#[derive(Debug)]
pub struct FsAssetStore {
    root: PathBuf,
    layout: StoreLayout,
    index: Mutex<DigestIndex>,
}

impl FsAssetStore {
    /// Open (creating if needed) a store directory and check it is writable.
    pub fn open(root: impl Into<PathBuf>, layout: StoreLayout) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| AssetDeployError::StoreUnavailable {
            path: root.clone(),
            source: e,
        })?;

        let probe = root.join(WRITE_PROBE);
        std::fs::write(&probe, b"").map_err(|e| AssetDeployError::StoreUnavailable {
            path: root.clone(),
            source: e,
        })?;
        let _ = std::fs::remove_file(&probe);

        debug!(path = %root.display(), "asset store opened");

        Ok(Self {
            root,
            layout,
            index: Mutex::new(DigestIndex::default()),
        })
    }

    /// Remove the store directory and recreate it empty.
    ///
    /// Must complete before the first `put` of a run.
    #[instrument(skip_all, fields(path = %root.display()))]
    pub fn clean(root: &Path) -> Result<()> {
        match std::fs::remove_dir_all(root) {
            Ok(()) => info!("removed existing assets"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(AssetDeployError::StoreUnavailable {
                    path: root.to_path_buf(),
                    source: e,
                });
            }
        }

        std::fs::create_dir_all(root).map_err(|e| AssetDeployError::StoreUnavailable {
            path: root.to_path_buf(),
            source: e,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write an asset file atomically (write to temp, then rename).
    ///
    /// A file left by an earlier run is adopted when its content hashes to
    /// the same digest and rejected otherwise.
    fn persist(&self, filename: &str, asset: &Asset) -> Result<PutStatus> {
        let target = self.root.join(filename);

        match std::fs::read(&target) {
            Ok(existing) => {
                let existing = AssetDigest::of(&existing);
                if &existing == asset.digest() {
                    debug!(file = %filename, "identical file already on disk");
                    return Ok(PutStatus::Adopted);
                }
                return Err(AssetDeployError::StoreIntegrity {
                    filename: filename.to_string(),
                    existing: existing.to_string(),
                    incoming: asset.digest().to_string(),
                });
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(AssetDeployError::StoreWrite {
                    path: target,
                    source: e,
                });
            }
        }

        let temp = self.root.join(format!(".{filename}.tmp"));
        if let Err(e) = std::fs::write(&temp, asset.bytes()) {
            let _ = std::fs::remove_file(&temp);
            return Err(AssetDeployError::StoreWrite {
                path: temp,
                source: e,
            });
        }
        if let Err(e) = std::fs::rename(&temp, &target) {
            let _ = std::fs::remove_file(&temp);
            return Err(AssetDeployError::StoreWrite {
                path: target,
                source: e,
            });
        }

        debug!(file = %filename, size = asset.len(), "wrote asset");
        Ok(PutStatus::Written)
    }
}

impl AssetStore for FsAssetStore {
    fn put(&self, asset: &Asset) -> Result<PutOutcome> {
        put_indexed(&self.index, &self.layout, asset, |filename| {
            self.persist(filename, asset)
        })
    }

    fn stored_assets(&self) -> Vec<StoredAsset> {
        self.index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries()
            .to_vec()
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Asset store that keeps files in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    layout: StoreLayout,
    index: Mutex<DigestIndex>,
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryAssetStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self {
            layout,
            ..Self::default()
        }
    }

    /// Number of files written.
    pub fn file_count(&self) -> usize {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Contents of a written file.
    pub fn file(&self, filename: &str) -> Option<Vec<u8>> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(filename)
            .cloned()
    }
}

impl AssetStore for MemoryAssetStore {
    fn put(&self, asset: &Asset) -> Result<PutOutcome> {
        put_indexed(&self.index, &self.layout, asset, |filename| {
            self.files
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(filename.to_string(), asset.bytes().to_vec());
            Ok(PutStatus::Written)
        })
    }

    fn stored_assets(&self) -> Vec<StoredAsset> {
        self.index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries()
            .to_vec()
    }
}
