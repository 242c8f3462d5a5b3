//! Embedded asset handling for assetdeploy.
//!
//! The building blocks of the deploy pipeline, leaf-first:
//! - [`scanner`] finds `data:` references in arbitrary JSON
//! - [`decoder`] turns a reference into a typed, hashed [`Asset`]
//! - [`store`] persists assets once per digest
//! - [`rewriter`] swaps references for their externalized paths

pub mod decoder;
pub mod rewriter;
pub mod scanner;
pub mod store;

pub use decoder::{Asset, decode, encode_reference};
pub use rewriter::{ReplacementMap, rewrite, rewrite_counted};
pub use scanner::{
    FoundReference, PathSegment, REFERENCE_PREFIX, ReferenceFields, References, ValuePath, scan,
};
pub use store::{
    AssetStore, DigestIndex, FsAssetStore, MemoryAssetStore, PutOutcome, PutStatus, StoreLayout,
    StoredAsset,
};
