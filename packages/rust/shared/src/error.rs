//! Error types for assetdeploy.
//!
//! Library crates use [`AssetDeployError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Errors fall into two classes. Per-item failures (one reference, one
//! document, one asset write) are recoverable: the orchestrator converts
//! them into run warnings and keeps going. Whole-run failures abort the run.
//! [`AssetDeployError::is_fatal`] encodes that split.

use std::path::PathBuf;

/// Why a single embedded reference could not be turned into an asset.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The text does not follow `data:<media-type>;base64,<payload>`.
    #[error("malformed reference: {reason}")]
    MalformedReference { reason: String },

    /// The media type is not in the supported audio/image table.
    #[error("unsupported media type: {media_type}")]
    UnsupportedMediaType { media_type: String },

    /// The payload is not valid standard base64.
    #[error("payload decode error: {reason}")]
    PayloadDecode { reason: String },
}

impl DecodeError {
    /// Create a malformed-reference error from any displayable message.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedReference {
            reason: reason.into(),
        }
    }

    /// Stable short name, used in warnings and JSON summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedReference { .. } => "malformed_reference",
            Self::UnsupportedMediaType { .. } => "unsupported_media_type",
            Self::PayloadDecode { .. } => "payload_decode_error",
        }
    }
}

/// Top-level error type for all assetdeploy operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetDeployError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (invalid shape, serialization failure, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// An embedded reference could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// An input document could not be read from disk.
    #[error("failed to read document {path:?}: {source}")]
    DocumentRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An input document is not valid JSON.
    #[error("failed to parse document {path:?}: {message}")]
    DocumentParse { path: PathBuf, message: String },

    /// The asset store directory cannot be created, cleaned, or written.
    #[error("asset store unavailable at {path:?}: {source}")]
    StoreUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Writing one asset file failed.
    #[error("failed to write asset {path:?}: {source}")]
    StoreWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Two different digests map to the same filename.
    #[error(
        "store integrity violated: {filename} already holds digest {existing}, refusing to overwrite with {incoming}"
    )]
    StoreIntegrity {
        filename: String,
        existing: String,
        incoming: String,
    },

    /// The input directory holds no documents.
    #[error("no input documents found in {dir:?}")]
    NoInputDocuments { dir: PathBuf },

    /// The merged output document could not be written.
    #[error("failed to write output {path:?}: {source}")]
    OutputWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A background job panicked or was cancelled.
    #[error("task error: {0}")]
    Task(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AssetDeployError>;

impl AssetDeployError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error aborts the whole run.
    ///
    /// Reference, document, and single-asset write failures are recoverable.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Decode(_)
                | Self::DocumentRead { .. }
                | Self::DocumentParse { .. }
                | Self::StoreWrite { .. }
        )
    }
}
