//! Shared types, error model, and configuration for assetdeploy.
//!
//! This crate is the foundation depended on by all other assetdeploy crates.
//! It provides:
//! - [`AssetDeployError`] and [`DecodeError`]: the error taxonomy
//! - Domain types ([`MediaType`], [`AssetDigest`], [`RunId`])
//! - Configuration ([`AppConfig`], [`DeployConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DeployConfig, MIN_DIGEST_LEN, PathsConfig, PipelineConfig, ScanConfig, StoreConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{AssetDeployError, DecodeError, Result};
pub use types::{AssetDigest, GENERIC_EXTENSION, MediaType, RunId, extension_for_mime};
