//! Application configuration for assetdeploy.
//!
//! User config lives at `~/.assetdeploy/assetdeploy.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AssetDeployError, Result};
use crate::types::AssetDigest;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "assetdeploy.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".assetdeploy";

/// Shortest digest prefix accepted for filenames.
pub const MIN_DIGEST_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Config structs (matching assetdeploy.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Input, output, and asset locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Asset store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Reference scanning settings.
    #[serde(default)]
    pub scan: ScanConfig,

    /// Orchestrator settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the input JSON documents.
    #[serde(default = "default_input_dir")]
    pub input_dir: String,

    /// Merged catalog output file.
    #[serde(default = "default_output")]
    pub output: String,

    /// Directory the asset files are written to.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output: default_output(),
            assets_dir: default_assets_dir(),
        }
    }
}

fn default_input_dir() -> String {
    "input_json".into()
}
fn default_output() -> String {
    "src/data/scenarios.json".into()
}
fn default_assets_dir() -> String {
    "public/assets/deployed".into()
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Public path prefix written into rewritten documents.
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,

    /// Number of digest hex characters used in asset filenames.
    #[serde(default = "default_digest_len")]
    pub digest_len: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            public_prefix: default_public_prefix(),
            digest_len: default_digest_len(),
        }
    }
}

fn default_public_prefix() -> String {
    "/assets/deployed".into()
}
fn default_digest_len() -> usize {
    16
}

/// `[scan]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Field names whose values may hold embedded references.
    #[serde(default = "default_reference_fields")]
    pub reference_fields: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            reference_fields: default_reference_fields(),
        }
    }
}

fn default_reference_fields() -> Vec<String> {
    vec!["audioUrl".into(), "imageUrl".into()]
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of documents processed at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Wipe the asset directory before deploying.
    #[serde(default)]
    pub clean: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            clean: false,
        }
    }
}

fn default_concurrency() -> u32 {
    4
}

// ---------------------------------------------------------------------------
// Deploy config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime deployment configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    /// Directory holding the input JSON documents.
    pub input_dir: PathBuf,
    /// Merged catalog output file.
    pub output_path: PathBuf,
    /// Directory the asset files are written to.
    pub assets_dir: PathBuf,
    /// Public path prefix for rewritten references.
    pub public_prefix: String,
    /// Digest hex characters used in filenames.
    pub digest_len: usize,
    /// Recognized reference field names.
    pub reference_fields: Vec<String>,
    /// Maximum documents processed at once.
    pub concurrency: u32,
    /// Wipe the asset directory first.
    pub clean: bool,
}

impl From<&AppConfig> for DeployConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            input_dir: PathBuf::from(&config.paths.input_dir),
            output_path: PathBuf::from(&config.paths.output),
            assets_dir: PathBuf::from(&config.paths.assets_dir),
            public_prefix: config.store.public_prefix.clone(),
            digest_len: config.store.digest_len,
            reference_fields: config.scan.reference_fields.clone(),
            concurrency: config.pipeline.concurrency,
            clean: config.pipeline.clean,
        }
    }
}

impl DeployConfig {
    /// Reject settings the pipeline cannot honor.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_DIGEST_LEN..=AssetDigest::HEX_LEN).contains(&self.digest_len) {
            return Err(AssetDeployError::config(format!(
                "digest_len must be between {MIN_DIGEST_LEN} and {}, got {}",
                AssetDigest::HEX_LEN,
                self.digest_len
            )));
        }
        if self.concurrency == 0 {
            return Err(AssetDeployError::config("concurrency must be at least 1"));
        }
        if self.reference_fields.is_empty() {
            return Err(AssetDeployError::config(
                "reference_fields must name at least one field",
            ));
        }
        // Rewritten paths must never look like references, or a second
        // rewrite pass could match them again.
        if self.public_prefix.starts_with("data:") {
            return Err(AssetDeployError::config(
                "public_prefix must not start with 'data:'",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.assetdeploy/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AssetDeployError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.assetdeploy/assetdeploy.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AssetDeployError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        AssetDeployError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| AssetDeployError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| AssetDeployError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| AssetDeployError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
