//! Configuration loading and working-directory resolution
//!
//! Settings resolve through the priority chain:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`TUNEBATCH_*`)
//! 3. TOML config file (`~/.config/tunebatch/config.toml`)
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable names
const ENV_TEMP_DIR: &str = "TUNEBATCH_TEMP_DIR";
const ENV_OUTPUT_DIR: &str = "TUNEBATCH_OUTPUT_DIR";
const ENV_BATCH_WIDTH: &str = "TUNEBATCH_BATCH_WIDTH";
const ENV_ALBUM_LABEL: &str = "TUNEBATCH_ALBUM_LABEL";

/// Default width of a concurrently dispatched batch
pub const DEFAULT_BATCH_WIDTH: usize = 5;

/// Default album label applied when catalog reconciliation declines a match
pub const DEFAULT_ALBUM_LABEL: &str = "Tunebatch Downloads";

/// Optional settings read from the TOML config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub temp_dir: Option<String>,
    pub output_dir: Option<String>,
    pub batch_width: Option<usize>,
    pub album_label: Option<String>,
}

impl TomlConfig {
    /// Parse a TOML config document
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load the config file from the platform config directory
    ///
    /// A missing file is not an error; all fields fall through to the next
    /// resolution tier.
    pub fn load() -> Result<Self> {
        match config_file_path() {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
                Self::parse(&content)
            }
            _ => Ok(Self::default()),
        }
    }
}

/// Platform config file location (`~/.config/tunebatch/config.toml`)
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tunebatch").join("config.toml"))
}

/// Resolved pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Per-run scratch area; every work item writes a distinct file here
    pub temp_dir: PathBuf,
    /// Destination for the packaged archive
    pub output_dir: PathBuf,
    /// Width of a concurrently dispatched validation/acquisition batch
    pub batch_width: usize,
    /// Album tag applied when no catalog match is accepted
    pub album_label: String,
}

/// Command-line overrides passed down from the binary
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub temp_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub batch_width: Option<usize>,
}

impl PipelineConfig {
    /// Resolve configuration through the CLI > ENV > TOML > default chain
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self> {
        let toml_config = TomlConfig::load()?;
        Ok(Self::resolve_from(overrides, &toml_config))
    }

    /// Resolution against an already-loaded TOML tier
    pub fn resolve_from(overrides: ConfigOverrides, toml_config: &TomlConfig) -> Self {
        let temp_dir = overrides
            .temp_dir
            .or_else(|| std::env::var(ENV_TEMP_DIR).ok().map(PathBuf::from))
            .or_else(|| toml_config.temp_dir.as_ref().map(PathBuf::from))
            .unwrap_or_else(default_temp_dir);

        let output_dir = overrides
            .output_dir
            .or_else(|| std::env::var(ENV_OUTPUT_DIR).ok().map(PathBuf::from))
            .or_else(|| toml_config.output_dir.as_ref().map(PathBuf::from))
            .unwrap_or_else(default_output_dir);

        let batch_width = overrides
            .batch_width
            .or_else(|| {
                std::env::var(ENV_BATCH_WIDTH)
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .or(toml_config.batch_width)
            .filter(|w| *w > 0)
            .unwrap_or(DEFAULT_BATCH_WIDTH);

        let album_label = std::env::var(ENV_ALBUM_LABEL)
            .ok()
            .or_else(|| toml_config.album_label.clone())
            .unwrap_or_else(|| DEFAULT_ALBUM_LABEL.to_string());

        Self {
            temp_dir,
            output_dir,
            batch_width,
            album_label,
        }
    }

    /// Create the temp and output directories if missing
    pub fn ensure_directories(&self) -> Result<()> {
        ensure_directory(&self.temp_dir)?;
        ensure_directory(&self.output_dir)?;
        Ok(())
    }
}

/// Create a directory and its parents if missing
pub fn ensure_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
        tracing::info!(path = %path.display(), "Created directory");
    }
    Ok(())
}

/// Default per-run scratch area under the OS temp directory
fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("tunebatch")
}

/// Default archive destination
fn default_output_dir() -> PathBuf {
    dirs::download_dir()
        .map(|d| d.join("tunebatch"))
        .unwrap_or_else(|| {
            dirs::data_local_dir()
                .map(|d| d.join("tunebatch"))
                .unwrap_or_else(|| PathBuf::from("./tunebatch_out"))
        })
}
