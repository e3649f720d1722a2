//! # Configuration Module
//!
//! Resolves where blockplay keeps its database and how a run is tuned.
//!
//! Precedence, highest first: command-line flags and `BLOCKPLAY_*` environment
//! variables (handled by clap), then `blockplay.toml`, then built-in defaults.
//!
//! ## Data Storage
//!
//! The database lives in the platform-standard data directory:
//! - Linux: `~/.local/share/blockplay/blockplay.db`
//! - macOS: `~/Library/Application Support/blockplay/blockplay.db`
//! - Windows: `%APPDATA%\blockplay\blockplay.db`
//!
//! The optional config file is read from the platform config directory
//! (`~/.config/blockplay/blockplay.toml` on Linux):
//!
//! ```toml
//! db_path = "/srv/blockplay/blockplay.db"
//! seed = 42
//! artist_spacing = "playlist-runtime"
//! export_dir = "/srv/blockplay/exports"
//! ```

use anyhow::{Context, Result};
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::selector::ArtistSpacing;

const APP_DIR: &str = "blockplay";
const DB_FILE: &str = "blockplay.db";
const CONFIG_FILE: &str = "blockplay.toml";

fn app_dir(base: Option<PathBuf>, kind: &str) -> Result<PathBuf> {
    let base = base.ok_or_else(|| {
        anyhow::anyhow!("Could not determine system {kind} directory. Please pass --db explicitly.")
    })?;
    Ok(base.join(APP_DIR))
}

/// Returns the default database path, creating its directory.
pub fn get_db_path() -> Result<PathBuf> {
    let dir = app_dir(dirs::data_dir(), "data")?;
    fs::create_dir_all(&dir).with_context(|| {
        format!("Failed to create blockplay data directory at {}. Please check file permissions.", dir.display())
    })?;
    Ok(dir.join(DB_FILE))
}

/// Default location of `blockplay.toml`. The file itself may not exist.
pub fn default_config_path() -> Result<PathBuf> {
    Ok(app_dir(dirs::config_dir(), "config")?.join(CONFIG_FILE))
}

/// Contents of `blockplay.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub db_path: Option<PathBuf>,
    pub seed: Option<u64>,
    pub artist_spacing: Option<ArtistSpacing>,
    pub export_dir: Option<PathBuf>,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid blockplay.toml")
    }

    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config file at {}", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("In {}", path.display()))
    }
}

/// Command-line overrides, already merged with the environment by clap.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub db_path: Option<PathBuf>,
    pub seed: Option<u64>,
    pub artist_spacing: Option<ArtistSpacing>,
    pub export_dir: Option<PathBuf>,
}

/// Settings for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeConfig {
    pub db_path: PathBuf,
    /// Fixed seed for reproducible runs; `None` draws from the thread RNG.
    pub seed: Option<u64>,
    pub artist_spacing: ArtistSpacing,
    pub export_dir: PathBuf,
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(path
        .absolutize()
        .with_context(|| format!("Cannot resolve path {}", path.display()))?
        .into_owned())
}

impl RuntimeConfig {
    /// Merges overrides over the file over the defaults.
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self> {
        let db_path = match overrides.db_path.or(file.db_path) {
            Some(path) => absolute(&path)?,
            None => get_db_path()?,
        };
        let export_dir = match overrides.export_dir.or(file.export_dir) {
            Some(dir) => absolute(&dir)?,
            None => std::env::temp_dir(),
        };
        Ok(Self {
            db_path,
            seed: overrides.seed.or(file.seed),
            artist_spacing: overrides.artist_spacing.or(file.artist_spacing).unwrap_or_default(),
            export_dir,
        })
    }

    /// Loads the config file (explicit or default location) and applies overrides.
    pub fn load(config_path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let path = match config_path {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };
        let file = FileConfig::load(&path)?;
        Self::resolve(file, overrides)
    }

    /// Configuration with an explicit database path and defaults elsewhere.
    pub fn with_db_path(db_path: PathBuf) -> Self {
        Self {
            db_path,
            seed: None,
            artist_spacing: ArtistSpacing::default(),
            export_dir: std::env::temp_dir(),
        }
    }
}
