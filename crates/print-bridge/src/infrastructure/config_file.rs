//! `config.json` discovery and parsing.
//!
//! The file uses the same camelCase keys as existing deployments of the print
//! service:
//!
//! ```json
//! {
//!   "port": 8181,
//!   "defaultPrinterIp": "192.168.1.50",
//!   "defaultPrinterPort": 9100
//! }
//! ```
//!
//! Every key is optional and unknown keys are ignored.  Values from the file
//! override environment variables but not CLI flags (see `main.rs`).
//!
//! Discovery looks next to the executable first, then in the current working
//! directory; the first file that exists *and* parses wins.  A file passed
//! explicitly with `--config` must exist and parse.

use std::path::{Path, PathBuf};

use serde::{de, Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// File name looked up during discovery.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON or has wrongly typed values.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Settings that may come from `config.json`.
///
/// Ports may be written as numbers or as numeric strings (`"8181"`); older
/// installs use both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    /// WebSocket listen port.
    #[serde(default, deserialize_with = "number_or_numeric_string")]
    pub port: Option<u16>,
    #[serde(default)]
    pub default_printer_ip: Option<String>,
    #[serde(default, deserialize_with = "number_or_numeric_string")]
    pub default_printer_port: Option<u16>,
}

fn number_or_numeric_string<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortValue {
        Number(u16),
        Text(String),
    }

    match Option::<PortValue>::deserialize(deserializer)? {
        None => Ok(None),
        Some(PortValue::Number(port)) => Ok(Some(port)),
        Some(PortValue::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("invalid port {text:?}"))),
    }
}

/// Reads and parses the config file at `path`.
///
/// # Errors
///
/// [`ConfigFileError::Io`] if the file cannot be read and
/// [`ConfigFileError::Parse`] if its content is not a valid config object.
pub fn load_from(path: &Path) -> Result<FileConfig, ConfigFileError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigFileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Returns the first candidate that exists and parses, with its path.
///
/// Files that exist but fail to load are skipped with a warning.
pub fn discover(candidates: &[PathBuf]) -> Option<(PathBuf, FileConfig)> {
    for path in candidates {
        if !path.is_file() {
            continue;
        }
        match load_from(path) {
            Ok(cfg) => return Some((path.clone(), cfg)),
            Err(e) => warn!("skipping config file: {e}"),
        }
    }
    None
}

/// Default discovery locations: the executable's directory, then the
/// current working directory.  Duplicates are removed.
pub fn default_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    let cwd = std::env::current_dir().ok();

    for dir in [exe_dir, cwd].into_iter().flatten() {
        let path = dir.join(CONFIG_FILE_NAME);
        if !candidates.contains(&path) {
            candidates.push(path);
        }
    }
    candidates
}

/// Resolves the file layer of the configuration.
///
/// With `explicit` set, that file is required.  Otherwise the
/// [`default_candidates`] are searched and a missing file yields
/// `FileConfig::default()`.
///
/// # Errors
///
/// Only when an explicit file cannot be loaded.
pub fn resolve(explicit: Option<&Path>) -> Result<FileConfig, ConfigFileError> {
    if let Some(path) = explicit {
        let cfg = load_from(path)?;
        info!("loaded config from {}", path.display());
        return Ok(cfg);
    }

    let candidates = default_candidates();
    match discover(&candidates) {
        Some((path, cfg)) => {
            info!("loaded config from {}", path.display());
            Ok(cfg)
        }
        None => {
            info!("no {CONFIG_FILE_NAME} found; using environment variables or defaults");
            for path in &candidates {
                info!("  tried {}", path.display());
            }
            Ok(FileConfig::default())
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
