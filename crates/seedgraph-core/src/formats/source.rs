//! # Source Documents
//!
//! Decoding of JSON and YAML seed sources into the generic document tree
//! (`serde_json::Value`, key order preserved).

use crate::primitives::MAX_SOURCE_FILE_SIZE;
use crate::types::{Result, SeedError};
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// Text format of a seed source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Pick the format from a file extension (`json`, `yaml`, `yml`).
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    /// Decode `text` in this format.
    pub fn parse(self, text: &str) -> Result<Value> {
        match self {
            Self::Json => parse_json_str(text),
            Self::Yaml => parse_yaml_str(text),
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "JSON"),
            Self::Yaml => write!(f, "YAML"),
        }
    }
}

/// Decode JSON text.
pub fn parse_json_str(text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|e| SeedError::Parse {
        format: DocumentFormat::Json.to_string(),
        message: e.to_string(),
    })
}

/// Decode YAML text.
///
/// Mapping keys must be strings.
pub fn parse_yaml_str(text: &str) -> Result<Value> {
    serde_yaml::from_str(text).map_err(|e| SeedError::Parse {
        format: DocumentFormat::Yaml.to_string(),
        message: e.to_string(),
    })
}

/// Read and decode a seed file, picking the format from its extension.
pub fn read_document(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let format = DocumentFormat::from_path(path).ok_or_else(|| SeedError::Parse {
        format: "unknown".to_string(),
        message: format!(
            "cannot tell the format of '{}', expected a .json, .yaml or .yml file",
            path.display()
        ),
    })?;

    let size = std::fs::metadata(path)
        .map_err(|e| SeedError::Io(format!("{}: {}", path.display(), e)))?
        .len();
    if size > MAX_SOURCE_FILE_SIZE {
        return Err(SeedError::Io(format!(
            "{}: file size {} bytes exceeds maximum allowed {} bytes",
            path.display(),
            size,
            MAX_SOURCE_FILE_SIZE
        )));
    }

    let text = std::fs::read_to_string(path)
        .map_err(|e| SeedError::Io(format!("{}: {}", path.display(), e)))?;
    format.parse(&text)
}
