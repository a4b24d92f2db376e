//! # Record Persistence Format
//!
//! Binary encoding of one persisted entity row.
//!
//! Format: Header (5 bytes) + postcard-serialized record.
//! - 4 bytes: Magic ("SEED")
//! - 1 byte: Version
//!
//! Attribute values are kept as JSON text because postcard is not
//! self-describing. Entity-valued attributes become links naming the target
//! class path and its primary key.
//!
//! Size and header are validated before the payload is decoded.

use crate::primitives::{self, MAX_RECORD_SIZE, ROW_KEY_SEPARATOR};
use crate::types::{Result, SeedError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Header length in bytes.
const HEADER_SIZE: usize = 5;

// =============================================================================
// RECORD HEADER
// =============================================================================

/// The header that precedes every encoded record.
#[derive(Debug, Clone, Copy)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate magic bytes and version.
    pub fn validate(&self) -> Result<()> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(SeedError::Deserialization(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(SeedError::Deserialization(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write the header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read the header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(SeedError::Deserialization("Header too short".to_string()));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// STORED RECORDS
// =============================================================================

/// One attribute value as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoredValue {
    /// JSON text of a literal value.
    Literal(String),
    /// Pointer to another row.
    Link { class: String, key: String },
}

impl StoredValue {
    /// Encode a literal value.
    pub fn literal(value: &Value) -> Result<Self> {
        serde_json::to_string(value)
            .map(Self::Literal)
            .map_err(|e| SeedError::Serialization(e.to_string()))
    }

    /// Decode a literal value. `None` for links.
    pub fn to_literal(&self) -> Result<Option<Value>> {
        match self {
            Self::Literal(text) => serde_json::from_str(text)
                .map(Some)
                .map_err(|e| SeedError::Deserialization(e.to_string())),
            Self::Link { .. } => Ok(None),
        }
    }
}

/// One persisted entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Qualified class path.
    pub class: String,
    /// Set attributes in declaration order.
    pub fields: Vec<(String, StoredValue)>,
}

/// Row key of an entity: class path and JSON-encoded primary key.
pub fn row_key(class: &str, key: &Value) -> Result<String> {
    let key = serde_json::to_string(key).map_err(|e| SeedError::Serialization(e.to_string()))?;
    Ok(encoded_row_key(class, &key))
}

/// Row key from an already JSON-encoded primary key.
#[must_use]
pub fn encoded_row_key(class: &str, key: &str) -> String {
    format!("{}{}{}", class, ROW_KEY_SEPARATOR, key)
}

/// Serialize a record (header + payload).
///
/// This is a pure transformation - no I/O.
pub fn encode_record(record: &StoredRecord) -> Result<Vec<u8>> {
    let header = PersistenceHeader::new();
    let payload =
        postcard::to_stdvec(record).map_err(|e| SeedError::Serialization(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
    bytes.extend_from_slice(&header.to_bytes());
    bytes.extend_from_slice(&payload);

    if bytes.len() > MAX_RECORD_SIZE {
        return Err(SeedError::Serialization(format!(
            "Record size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_RECORD_SIZE
        )));
    }
    Ok(bytes)
}

/// Deserialize a record.
///
/// Size and header are checked before the payload is touched.
pub fn decode_record(bytes: &[u8]) -> Result<StoredRecord> {
    if bytes.len() < HEADER_SIZE {
        return Err(SeedError::Deserialization(format!(
            "Data too short: minimum {} bytes required",
            HEADER_SIZE
        )));
    }
    if bytes.len() > MAX_RECORD_SIZE {
        return Err(SeedError::Deserialization(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_RECORD_SIZE
        )));
    }

    PersistenceHeader::from_bytes(bytes)?.validate()?;

    postcard::from_bytes(&bytes[HEADER_SIZE..]).map_err(|e| {
        SeedError::Deserialization(format!("Failed to deserialize record: {}", e))
    })
}

// =============================================================================
// TESTS
// =============================================================================
