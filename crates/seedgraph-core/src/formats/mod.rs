//! # Formats
//!
//! - `source`: JSON/YAML seed documents into the generic tree
//! - `persistence`: binary rows written by [`RedbStore`](crate::store::RedbStore)

pub mod persistence;
pub mod source;

pub use persistence::{PersistenceHeader, StoredRecord, StoredValue, decode_record, encode_record};
pub use source::{DocumentFormat, parse_json_str, parse_yaml_str, read_document};
