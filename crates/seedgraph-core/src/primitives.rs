//! # Document and Format Primitives
//!
//! Fixed keys, separators, and limits of the seed document format and the
//! persisted record format. These are compiled in and immutable at runtime.

// =============================================================================
// DOCUMENT KEYS
// =============================================================================

/// Key of an entity group naming the class to build.
pub const TARGET_CLASS_KEY: &str = "target_class";

/// Key of an entity group holding one entity-data node or a sequence of them.
pub const DATA_KEY: &str = "data";

/// Reserved entity-data key holding the reference descriptions.
///
/// Chosen so that it cannot collide with a real attribute name.
pub const REFS_KEY: &str = "!refs";

/// Key of a reference description holding the lookup criteria.
pub const CRITERIA_KEY: &str = "criteria";

/// Key of a reference description naming the attribute to copy.
pub const FIELD_KEY: &str = "field";

/// Reserved entity-data key naming the entity for id references.
pub const ID_KEY: &str = "!id";

/// Prefix of entity-data keys reserved for directives.
pub const DIRECTIVE_PREFIX: char = '!';

// =============================================================================
// INLINE REFERENCES
// =============================================================================

/// Prefix marking a string field value as an inline reference.
///
/// `"!Country?short=UK&name=United Kingdom:id"`
pub const INLINE_REF_PREFIX: char = '!';

/// Prefix marking a string field value as an id reference.
///
/// `"#country_uk"` or `"#country_uk:id"`
pub const ID_REF_PREFIX: char = '#';

/// Separates the class identifier from the criteria.
pub const REF_CLASS_SEPARATOR: char = '?';

/// Separates criteria pairs.
pub const CRITERIA_SEPARATOR: char = '&';

/// Separates a criterion key from its value.
pub const KEY_VALUE_SEPARATOR: char = '=';

/// Separates the criteria from the attribute to copy.
pub const REF_FIELD_SEPARATOR: char = ':';

// =============================================================================
// CLASS IDENTIFIERS
// =============================================================================

/// Separates module path and class name: `module.path:Name`.
pub const MODULE_CLASS_SEPARATOR: char = ':';

/// Separates a module path from its registration depth: `module.path#1`.
pub const MODULE_DEPTH_SEPARATOR: char = '#';

/// Separates the segments of a module path.
pub const MODULE_PATH_SEPARATOR: char = '.';

// =============================================================================
// PERSISTED RECORDS
// =============================================================================

/// Magic bytes for the persisted record header.
pub const MAGIC_BYTES: &[u8; 4] = b"SEED";

/// Current record format version.
///
/// Increment this when making breaking changes to the record format.
pub const FORMAT_VERSION: u8 = 1;

/// Separates the class path from the primary key in store row keys.
pub const ROW_KEY_SEPARATOR: char = '\u{1f}';

// =============================================================================
// INPUT LIMITS
// =============================================================================

/// Maximum number of entity-data nodes in a single document.
pub const MAX_DOCUMENT_ENTITIES: usize = 100_000;

/// Maximum size of a seed document read from disk (100 MB).
pub const MAX_SOURCE_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum size of one persisted record (16 MB).
pub const MAX_RECORD_SIZE: usize = 16 * 1024 * 1024;
