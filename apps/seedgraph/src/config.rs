//! # Configuration
//!
//! `seedgraph.toml` declares the entity classes, which of them to register,
//! where the database lives, and the default seeding options.
//!
//! ```toml
//! models = ["geo"]
//!
//! [store]
//! path = "seedgraph.redb"
//!
//! [seed]
//! flush_on_create = true
//! inline_references = true
//! commit = false
//!
//! [[classes]]
//! module = "geo"
//! name = "Country"
//! fields = ["name", "short"]
//! primary_key = "id"
//! ```
//!
//! A missing file means defaults; a malformed one is an error.

use seedgraph_core::{ClassDef, ClassRegistry, Result, SeedError, SeedOptions};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "seedgraph.toml";

/// Database used when neither `--database` nor `[store] path` is set.
pub const DEFAULT_DATABASE: &str = "seedgraph.redb";

/// Contents of `seedgraph.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeedgraphConfig {
    /// Registration targets: `"geo"`, `"geo#1"`, `"geo:Country"`.
    /// Empty means every declared class.
    pub models: Vec<String>,
    pub store: StoreConfig,
    pub seed: SeedConfig,
    /// Class declarations.
    pub classes: Vec<ClassDef>,
}

/// `[store]` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// redb database file.
    pub path: Option<PathBuf>,
}

/// `[seed]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeedConfig {
    pub flush_on_create: bool,
    pub inline_references: bool,
    /// Commit seeded entities without `--commit`.
    pub commit: bool,
}

impl Default for SeedConfig {
    fn default() -> Self {
        let options = SeedOptions::default();
        Self {
            flush_on_create: options.flush_on_create,
            inline_references: options.inline_references,
            commit: false,
        }
    }
}

impl SeedgraphConfig {
    /// Load the config at `path`, or defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| SeedError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Parse config text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| SeedError::Parse {
            format: "TOML".to_string(),
            message: e.to_string(),
        })
    }

    /// Seeding options from the `[seed]` section.
    #[must_use]
    pub fn seed_options(&self) -> SeedOptions {
        SeedOptions {
            flush_on_create: self.seed.flush_on_create,
            inline_references: self.seed.inline_references,
        }
    }

    /// Database path: the override, else `[store] path`, else the default.
    #[must_use]
    pub fn database_path(&self, database: Option<&Path>) -> PathBuf {
        database
            .map(Path::to_path_buf)
            .or_else(|| self.store.path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE))
    }

    /// A registry whose catalog holds every declared class, with `models`
    /// registered (or everything, when `models` is empty).
    pub fn build_registry(&self) -> Result<ClassRegistry> {
        let mut registry = ClassRegistry::new();
        let mut seen = BTreeSet::new();

        for def in &self.classes {
            let class = def.clone().into_class();
            if !seen.insert(class.path()) {
                return Err(SeedError::class_resolution(
                    class.path(),
                    "class is declared more than once",
                ));
            }
            registry.declare(class);
        }

        if self.models.is_empty() {
            for class in registry.catalog() {
                registry.register_class(class);
            }
        } else {
            for target in &self.models {
                registry.register(target)?;
            }
        }

        debug!(
            declared = self.classes.len(),
            registered = registry.registered_classes().len(),
            "built class registry"
        );
        Ok(registry)
    }
}
