//! Tests for loading `seedgraph.toml` from disk.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use seedgraph::config::SeedgraphConfig;
use seedgraph_core::{ClassResolver, SeedError, SeedOptions};
use std::path::PathBuf;
use tempfile::TempDir;

// =============================================================================
// LOADING
// =============================================================================

#[test]
fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = SeedgraphConfig::load(&dir.path().join("seedgraph.toml")).unwrap();

    assert_eq!(config, SeedgraphConfig::default());
    assert_eq!(config.seed_options(), SeedOptions::default());
    assert!(!config.seed.commit);
}

#[test]
fn test_file_is_read() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("seedgraph.toml");
    std::fs::write(
        &path,
        r#"
models = ["geo:Country"]

[store]
path = "countries.redb"

[seed]
commit = true
inline_references = false

[[classes]]
module = "geo"
name = "Country"
fields = ["name"]
primary_key = "code"
"#,
    )
    .unwrap();

    let config = SeedgraphConfig::load(&path).unwrap();
    assert!(config.seed.commit);
    assert!(!config.seed_options().inline_references);
    assert!(config.seed_options().flush_on_create);
    assert_eq!(config.database_path(None), PathBuf::from("countries.redb"));

    let registry = config.build_registry().unwrap();
    let country = registry.resolve("Country").unwrap();
    assert_eq!(country.primary_key(), Some("code"));
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("seedgraph.toml");
    std::fs::write(&path, "models = \"geo\"\n").unwrap();

    let err = SeedgraphConfig::load(&path).unwrap_err();
    assert!(matches!(err, SeedError::Parse { .. }));
}

// =============================================================================
// REGISTRATION
// =============================================================================

#[test]
fn test_unknown_model_is_an_error() {
    let config = SeedgraphConfig::from_toml_str(
        r#"
models = ["weather"]

[[classes]]
module = "geo"
name = "Country"
"#,
    )
    .unwrap();

    let err = config.build_registry().unwrap_err();
    assert!(matches!(err, SeedError::ClassResolution { .. }));
}

#[test]
fn test_module_depth_in_models() {
    let config = SeedgraphConfig::from_toml_str(
        r#"
models = ["geo#1"]

[[classes]]
module = "geo"
name = "Country"

[[classes]]
module = "geo.weather"
name = "Station"

[[classes]]
module = "geo.weather.sensors"
name = "Gauge"
"#,
    )
    .unwrap();

    let registry = config.build_registry().unwrap();
    assert!(registry.is_registered("geo:Country"));
    assert!(registry.is_registered("geo.weather:Station"));
    assert!(!registry.is_registered("geo.weather.sensors:Gauge"));
}
