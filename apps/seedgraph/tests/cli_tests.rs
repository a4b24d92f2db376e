//! Tests for the CLI commands against real files and databases.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use clap::Parser;
use seedgraph::cli::{
    Cli, Commands, Output, SeedFlags, cmd_init, cmd_list, cmd_seed, cmd_validate, entity_to_json,
    execute,
};
use seedgraph::config::SeedgraphConfig;
use seedgraph_core::{ClassRegistry, ClassResolver, MemoryStore, RedbStore, SeedError, Seeder};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

const CONFIG: &str = r#"
[[classes]]
module = "geo"
name = "Country"
fields = ["name", "short"]
primary_key = "id"

[[classes]]
module = "geo"
name = "Airport"
fields = ["icao", "name", "country"]
primary_key = "id"
"#;

const COUNTRIES: &str = "target_class: Country\ndata:\n  - name: United Kingdom\n    short: UK\n  - name: Belgium\n    short: BE\n";

const AIRPORTS: &str = r#"{"target_class": "Airport", "data": [
    {"icao": "EGLL", "name": "Heathrow", "!refs": {"country": {"target_class": "Country", "criteria": {"short": "UK"}}}},
    {"icao": "EBBR", "name": "Brussels", "country": "!Country?short=BE"}
]}"#;

struct Workspace {
    dir: TempDir,
    config: SeedgraphConfig,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("countries.yaml"), COUNTRIES).unwrap();
        std::fs::write(dir.path().join("airports.json"), AIRPORTS).unwrap();
        Self {
            dir,
            config: SeedgraphConfig::from_toml_str(CONFIG).unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn db(&self) -> PathBuf {
        self.path("seed.redb")
    }

    fn seed_files(&self) -> Vec<PathBuf> {
        vec![self.path("countries.yaml"), self.path("airports.json")]
    }

    fn stored(&self, class: &str) -> usize {
        let registry = Rc::new(self.config.build_registry().unwrap());
        let class = registry.resolve(class).unwrap();
        let classes: Rc<dyn ClassResolver> = registry;
        let mut store = RedbStore::open(self.db(), classes).unwrap();
        store.list(&class).unwrap().len()
    }
}

fn quiet() -> Output {
    Output {
        quiet: true,
        ..Output::default()
    }
}

// =============================================================================
// SEED COMMAND
// =============================================================================

#[test]
fn test_seed_with_commit_persists() {
    let ws = Workspace::new();
    let flags = SeedFlags {
        commit: true,
        ..SeedFlags::default()
    };

    cmd_seed(&ws.db(), &ws.config, &ws.seed_files(), flags, quiet()).unwrap();

    assert_eq!(ws.stored("Country"), 2);
    assert_eq!(ws.stored("Airport"), 2);
}

#[test]
fn test_seed_without_commit_is_a_dry_run() {
    let ws = Workspace::new();

    cmd_seed(
        &ws.db(),
        &ws.config,
        &ws.seed_files(),
        SeedFlags::default(),
        quiet(),
    )
    .unwrap();

    assert_eq!(ws.stored("Country"), 0);
}

#[test]
fn test_seed_respects_commit_in_config() {
    let mut ws = Workspace::new();
    ws.config.seed.commit = true;

    cmd_seed(
        &ws.db(),
        &ws.config,
        &ws.seed_files(),
        SeedFlags::default(),
        quiet(),
    )
    .unwrap();

    assert_eq!(ws.stored("Country"), 2);
}

#[test]
fn test_seed_failure_commits_nothing() {
    let ws = Workspace::new();
    let flags = SeedFlags {
        commit: true,
        ..SeedFlags::default()
    };

    // Airports before countries: the first reference cannot be resolved.
    let files = vec![ws.path("airports.json"), ws.path("countries.yaml")];
    let err = cmd_seed(&ws.db(), &ws.config, &files, flags, quiet()).unwrap_err();

    assert!(matches!(err, SeedError::NoMatch { .. }));
    assert_eq!(ws.stored("Country"), 0);
    assert_eq!(ws.stored("Airport"), 0);
}

#[test]
fn test_later_invocation_references_committed_rows() {
    let ws = Workspace::new();
    let flags = SeedFlags {
        commit: true,
        ..SeedFlags::default()
    };

    cmd_seed(&ws.db(), &ws.config, &[ws.path("countries.yaml")], flags, quiet()).unwrap();
    cmd_seed(&ws.db(), &ws.config, &[ws.path("airports.json")], flags, quiet()).unwrap();

    assert_eq!(ws.stored("Airport"), 2);
}

#[test]
fn test_seed_missing_file_is_an_io_error() {
    let ws = Workspace::new();
    let err = cmd_seed(
        &ws.db(),
        &ws.config,
        &[ws.path("nope.yaml")],
        SeedFlags::default(),
        quiet(),
    )
    .unwrap_err();

    assert!(matches!(err, SeedError::Io(_)));
}

// =============================================================================
// OTHER COMMANDS
// =============================================================================

#[test]
fn test_validate_accepts_good_and_rejects_bad() {
    let ws = Workspace::new();
    cmd_validate(&ws.config, &ws.seed_files(), quiet()).unwrap();

    let bad = ws.path("bad.json");
    std::fs::write(&bad, r#"{"target_class": "Country"}"#).unwrap();
    let err = cmd_validate(&ws.config, &[bad], quiet()).unwrap_err();
    assert!(matches!(err, SeedError::Shape { .. }));
}

#[test]
fn test_validate_builds_nothing() {
    let ws = Workspace::new();
    cmd_validate(&ws.config, &ws.seed_files(), quiet()).unwrap();
    assert!(!ws.db().exists());
}

#[test]
fn test_init_refuses_to_overwrite_without_force() {
    let ws = Workspace::new();
    cmd_init(&ws.db(), false, quiet()).unwrap();
    assert!(ws.db().exists());

    let err = cmd_init(&ws.db(), false, quiet()).unwrap_err();
    assert!(matches!(err, SeedError::Io(_)));

    cmd_init(&ws.db(), true, quiet()).unwrap();
}

#[test]
fn test_init_force_clears_data() {
    let ws = Workspace::new();
    let flags = SeedFlags {
        commit: true,
        ..SeedFlags::default()
    };
    cmd_seed(&ws.db(), &ws.config, &ws.seed_files(), flags, quiet()).unwrap();
    assert_eq!(ws.stored("Country"), 2);

    cmd_init(&ws.db(), true, quiet()).unwrap();
    assert_eq!(ws.stored("Country"), 0);
}

#[test]
fn test_list_unknown_class_fails() {
    let ws = Workspace::new();
    let err = cmd_list(&ws.db(), &ws.config, "Planet", quiet()).unwrap_err();
    assert!(matches!(err, SeedError::ClassResolution { .. }));
}

#[test]
fn test_entity_to_json_shows_links_as_labels() {
    let ws = Workspace::new();
    let registry: ClassRegistry = ws.config.build_registry().unwrap();
    let mut store = MemoryStore::new();

    Seeder::new(&registry, &mut store)
        .load_from_file(ws.path("countries.yaml"))
        .unwrap();
    // A second run resolves against the flushed countries in the store.
    let airports = Seeder::new(&registry, &mut store)
        .load_from_file(ws.path("airports.json"))
        .unwrap();

    let heathrow = entity_to_json(&airports[0]);
    assert_eq!(heathrow["class"], "geo:Airport");
    assert_eq!(heathrow["fields"]["icao"], "EGLL");
    assert_eq!(heathrow["fields"]["country"]["ref"], "geo:Country#1");
}

// =============================================================================
// ARGUMENT PARSING
// =============================================================================

#[test]
fn test_cli_parses_seed_flags() {
    let cli = Cli::try_parse_from([
        "seedgraph",
        "--database",
        "x.redb",
        "seed",
        "a.yaml",
        "b.json",
        "--commit",
        "--by-class",
    ])
    .unwrap();

    assert_eq!(cli.database.as_deref(), Some(Path::new("x.redb")));
    match cli.command {
        Some(Commands::Seed {
            files,
            commit,
            no_flush,
            by_class,
        }) => {
            assert_eq!(files, vec![PathBuf::from("a.yaml"), PathBuf::from("b.json")]);
            assert!(commit);
            assert!(!no_flush);
            assert!(by_class);
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_cli_seed_requires_files() {
    assert!(Cli::try_parse_from(["seedgraph", "seed"]).is_err());
}

#[test]
fn test_execute_uses_config_file() {
    let ws = Workspace::new();
    let config_path = ws.path("seedgraph.toml");
    std::fs::write(&config_path, CONFIG).unwrap();

    let cli = Cli::try_parse_from([
        "seedgraph".to_string(),
        "--quiet".to_string(),
        "--config".to_string(),
        config_path.to_string_lossy().into_owned(),
        "--database".to_string(),
        ws.db().to_string_lossy().into_owned(),
        "seed".to_string(),
        ws.path("countries.yaml").to_string_lossy().into_owned(),
        "--commit".to_string(),
    ])
    .unwrap();
    execute(cli).unwrap();

    assert_eq!(ws.stored("Country"), 2);
}
