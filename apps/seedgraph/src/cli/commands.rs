//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::config::SeedgraphConfig;
use seedgraph_core::{
    ClassRegistry, ClassResolver, DocumentValidator, EntityRef, EntityStore, FieldValue, RedbStore,
    SeedError, Seeder, group_by_class, read_document,
};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{info, warn};

/// Output settings shared by every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    /// Print JSON instead of text.
    pub json_mode: bool,
    /// Include every entity in the report.
    pub verbose: bool,
    /// Suppress the text report.
    pub quiet: bool,
}

/// Flags of the `seed` command.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeedFlags {
    pub commit: bool,
    pub no_flush: bool,
    pub by_class: bool,
}

/// Validate file path for security.
///
/// Canonicalizes the path (resolving symlinks and "..") and ensures it is a
/// regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, SeedError> {
    let canonical = path.canonicalize().map_err(|e| {
        SeedError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(SeedError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

fn print_json(value: &Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// SEED COMMAND
// =============================================================================

/// Entities seeded from one file.
struct FileReport {
    path: PathBuf,
    entities: Vec<EntityRef>,
}

/// Seed `files` in order into the database.
///
/// Every file is its own run against the same store. The store is committed
/// once all files succeed and `--commit` (or `[seed] commit`) is set, and
/// rolled back otherwise.
pub fn cmd_seed(
    db_path: &Path,
    config: &SeedgraphConfig,
    files: &[PathBuf],
    flags: SeedFlags,
    output: Output,
) -> Result<(), SeedError> {
    let registry = Rc::new(config.build_registry()?);
    let classes: Rc<dyn ClassResolver> = registry.clone();
    let mut store = RedbStore::open(db_path, classes)?;

    let mut options = config.seed_options();
    if flags.no_flush {
        options.flush_on_create = false;
    }

    let mut reports = Vec::with_capacity(files.len());
    for file in files {
        let seeded = validate_file_path(file).and_then(|path| {
            Seeder::new(&*registry, &mut store)
                .with_options(options)
                .load_from_file(&path)
                .map(|entities| FileReport { path, entities })
        });
        match seeded {
            Ok(report) => reports.push(report),
            Err(e) => {
                if let Err(rollback) = store.rollback() {
                    warn!(error = %rollback, "rollback failed");
                }
                return Err(e);
            }
        }
    }

    let commit = flags.commit || config.seed.commit;
    if commit {
        store.commit()?;
        info!(database = %db_path.display(), "committed");
    } else {
        store.rollback()?;
    }

    if output.json_mode {
        let files: Vec<Value> = reports
            .iter()
            .map(|report| {
                let mut entry = json!({
                    "path": report.path.to_string_lossy(),
                    "entities": report.entities.len(),
                });
                if flags.by_class {
                    entry["by_class"] = class_counts(&report.entities);
                }
                if output.verbose {
                    entry["seeded"] =
                        Value::Array(report.entities.iter().map(entity_to_json).collect());
                }
                entry
            })
            .collect();
        print_json(&json!({
            "database": db_path.to_string_lossy(),
            "committed": commit,
            "files": files,
        }));
        return Ok(());
    }

    if output.quiet {
        return Ok(());
    }

    for report in &reports {
        println!(
            "Seeded {} entities from {}",
            report.entities.len(),
            report.path.display()
        );
        if flags.by_class {
            for (class, entities) in group_by_class(&report.entities) {
                println!("  {:<24} {}", class, entities.len());
            }
        }
        if output.verbose {
            for entity in &report.entities {
                println!("  {}", describe(entity));
            }
        }
    }
    if commit {
        println!("Committed to {:?}", db_path);
    } else {
        println!("Dry run: rolled back (use --commit to persist)");
    }

    Ok(())
}

// =============================================================================
// VALIDATE COMMAND
// =============================================================================

/// Validate the shape of each file without building anything.
pub fn cmd_validate(
    config: &SeedgraphConfig,
    files: &[PathBuf],
    output: Output,
) -> Result<(), SeedError> {
    let validator = DocumentValidator::new().inline_references(config.seed.inline_references);

    let mut results = Vec::with_capacity(files.len());
    for file in files {
        let path = validate_file_path(file)?;
        let document = validator.validate(&read_document(&path)?)?;
        results.push((path, document.groups.len(), document.entity_count()));
    }

    if output.json_mode {
        let files: Vec<Value> = results
            .iter()
            .map(|(path, groups, entities)| {
                json!({
                    "path": path.to_string_lossy(),
                    "groups": groups,
                    "entities": entities,
                })
            })
            .collect();
        print_json(&json!({ "valid": true, "files": files }));
        return Ok(());
    }

    if !output.quiet {
        for (path, groups, entities) in &results {
            println!(
                "{}: ok ({} groups, {} entities)",
                path.display(),
                groups,
                entities
            );
        }
    }
    Ok(())
}

// =============================================================================
// CLASSES COMMAND
// =============================================================================

/// List the classes registered by the configuration.
pub fn cmd_classes(config: &SeedgraphConfig, output: Output) -> Result<(), SeedError> {
    let registry = config.build_registry()?;
    let classes = registry.registered_classes();

    if output.json_mode {
        let classes: Vec<Value> = classes
            .iter()
            .map(|class| {
                json!({
                    "path": class.path(),
                    "name": class.name(),
                    "module": class.module(),
                    "fields": class.construct().field_names(),
                    "primary_key": class.primary_key(),
                })
            })
            .collect();
        print_json(&json!({ "classes": classes }));
        return Ok(());
    }

    if classes.is_empty() {
        println!("No classes registered. Declare [[classes]] in the configuration file.");
        return Ok(());
    }

    println!("Registered Classes");
    println!("==================");
    for class in &classes {
        let fields = class.construct().field_names().join(", ");
        match class.primary_key() {
            Some(pk) => println!("{:<24} key={:<8} [{}]", class.path(), pk, fields),
            None => println!("{:<24} {:<12} [{}]", class.path(), "", fields),
        }
    }
    Ok(())
}

// =============================================================================
// LIST COMMAND
// =============================================================================

/// List the committed entities of one class.
pub fn cmd_list(
    db_path: &Path,
    config: &SeedgraphConfig,
    class: &str,
    output: Output,
) -> Result<(), SeedError> {
    let registry = Rc::new(config.build_registry()?);
    let class = registry.resolve(class)?;
    let classes: Rc<dyn ClassResolver> = registry;
    let mut store = RedbStore::open(db_path, classes)?;
    let entities = store.list(&class)?;

    if output.json_mode {
        print_json(&json!({
            "class": class.path(),
            "count": entities.len(),
            "entities": entities.iter().map(entity_to_json).collect::<Vec<_>>(),
        }));
        return Ok(());
    }

    println!("{} ({} stored)", class.path(), entities.len());
    for entity in &entities {
        println!("  {}", describe(entity));
    }
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty database.
pub fn cmd_init(db_path: &Path, force: bool, output: Output) -> Result<(), SeedError> {
    if db_path.exists() {
        if !force {
            return Err(SeedError::Io(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| SeedError::Io(format!("{}: {}", db_path.display(), e)))?;
    }

    let classes: Rc<dyn ClassResolver> = Rc::new(ClassRegistry::new());
    let _store = RedbStore::open(db_path, classes)?;

    if output.json_mode {
        print_json(&json!({ "initialized": db_path.to_string_lossy() }));
    } else if !output.quiet {
        println!("Initialized new database at {:?}", db_path);
    }
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// JSON view of an entity; linked entities appear as their label.
#[must_use]
pub fn entity_to_json(entity: &EntityRef) -> Value {
    let fields: Map<String, Value> = entity
        .fields()
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                FieldValue::Literal(literal) => literal,
                FieldValue::Entity(target) => json!({ "ref": target.label() }),
            };
            (name, value)
        })
        .collect();
    json!({ "class": entity.class_path(), "fields": fields })
}

/// Class path -> entity count.
fn class_counts(entities: &[EntityRef]) -> Value {
    group_by_class(entities)
        .into_iter()
        .map(|(class, entities)| (class, Value::from(entities.len())))
        .collect::<Map<String, Value>>()
        .into()
}

/// One-line text view of an entity.
fn describe(entity: &EntityRef) -> String {
    let fields: Vec<String> = entity
        .fields()
        .into_iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect();
    format!("{} {}", entity.label(), fields.join(" "))
}
