//! # redb Store Tests
//!
//! Durability, identity and transaction behavior of the disk-backed store.

use seedgraph_core::{
    ClassDef, ClassRegistry, ClassResolver, Criteria, EntityRef, EntityStore, FieldValue, RedbStore,
    SeedError, Seeder,
};
use serde_json::json;
use std::path::Path;
use std::rc::Rc;
use tempfile::TempDir;

fn registry() -> Rc<ClassRegistry> {
    let registry = ClassRegistry::with_catalog([
        ClassDef::new("geo", "Country")
            .with_fields(["name", "short"])
            .with_primary_key("id")
            .into_class(),
        ClassDef::new("geo", "Airport")
            .with_fields(["icao", "country"])
            .with_primary_key("id")
            .into_class(),
        ClassDef::new("notes", "Note").with_field("text").into_class(),
    ]);
    registry.register("geo").expect("register");
    registry.register("notes").expect("register");
    Rc::new(registry)
}

fn open(path: &Path, registry: &Rc<ClassRegistry>) -> RedbStore {
    let classes: Rc<dyn ClassResolver> = registry.clone();
    RedbStore::open(path, classes).expect("open store")
}

const HEATHROW: &str = r#"[
    {"target_class": "Country", "data": [{"name": "United Kingdom", "short": "UK"}, {"short": "BE"}]},
    {"target_class": "Airport", "data": {"icao": "EGLL", "!refs": {
        "country": {"target_class": "Country", "criteria": {"short": "UK"}}
    }}}
]"#;

#[test]
fn committed_rows_survive_reopen() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("seed.redb");
    let registry = registry();

    {
        let mut store = open(&path, &registry);
        Seeder::new(&*registry, &mut store)
            .load_from_json_str(HEATHROW)
            .expect("seed");
        store.commit().expect("commit");
        assert_eq!(store.count().expect("count"), 3);
    }

    let mut store = open(&path, &registry);
    let airport_class = registry.resolve("Airport").expect("class");
    let airports = store.list(&airport_class).expect("list");
    assert_eq!(airports.len(), 1);

    let Some(FieldValue::Entity(country)) = airports[0].get("country") else {
        unreachable!("country link was not restored");
    };
    assert_eq!(country.get("short"), Some(json!("UK").into()));
    assert_eq!(country.get("id"), Some(json!(1).into()));
}

#[test]
fn loaded_rows_keep_their_identity() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("seed.redb");
    let registry = registry();

    {
        let mut store = open(&path, &registry);
        Seeder::new(&*registry, &mut store)
            .load_from_json_str(HEATHROW)
            .expect("seed");
        store.commit().expect("commit");
    }

    let mut store = open(&path, &registry);
    let country_class = registry.resolve("Country").expect("class");
    let airport_class = registry.resolve("Airport").expect("class");

    let airports = store.list(&airport_class).expect("list");
    let mut criteria = Criteria::new();
    criteria.insert("short".to_string(), json!("UK"));
    let found = store.find(&country_class, &criteria).expect("find");

    assert_eq!(found.len(), 1);
    assert_eq!(airports[0].get("country"), Some(FieldValue::Entity(found[0].clone())));
}

#[test]
fn later_runs_reference_committed_rows() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("seed.redb");
    let registry = registry();

    {
        let mut store = open(&path, &registry);
        Seeder::new(&*registry, &mut store)
            .load_from_json_str(r#"{"target_class": "Country", "data": {"short": "NL"}}"#)
            .expect("seed");
        store.commit().expect("commit");
    }

    let mut store = open(&path, &registry);
    let entities = Seeder::new(&*registry, &mut store)
        .load_from_json_str(
            r#"[
                {"target_class": "Country", "data": {"short": "FR"}},
                {"target_class": "Airport", "data": {"icao": "EHAM", "country": "!Country?short=NL"}}
            ]"#,
        )
        .expect("seed");

    // Keys continue from the committed sequence.
    assert_eq!(entities[0].get("id"), Some(json!(2).into()));
    let Some(FieldValue::Entity(country)) = entities[1].get("country") else {
        unreachable!("country is not a link");
    };
    assert_eq!(country.get("id"), Some(json!(1).into()));
}

#[test]
fn rollback_discards_flushed_rows() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("seed.redb");
    let registry = registry();
    let mut store = open(&path, &registry);

    Seeder::new(&*registry, &mut store)
        .load_from_json_str(HEATHROW)
        .expect("seed");
    store.rollback().expect("rollback");
    store.commit().expect("commit");

    assert_eq!(store.count().expect("count"), 0);
    let country_class = registry.resolve("Country").expect("class");
    assert!(store.list(&country_class).expect("list").is_empty());
}

#[test]
fn duplicate_explicit_keys_are_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("seed.redb");
    let registry = registry();
    let mut store = open(&path, &registry);

    let err = Seeder::new(&*registry, &mut store)
        .load_from_json_str(
            r#"{"target_class": "Country", "data": [{"id": 7, "short": "UK"}, {"id": 7, "short": "BE"}]}"#,
        )
        .expect_err("should fail");
    assert!(matches!(err, SeedError::Store { .. }));
}

#[test]
fn classes_without_primary_key_cannot_be_flushed() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("seed.redb");
    let registry = registry();
    let mut store = open(&path, &registry);

    let err = Seeder::new(&*registry, &mut store)
        .load_from_json_str(r#"{"target_class": "Note", "data": {"text": "hello"}}"#)
        .expect_err("should fail");
    assert!(matches!(err, SeedError::Store { .. }));
}

#[test]
fn failed_flush_keeps_the_rest_staged() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("seed.redb");
    let registry = registry();
    let country_class = registry.resolve("Country").expect("class");
    let mut store = open(&path, &registry);

    let countries: Vec<EntityRef> = [(Some(7), "UK"), (Some(7), "BE"), (None, "NL")]
        .into_iter()
        .map(|(id, short)| {
            let entity = EntityRef::construct(&country_class);
            if let Some(id) = id {
                entity.set("id", json!(id).into()).expect("set");
            }
            entity.set("short", json!(short).into()).expect("set");
            entity
        })
        .collect();
    for country in &countries {
        store.add(country).expect("add");
    }

    let err = store.flush().expect_err("duplicate key");
    assert!(matches!(err, SeedError::Store { .. }));
    assert_eq!(store.pending(), 2);
    assert_eq!(store.list(&country_class).expect("list"), vec![countries[0].clone()]);

    store.rollback().expect("rollback");
    assert_eq!(store.pending(), 0);
    assert!(store.list(&country_class).expect("list").is_empty());
}

#[test]
fn long_link_chains_reload() {
    const PEOPLE: u64 = 20_000;

    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("seed.redb");
    let registry = ClassRegistry::with_catalog([ClassDef::new("people", "Person")
        .with_fields(["name", "manager"])
        .with_primary_key("id")
        .into_class()]);
    registry.register("people").expect("register");
    let registry = Rc::new(registry);
    let person_class = registry.resolve("Person").expect("class");

    {
        let mut store = open(&path, &registry);
        let mut manager: Option<EntityRef> = None;
        for n in 1..=PEOPLE {
            let person = EntityRef::construct(&person_class);
            person.set("id", json!(n).into()).expect("set");
            person.set("name", json!(format!("person-{}", n)).into()).expect("set");
            if let Some(manager) = manager.take() {
                person.set("manager", FieldValue::Entity(manager)).expect("set");
            }
            store.add(&person).expect("add");
            manager = Some(person);
        }
        store.commit().expect("commit");
    }

    // Rows come back in key order ("1", "10", "100", ...), so most rows
    // reach a manager that is not loaded yet.
    let mut store = open(&path, &registry);
    let people = store.list(&person_class).expect("list");
    assert_eq!(people.len() as u64, PEOPLE);

    let mut criteria = Criteria::new();
    criteria.insert("name".to_string(), json!(format!("person-{}", PEOPLE)));
    let found = store.find(&person_class, &criteria).expect("find");
    assert_eq!(found.len(), 1);

    let mut steps = 0;
    let mut current = found[0].clone();
    while let Some(FieldValue::Entity(manager)) = current.get("manager") {
        current = manager;
        steps += 1;
    }
    assert_eq!(steps, PEOPLE - 1);
    assert_eq!(current.get("name"), Some(json!("person-1").into()));
}
