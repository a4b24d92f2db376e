//! # Class Registry
//!
//! The default [`ClassResolver`]. It keeps two collections:
//! - a catalog of every class that *could* be registered, keyed by path
//! - the set of classes that *are* registered and visible by bare name
//!
//! Registration targets are strings:
//! - `"geo"` registers every catalog class of module `geo`
//! - `"geo#1"` also descends one level into submodules (`geo.places`)
//! - `"geo:Country"` registers one class
//!
//! Resolving a qualified path registers the class on first use, so a
//! document may name any catalog class by path without prior registration.

use crate::class::{ClassPath, ClassRef, ClassResolver};
use crate::primitives::{MODULE_CLASS_SEPARATOR, MODULE_DEPTH_SEPARATOR, MODULE_PATH_SEPARATOR};
use crate::types::{Result, SeedError};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::debug;

/// Registry of classes available to seed documents.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    /// Every declared class: path -> class.
    catalog: BTreeMap<String, ClassRef>,
    /// Registered classes: path -> class.
    registered: RefCell<BTreeMap<String, ClassRef>>,
}

impl ClassRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry whose catalog holds `classes`. Nothing is registered.
    #[must_use]
    pub fn with_catalog(classes: impl IntoIterator<Item = ClassRef>) -> Self {
        let mut registry = Self::new();
        for class in classes {
            registry.declare(class);
        }
        registry
    }

    /// Add a class to the catalog without registering it.
    pub fn declare(&mut self, class: ClassRef) {
        self.catalog.insert(class.path(), class);
    }

    /// Register one class directly.
    pub fn register_class(&self, class: ClassRef) -> ClassRef {
        debug!(class = %class.path(), "registering class");
        self.registered
            .borrow_mut()
            .insert(class.path(), Rc::clone(&class));
        class
    }

    /// Register every catalog class of `module`, descending `depth` levels
    /// into its submodules. Returns the classes that were registered.
    pub fn register_module(&self, module: &str, depth: usize) -> Vec<ClassRef> {
        let found: Vec<ClassRef> = self
            .catalog
            .values()
            .filter(|class| module_within(class.module(), module, depth))
            .cloned()
            .collect();

        debug!(module, depth, count = found.len(), "found classes in module");
        for class in &found {
            self.register_class(Rc::clone(class));
        }
        found
    }

    /// Register a module or class named by a target string.
    pub fn register(&self, target: &str) -> Result<Vec<ClassRef>> {
        if !target.contains(MODULE_CLASS_SEPARATOR) {
            let (module, depth) = match target.split_once(MODULE_DEPTH_SEPARATOR) {
                Some((module, depth)) => {
                    let depth = depth.trim().parse::<usize>().map_err(|_| {
                        SeedError::class_resolution(
                            target,
                            format!("invalid module depth '{}'", depth),
                        )
                    })?;
                    (module, depth)
                }
                None => (target, 0),
            };

            let known = self
                .catalog
                .values()
                .any(|class| module_within(class.module(), module, usize::MAX));
            if !known {
                return Err(SeedError::class_resolution(
                    target,
                    format!("no module '{}' declared", module),
                ));
            }
            return Ok(self.register_module(module, depth));
        }

        let path = ClassPath::parse(target)?;
        let class = self.catalog.get(&path.to_string()).ok_or_else(|| {
            let module = match &path {
                ClassPath::Qualified { module, .. } => module.as_str(),
                ClassPath::Bare(_) => "",
            };
            SeedError::class_resolution(
                target,
                format!("no class '{}' in module '{}' found", path.name(), module),
            )
        })?;
        Ok(vec![self.register_class(Rc::clone(class))])
    }

    /// Registered classes, ordered by path.
    #[must_use]
    pub fn registered_classes(&self) -> Vec<ClassRef> {
        self.registered.borrow().values().cloned().collect()
    }

    /// Catalog classes, ordered by path.
    #[must_use]
    pub fn catalog(&self) -> Vec<ClassRef> {
        self.catalog.values().cloned().collect()
    }

    /// True when the class at `path` is registered.
    #[must_use]
    pub fn is_registered(&self, path: &str) -> bool {
        self.registered.borrow().contains_key(path)
    }
}

impl ClassResolver for ClassRegistry {
    fn resolve(&self, identifier: &str) -> Result<ClassRef> {
        match ClassPath::parse(identifier)? {
            ClassPath::Bare(name) => {
                let registered = self.registered.borrow();
                let matches: Vec<&ClassRef> = registered
                    .values()
                    .filter(|class| class.name() == name)
                    .collect();
                match matches.as_slice() {
                    [class] => Ok(Rc::clone(class)),
                    [] => Err(SeedError::class_resolution(
                        identifier,
                        "no registered class found",
                    )),
                    several => Err(SeedError::class_resolution(
                        identifier,
                        format!(
                            "bare name is registered under several paths: {}",
                            several
                                .iter()
                                .map(|class| class.path())
                                .collect::<Vec<_>>()
                                .join(", ")
                        ),
                    )),
                }
            }
            path @ ClassPath::Qualified { .. } => {
                let key = path.to_string();
                if let Some(class) = self.registered.borrow().get(&key) {
                    return Ok(Rc::clone(class));
                }
                match self.catalog.get(&key) {
                    Some(class) => Ok(self.register_class(Rc::clone(class))),
                    None => Err(SeedError::class_resolution(
                        identifier,
                        format!(
                            "no class '{}' in module '{}' found",
                            path.name(),
                            key.split(MODULE_CLASS_SEPARATOR).next().unwrap_or_default()
                        ),
                    )),
                }
            }
        }
    }
}

/// True when `candidate` is `module` or a submodule at most `depth` levels below.
fn module_within(candidate: &str, module: &str, depth: usize) -> bool {
    if candidate == module {
        return true;
    }
    let Some(rest) = candidate
        .strip_prefix(module)
        .and_then(|rest| rest.strip_prefix(MODULE_PATH_SEPARATOR))
    else {
        return false;
    };
    rest.split(MODULE_PATH_SEPARATOR).count() <= depth
}
