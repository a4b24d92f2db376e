//! # Entity Classes
//!
//! A class is the constructible type behind a `target_class` identifier.
//! Identifiers are either a bare name (`Country`) or a qualified path
//! (`geo.places:Country`); what they map to is decided by a [`ClassResolver`].

use crate::primitives::{MODULE_CLASS_SEPARATOR, MODULE_PATH_SEPARATOR};
use crate::types::{Entity, Result, SeedError};
use std::fmt;
use std::rc::Rc;

/// A constructible entity type.
pub trait EntityClass: fmt::Debug {
    /// Bare class name.
    fn name(&self) -> &str;

    /// Dotted module path the class lives in. Empty for top-level classes.
    fn module(&self) -> &str;

    /// Construct a bare instance with no attribute set.
    fn construct(&self) -> Box<dyn Entity>;

    /// Attribute holding the store-assigned identity, if the class has one.
    fn primary_key(&self) -> Option<&str> {
        None
    }

    /// Qualified path (`module:Name`), or the bare name when there is no module.
    fn path(&self) -> String {
        if self.module().is_empty() {
            self.name().to_string()
        } else {
            format!("{}{}{}", self.module(), MODULE_CLASS_SEPARATOR, self.name())
        }
    }
}

/// Shared handle to a class.
pub type ClassRef = Rc<dyn EntityClass>;

/// True when both handles describe the same class.
#[must_use]
pub fn same_class(a: &ClassRef, b: &ClassRef) -> bool {
    Rc::ptr_eq(a, b) || a.path() == b.path()
}

/// Maps textual class identifiers to classes.
pub trait ClassResolver {
    /// Resolve `identifier` into a class.
    ///
    /// Fails with `SeedError::ClassResolution` when nothing matches.
    fn resolve(&self, identifier: &str) -> Result<ClassRef>;
}

impl<R: ClassResolver + ?Sized> ClassResolver for Rc<R> {
    fn resolve(&self, identifier: &str) -> Result<ClassRef> {
        (**self).resolve(identifier)
    }
}

// =============================================================================
// CLASS PATHS
// =============================================================================

/// A parsed class identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassPath {
    /// `Name`
    Bare(String),
    /// `module.path:Name`
    Qualified { module: String, name: String },
}

impl ClassPath {
    /// Parse an identifier.
    ///
    /// Rejects empty identifiers, empty parts, and more than one `:`.
    pub fn parse(identifier: &str) -> Result<Self> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(SeedError::class_resolution(
                identifier,
                "class identifier is empty",
            ));
        }

        let mut parts = identifier.split(MODULE_CLASS_SEPARATOR);
        let (Some(first), second, None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(SeedError::class_resolution(
                identifier,
                format!("couldn't separate module and class, too many '{MODULE_CLASS_SEPARATOR}' symbols"),
            ));
        };

        match second {
            None => Ok(Self::Bare(first.to_string())),
            Some(name) => {
                let module_ok = !first.is_empty()
                    && first
                        .split(MODULE_PATH_SEPARATOR)
                        .all(|segment| !segment.is_empty());
                if !module_ok || name.is_empty() {
                    return Err(SeedError::class_resolution(
                        identifier,
                        "qualified class path needs both a module and a class name",
                    ));
                }
                Ok(Self::Qualified {
                    module: first.to_string(),
                    name: name.to_string(),
                })
            }
        }
    }

    /// The bare class name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Bare(name) | Self::Qualified { name, .. } => name,
        }
    }
}

impl fmt::Display for ClassPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bare(name) => write!(f, "{}", name),
            Self::Qualified { module, name } => {
                write!(f, "{}{}{}", module, MODULE_CLASS_SEPARATOR, name)
            }
        }
    }
}
