//! Mirror registry.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;

use super::builtin::UrlMirror;
use super::types::Mirror;

/// Errors building a registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No mirrors were supplied.
    #[error("mirror registry is empty")]
    Empty,

    /// Two mirrors share a name; names key the health tracker.
    #[error("duplicate mirror name: {0}")]
    DuplicateName(String),
}

/// Immutable, ordered list of mirrors.
///
/// Registry order is the tie-break order when two mirrors have equal
/// health scores.
#[derive(Clone)]
pub struct MirrorRegistry {
    mirrors: Vec<Arc<dyn Mirror>>,
}

impl std::fmt::Debug for MirrorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.mirrors.iter().map(|m| m.name().to_string()))
            .finish()
    }
}

impl MirrorRegistry {
    /// Creates a registry, rejecting empty lists and duplicate names.
    pub fn new(mirrors: Vec<Arc<dyn Mirror>>) -> Result<Self, RegistryError> {
        if mirrors.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut seen = HashSet::new();
        for mirror in &mirrors {
            if !seen.insert(mirror.name().to_string()) {
                return Err(RegistryError::DuplicateName(mirror.name().to_string()));
            }
        }

        Ok(Self { mirrors })
    }

    /// The built-in public mirrors.
    pub fn builtin() -> Self {
        Self {
            mirrors: UrlMirror::defaults()
                .into_iter()
                .map(|m| Arc::new(m) as Arc<dyn Mirror>)
                .collect(),
        }
    }

    /// Iterates mirrors in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Mirror>> {
        self.mirrors.iter()
    }

    /// Looks up a mirror by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Mirror>> {
        self.mirrors.iter().find(|m| m.name() == name)
    }

    /// Mirror names in registry order.
    pub fn names(&self) -> Vec<String> {
        self.mirrors.iter().map(|m| m.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }
}

impl Default for MirrorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
