//! Named declarations shared by the server and the client.
//!
//! The server looks declarations up to attach actions and handlers; the
//! client binds the same catalog into callables.

use std::collections::BTreeMap;

use http::Method;

use crate::error::RegistryError;
use crate::index::Entry;
use crate::procedure::Procedure;
use crate::route::Route;

/// An immutable map from client-facing names (`users.create`) to declarations.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: BTreeMap<String, Entry>,
}

impl Catalog {
    #[must_use]
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    /// The route declared for `(method, path)`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownDeclaration`] when no such route exists.
    pub fn route(&self, method: &Method, path: &str) -> Result<Route, RegistryError> {
        self.entries
            .values()
            .find_map(|entry| match entry {
                Entry::Route(route) if route.method() == method && route.path() == path => Some(route.clone()),
                _ => None,
            })
            .ok_or_else(|| RegistryError::UnknownDeclaration {
                key: format!("{method} {path}"),
            })
    }

    /// The procedure declared under method name `name`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownDeclaration`] when no such procedure exists.
    pub fn procedure(&self, name: &str) -> Result<Procedure, RegistryError> {
        self.entries
            .values()
            .find_map(|entry| match entry {
                Entry::Procedure(procedure) if procedure.name() == name => Some(procedure.clone()),
                _ => None,
            })
            .ok_or_else(|| RegistryError::UnknownDeclaration { key: name.to_string() })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collects named declarations; duplicates are reported by [`CatalogBuilder::build`].
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    entries: Vec<(String, Entry)>,
}

impl CatalogBuilder {
    #[must_use]
    pub fn route(mut self, name: impl Into<String>, route: Route) -> Self {
        self.entries.push((name.into(), Entry::Route(route)));
        self
    }

    #[must_use]
    pub fn procedure(mut self, name: impl Into<String>, procedure: Procedure) -> Self {
        self.entries.push((name.into(), Entry::Procedure(procedure)));
        self
    }

    /// # Errors
    ///
    /// [`RegistryError::DuplicateName`] for a repeated name, and
    /// [`RegistryError::DuplicateRoute`] / [`RegistryError::DuplicateProcedure`]
    /// when two names point at the same identity.
    pub fn build(self) -> Result<Catalog, RegistryError> {
        let mut entries = BTreeMap::new();
        for (name, entry) in self.entries {
            let clash = entries.values().find_map(|existing: &Entry| match (existing, &entry) {
                (Entry::Route(a), Entry::Route(b)) if a.method() == b.method() && a.path() == b.path() => {
                    Some(RegistryError::DuplicateRoute {
                        method: b.method().to_string(),
                        path: b.path().to_string(),
                    })
                }
                (Entry::Procedure(a), Entry::Procedure(b)) if a.name() == b.name() => {
                    Some(RegistryError::DuplicateProcedure {
                        method: b.name().to_string(),
                    })
                }
                _ => None,
            });
            if let Some(err) = clash {
                return Err(err);
            }
            if entries.contains_key(&name) {
                return Err(RegistryError::DuplicateName { name });
            }
            entries.insert(name, entry);
        }
        Ok(Catalog { entries })
    }
}
