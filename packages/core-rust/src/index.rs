//! The route and procedure index: uniqueness checks at registration, then
//! lock-free lookups for the lifetime of the process.

use std::collections::{BTreeMap, HashMap, HashSet};

use http::Method;
use tracing::debug;

use crate::error::RegistryError;
use crate::path::{compare_static_priority, PathPattern};
use crate::procedure::Procedure;
use crate::route::{Route, ROUTE_METHODS};

/// Anything that can be registered.
#[derive(Debug, Clone)]
pub enum Entry {
    Route(Route),
    Procedure(Procedure),
}

impl From<Route> for Entry {
    fn from(route: Route) -> Self {
        Self::Route(route)
    }
}

impl From<Procedure> for Entry {
    fn from(procedure: Procedure) -> Self {
        Self::Procedure(procedure)
    }
}

#[derive(Debug)]
struct IndexedRoute {
    route: Route,
    pattern: PathPattern,
}

/// Result of resolving a REST request against the index.
#[derive(Debug)]
pub enum Resolution<'a> {
    Matched(ResolvedRoute<'a>),
    /// No route of a served method matches the path.
    NotFound,
    /// The verb is not one routes are served for.
    UnsupportedMethod,
}

/// A matched route and its decoded path captures.
#[derive(Debug)]
pub struct ResolvedRoute<'a> {
    pub route: &'a Route,
    pub params: BTreeMap<String, String>,
}

/// Registered routes (per method, in static-priority order) and procedures.
#[derive(Debug, Default)]
pub struct RelayIndex {
    routes: HashMap<Method, Vec<IndexedRoute>>,
    procedures: HashMap<String, Procedure>,
}

impl RelayIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from one batch of entries.
    ///
    /// # Errors
    ///
    /// See [`RelayIndex::register`].
    pub fn with<I, E>(entries: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = E>,
        E: Into<Entry>,
    {
        let mut index = Self::new();
        index.register(entries)?;
        Ok(index)
    }

    /// Registers a batch of entries.
    ///
    /// The batch is checked as a whole before anything is inserted, so a
    /// failed registration leaves the index unchanged.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::UnsupportedMethod`] for a route verb other than
    ///   GET, POST, PUT, PATCH, or DELETE.
    /// - [`RegistryError::InvalidPath`] for a malformed path.
    /// - [`RegistryError::DuplicateRoute`] / [`RegistryError::DuplicateProcedure`]
    ///   when an identity is already taken, in the index or the batch.
    pub fn register<I, E>(&mut self, entries: I) -> Result<&mut Self, RegistryError>
    where
        I: IntoIterator<Item = E>,
        E: Into<Entry>,
    {
        let mut routes = Vec::new();
        let mut procedures = Vec::new();
        let mut route_keys = HashSet::new();
        let mut procedure_keys = HashSet::new();

        for entry in entries {
            match entry.into() {
                Entry::Route(route) => {
                    if !ROUTE_METHODS.contains(route.method()) {
                        return Err(RegistryError::UnsupportedMethod {
                            method: route.method().to_string(),
                        });
                    }
                    let pattern = route.pattern()?;
                    let key = (route.method().clone(), route.path().to_string());
                    if self.contains_route(route.method(), route.path()) || !route_keys.insert(key) {
                        return Err(RegistryError::DuplicateRoute {
                            method: route.method().to_string(),
                            path: route.path().to_string(),
                        });
                    }
                    routes.push(IndexedRoute { route, pattern });
                }
                Entry::Procedure(procedure) => {
                    let name = procedure.name().to_string();
                    if self.procedures.contains_key(&name) || !procedure_keys.insert(name.clone()) {
                        return Err(RegistryError::DuplicateProcedure { method: name });
                    }
                    procedures.push(procedure);
                }
            }
        }

        for indexed in routes {
            debug!(method = %indexed.route.method(), path = indexed.route.path(), "route registered");
            self.routes
                .entry(indexed.route.method().clone())
                .or_default()
                .push(indexed);
        }
        for list in self.routes.values_mut() {
            list.sort_by(|a, b| compare_static_priority(a.route.path(), b.route.path()));
        }
        for procedure in procedures {
            debug!(method = procedure.name(), "procedure registered");
            self.procedures.insert(procedure.name().to_string(), procedure);
        }

        Ok(self)
    }

    fn contains_route(&self, method: &Method, path: &str) -> bool {
        self.routes
            .get(method)
            .is_some_and(|list| list.iter().any(|r| r.route.path() == path))
    }

    /// Finds the first route, in priority order, matching `method` and `path`.
    /// `HEAD` is resolved against `GET` routes.
    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> Resolution<'_> {
        let method = if method == Method::HEAD { &Method::GET } else { method };
        if !ROUTE_METHODS.contains(method) {
            return Resolution::UnsupportedMethod;
        }

        let Some(list) = self.routes.get(method) else {
            return Resolution::NotFound;
        };
        for indexed in list {
            if let Some(params) = indexed.pattern.matches(path) {
                return Resolution::Matched(ResolvedRoute {
                    route: &indexed.route,
                    params,
                });
            }
        }
        Resolution::NotFound
    }

    /// Exact-name procedure lookup.
    #[must_use]
    pub fn procedure(&self, name: &str) -> Option<&Procedure> {
        self.procedures.get(name)
    }

    /// Routes registered for `method`, in match order.
    pub fn routes(&self, method: &Method) -> impl Iterator<Item = &Route> {
        self.routes
            .get(method)
            .into_iter()
            .flat_map(|list| list.iter().map(|indexed| &indexed.route))
    }

    pub fn procedures(&self) -> impl Iterator<Item = &Procedure> {
        self.procedures.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum::<usize>() + self.procedures.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn matched_path(index: &RelayIndex, method: &Method, path: &str) -> Option<String> {
        match index.resolve(method, path) {
            Resolution::Matched(resolved) => Some(resolved.route.path().to_string()),
            _ => None,
        }
    }

    #[test]
    fn literal_route_wins_regardless_of_registration_order() {
        let index = RelayIndex::with([Route::get("/users/:id"), Route::get("/users/me")]).unwrap();
        assert_eq!(matched_path(&index, &Method::GET, "/users/me").as_deref(), Some("/users/me"));
        assert_eq!(matched_path(&index, &Method::GET, "/users/42").as_deref(), Some("/users/:id"));

        let reversed = RelayIndex::with([Route::get("/users/me"), Route::get("/users/:id")]).unwrap();
        assert_eq!(
            matched_path(&reversed, &Method::GET, "/users/me").as_deref(),
            Some("/users/me")
        );
    }

    #[test]
    fn resolve_returns_decoded_params() {
        let index = RelayIndex::with([Route::get("/users/:id")]).unwrap();
        let Resolution::Matched(resolved) = index.resolve(&Method::GET, "/users/a%2Fb") else {
            panic!("expected a match");
        };
        assert_eq!(resolved.params.get("id").map(String::as_str), Some("a/b"));
    }

    #[test]
    fn head_resolves_against_get() {
        let index = RelayIndex::with([Route::get("/health")]).unwrap();
        assert_eq!(matched_path(&index, &Method::HEAD, "/health").as_deref(), Some("/health"));
    }

    #[test]
    fn unknown_verb_and_unmatched_path() {
        let index = RelayIndex::with([Route::get("/health")]).unwrap();
        assert!(matches!(index.resolve(&Method::OPTIONS, "/health"), Resolution::UnsupportedMethod));
        assert!(matches!(index.resolve(&Method::GET, "/missing"), Resolution::NotFound));
        assert!(matches!(index.resolve(&Method::POST, "/health"), Resolution::NotFound));
    }

    #[test]
    fn duplicate_route_is_rejected() {
        let mut index = RelayIndex::with([Route::post("/users")]).unwrap();
        let err = index.register([Route::post("/users")]).unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateRoute {
                method: "POST".to_string(),
                path: "/users".to_string(),
            }
        );
        // Same path, other method is fine.
        assert!(index.register([Route::get("/users")]).is_ok());
    }

    #[test]
    fn duplicate_within_batch_leaves_index_untouched() {
        let mut index = RelayIndex::new();
        let result = index.register([
            Entry::from(Procedure::method("numbers:add")),
            Entry::from(Route::get("/a")),
            Entry::from(Procedure::method("numbers:add")),
        ]);
        assert!(matches!(result, Err(RegistryError::DuplicateProcedure { .. })));
        assert!(index.is_empty());
    }

    #[test]
    fn head_and_unknown_route_methods_cannot_be_registered() {
        let err = RelayIndex::with([Route::new(Method::HEAD, "/x")]).unwrap_err();
        assert!(matches!(err, RegistryError::UnsupportedMethod { .. }));
    }

    #[test]
    fn procedures_use_exact_lookup() {
        let index = RelayIndex::with([Procedure::method("numbers:add")]).unwrap();
        assert!(index.procedure("numbers:add").is_some());
        assert!(index.procedure("numbers").is_none());
        assert_eq!(index.len(), 1);
    }
}
