//! Service lifetime definitions.

use crate::call_site::CacheLocation;

/// Service lifetimes controlling instance caching behavior.
///
/// # Examples
///
/// ```rust
/// use callsite_di::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct Repository { db_url: String }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Database { url: "postgres://localhost".to_string() });
/// services.add_scoped_factory::<Repository, _>(|r| {
///     let db = r.get_required::<Database>();
///     Repository { db_url: db.url.clone() }
/// });
///
/// let provider = services.build().unwrap();
/// let scope1 = provider.create_scope().unwrap();
/// let scope2 = provider.create_scope().unwrap();
///
/// let repo1a = scope1.get_required::<Repository>();
/// let repo1b = scope1.get_required::<Repository>();
/// let repo2 = scope2.get_required::<Repository>();
/// assert!(Arc::ptr_eq(&repo1a, &repo1b));
/// assert!(!Arc::ptr_eq(&repo1a, &repo2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// One instance per container, shared by every scope.
    Singleton,
    /// One instance per scope, disposed with that scope.
    Scoped,
    /// A fresh instance per resolution. Disposable transients are still
    /// tracked by the scope that created them.
    Transient,
}

impl Lifetime {
    /// Where results of a call site with this lifetime are cached.
    pub(crate) fn cache_location(self) -> CacheLocation {
        match self {
            Lifetime::Singleton => CacheLocation::Root,
            Lifetime::Scoped => CacheLocation::Scope,
            Lifetime::Transient => CacheLocation::Dispose,
        }
    }
}

impl std::fmt::Display for Lifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Lifetime::Singleton => "Singleton",
            Lifetime::Scoped => "Scoped",
            Lifetime::Transient => "Transient",
        };
        f.write_str(name)
    }
}
