//! Resolver context handed to factories and overrides.

use std::sync::Arc;

use super::{Engine, Scope};
use crate::error::DiResult;
use crate::instance::{AnyArc, Disposer};
use crate::key::ServiceType;
use crate::traits::{Resolver, ResolverCore};

/// Context passed to factory functions for resolving dependencies.
///
/// Resolves against the scope that requested the service being built, and
/// against the same compiled graph, so a factory never observes a
/// half-applied rebuild.
///
/// # Examples
///
/// ```
/// use callsite_di::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Database {
///     url: "postgres://localhost".to_string()
/// });
/// services.add_transient_factory::<UserService, _>(|resolver| {
///     UserService {
///         db: resolver.get_required::<Database>(),
///     }
/// });
///
/// let provider = services.build().unwrap();
/// assert_eq!(provider.get_required::<UserService>().db.url, "postgres://localhost");
/// ```
pub struct ResolverContext<'a> {
    scope: &'a Scope,
    engine: &'a Arc<Engine>,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(scope: &'a Scope, engine: &'a Arc<Engine>) -> Self {
        Self { scope, engine }
    }

    /// The scope this resolution runs in.
    pub fn scope(&self) -> &Scope {
        self.scope
    }
}

impl ResolverCore for ResolverContext<'_> {
    fn resolve(&self, service_type: &ServiceType) -> DiResult<Option<AnyArc>> {
        self.scope.resolve_with(self.engine, service_type)
    }

    fn push_disposer(&self, disposer: Disposer) -> DiResult<()> {
        self.scope.push_disposer(disposer)
    }
}

impl Resolver for ResolverContext<'_> {}
