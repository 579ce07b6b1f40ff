//! Fallback factories for types no registration covers.
//!
//! Overrides are consulted only after exact registrations, open generics and
//! sequences have all failed to produce a call site. The first override
//! whose predicate accepts the requested type wins.

use std::fmt;
use std::sync::Arc;

use crate::error::DiResult;
use crate::instance::{erase, AnyArc, OptionalValue};
use crate::key::ServiceType;
use crate::provider::ResolverContext;
use crate::traits::ResolverCore;

pub type OverridePredicate = Arc<dyn Fn(&ServiceType) -> bool + Send + Sync>;

/// Produces the value for an overridden type, resolving through the scope
/// that requested it.
pub type OverrideFactory = Arc<dyn for<'a> Fn(&ServiceType, &ResolverContext<'a>) -> DiResult<AnyArc> + Send + Sync>;

/// A predicate/factory pair.
///
/// ```
/// use callsite_di::{erase, ServiceCollection, ServiceOverride, Resolver};
/// use std::sync::Arc;
///
/// struct Clock(u64);
///
/// let mut services = ServiceCollection::new();
/// services.add_override(ServiceOverride::new(
///     |t| t.is::<Clock>(),
///     |_, _| Ok(erase(Arc::new(Clock(7)))),
/// ));
///
/// let provider = services.build().unwrap();
/// assert_eq!(provider.get_required::<Clock>().0, 7);
/// ```
#[derive(Clone)]
pub struct ServiceOverride {
    predicate: OverridePredicate,
    factory: OverrideFactory,
}

impl ServiceOverride {
    pub fn new<P, F>(predicate: P, factory: F) -> Self
    where
        P: Fn(&ServiceType) -> bool + Send + Sync + 'static,
        F: for<'a> Fn(&ServiceType, &ResolverContext<'a>) -> DiResult<AnyArc> + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            factory: Arc::new(factory),
        }
    }

    /// The built-in `Optional<T>` override: resolves `T` through the
    /// current scope and wraps presence or absence.
    pub fn optional() -> Self {
        Self::new(
            |service_type| service_type.optional_inner().is_some(),
            |service_type, resolver| {
                let inner = match service_type.optional_inner() {
                    Some(inner) => resolver.resolve(inner)?,
                    None => None,
                };
                Ok(erase(Arc::new(OptionalValue(inner))))
            },
        )
    }

    pub(crate) fn matches(&self, service_type: &ServiceType) -> bool {
        (self.predicate)(service_type)
    }

    pub(crate) fn factory(&self) -> &OverrideFactory {
        &self.factory
    }
}

impl fmt::Debug for ServiceOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServiceOverride")
    }
}
