//! Compiled resolution graph.
//!
//! A [`CallSite`] describes how to produce one service: which registration
//! wins, which constructor runs, which call sites feed its parameters and
//! where its result is cached. Call sites are built lazily by the
//! [`CallSiteFactory`](factory::CallSiteFactory) and executed by the
//! [`runtime`] module against a scope.

pub(crate) mod chain;
pub(crate) mod factory;
pub(crate) mod runtime;

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::activation::Constructor;
use crate::descriptors::FactoryFn;
use crate::instance::AnyArc;
use crate::key::ServiceType;
use crate::lifetime::Lifetime;
use crate::overrides::OverrideFactory;

/// Where the result of a call site lives.
///
/// Ordered from most to least shared; combining two locations keeps the
/// less shared one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CacheLocation {
    /// Once per container, memoised on the call site.
    Root,
    /// Once per scope.
    Scope,
    /// Fresh each time, disposer captured by the resolving scope.
    Dispose,
    /// Fresh each time, never captured.
    None,
}

impl CacheLocation {
    pub(crate) fn combine(self, other: CacheLocation) -> CacheLocation {
        self.max(other)
    }
}

/// Identity of a cached result: service type plus registration slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    pub(crate) service_type: ServiceType,
    pub(crate) slot: usize,
}

impl CacheKey {
    pub(crate) fn new(service_type: ServiceType, slot: usize) -> Self {
        Self { service_type, slot }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ResultCache {
    pub(crate) location: CacheLocation,
    pub(crate) key: CacheKey,
}

impl ResultCache {
    pub(crate) fn new(lifetime: Lifetime, service_type: ServiceType, slot: usize) -> Self {
        Self {
            location: lifetime.cache_location(),
            key: CacheKey::new(service_type, slot),
        }
    }

    pub(crate) fn none(service_type: ServiceType) -> Self {
        Self {
            location: CacheLocation::None,
            key: CacheKey::new(service_type, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SelfReference {
    Provider,
    Scope,
}

pub(crate) enum CallSiteKind {
    Constant(AnyArc),
    Factory(FactoryFn),
    Constructor {
        implementation: &'static str,
        constructor: Arc<Constructor>,
        parameters: Vec<Arc<CallSite>>,
    },
    Enumerable {
        items: Vec<Arc<CallSite>>,
    },
    SelfReference(SelfReference),
    Override(OverrideFactory),
}

/// A node of the compiled graph.
pub(crate) struct CallSite {
    pub(crate) service_type: ServiceType,
    pub(crate) cache: ResultCache,
    pub(crate) kind: CallSiteKind,
    /// Memo for `Root` call sites.
    pub(crate) value: OnceCell<AnyArc>,
}

impl CallSite {
    pub(crate) fn new(service_type: ServiceType, cache: ResultCache, kind: CallSiteKind) -> Self {
        Self {
            service_type,
            cache,
            kind,
            value: OnceCell::new(),
        }
    }

    pub(crate) fn location(&self) -> CacheLocation {
        self.cache.location
    }

    pub(crate) fn implementation_name(&self) -> Option<&'static str> {
        match &self.kind {
            CallSiteKind::Constructor { implementation, .. } => Some(*implementation),
            _ => None,
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match &self.kind {
            CallSiteKind::Constant(_) => "Constant",
            CallSiteKind::Factory(_) => "Factory",
            CallSiteKind::Constructor { .. } => "Constructor",
            CallSiteKind::Enumerable { .. } => "Enumerable",
            CallSiteKind::SelfReference(_) => "SelfReference",
            CallSiteKind::Override(_) => "Override",
        }
    }

    /// Direct children in parameter order.
    pub(crate) fn children(&self) -> &[Arc<CallSite>] {
        match &self.kind {
            CallSiteKind::Constructor { parameters, .. } => parameters,
            CallSiteKind::Enumerable { items, .. } => items,
            _ => &[],
        }
    }
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSite")
            .field("service_type", &self.service_type)
            .field("kind", &self.kind_name())
            .field("location", &self.cache.location)
            .field("slot", &self.cache.key.slot)
            .field("children", &self.children().len())
            .finish()
    }
}
