//! Diagnostic observers for dependency injection traceability.
//!
//! Observers are registered on the [`ServiceCollection`](crate::ServiceCollection)
//! and called synchronously from the resolution path. With no observers
//! registered the hooks cost a single length check.

use std::sync::Arc;
use std::time::Duration;

use crate::error::DiError;
use crate::key::ServiceType;

/// Hooks into container activity.
///
/// All methods have empty defaults so implementations pick what they need.
///
/// # Examples
///
/// ```
/// use callsite_di::{DiObserver, ServiceCollection, ServiceType};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Counter(AtomicUsize);
///
/// impl DiObserver for Counter {
///     fn resolved(&self, _service: &ServiceType, _duration: Duration) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
/// }
///
/// let counter = Arc::new(Counter::default());
/// let mut services = ServiceCollection::new();
/// services.add_singleton(5u32);
/// services.add_observer(counter.clone());
///
/// let provider = services.build().unwrap();
/// provider.resolve(&ServiceType::of::<u32>()).unwrap();
/// assert_eq!(counter.0.load(Ordering::Relaxed), 1);
/// ```
pub trait DiObserver: Send + Sync {
    /// Before a service is looked up.
    fn resolving(&self, _service: &ServiceType) {}

    /// After a service was produced (or found absent).
    fn resolved(&self, _service: &ServiceType, _duration: Duration) {}

    fn failed(&self, _service: &ServiceType, _error: &DiError) {}

    /// After the container swapped in a freshly compiled engine.
    fn rebuilt(&self, _generation: u64, _registrations: usize) {}

    /// After a scope finished disposing.
    fn disposed(&self, _root: bool, _disposables: usize) {}
}

/// Fan-out over registered observers.
#[derive(Clone, Default)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn DiObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    pub(crate) fn resolving(&self, service: &ServiceType) {
        for o in &self.observers {
            o.resolving(service);
        }
    }

    pub(crate) fn resolved(&self, service: &ServiceType, duration: Duration) {
        for o in &self.observers {
            o.resolved(service, duration);
        }
    }

    pub(crate) fn failed(&self, service: &ServiceType, error: &DiError) {
        for o in &self.observers {
            o.failed(service, error);
        }
    }

    pub(crate) fn rebuilt(&self, generation: u64, registrations: usize) {
        for o in &self.observers {
            o.rebuilt(generation, registrations);
        }
    }

    pub(crate) fn disposed(&self, root: bool, disposables: usize) {
        for o in &self.observers {
            o.disposed(root, disposables);
        }
    }
}

/// Observer that forwards every event to [`tracing`].
///
/// Resolution events go out at `TRACE`, failures at `WARN`, container
/// lifecycle at `DEBUG`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TracingObserver {
    pub fn new() -> Self {
        Self
    }
}

impl DiObserver for TracingObserver {
    fn resolving(&self, service: &ServiceType) {
        tracing::trace!(service = %service, "resolving");
    }

    fn resolved(&self, service: &ServiceType, duration: Duration) {
        tracing::trace!(service = %service, elapsed_us = duration.as_micros() as u64, "resolved");
    }

    fn failed(&self, service: &ServiceType, error: &DiError) {
        tracing::warn!(service = %service, error = %error, "resolution failed");
    }

    fn rebuilt(&self, generation: u64, registrations: usize) {
        tracing::debug!(generation, registrations, "container rebuilt");
    }

    fn disposed(&self, root: bool, disposables: usize) {
        tracing::debug!(root, disposables, "scope disposed");
    }
}
