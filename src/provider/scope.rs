//! Scoped service resolution and lifecycle management.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use super::{Engine, ProviderInner, ServiceProvider};
use crate::call_site::{runtime, CacheKey};
use crate::error::{DiError, DiResult};
use crate::instance::{AnyArc, Disposer, Instance};
use crate::internal::DisposeBag;
use crate::key::ServiceType;
use crate::traits::{Resolver, ResolverCore};

/// Per-key one-shot cells, tagged with the engine generation that filled
/// them.
#[derive(Default)]
struct ResolvedServices {
    generation: u64,
    cells: HashMap<CacheKey, Arc<OnceCell<AnyArc>>>,
}

/// Storage shared by every handle to one scope.
pub(crate) struct ScopeState {
    is_root: bool,
    resolved: Mutex<ResolvedServices>,
    disposables: Mutex<DisposeBag>,
    disposed: AtomicBool,
}

impl ScopeState {
    pub(crate) fn new(is_root: bool) -> Self {
        Self {
            is_root,
            resolved: Mutex::new(ResolvedServices::default()),
            disposables: Mutex::new(DisposeBag::default()),
            disposed: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Cell holding this scope's instance for `key`.
    ///
    /// A newer generation drops everything cached so far. A call site from
    /// an older generation (a resolution still running across a rebuild)
    /// gets a detached cell so it never pollutes the current cache.
    pub(crate) fn cell_for(&self, key: &CacheKey, generation: u64) -> Arc<OnceCell<AnyArc>> {
        let mut resolved = self.resolved.lock();
        if generation > resolved.generation {
            resolved.cells.clear();
            resolved.generation = generation;
        } else if generation < resolved.generation {
            return Arc::new(OnceCell::new());
        }
        resolved.cells.entry(key.clone()).or_default().clone()
    }

    fn name(&self) -> &'static str {
        if self.is_root {
            "ServiceProvider"
        } else {
            "Scope"
        }
    }

    fn push(&self, disposer: Disposer) -> DiResult<()> {
        let mut bag = self.disposables.lock();
        if self.is_disposed() {
            drop(bag);
            disposer.dispose_blocking();
            return Err(DiError::ObjectDisposed(self.name()));
        }
        bag.push(disposer);
        Ok(())
    }

    /// Marks the scope disposed and hands back what it captured. `None` if
    /// it was already disposed.
    pub(crate) fn begin_dispose(&self) -> Option<DisposeBag> {
        let mut bag = self.disposables.lock();
        if self.disposed.swap(true, Ordering::AcqRel) {
            return None;
        }
        let taken = bag.take();
        drop(bag);
        self.resolved.lock().cells.clear();
        Some(taken)
    }
}

/// A scope for resolving scoped services.
///
/// Scoped services are created once per scope; singletons come from the
/// root; transients are new on every request but the scope still owns their
/// disposal. `Scope` is a cheap handle: clones refer to the same scope.
///
/// # Examples
///
/// ```
/// use callsite_di::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct DatabaseConnection(String);
///
/// struct UserService {
///     db: Arc<DatabaseConnection>,
/// }
///
/// let mut collection = ServiceCollection::new();
/// collection.add_scoped_factory::<DatabaseConnection, _>(|_| {
///     DatabaseConnection("connection-123".to_string())
/// });
/// collection.add_transient_factory::<UserService, _>(|resolver| {
///     UserService {
///         db: resolver.get_required::<DatabaseConnection>(),
///     }
/// });
///
/// let provider = collection.build().unwrap();
/// let scope = provider.create_scope().unwrap();
///
/// let user1 = scope.get_required::<UserService>();
/// let user2 = scope.get_required::<UserService>();
/// assert!(!Arc::ptr_eq(&user1, &user2));
/// assert!(Arc::ptr_eq(&user1.db, &user2.db));
/// ```
#[derive(Clone)]
pub struct Scope {
    pub(crate) provider: Arc<ProviderInner>,
    pub(crate) state: Arc<ScopeState>,
}

impl Scope {
    pub(crate) fn new(provider: Arc<ProviderInner>, state: Arc<ScopeState>) -> Self {
        Self { provider, state }
    }

    /// Whether this is the container's root scope.
    pub fn is_root(&self) -> bool {
        self.state.is_root
    }

    pub fn is_disposed(&self) -> bool {
        self.state.is_disposed() || self.provider.is_disposed()
    }

    /// The container this scope belongs to.
    pub fn provider(&self) -> ServiceProvider {
        ServiceProvider {
            inner: self.provider.clone(),
        }
    }

    pub(crate) fn root(&self) -> Scope {
        Scope::new(self.provider.clone(), self.provider.root.clone())
    }

    /// Creates a sibling scope under the same container.
    ///
    /// Scopes are flat: a scope created from another scope shares only the
    /// root with it.
    pub fn create_scope(&self) -> DiResult<Scope> {
        if self.state.is_disposed() {
            return Err(DiError::ObjectDisposed(self.state.name()));
        }
        self.provider().create_scope()
    }

    /// Takes ownership of `instance`'s disposer and returns its value.
    pub(crate) fn capture(&self, instance: Instance) -> DiResult<AnyArc> {
        if let Some(disposer) = instance.disposer {
            self.state.push(disposer)?;
        }
        Ok(instance.value)
    }

    pub(crate) fn push_disposer(&self, disposer: Disposer) -> DiResult<()> {
        self.state.push(disposer)
    }

    /// Resolves against the container's current engine.
    pub(crate) fn resolve_service(&self, service_type: &ServiceType) -> DiResult<Option<AnyArc>> {
        let engine = self.provider.engine()?;
        self.resolve_with(&engine, service_type)
    }

    /// Resolves against a fixed engine snapshot.
    pub(crate) fn resolve_with(&self, engine: &Arc<Engine>, service_type: &ServiceType) -> DiResult<Option<AnyArc>> {
        if self.state.is_disposed() {
            return Err(DiError::ObjectDisposed(self.state.name()));
        }

        let observers = &self.provider.observers;
        if !observers.has_observers() {
            return self.resolve_site(engine, service_type);
        }

        observers.resolving(service_type);
        let started = Instant::now();
        let result = self.resolve_site(engine, service_type);
        match &result {
            Ok(_) => observers.resolved(service_type, started.elapsed()),
            Err(error) => observers.failed(service_type, error),
        }
        result
    }

    fn resolve_site(&self, engine: &Arc<Engine>, service_type: &ServiceType) -> DiResult<Option<AnyArc>> {
        let Some(site) = engine.realize(service_type)? else {
            return Ok(None);
        };
        if let Some(validator) = engine.validator() {
            validator.validate_resolution(&site, self.state.is_root)?;
        }
        runtime::resolve(&site, self, engine).map(Some)
    }

    /// Disposes everything this scope captured, most recent first.
    ///
    /// Async-only disposers are driven to completion on the current thread.
    /// Prefer [`dispose_async`](Self::dispose_async) when any service needs
    /// async teardown. Disposing twice is a no-op; disposing the root scope
    /// disposes the container.
    pub fn dispose(&self) {
        if self.state.is_root {
            return self.provider().dispose();
        }
        if let Some(bag) = self.state.begin_dispose() {
            let count = bag.len();
            bag.run_all_blocking_reverse();
            self.provider.observers.disposed(false, count);
        }
    }

    /// Asynchronous counterpart of [`dispose`](Self::dispose).
    pub async fn dispose_async(&self) {
        if self.state.is_root {
            return self.provider().dispose_async().await;
        }
        if let Some(bag) = self.state.begin_dispose() {
            let count = bag.len();
            bag.run_all_async_reverse().await;
            self.provider.observers.disposed(false, count);
        }
    }
}

impl ResolverCore for Scope {
    fn resolve(&self, service_type: &ServiceType) -> DiResult<Option<AnyArc>> {
        self.resolve_service(service_type)
    }

    fn push_disposer(&self, disposer: Disposer) -> DiResult<()> {
        Scope::push_disposer(self, disposer)
    }
}

impl Resolver for Scope {}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("root", &self.state.is_root)
            .field("disposed", &self.state.is_disposed())
            .field("disposables", &self.state.disposables.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ServiceType;

    fn key<T: 'static>() -> CacheKey {
        CacheKey::new(ServiceType::of::<T>(), 0)
    }

    #[test]
    fn cells_are_shared_within_a_generation() {
        let state = ScopeState::new(false);
        let a = state.cell_for(&key::<u8>(), 0);
        let b = state.cell_for(&key::<u8>(), 0);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn newer_generation_resets_and_older_is_detached() {
        let state = ScopeState::new(false);
        let first = state.cell_for(&key::<u8>(), 0);
        let _ = first.set(crate::instance::erase(Arc::new(1u8)));

        let second = state.cell_for(&key::<u8>(), 1);
        assert!(second.get().is_none());
        assert!(!Arc::ptr_eq(&first, &second));

        let stale = state.cell_for(&key::<u8>(), 0);
        assert!(!Arc::ptr_eq(&stale, &state.cell_for(&key::<u8>(), 1)));
    }

    #[test]
    fn pushing_after_dispose_runs_the_hook() {
        use std::sync::atomic::AtomicUsize;

        let state = ScopeState::new(false);
        assert!(state.begin_dispose().is_some());
        assert!(state.begin_dispose().is_none());

        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let err = state
            .push(Disposer::from_fn(move || {
                h.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap_err();
        assert!(matches!(err, DiError::ObjectDisposed("Scope")));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
