//! Service provider: the container facade.
//!
//! A [`ServiceProvider`] owns the registration list, the compiled call-site
//! graph for that list (the engine) and the root scope. Resolution snapshots
//! the current engine under a read lock and then runs without container-wide
//! locking; [`rebuild`](ServiceProvider::rebuild) swaps in a freshly compiled
//! engine under the write lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::call_site::chain::CallSiteChain;
use crate::call_site::factory::CallSiteFactory;
use crate::call_site::{CacheLocation, CallSite};
use crate::collection::{ServiceCollection, ServiceModule};
use crate::config::ProviderOptions;
use crate::descriptors::{ServiceDescriptor, ServiceDescriptorInfo};
use crate::error::{DescriptorFailure, DiError, DiResult};
use crate::instance::{AnyArc, Disposer};
use crate::key::ServiceType;
use crate::observer::Observers;
use crate::overrides::ServiceOverride;
use crate::registration::{validate_shape, Registry};
use crate::traits::{Resolver, ResolverCore};
use crate::validation::CallSiteValidator;

pub mod context;
pub mod scope;

pub use context::ResolverContext;
pub use scope::Scope;
use scope::ScopeState;

/// One compiled snapshot of the registration list.
pub(crate) struct Engine {
    pub(crate) generation: u64,
    pub(crate) factory: CallSiteFactory,
    realized: Mutex<HashMap<ServiceType, Option<Arc<CallSite>>>>,
    validator: Option<CallSiteValidator>,
}

impl Engine {
    fn build(
        generation: u64,
        descriptors: Vec<Arc<ServiceDescriptor>>,
        overrides: Arc<[ServiceOverride]>,
        options: &ProviderOptions,
    ) -> DiResult<Self> {
        let registry = Registry::build(descriptors)?;
        let engine = Self {
            generation,
            factory: CallSiteFactory::new(registry, overrides),
            realized: Mutex::new(HashMap::new()),
            validator: options.validate_scopes.then(CallSiteValidator::new),
        };
        if options.validate_on_build {
            engine.validate_all()?;
        }
        Ok(engine)
    }

    /// Compiles every closed registration, collecting every failure.
    fn validate_all(&self) -> DiResult<()> {
        let mut failures = Vec::new();
        for descriptor in self.factory.registry().descriptors() {
            if descriptor.is_open_generic() {
                continue;
            }
            let result = self
                .factory
                .get_call_site_for(descriptor, &mut CallSiteChain::new())
                .and_then(|site| match (site, &self.validator) {
                    (Some(site), Some(validator)) => validator.validate_call_site(&site),
                    _ => Ok(()),
                });
            if let Err(error) = result {
                failures.push(DescriptorFailure {
                    descriptor: descriptor.to_string(),
                    error: Box::new(error),
                });
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(DiError::AggregateConstruction(failures))
        }
    }

    /// Call site for a top-level request, compiled and validated on first
    /// use. Failures are not remembered, so a later request retries.
    pub(crate) fn realize(&self, service_type: &ServiceType) -> DiResult<Option<Arc<CallSite>>> {
        if let Some(site) = self.realized.lock().get(service_type) {
            return Ok(site.clone());
        }

        let site = self.factory.get_call_site(service_type, &mut CallSiteChain::new())?;
        if let (Some(site), Some(validator)) = (&site, &self.validator) {
            validator.validate_call_site(site)?;
        }
        Ok(self
            .realized
            .lock()
            .entry(service_type.clone())
            .or_insert(site)
            .clone())
    }

    pub(crate) fn validator(&self) -> Option<&CallSiteValidator> {
        self.validator.as_ref()
    }
}

pub(crate) struct ProviderInner {
    options: ProviderOptions,
    descriptors: RwLock<Vec<Arc<ServiceDescriptor>>>,
    engine: RwLock<Option<Arc<Engine>>>,
    pub(crate) root: Arc<ScopeState>,
    overrides: Arc<[ServiceOverride]>,
    pub(crate) observers: Observers,
}

impl ProviderInner {
    /// Current engine; fails once the container is disposed.
    pub(crate) fn engine(&self) -> DiResult<Arc<Engine>> {
        self.engine
            .read()
            .clone()
            .ok_or(DiError::ObjectDisposed("ServiceProvider"))
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.root.is_disposed()
    }
}

/// The dependency injection container.
///
/// Resolves services according to their lifetimes, hands out scopes, accepts
/// new registrations and recompiles itself on [`rebuild`](Self::rebuild).
/// Cloning is cheap; clones share the same container.
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
/// let mut collection = ServiceCollection::new();
/// collection.add_singleton(Database { url: "postgres://localhost".to_string() });
/// collection.add_transient_factory::<UserService, _>(|resolver| {
///     UserService { db: resolver.get_required::<Database>() }
/// });
///
/// let provider = collection.build().unwrap();
/// let user_service = provider.get_required::<UserService>();
/// assert_eq!(user_service.db.url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct ServiceProvider {
    pub(crate) inner: Arc<ProviderInner>,
}

impl ServiceProvider {
    pub(crate) fn new(
        descriptors: Vec<ServiceDescriptor>,
        overrides: Vec<ServiceOverride>,
        observers: Observers,
        options: ProviderOptions,
    ) -> DiResult<Self> {
        let descriptors: Vec<_> = descriptors.into_iter().map(Arc::new).collect();
        let overrides: Arc<[ServiceOverride]> = overrides.into();
        let engine = Engine::build(0, descriptors.clone(), overrides.clone(), &options)?;

        tracing::debug!(
            registrations = descriptors.len(),
            overrides = overrides.len(),
            validate_scopes = options.validate_scopes,
            validate_on_build = options.validate_on_build,
            "built service provider"
        );

        Ok(Self {
            inner: Arc::new(ProviderInner {
                options,
                descriptors: RwLock::new(descriptors),
                engine: RwLock::new(Some(Arc::new(engine))),
                root: Arc::new(ScopeState::new(true)),
                overrides,
                observers,
            }),
        })
    }

    pub fn options(&self) -> &ProviderOptions {
        &self.inner.options
    }

    /// Resolves `service_type` from the root scope.
    ///
    /// Returns `Ok(None)` when nothing is registered for the type and no
    /// override matches.
    pub fn resolve(&self, service_type: &ServiceType) -> DiResult<Option<AnyArc>> {
        self.root_scope().resolve_service(service_type)
    }

    /// The root scope. Singletons are cached and owned here.
    pub fn root_scope(&self) -> Scope {
        Scope::new(self.inner.clone(), self.inner.root.clone())
    }

    /// Creates a new scope for resolving scoped services.
    ///
    /// # Examples
    ///
    /// ```
    /// use callsite_di::{ServiceCollection, Resolver};
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// struct RequestId(usize);
    ///
    /// let mut collection = ServiceCollection::new();
    /// let counter = Arc::new(AtomicUsize::new(0));
    /// let counter_clone = counter.clone();
    /// collection.add_scoped_factory::<RequestId, _>(move |_| {
    ///     RequestId(counter_clone.fetch_add(1, Ordering::SeqCst))
    /// });
    ///
    /// let provider = collection.build().unwrap();
    /// let scope1 = provider.create_scope().unwrap();
    /// let scope2 = provider.create_scope().unwrap();
    ///
    /// let req1a = scope1.get_required::<RequestId>();
    /// let req1b = scope1.get_required::<RequestId>();
    /// let req2 = scope2.get_required::<RequestId>();
    ///
    /// assert!(Arc::ptr_eq(&req1a, &req1b));
    /// assert!(!Arc::ptr_eq(&req1a, &req2));
    /// ```
    pub fn create_scope(&self) -> DiResult<Scope> {
        if self.inner.is_disposed() {
            return Err(DiError::ObjectDisposed("ServiceProvider"));
        }
        Ok(Scope::new(self.inner.clone(), Arc::new(ScopeState::new(false))))
    }

    /// Appends registrations. They take effect on the next
    /// [`rebuild`](Self::rebuild).
    ///
    /// Each descriptor is shape-checked before anything is appended, so a
    /// rejected batch leaves the list untouched.
    pub fn add_registrations<I>(&self, descriptors: I) -> DiResult<()>
    where
        I: IntoIterator<Item = ServiceDescriptor>,
    {
        if self.inner.is_disposed() {
            return Err(DiError::ObjectDisposed("ServiceProvider"));
        }
        let batch: Vec<_> = descriptors.into_iter().map(Arc::new).collect();
        for descriptor in &batch {
            validate_shape(descriptor)?;
        }
        tracing::debug!(added = batch.len(), "appended registrations");
        self.inner.descriptors.write().extend(batch);
        Ok(())
    }

    /// Recompiles the call-site graph from every registration added so far
    /// and swaps it in.
    ///
    /// Singletons and scoped instances realized before the rebuild are not
    /// carried over; they are created again on next request. Fixed instances
    /// live in their registration and keep their identity. Disposers of
    /// discarded instances stay with their scope until it is disposed.
    ///
    /// If the new graph fails build-time validation the previous one stays
    /// in place.
    ///
    /// # Examples
    ///
    /// ```
    /// use callsite_di::{erase, Resolver, ServiceCollection, ServiceDescriptor, ServiceType};
    /// use std::sync::Arc;
    ///
    /// struct Foo;
    ///
    /// let provider = ServiceCollection::new().build().unwrap();
    /// assert!(!provider.get_optional::<Foo>().unwrap().is_present());
    ///
    /// provider
    ///     .add_registrations([ServiceDescriptor::instance(ServiceType::of::<Foo>(), erase(Arc::new(Foo)))])
    ///     .unwrap();
    /// provider.rebuild().unwrap();
    /// assert!(provider.get_optional::<Foo>().unwrap().is_present());
    /// ```
    pub fn rebuild(&self) -> DiResult<()> {
        let mut slot = self.inner.engine.write();
        let Some(current) = slot.as_ref() else {
            return Err(DiError::ObjectDisposed("ServiceProvider"));
        };
        let generation = current.generation + 1;
        let descriptors = self.inner.descriptors.read().clone();
        let registrations = descriptors.len();

        let engine = Engine::build(generation, descriptors, self.inner.overrides.clone(), &self.inner.options)?;
        *slot = Some(Arc::new(engine));
        drop(slot);

        tracing::debug!(generation, registrations, "rebuilt call-site graph");
        self.inner.observers.rebuilt(generation, registrations);
        Ok(())
    }

    /// Registers a module's services, then rebuilds once.
    pub fn load_module<M: ServiceModule>(&self, module: M) -> DiResult<()> {
        let mut services = ServiceCollection::new();
        module.register_services(&mut services)?;
        self.add_registrations(services.into_descriptors())?;
        self.rebuild()
    }

    /// Whether a request for `service_type` can be satisfied without
    /// falling back to an override.
    pub fn is_service(&self, service_type: &ServiceType) -> bool {
        self.inner
            .engine()
            .map(|engine| engine.factory.is_service(service_type))
            .unwrap_or(false)
    }

    /// Summaries of every registration, in registration order.
    pub fn descriptors(&self) -> Vec<ServiceDescriptorInfo> {
        self.inner.descriptors.read().iter().map(|d| d.info()).collect()
    }

    /// Where the compiled call site for `service_type` caches its value, or
    /// `None` if the type cannot be resolved.
    pub fn cache_location(&self, service_type: &ServiceType) -> DiResult<Option<CacheLocation>> {
        Ok(self.inner.engine()?.realize(service_type)?.map(|site| site.location()))
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Disposes the root scope's captured services, most recent first, and
    /// shuts the container down. Idempotent.
    ///
    /// Async-only disposers are driven to completion on the current thread;
    /// prefer [`dispose_async`](Self::dispose_async) when any exist.
    ///
    /// # Examples
    ///
    /// ```
    /// use callsite_di::{DiError, Dispose, Lifetime, Resolver, ServiceCollection};
    /// use std::sync::atomic::{AtomicBool, Ordering};
    /// use std::sync::Arc;
    ///
    /// static CLOSED: AtomicBool = AtomicBool::new(false);
    ///
    /// struct Pool;
    /// impl Dispose for Pool {
    ///     fn dispose(&self) {
    ///         CLOSED.store(true, Ordering::SeqCst);
    ///     }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_disposable_factory::<Pool, _>(Lifetime::Singleton, |_| Pool);
    ///
    /// let provider = services.build().unwrap();
    /// provider.get_required::<Pool>();
    /// provider.dispose();
    /// provider.dispose();
    ///
    /// assert!(CLOSED.load(Ordering::SeqCst));
    /// assert!(matches!(provider.get::<Pool>(), Err(DiError::ObjectDisposed(_))));
    /// ```
    pub fn dispose(&self) {
        if let Some(bag) = self.begin_dispose() {
            let count = bag.len();
            bag.run_all_blocking_reverse();
            self.finish_dispose(count);
        }
    }

    /// Asynchronous counterpart of [`dispose`](Self::dispose).
    pub async fn dispose_async(&self) {
        if let Some(bag) = self.begin_dispose() {
            let count = bag.len();
            bag.run_all_async_reverse().await;
            self.finish_dispose(count);
        }
    }

    fn begin_dispose(&self) -> Option<crate::internal::DisposeBag> {
        let bag = self.inner.root.begin_dispose()?;
        self.inner.engine.write().take();
        Some(bag)
    }

    fn finish_dispose(&self, disposables: usize) {
        tracing::debug!(disposables, "disposed service provider");
        self.inner.observers.disposed(true, disposables);
    }

    /// Registrations and compiled call sites, one per line.
    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let descriptors = self.inner.descriptors.read();
        let _ = writeln!(out, "ServiceProvider ({} registrations)", descriptors.len());
        for descriptor in descriptors.iter() {
            let _ = writeln!(out, "  {descriptor}");
        }
        drop(descriptors);

        match self.inner.engine() {
            Ok(engine) => {
                let mut sites = engine.factory.compiled();
                sites.sort_by_key(|s| (s.service_type.to_string(), s.cache.key.slot));
                let _ = writeln!(out, "Call sites (generation {}):", engine.generation);
                for site in sites {
                    let _ = write!(
                        out,
                        "  {} #{} {} {:?}",
                        site.service_type,
                        site.cache.key.slot,
                        site.kind_name(),
                        site.location()
                    );
                    if let Some(implementation) = site.implementation_name() {
                        let _ = write!(out, " ({implementation})");
                    }
                    out.push('\n');
                }
            }
            Err(_) => out.push_str("Disposed\n"),
        }
        out
    }
}

impl ResolverCore for ServiceProvider {
    fn resolve(&self, service_type: &ServiceType) -> DiResult<Option<AnyArc>> {
        ServiceProvider::resolve(self, service_type)
    }

    fn push_disposer(&self, disposer: Disposer) -> DiResult<()> {
        self.root_scope().push_disposer(disposer)
    }
}

impl Resolver for ServiceProvider {}

impl fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("registrations", &self.inner.descriptors.read().len())
            .field("options", &self.inner.options)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
