//! Service collection: registration and container construction.
//!
//! A [`ServiceCollection`] accumulates [`ServiceDescriptor`]s, overrides and
//! observers, then [`build`](ServiceCollection::build)s them into a
//! [`ServiceProvider`]. Registration order matters: when a service type is
//! registered more than once, single resolution returns the last
//! registration while sequence resolution returns all of them in order.

use std::sync::Arc;

use crate::activation::{Implementation, OpenImplementation};
use crate::config::{ProviderOptions, ResolveMode};
use crate::descriptors::{RegisteredService, ServiceDescriptor, ServiceDescriptorInfo};
use crate::error::DiResult;
use crate::instance::{erase, Instance};
use crate::key::{GenericDefinition, ServiceType};
use crate::lifetime::Lifetime;
use crate::observer::{DiObserver, Observers};
use crate::overrides::ServiceOverride;
use crate::provider::{ResolverContext, ServiceProvider};
use crate::traits::{AsyncDispose, Dispose};

pub mod module_system;
pub use module_system::*;

#[derive(Default)]
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
    overrides: Vec<ServiceOverride>,
    observers: Observers,
    options: ProviderOptions,
}

impl ServiceCollection {
    /// Creates a new empty service collection.
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
            overrides: Vec::new(),
            observers: Observers::new(),
            options: ProviderOptions::default(),
        }
    }

    /// Appends a raw descriptor.
    pub fn add(&mut self, descriptor: ServiceDescriptor) -> &mut Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn extend<I>(&mut self, descriptors: I) -> &mut Self
    where
        I: IntoIterator<Item = ServiceDescriptor>,
    {
        self.descriptors.extend(descriptors);
        self
    }

    // ----- Concrete Type Registrations -----

    /// Registers a singleton instance that will be shared across the entire application.
    ///
    /// The instance lives in the registration itself, so it keeps its identity
    /// across [`rebuild`](ServiceProvider::rebuild)s and is never disposed by
    /// the container.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use callsite_di::ServiceCollection;
    /// struct Config {
    ///     database_url: String
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Config {
    ///     database_url: "postgres://localhost".to_string()
    /// });
    /// ```
    pub fn add_singleton<T: 'static + Send + Sync>(&mut self, value: T) -> &mut Self {
        self.add_singleton_trait(Arc::new(value))
    }

    /// Registers a pre-built shared value under `T`, which may be a trait
    /// object.
    pub fn add_singleton_trait<T>(&mut self, value: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::instance(ServiceType::of::<T>(), erase(value)))
    }

    /// Registers a singleton factory that creates the instance on first request.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use callsite_di::{ServiceCollection, Resolver};
    /// # use std::sync::Arc;
    /// struct Database { url: String }
    /// struct UserService { db: Arc<Database> }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Database { url: "postgres://localhost".to_string() });
    /// services.add_singleton_factory::<UserService, _>(|resolver| {
    ///     UserService {
    ///         db: resolver.get_required::<Database>()
    ///     }
    /// });
    /// ```
    pub fn add_singleton_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add_value_factory(Lifetime::Singleton, factory)
    }

    /// Registers a scoped factory that creates one instance per scope.
    pub fn add_scoped_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add_value_factory(Lifetime::Scoped, factory)
    }

    /// Registers a transient factory that creates a new instance on every request.
    pub fn add_transient_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add_value_factory(Lifetime::Transient, factory)
    }

    fn add_value_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory(ServiceType::of::<T>(), lifetime, move |r| {
            Ok(Instance::from_value(factory(r)))
        }))
    }

    // ----- Trait Registrations -----

    /// Registers a singleton factory for a trait object.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use callsite_di::{ServiceCollection, Resolver};
    /// # use std::sync::Arc;
    /// trait Greeter: Send + Sync {
    ///     fn greet(&self) -> String;
    /// }
    ///
    /// struct English;
    /// impl Greeter for English {
    ///     fn greet(&self) -> String { "hello".into() }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton_trait_factory::<dyn Greeter, _>(|_| Arc::new(English));
    ///
    /// let provider = services.build().unwrap();
    /// assert_eq!(provider.get_required::<dyn Greeter>().greet(), "hello");
    /// ```
    pub fn add_singleton_trait_factory<Trait, F>(&mut self, factory: F) -> &mut Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext) -> Arc<Trait> + Send + Sync + 'static,
    {
        self.add_trait_factory(Lifetime::Singleton, factory)
    }

    pub fn add_scoped_trait_factory<Trait, F>(&mut self, factory: F) -> &mut Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext) -> Arc<Trait> + Send + Sync + 'static,
    {
        self.add_trait_factory(Lifetime::Scoped, factory)
    }

    pub fn add_transient_trait_factory<Trait, F>(&mut self, factory: F) -> &mut Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext) -> Arc<Trait> + Send + Sync + 'static,
    {
        self.add_trait_factory(Lifetime::Transient, factory)
    }

    /// Registers a trait-object factory with an explicit lifetime.
    pub fn add_trait_factory<Trait, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext) -> Arc<Trait> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory(ServiceType::of::<Trait>(), lifetime, move |r| {
            Ok(Instance::new(factory(r)))
        }))
    }

    // ----- Fallible and disposable factories -----

    /// Registers a factory that may fail. The error surfaces from the
    /// resolution that triggered the factory.
    pub fn add_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory(ServiceType::of::<T>(), lifetime, move |r| {
            factory(r).map(Instance::new)
        }))
    }

    /// Registers a factory that returns a full [`Instance`], disposer
    /// included.
    pub fn add_instance_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext) -> DiResult<Instance> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory(ServiceType::of::<T>(), lifetime, move |r| factory(r)))
    }

    /// Registers a factory whose product implements [`Dispose`]. The scope
    /// that owns each instance disposes it, singletons at container
    /// disposal.
    pub fn add_disposable_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: Dispose,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory(ServiceType::of::<T>(), lifetime, move |r| {
            Ok(Instance::disposable(Arc::new(factory(r))))
        }))
    }

    /// Like [`add_disposable_factory`](Self::add_disposable_factory) for
    /// [`AsyncDispose`] services.
    pub fn add_async_disposable_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: AsyncDispose,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory(ServiceType::of::<T>(), lifetime, move |r| {
            Ok(Instance::async_disposable(Arc::new(factory(r))))
        }))
    }

    // ----- Constructor-based registrations -----

    /// Registers `T` as built by one of `implementation`'s constructors,
    /// chosen when the call site is compiled.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use callsite_di::{Constructor, Implementation, Lifetime, Resolver, ServiceCollection};
    /// use std::sync::Arc;
    ///
    /// struct Logger;
    /// struct Handler { logger: Arc<Logger> }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Logger);
    /// services.add_implementation::<Handler>(
    ///     Lifetime::Transient,
    ///     Implementation::new("Handler").constructor(
    ///         Constructor::new("new")
    ///             .param::<Logger>()
    ///             .build(|args| Ok(Arc::new(Handler { logger: args.next::<Logger>()? }))),
    ///     ),
    /// );
    ///
    /// let provider = services.build().unwrap();
    /// let a = provider.get_required::<Handler>();
    /// let b = provider.get_required::<Handler>();
    /// assert!(Arc::ptr_eq(&a.logger, &b.logger));
    /// ```
    pub fn add_implementation<T>(&mut self, lifetime: Lifetime, implementation: Implementation) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::implementation(ServiceType::of::<T>(), lifetime, implementation))
    }

    /// Registers an open generic service, closed on demand for each
    /// requested set of type arguments.
    pub fn add_open_generic(
        &mut self,
        definition: GenericDefinition,
        lifetime: Lifetime,
        implementation: OpenImplementation,
    ) -> &mut Self {
        self.add(ServiceDescriptor::open_generic(definition, lifetime, implementation))
    }

    // ----- Conditional registrations -----

    /// Adds `descriptor` only if its service is not registered yet.
    /// Returns whether it was added.
    pub fn try_add(&mut self, descriptor: ServiceDescriptor) -> bool {
        if self.descriptors.iter().any(|d| d.service() == descriptor.service()) {
            return false;
        }
        self.descriptors.push(descriptor);
        true
    }

    pub fn try_add_singleton<T: 'static + Send + Sync>(&mut self, value: T) -> bool {
        self.try_add(ServiceDescriptor::instance(ServiceType::of::<T>(), erase(Arc::new(value))))
    }

    pub fn try_add_scoped_factory<T, F>(&mut self, factory: F) -> bool
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.try_add(ServiceDescriptor::factory(ServiceType::of::<T>(), Lifetime::Scoped, move |r| {
            Ok(Instance::from_value(factory(r)))
        }))
    }

    pub fn try_add_transient_factory<T, F>(&mut self, factory: F) -> bool
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.try_add(ServiceDescriptor::factory(ServiceType::of::<T>(), Lifetime::Transient, move |r| {
            Ok(Instance::from_value(factory(r)))
        }))
    }

    /// Adds `descriptor` unless an identical registration (same service,
    /// same implementation) already exists. Factories and instances are
    /// never considered identical.
    pub fn try_add_enumerable(&mut self, descriptor: ServiceDescriptor) -> bool {
        let implementation = descriptor.info().implementation;
        let duplicate = implementation.is_some()
            && self
                .descriptors
                .iter()
                .any(|d| d.service() == descriptor.service() && d.info().implementation == implementation);
        if duplicate {
            return false;
        }
        self.descriptors.push(descriptor);
        true
    }

    // ----- Overrides, observers, options -----

    /// Adds a fallback consulted for types no registration covers, after the
    /// overrides added before it.
    pub fn add_override(&mut self, service_override: ServiceOverride) -> &mut Self {
        self.overrides.push(service_override);
        self
    }

    /// Adds a diagnostic observer.
    pub fn add_observer(&mut self, observer: Arc<dyn DiObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    pub fn with_options(&mut self, options: ProviderOptions) -> &mut Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ProviderOptions {
        &self.options
    }

    // ----- Introspection -----

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Whether a closed registration exists for `service_type`.
    pub fn contains(&self, service_type: &ServiceType) -> bool {
        self.descriptors
            .iter()
            .any(|d| matches!(d.service(), RegisteredService::Closed(t) if t == service_type))
    }

    /// Summaries of every registration, in order.
    pub fn descriptors(&self) -> Vec<ServiceDescriptorInfo> {
        self.descriptors.iter().map(|d| d.info()).collect()
    }

    /// The registrations alone, dropping overrides, observers and options.
    pub fn into_descriptors(self) -> Vec<ServiceDescriptor> {
        self.descriptors
    }

    // ----- Build -----

    /// Builds the container with the collection's options.
    ///
    /// Fails if a descriptor is malformed, or, with
    /// [`validate_on_build`](ProviderOptions::validate_on_build), if any
    /// registration cannot be constructed.
    pub fn build(self) -> DiResult<ServiceProvider> {
        let options = self.options.clone();
        self.build_with_options(options)
    }

    pub fn build_with_options(self, options: ProviderOptions) -> DiResult<ServiceProvider> {
        let mut overrides = Vec::with_capacity(self.overrides.len() + 1);
        if options.resolve_mode == ResolveMode::EnableOptional {
            overrides.push(ServiceOverride::optional());
        }
        overrides.extend(self.overrides);
        ServiceProvider::new(self.descriptors, overrides, self.observers, options)
    }
}
