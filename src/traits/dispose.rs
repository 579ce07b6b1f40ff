//! Disposal traits for resource cleanup.

/// Synchronous teardown for services owned by a scope.
///
/// Register the service with [`Instance::disposable`](crate::Instance::disposable)
/// or [`ServiceCollection::add_disposable_factory`](crate::ServiceCollection::add_disposable_factory)
/// and the scope that created it calls `dispose` when the scope ends, in
/// reverse creation order.
///
/// # Examples
///
/// ```
/// use callsite_di::{Dispose, Lifetime, ServiceCollection, Resolver};
///
/// struct Cache;
///
/// impl Dispose for Cache {
///     fn dispose(&self) {
///         println!("flushing cache");
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_disposable_factory::<Cache, _>(Lifetime::Scoped, |_| Cache);
///
/// let provider = services.build().unwrap();
/// let scope = provider.create_scope().unwrap();
/// let _cache = scope.get_required::<Cache>();
/// scope.dispose(); // prints "flushing cache"
/// ```
pub trait Dispose: Send + Sync + 'static {
    fn dispose(&self);
}

/// Asynchronous teardown, awaited by [`Scope::dispose_async`](crate::Scope::dispose_async).
///
/// Synchronous disposal of an async-only service blocks the calling thread
/// on the future.
///
/// ```
/// use callsite_di::{AsyncDispose, Lifetime, ServiceCollection};
/// use async_trait::async_trait;
///
/// struct Client;
///
/// #[async_trait]
/// impl AsyncDispose for Client {
///     async fn dispose(&self) {
///         println!("closing connection");
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_async_disposable_factory::<Client, _>(Lifetime::Singleton, |_| Client);
/// ```
#[async_trait::async_trait]
pub trait AsyncDispose: Send + Sync + 'static {
    async fn dispose(&self);
}
