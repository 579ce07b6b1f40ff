//! Type-erased service values and their disposal hooks.
//!
//! Every resolved value is stored as an `Arc<T>` boxed once more into an
//! [`AnyArc`], so concrete types and trait objects share one representation
//! and downcasting is always `downcast_ref::<Arc<T>>()`.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::internal::BoxFutureUnit;
use crate::traits::{AsyncDispose, Dispose};

/// Type-erased shared service value.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Erases an `Arc<T>` into the uniform storage form.
pub fn erase<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> AnyArc {
    Arc::new(value)
}

/// Recovers an `Arc<T>` previously stored with [`erase`].
pub fn downcast<T: ?Sized + Send + Sync + 'static>(value: &AnyArc) -> Option<Arc<T>> {
    value.downcast_ref::<Arc<T>>().cloned()
}

/// Disposal hook attached to a constructed instance.
///
/// A disposer can carry a synchronous part, an asynchronous part, or both.
/// Synchronous scope disposal prefers the synchronous part; asynchronous
/// disposal prefers the asynchronous one.
#[derive(Clone, Default)]
pub struct Disposer {
    sync: Option<Arc<dyn Fn() + Send + Sync>>,
    asynchronous: Option<Arc<dyn Fn() -> BoxFutureUnit + Send + Sync>>,
}

impl Disposer {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self { sync: Some(Arc::new(f)), asynchronous: None }
    }

    pub fn from_async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            sync: None,
            asynchronous: Some(Arc::new(move || Box::pin(f()) as BoxFutureUnit)),
        }
    }

    pub fn of<T: Dispose>(service: Arc<T>) -> Self {
        Self::from_fn(move || service.dispose())
    }

    pub fn of_async<T: AsyncDispose>(service: Arc<T>) -> Self {
        Self::from_async_fn(move || {
            let service = service.clone();
            async move { service.dispose().await }
        })
    }

    /// Disposer for services implementing both traits.
    pub fn of_both<T: Dispose + AsyncDispose>(service: Arc<T>) -> Self {
        let async_part = Self::of_async(service.clone());
        Self {
            sync: Some(Arc::new(move || Dispose::dispose(&*service))),
            asynchronous: async_part.asynchronous,
        }
    }

    pub fn is_async(&self) -> bool {
        self.asynchronous.is_some()
    }

    /// Runs the synchronous part, or blocks on the asynchronous one when
    /// that is all there is.
    pub(crate) fn dispose_blocking(&self) {
        if let Some(sync) = &self.sync {
            sync();
        } else if let Some(asynchronous) = &self.asynchronous {
            futures::executor::block_on(asynchronous());
        }
    }

    pub(crate) async fn dispose_async(&self) {
        if let Some(asynchronous) = &self.asynchronous {
            asynchronous().await;
        } else if let Some(sync) = &self.sync {
            sync();
        }
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("sync", &self.sync.is_some())
            .field("async", &self.asynchronous.is_some())
            .finish()
    }
}

/// A freshly constructed value plus the hook that tears it down.
///
/// Factories and constructors return `Instance`s; the executor hands the
/// disposer to the owning scope according to the call site's cache location.
pub struct Instance {
    pub(crate) value: AnyArc,
    pub(crate) disposer: Option<Disposer>,
}

impl Instance {
    pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self { value: erase(value), disposer: None }
    }

    pub fn from_value<T: Send + Sync + 'static>(value: T) -> Self {
        Self::new(Arc::new(value))
    }

    pub fn disposable<T: Dispose>(value: Arc<T>) -> Self {
        let disposer = Disposer::of(value.clone());
        Self { value: erase(value), disposer: Some(disposer) }
    }

    pub fn async_disposable<T: AsyncDispose>(value: Arc<T>) -> Self {
        let disposer = Disposer::of_async(value.clone());
        Self { value: erase(value), disposer: Some(disposer) }
    }

    /// Stores `value` as `Arc<T>` but disposes through `disposer`. Useful
    /// when the service type is a trait object and the concrete type owns
    /// the teardown.
    pub fn with_disposer<T: ?Sized + Send + Sync + 'static>(value: Arc<T>, disposer: Disposer) -> Self {
        Self { value: erase(value), disposer: Some(disposer) }
    }

    pub(crate) fn shared(value: AnyArc) -> Self {
        Self { value, disposer: None }
    }

    pub fn is_disposable(&self) -> bool {
        self.disposer.is_some()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("disposer", &self.disposer)
            .finish_non_exhaustive()
    }
}

/// Erased value of a resolved `Sequence<T>`.
pub(crate) struct ServiceList(pub(crate) Vec<AnyArc>);

/// Erased value of a resolved `Optional<T>`.
pub(crate) struct OptionalValue(pub(crate) Option<AnyArc>);

/// A service that may or may not be registered.
///
/// Resolved through the built-in optional override (see
/// [`ResolveMode::EnableOptional`](crate::ResolveMode::EnableOptional)).
/// Absence is a value, not an error.
///
/// The service type of an optional is the generic
/// [`ServiceType::optional_of::<T>()`](crate::ServiceType::optional_of), not
/// the Rust type `Optional<T>`. Resolve it with
/// [`Resolver::get_optional`](crate::Resolver::get_optional), or declare a
/// constructor parameter with `param_type(ServiceType::optional_of::<T>())`.
/// `try_get::<Optional<T>>()` looks up an unregistered concrete type and
/// yields `Ok(None)`.
///
/// ```
/// use callsite_di::{Optional, Resolver, ServiceCollection};
///
/// struct Cache;
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Cache);
/// let provider = services.build().unwrap();
///
/// assert!(provider.get_optional::<Cache>().unwrap().is_present());
/// assert!(provider.try_get::<Optional<Cache>>().unwrap().is_none());
/// ```
pub struct Optional<T: ?Sized>(Option<Arc<T>>);

impl<T: ?Sized> Optional<T> {
    pub fn empty() -> Self {
        Optional(None)
    }

    pub fn present(value: Arc<T>) -> Self {
        Optional(Some(value))
    }

    pub fn is_present(&self) -> bool {
        self.0.is_some()
    }

    pub fn value(&self) -> Option<&Arc<T>> {
        self.0.as_ref()
    }

    pub fn into_inner(self) -> Option<Arc<T>> {
        self.0
    }
}

impl<T: ?Sized> Clone for Optional<T> {
    fn clone(&self) -> Self {
        Optional(self.0.clone())
    }
}

impl<T: ?Sized> fmt::Debug for Optional<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_present() {
            f.write_str("Optional(present)")
        } else {
            f.write_str("Optional(empty)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    struct Hello;
    impl Greeter for Hello {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    #[test]
    fn erase_and_downcast_trait_objects() {
        let erased = erase(Arc::new(Hello) as Arc<dyn Greeter>);
        let back = downcast::<dyn Greeter>(&erased).unwrap();
        assert_eq!(back.greet(), "hello");
        assert!(downcast::<Hello>(&erased).is_none());
    }

    #[test]
    fn blocking_disposal_falls_back_to_async() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let disposer = Disposer::from_async_fn(move || {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
            }
        });
        disposer.dispose_blocking();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
