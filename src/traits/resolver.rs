//! Resolver traits for service resolution.

use std::any::type_name;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::instance::{downcast, AnyArc, Disposer, Optional, OptionalValue, ServiceList};
use crate::internal::raise_resolution_panic;
use crate::key::ServiceType;
use crate::traits::{AsyncDispose, Dispose};

/// Object-safe resolution surface.
///
/// Implemented by [`ServiceProvider`](crate::ServiceProvider),
/// [`Scope`](crate::Scope) and the [`ResolverContext`](crate::ResolverContext)
/// handed to factories. Most callers want the typed helpers on [`Resolver`].
pub trait ResolverCore: Send + Sync {
    /// Resolves `service_type` against this resolver's scope.
    ///
    /// * `Ok(Some(value))` - the erased value
    /// * `Ok(None)` - nothing registered and no override matched
    /// * `Err(_)` - the service is registered but could not be produced
    fn resolve(&self, service_type: &ServiceType) -> DiResult<Option<AnyArc>>;

    /// Hands a disposal hook to this resolver's scope.
    ///
    /// If the scope is already disposed the hook runs immediately and
    /// [`DiError::ObjectDisposed`] is returned.
    fn push_disposer(&self, disposer: Disposer) -> DiResult<()>;
}

/// Typed resolution helpers built on [`ResolverCore`].
///
/// Concrete types and trait objects go through the same methods:
///
/// ```
/// use callsite_di::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn log(&self, msg: &str);
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn log(&self, msg: &str) {
///         println!("LOG: {}", msg);
///     }
/// }
///
/// let mut collection = ServiceCollection::new();
/// collection.add_singleton(42usize);
/// collection.add_singleton_trait(Arc::new(ConsoleLogger) as Arc<dyn Logger>);
///
/// let provider = collection.build().unwrap();
/// assert_eq!(*provider.get_required::<usize>(), 42);
/// provider.get_required::<dyn Logger>().log("resolved");
/// assert!(provider.try_get::<String>().unwrap().is_none());
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves `T`, reporting absence as `Ok(None)`.
    ///
    /// `T` is looked up as a concrete type. Sequences and optionals are
    /// generic service types and go through [`get_all`](Self::get_all) and
    /// [`get_optional`](Self::get_optional).
    fn try_get<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        self.try_get_as::<T>(&ServiceType::of::<T>())
    }

    /// Resolves `T`; absence is [`DiError::NotFound`].
    fn get<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.try_get::<T>()?
            .ok_or_else(|| DiError::NotFound(type_name::<T>().to_string()))
    }

    /// Resolves `T` or panics.
    ///
    /// Intended for factory bodies: when called inside a factory the panic
    /// is caught by the container and surfaces as the original error from
    /// the outer resolution.
    fn get_required<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        match self.get::<T>() {
            Ok(value) => value,
            Err(error) => raise_resolution_panic(type_name::<T>(), error),
        }
    }

    /// Resolves an arbitrary service type and downcasts it to `T`.
    fn try_get_as<T: ?Sized + Send + Sync + 'static>(
        &self,
        service_type: &ServiceType,
    ) -> DiResult<Option<Arc<T>>> {
        match self.resolve(service_type)? {
            None => Ok(None),
            Some(value) => downcast::<T>(&value)
                .map(Some)
                .ok_or_else(|| DiError::TypeMismatch(type_name::<T>().to_string())),
        }
    }

    fn get_as<T: ?Sized + Send + Sync + 'static>(&self, service_type: &ServiceType) -> DiResult<Arc<T>> {
        self.try_get_as::<T>(service_type)?
            .ok_or_else(|| DiError::NotFound(service_type.to_string()))
    }

    fn get_required_as<T: ?Sized + Send + Sync + 'static>(&self, service_type: &ServiceType) -> Arc<T> {
        match self.get_as::<T>(service_type) {
            Ok(value) => value,
            Err(error) => raise_resolution_panic(&service_type.to_string(), error),
        }
    }

    /// Every registration of `T`, in registration order.
    fn get_all<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        self.get_all_as::<T>(&ServiceType::of::<T>())
    }

    /// Every registration of `item` (exact or closed from an open generic),
    /// in registration order.
    fn get_all_as<T: ?Sized + Send + Sync + 'static>(&self, item: &ServiceType) -> DiResult<Vec<Arc<T>>> {
        let Some(value) = self.resolve(&ServiceType::sequence(item.clone()))? else {
            return Ok(Vec::new());
        };
        let list = downcast::<ServiceList>(&value)
            .ok_or_else(|| DiError::TypeMismatch(format!("Sequence<{item}>")))?;
        list.0
            .iter()
            .map(|v| downcast::<T>(v).ok_or_else(|| DiError::TypeMismatch(type_name::<T>().to_string())))
            .collect()
    }

    /// Resolves `Optional<T>`.
    ///
    /// Fails with [`DiError::NotFound`] only when the optional override is
    /// disabled; a missing `T` is an empty [`Optional`].
    fn get_optional<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Optional<T>> {
        let service_type = ServiceType::optional_of::<T>();
        let value = self
            .resolve(&service_type)?
            .ok_or_else(|| DiError::NotFound(service_type.to_string()))?;
        let optional = downcast::<OptionalValue>(&value)
            .ok_or_else(|| DiError::TypeMismatch(service_type.to_string()))?;
        match &optional.0 {
            None => Ok(Optional::empty()),
            Some(inner) => downcast::<T>(inner)
                .map(Optional::present)
                .ok_or_else(|| DiError::TypeMismatch(type_name::<T>().to_string())),
        }
    }

    /// Ties `service` to this resolver's scope so it is disposed with it.
    fn register_disposer<T: Dispose>(&self, service: Arc<T>) -> DiResult<()> {
        self.push_disposer(Disposer::of(service))
    }

    fn register_async_disposer<T: AsyncDispose>(&self, service: Arc<T>) -> DiResult<()> {
        self.push_disposer(Disposer::of_async(service))
    }
}
