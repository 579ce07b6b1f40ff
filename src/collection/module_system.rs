//! Service modules: reusable bundles of registrations.
//!
//! A module registers into a [`ServiceCollection`] before the container is
//! built, or into a running container through
//! [`ServiceProvider::load_module`](crate::ServiceProvider::load_module),
//! which appends the module's registrations and rebuilds once.

use crate::collection::ServiceCollection;
use crate::error::DiResult;

/// A module that can register services with a ServiceCollection.
///
/// # Example
///
/// ```rust
/// use callsite_di::{DiResult, Resolver, ServiceCollection, ServiceCollectionExt, ServiceModule};
///
/// #[derive(Default)]
/// struct UserConfig;
///
/// struct UserService;
/// impl UserService {
///     fn new(_config: std::sync::Arc<UserConfig>) -> Self { Self }
/// }
///
/// struct UserModule;
///
/// impl ServiceModule for UserModule {
///     fn register_services(self, services: &mut ServiceCollection) -> DiResult<()> {
///         services.add_singleton(UserConfig::default());
///         services.add_scoped_factory::<UserService, _>(|r| {
///             let config = r.get_required::<UserConfig>();
///             UserService::new(config)
///         });
///         Ok(())
///     }
/// }
///
/// # fn main() -> DiResult<()> {
/// let provider = ServiceCollection::new().add_module(UserModule)?.build()?;
/// let scope = provider.create_scope()?;
/// scope.get::<UserService>()?;
/// # Ok(())
/// # }
/// ```
pub trait ServiceModule {
    /// Register this module's services with the ServiceCollection.
    fn register_services(self, services: &mut ServiceCollection) -> DiResult<()>;
}

/// Chaining module registration for owned collections.
pub trait ServiceCollectionExt {
    fn add_module<M: ServiceModule>(self, module: M) -> DiResult<Self>
    where
        Self: Sized;
}

impl ServiceCollectionExt for ServiceCollection {
    fn add_module<M: ServiceModule>(mut self, module: M) -> DiResult<Self> {
        module.register_services(&mut self)?;
        Ok(self)
    }
}

/// In-place module registration, matching the `&mut Self` builder methods.
pub trait ServiceCollectionModuleExt {
    fn add_module_mut<M: ServiceModule>(&mut self, module: M) -> DiResult<&mut Self>;
}

impl ServiceCollectionModuleExt for ServiceCollection {
    fn add_module_mut<M: ServiceModule>(&mut self, module: M) -> DiResult<&mut Self> {
        module.register_services(self)?;
        Ok(self)
    }
}
