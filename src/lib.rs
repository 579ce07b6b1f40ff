//! # callsite-di
//!
//! Dependency injection for Rust built around a compiled call-site graph,
//! in the style of Microsoft.Extensions.DependencyInjection.
//!
//! ## Features
//!
//! - **Lifetimes**: Singleton, Scoped and Transient services
//! - **Call-site graph**: each requested type is compiled once into a tree of nodes that knows where every value is cached
//! - **Sequences and open generics**: resolve every registration of a type, or close a generic registration on demand
//! - **Circular dependency detection**: with the full path in the error
//! - **Rebuildable**: append registrations to a running container and recompile
//! - **Overrides**: caller-supplied fallbacks, including a built-in `Optional<T>`
//! - **Validation**: optional scope-leak checks and build-time compilation of every registration
//!
//! ## Quick Start
//!
//! ```rust
//! use callsite_di::{ServiceCollection, Resolver};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add_singleton(Database {
//!     connection_string: "postgres://localhost".to_string(),
//! });
//! services.add_transient_factory::<UserService, _>(|resolver| {
//!     UserService {
//!         db: resolver.get_required::<Database>(),
//!     }
//! });
//!
//! let provider = services.build().unwrap();
//! let user_service = provider.get_required::<UserService>();
//! assert_eq!(user_service.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Service Lifetimes
//!
//! - **Singleton**: created once, cached and disposed by the root scope
//! - **Scoped**: created once per scope
//! - **Transient**: created on every resolution; the resolving scope still disposes it
//!
//! ## Sequences
//!
//! ```rust
//! use callsite_di::{ServiceCollection, Resolver};
//! use std::sync::Arc;
//!
//! trait Plugin: Send + Sync {
//!     fn name(&self) -> &'static str;
//! }
//!
//! struct A;
//! struct B;
//! impl Plugin for A { fn name(&self) -> &'static str { "a" } }
//! impl Plugin for B { fn name(&self) -> &'static str { "b" } }
//!
//! let mut services = ServiceCollection::new();
//! services.add_singleton_trait::<dyn Plugin>(Arc::new(A));
//! services.add_singleton_trait::<dyn Plugin>(Arc::new(B));
//!
//! let provider = services.build().unwrap();
//! let names: Vec<_> = provider.get_all::<dyn Plugin>().unwrap().iter().map(|p| p.name()).collect();
//! assert_eq!(names, ["a", "b"]);
//! assert_eq!(provider.get_required::<dyn Plugin>().name(), "b");
//! ```
//!
//! ## Scoped Services
//!
//! ```rust
//! use callsite_di::{ServiceCollection, Resolver};
//! use std::sync::Arc;
//!
//! struct RequestId(u64);
//!
//! let mut services = ServiceCollection::new();
//! services.add_scoped_factory::<RequestId, _>(|_| RequestId(7));
//!
//! let provider = services.build().unwrap();
//! let scope1 = provider.create_scope().unwrap();
//! let scope2 = provider.create_scope().unwrap();
//!
//! let req1 = scope1.get_required::<RequestId>();
//! let req2 = scope2.get_required::<RequestId>();
//! assert!(!Arc::ptr_eq(&req1, &req2));
//! ```

// Module declarations
pub mod activation;
pub mod collection;
pub mod config;
pub mod descriptors;
pub mod error;
pub mod instance;
pub mod key;
pub mod lifetime;
pub mod observer;
pub mod overrides;
pub mod provider;
pub mod traits;

// Internal modules
mod call_site;
mod internal;
mod registration;
mod validation;

pub use activation::{Arguments, Constructor, ConstructorBuilder, Implementation, OpenImplementation, Parameter};
pub use call_site::CacheLocation;
pub use collection::{ServiceCollection, ServiceCollectionExt, ServiceCollectionModuleExt, ServiceModule};
pub use config::{
    ConfigSource, ConfigValue, EnvironmentConfigSource, MapConfigSource, ProviderOptions, ResolveMode, DEFAULT_ENV_PREFIX,
};
pub use descriptors::{FactoryFn, RegisteredService, ServiceDescriptor, ServiceDescriptorInfo, ServiceSource, SourceKind};
pub use error::{
    ConfigurationError, ConstructorError, DescriptorFailure, DiError, DiResult, ScopeValidationError,
};
pub use instance::{downcast, erase, AnyArc, Disposer, Instance, Optional};
pub use internal::ResolutionPanic;
pub use key::{GenericDefinition, GenericParameter, ServiceType};
pub use lifetime::Lifetime;
pub use observer::{DiObserver, TracingObserver};
pub use overrides::{OverrideFactory, OverridePredicate, ServiceOverride};
pub use provider::{ResolverContext, Scope, ServiceProvider};
pub use traits::{AsyncDispose, Dispose, Resolver, ResolverCore};
