//! Service descriptors: the immutable registration records.

use std::fmt;
use std::sync::Arc;

use crate::activation::{Implementation, OpenImplementation};
use crate::error::DiResult;
use crate::instance::{AnyArc, Instance};
use crate::key::{GenericDefinition, ServiceType};
use crate::lifetime::Lifetime;
use crate::provider::ResolverContext;

/// Type-erased factory producing an [`Instance`].
pub type FactoryFn = Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> DiResult<Instance> + Send + Sync>;

/// The service a descriptor registers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegisteredService {
    Closed(ServiceType),
    Open(GenericDefinition),
}

impl fmt::Display for RegisteredService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisteredService::Closed(t) => fmt::Display::fmt(t, f),
            RegisteredService::Open(d) => fmt::Display::fmt(d, f),
        }
    }
}

/// How a descriptor produces its value.
#[derive(Clone)]
pub enum ServiceSource {
    /// A pre-built value; never disposed by the container.
    Instance(AnyArc),
    Factory(FactoryFn),
    Implementation(Arc<Implementation>),
    OpenImplementation(Arc<OpenImplementation>),
}

impl ServiceSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            ServiceSource::Instance(_) => SourceKind::Instance,
            ServiceSource::Factory(_) => SourceKind::Factory,
            ServiceSource::Implementation(_) => SourceKind::Implementation,
            ServiceSource::OpenImplementation(_) => SourceKind::OpenImplementation,
        }
    }

    fn implementation_name(&self) -> Option<&'static str> {
        match self {
            ServiceSource::Implementation(i) => Some(i.name()),
            ServiceSource::OpenImplementation(i) => Some(i.name()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Instance,
    Factory,
    Implementation,
    OpenImplementation,
}

/// One registration. Immutable once added to a collection.
#[derive(Clone)]
pub struct ServiceDescriptor {
    service: RegisteredService,
    lifetime: Lifetime,
    source: ServiceSource,
}

impl ServiceDescriptor {
    /// Unchecked constructor; shape errors surface when the container is built.
    pub fn new(service: RegisteredService, lifetime: Lifetime, source: ServiceSource) -> Self {
        Self { service, lifetime, source }
    }

    /// A fixed singleton value.
    pub fn instance(service_type: ServiceType, value: AnyArc) -> Self {
        Self::new(
            RegisteredService::Closed(service_type),
            Lifetime::Singleton,
            ServiceSource::Instance(value),
        )
    }

    pub fn factory<F>(service_type: ServiceType, lifetime: Lifetime, factory: F) -> Self
    where
        F: for<'a> Fn(&ResolverContext<'a>) -> DiResult<Instance> + Send + Sync + 'static,
    {
        Self::new(
            RegisteredService::Closed(service_type),
            lifetime,
            ServiceSource::Factory(Arc::new(factory)),
        )
    }

    pub fn implementation(service_type: ServiceType, lifetime: Lifetime, implementation: Implementation) -> Self {
        Self::new(
            RegisteredService::Closed(service_type),
            lifetime,
            ServiceSource::Implementation(Arc::new(implementation)),
        )
    }

    pub fn open_generic(definition: GenericDefinition, lifetime: Lifetime, implementation: OpenImplementation) -> Self {
        Self::new(
            RegisteredService::Open(definition),
            lifetime,
            ServiceSource::OpenImplementation(Arc::new(implementation)),
        )
    }

    pub fn service(&self) -> &RegisteredService {
        &self.service
    }

    pub fn service_type(&self) -> Option<&ServiceType> {
        match &self.service {
            RegisteredService::Closed(t) => Some(t),
            RegisteredService::Open(_) => None,
        }
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn source(&self) -> &ServiceSource {
        &self.source
    }

    pub fn is_open_generic(&self) -> bool {
        matches!(self.service, RegisteredService::Open(_))
    }

    /// Introspection summary.
    pub fn info(&self) -> ServiceDescriptorInfo {
        ServiceDescriptorInfo {
            service: self.service.to_string(),
            lifetime: self.lifetime,
            source: self.source.kind(),
            implementation: self.source.implementation_name(),
        }
    }
}

impl fmt::Display for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service: {} Lifetime: {}", self.service, self.lifetime)?;
        match &self.source {
            ServiceSource::Instance(_) => f.write_str(" Instance"),
            ServiceSource::Factory(_) => f.write_str(" Factory"),
            ServiceSource::Implementation(i) => write!(f, " Implementation: {}", i.name()),
            ServiceSource::OpenImplementation(i) => write!(f, " Implementation: {}", i.name()),
        }
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("service", &self.service)
            .field("lifetime", &self.lifetime)
            .field("source", &self.source.kind())
            .finish()
    }
}

/// Read-only summary of a descriptor for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptorInfo {
    pub service: String,
    pub lifetime: Lifetime,
    pub source: SourceKind,
    pub implementation: Option<&'static str>,
}
