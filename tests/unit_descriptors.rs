/// Unit tests for ServiceDescriptor
/// Accessors, display text and introspection summaries

use callsite_di::{
    erase, GenericDefinition, GenericParameter, Implementation, Lifetime, OpenImplementation, RegisteredService,
    ServiceCollection, ServiceDescriptor, ServiceType, SourceKind,
};
use std::sync::Arc;

struct Widget;
struct RepositoryMarker;

#[test]
fn test_instance_descriptor_is_singleton() {
    let descriptor = ServiceDescriptor::instance(ServiceType::of::<u32>(), erase(Arc::new(7u32)));
    assert_eq!(descriptor.lifetime(), Lifetime::Singleton);
    assert_eq!(descriptor.source().kind(), SourceKind::Instance);
    assert_eq!(descriptor.service_type(), Some(&ServiceType::of::<u32>()));
    assert!(!descriptor.is_open_generic());
    assert_eq!(descriptor.to_string(), "Service: u32 Lifetime: Singleton Instance");
}

#[test]
fn test_factory_descriptor_display() {
    let descriptor = ServiceDescriptor::factory(ServiceType::of::<u8>(), Lifetime::Scoped, |_| {
        Ok(callsite_di::Instance::from_value(1u8))
    });
    assert_eq!(descriptor.to_string(), "Service: u8 Lifetime: Scoped Factory");
    assert_eq!(descriptor.info().implementation, None);
}

#[test]
fn test_implementation_descriptor_names_the_implementation() {
    let descriptor = ServiceDescriptor::implementation(
        ServiceType::of::<Widget>(),
        Lifetime::Transient,
        Implementation::of("WidgetImpl", || Widget),
    );
    let info = descriptor.info();
    assert_eq!(info.source, SourceKind::Implementation);
    assert_eq!(info.implementation, Some("WidgetImpl"));
    assert_eq!(info.lifetime, Lifetime::Transient);
    assert!(descriptor.to_string().ends_with("Lifetime: Transient Implementation: WidgetImpl"));
}

#[test]
fn test_open_generic_descriptor() {
    let definition = GenericDefinition::new::<RepositoryMarker>("Repository", vec![GenericParameter::new("T")]);
    let descriptor = ServiceDescriptor::open_generic(
        definition.clone(),
        Lifetime::Scoped,
        OpenImplementation::new("SqlRepository", vec![GenericParameter::new("T")], |_| None),
    );
    assert!(descriptor.is_open_generic());
    assert!(descriptor.service_type().is_none());
    assert_eq!(descriptor.service(), &RegisteredService::Open(definition));
    assert_eq!(
        descriptor.to_string(),
        "Service: Repository<T> Lifetime: Scoped Implementation: SqlRepository"
    );
}

#[test]
fn test_debug_omits_the_value() {
    let descriptor = ServiceDescriptor::instance(ServiceType::of::<String>(), erase(Arc::new("secret".to_string())));
    let debug = format!("{descriptor:?}");
    assert!(debug.contains("ServiceDescriptor"));
    assert!(debug.contains("Instance"));
    assert!(!debug.contains("secret"));
}

#[test]
fn test_collection_keeps_registration_order() {
    let mut services = ServiceCollection::new();
    services.add_singleton(1u8);
    services.add_transient_factory::<u16, _>(|_| 2u16);
    services.add_singleton(3u8);

    let kinds: Vec<_> = services.descriptors().into_iter().map(|d| (d.service, d.lifetime)).collect();
    assert_eq!(
        kinds,
        vec![
            ("u8".to_string(), Lifetime::Singleton),
            ("u16".to_string(), Lifetime::Transient),
            ("u8".to_string(), Lifetime::Singleton),
        ]
    );
}

#[test]
fn test_provider_reports_descriptors() {
    let mut services = ServiceCollection::new();
    services.add_scoped_factory::<Widget, _>(|_| Widget);
    let provider = services.build().unwrap();

    let descriptors = provider.descriptors();
    assert_eq!(descriptors.len(), 1);
    assert_eq!(descriptors[0].lifetime, Lifetime::Scoped);
    assert_eq!(descriptors[0].source, SourceKind::Factory);
}
