use callsite_di::{
    ConfigurationError, Constructor, DiError, GenericDefinition, GenericParameter, Implementation, Lifetime,
    OpenImplementation, RegisteredService, Resolver, ServiceCollection, ServiceDescriptor, ServiceSource,
    ServiceType,
};
use std::sync::Arc;

trait Store: Send + Sync {
    fn entity(&self) -> &'static str;
    fn origin(&self) -> &'static str;
}

struct MemoryStore {
    entity: &'static str,
    origin: &'static str,
}

impl Store for MemoryStore {
    fn entity(&self) -> &'static str {
        self.entity
    }
    fn origin(&self) -> &'static str {
        self.origin
    }
}

struct RepositoryMarker;
struct PairMarker;
struct User;
struct Order;
struct Invoice;

fn repository() -> GenericDefinition {
    GenericDefinition::new::<RepositoryMarker>("Repository", vec![GenericParameter::new("T")])
}

fn store(entity: &'static str, origin: &'static str) -> Implementation {
    Implementation::new("MemoryStore").constructor(
        Constructor::new("new").build(move |_| Ok(Arc::new(MemoryStore { entity, origin }) as Arc<dyn Store>)),
    )
}

/// Closes over `User` and `Order`; anything else is rejected.
fn open_store() -> OpenImplementation {
    OpenImplementation::new("MemoryStore", vec![GenericParameter::new("T")], |args| {
        if args[0].is::<User>() {
            Some(store("user", "open"))
        } else if args[0].is::<Order>() {
            Some(store("order", "open"))
        } else {
            None
        }
    })
}

#[test]
fn open_generic_is_closed_per_argument() {
    let mut services = ServiceCollection::new();
    services.add_open_generic(repository(), Lifetime::Singleton, open_store());
    let provider = services.build().unwrap();

    let users = repository().close([ServiceType::of::<User>()]);
    let orders = repository().close([ServiceType::of::<Order>()]);

    let a = provider.get_as::<dyn Store>(&users).unwrap();
    let b = provider.get_as::<dyn Store>(&users).unwrap();
    let c = provider.get_as::<dyn Store>(&orders).unwrap();

    assert_eq!(a.entity(), "user");
    assert_eq!(c.entity(), "order");
    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
}

#[test]
fn exact_registration_beats_open_generic() {
    let users = repository().close([ServiceType::of::<User>()]);

    let mut services = ServiceCollection::new();
    services.add_open_generic(repository(), Lifetime::Transient, open_store());
    services.add(ServiceDescriptor::implementation(users.clone(), Lifetime::Singleton, store("user", "exact")));
    let provider = services.build().unwrap();

    assert_eq!(provider.get_as::<dyn Store>(&users).unwrap().origin(), "exact");
}

#[test]
fn sequence_of_closed_generic_mixes_exact_and_open() {
    let users = repository().close([ServiceType::of::<User>()]);

    let mut services = ServiceCollection::new();
    services.add(ServiceDescriptor::implementation(users.clone(), Lifetime::Singleton, store("user", "exact")));
    services.add_open_generic(repository(), Lifetime::Singleton, open_store());
    let provider = services.build().unwrap();

    let origins: Vec<_> = provider
        .get_all_as::<dyn Store>(&users)
        .unwrap()
        .iter()
        .map(|s| s.origin())
        .collect();
    assert_eq!(origins, vec!["exact", "open"]);

    // The single resolution still picks the exact registration and shares its singleton.
    let single = provider.get_as::<dyn Store>(&users).unwrap();
    assert_eq!(single.origin(), "exact");
    assert!(Arc::ptr_eq(&single, &provider.get_all_as::<dyn Store>(&users).unwrap()[0]));
}

#[test]
fn rejected_closing_is_an_error_for_single_resolution() {
    let mut services = ServiceCollection::new();
    services.add_open_generic(repository(), Lifetime::Transient, open_store());
    let provider = services.build().unwrap();

    let invoices = repository().close([ServiceType::of::<Invoice>()]);
    assert!(matches!(
        provider.get_as::<dyn Store>(&invoices),
        Err(DiError::Configuration(ConfigurationError::ClosingRejected { .. }))
    ));
    // A sequence silently skips the registration instead.
    assert!(provider.get_all_as::<dyn Store>(&invoices).unwrap().is_empty());
}

#[test]
fn wrong_argument_count_is_reported() {
    let mut services = ServiceCollection::new();
    services.add_open_generic(repository(), Lifetime::Transient, open_store());
    let provider = services.build().unwrap();

    let malformed = repository().close([ServiceType::of::<User>(), ServiceType::of::<Order>()]);
    assert!(matches!(
        provider.resolve(&malformed),
        Err(DiError::Configuration(ConfigurationError::ArityMismatch { expected: 1, actual: 2, .. }))
    ));
}

#[test]
fn implementation_arity_must_match_definition() {
    let pair = GenericDefinition::with_arity::<PairMarker>("Pair", 2);
    let mut services = ServiceCollection::new();
    services.add_open_generic(pair, Lifetime::Transient, open_store());
    assert!(matches!(
        services.build(),
        Err(DiError::Configuration(ConfigurationError::ArityMismatch { expected: 2, actual: 1, .. }))
    ));
}

#[test]
fn implementation_constraints_must_be_declared_by_service() {
    let mut services = ServiceCollection::new();
    services.add_open_generic(
        repository(),
        Lifetime::Transient,
        OpenImplementation::new(
            "EntityStore",
            vec![GenericParameter::new("T").with_constraint("entity")],
            |_| None,
        ),
    );
    match services.build() {
        Err(DiError::Configuration(ConfigurationError::ConstraintMismatch { parameter, .. })) => {
            assert_eq!(parameter, "T")
        }
        other => panic!("unexpected result {:?}", other.err()),
    }

    let constrained = GenericDefinition::new::<RepositoryMarker>(
        "Repository",
        vec![GenericParameter::new("T").with_constraint("entity").with_constraint("send")],
    );
    let mut services = ServiceCollection::new();
    services.add_open_generic(
        constrained,
        Lifetime::Transient,
        OpenImplementation::new(
            "EntityStore",
            vec![GenericParameter::new("T").with_constraint("entity")],
            |_| None,
        ),
    );
    assert!(services.build().is_ok());
}

#[test]
fn open_service_requires_open_implementation() {
    let mut services = ServiceCollection::new();
    services.add(ServiceDescriptor::new(
        RegisteredService::Open(repository()),
        Lifetime::Scoped,
        ServiceSource::Implementation(Arc::new(store("user", "exact"))),
    ));
    assert!(matches!(
        services.build(),
        Err(DiError::Configuration(ConfigurationError::OpenServiceWithoutOpenImplementation { .. }))
    ));
}

#[test]
fn is_service_understands_generics() {
    let mut services = ServiceCollection::new();
    services.add_open_generic(repository(), Lifetime::Transient, open_store());
    let provider = services.build().unwrap();

    assert!(provider.is_service(&repository().close([ServiceType::of::<Invoice>()])));
    assert!(provider.is_service(&ServiceType::sequence_of::<Invoice>()));
    let pair = GenericDefinition::with_arity::<PairMarker>("Pair", 2);
    assert!(!provider.is_service(&pair.close([ServiceType::of::<User>(), ServiceType::of::<Order>()])));
}

#[test]
fn closed_generics_feed_constructors() {
    struct Service {
        users: Arc<dyn Store>,
    }

    let users = repository().close([ServiceType::of::<User>()]);
    let mut services = ServiceCollection::new();
    services.add_open_generic(repository(), Lifetime::Scoped, open_store());
    services.add_implementation::<Service>(
        Lifetime::Transient,
        Implementation::new("Service").constructor(
            Constructor::new("new")
                .param_type(users.clone())
                .build(|args| Ok(Arc::new(Service { users: args.next::<dyn Store>()? }))),
        ),
    );
    let provider = services.build().unwrap();
    let scope = provider.create_scope().unwrap();

    let service = scope.get_required::<Service>();
    assert_eq!(service.users.entity(), "user");
    assert!(Arc::ptr_eq(&service.users, &scope.get_as::<dyn Store>(&users).unwrap()));
}
