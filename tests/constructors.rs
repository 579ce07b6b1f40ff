use callsite_di::{
    Constructor, ConstructorError, DiError, DiResult, Dispose, Implementation, Instance, Lifetime, Resolver, ServiceCollection,
    ServiceType,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct Db;
struct Cache;
struct Metrics;

#[derive(Debug, PartialEq)]
enum Chosen {
    Empty,
    WithDb,
    WithDbAndCache,
}

struct Service(Chosen);

fn service_impl() -> Implementation {
    Implementation::new("Service")
        .constructor(Constructor::new("new").build(|_| Ok(Arc::new(Service(Chosen::Empty)))))
        .constructor(
            Constructor::new("with_db")
                .param::<Db>()
                .build(|_| Ok(Arc::new(Service(Chosen::WithDb)))),
        )
        .constructor(
            Constructor::new("with_db_and_cache")
                .param::<Db>()
                .param::<Cache>()
                .build(|_| Ok(Arc::new(Service(Chosen::WithDbAndCache)))),
        )
}

#[test]
fn longest_satisfiable_constructor_wins() {
    let mut services = ServiceCollection::new();
    services.add_singleton(Db);
    services.add_implementation::<Service>(Lifetime::Transient, service_impl());
    let provider = services.build().unwrap();
    assert_eq!(provider.get_required::<Service>().0, Chosen::WithDb);

    let mut services = ServiceCollection::new();
    services.add_singleton(Db).add_singleton(Cache);
    services.add_implementation::<Service>(Lifetime::Transient, service_impl());
    let provider = services.build().unwrap();
    assert_eq!(provider.get_required::<Service>().0, Chosen::WithDbAndCache);

    let mut services = ServiceCollection::new();
    services.add_implementation::<Service>(Lifetime::Transient, service_impl());
    let provider = services.build().unwrap();
    assert_eq!(provider.get_required::<Service>().0, Chosen::Empty);
}

#[test]
fn equally_long_unrelated_constructors_are_ambiguous() {
    let mut services = ServiceCollection::new();
    services.add_singleton(Db).add_singleton(Metrics);
    services.add_implementation::<Service>(
        Lifetime::Transient,
        Implementation::new("Service")
            .constructor(Constructor::new("from_db").param::<Db>().build(|_| Ok(Arc::new(Service(Chosen::WithDb)))))
            .constructor(
                Constructor::new("from_metrics")
                    .param::<Metrics>()
                    .build(|_| Ok(Arc::new(Service(Chosen::Empty)))),
            ),
    );
    let provider = services.build().unwrap();

    match provider.get::<Service>() {
        Err(DiError::ConstructorResolution(ConstructorError::Ambiguous { first, second, .. })) => {
            assert_eq!(first, "from_db");
            assert_eq!(second, "from_metrics");
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("selection should be ambiguous"),
    }
}

#[test]
fn missing_constructors_are_reported() {
    let mut services = ServiceCollection::new();
    services.add_implementation::<Service>(Lifetime::Transient, Implementation::new("Service"));
    let provider = services.build().unwrap();
    assert!(matches!(
        provider.get::<Service>(),
        Err(DiError::ConstructorResolution(ConstructorError::NoConstructor { .. }))
    ));
}

#[test]
fn unresolvable_parameters_fail_selection() {
    let mut services = ServiceCollection::new();
    services.add_implementation::<Service>(
        Lifetime::Transient,
        Implementation::new("Service")
            .constructor(Constructor::new("with_db").param::<Db>().build(|_| Ok(Arc::new(Service(Chosen::WithDb))))),
    );
    let provider = services.build().unwrap();
    match provider.get::<Service>() {
        Err(DiError::ConstructorResolution(ConstructorError::UnresolvableParameter { service, implementation })) => {
            assert!(service.ends_with("Db"));
            assert_eq!(implementation, "Service");
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("Db is not registered"),
    }

    let mut services = ServiceCollection::new();
    services.add_implementation::<Service>(
        Lifetime::Transient,
        Implementation::new("Service")
            .constructor(Constructor::new("with_db").param::<Db>().build(|_| Ok(Arc::new(Service(Chosen::WithDb)))))
            .constructor(
                Constructor::new("with_cache")
                    .param::<Cache>()
                    .build(|_| Ok(Arc::new(Service(Chosen::Empty)))),
            ),
    );
    let provider = services.build().unwrap();
    assert!(matches!(
        provider.get::<Service>(),
        Err(DiError::ConstructorResolution(ConstructorError::NoResolvableConstructor { .. }))
    ));
}

#[test]
fn defaults_fill_unregistered_parameters() {
    struct Port(u16);
    struct Server {
        port: Arc<Port>,
    }

    let server = || {
        Implementation::new("Server").constructor(
            Constructor::new("new")
                .param_or::<Port>(Arc::new(Port(80)))
                .build(|a| Ok(Arc::new(Server { port: a.next()? }))),
        )
    };

    let mut services = ServiceCollection::new();
    services.add_implementation::<Server>(Lifetime::Transient, server());
    let provider = services.build().unwrap();
    assert_eq!(provider.get_required::<Server>().port.0, 80);

    let mut services = ServiceCollection::new();
    services.add_singleton(Port(8080));
    services.add_implementation::<Server>(Lifetime::Transient, server());
    let provider = services.build().unwrap();
    assert_eq!(provider.get_required::<Server>().port.0, 8080);
}

#[test]
fn sequence_and_optional_parameters() {
    trait Plugin: Send + Sync {
        fn id(&self) -> u8;
    }
    struct P(u8);
    impl Plugin for P {
        fn id(&self) -> u8 {
            self.0
        }
    }

    struct Host {
        plugins: Vec<Arc<dyn Plugin>>,
        cache: Option<Arc<Cache>>,
    }

    let mut services = ServiceCollection::new();
    services.add_singleton_trait::<dyn Plugin>(Arc::new(P(1)));
    services.add_transient_trait_factory::<dyn Plugin, _>(|_| Arc::new(P(2)));
    services.add_implementation::<Host>(
        Lifetime::Transient,
        Implementation::new("Host").constructor(
            Constructor::new("new")
                .param_type(ServiceType::sequence_of::<dyn Plugin>())
                .param_type(ServiceType::optional_of::<Cache>())
                .build(|a| {
                    Ok(Arc::new(Host {
                        plugins: a.next_all::<dyn Plugin>()?,
                        cache: a.next_optional::<Cache>()?,
                    }))
                }),
        ),
    );
    let provider = services.build().unwrap();

    let host = provider.get_required::<Host>();
    assert_eq!(host.plugins.iter().map(|p| p.id()).collect::<Vec<_>>(), vec![1, 2]);
    assert!(host.cache.is_none());
}

#[test]
fn constructed_instances_may_carry_disposers() {
    struct Conn(Arc<AtomicBool>);
    impl Dispose for Conn {
        fn dispose(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    let closed = Arc::new(AtomicBool::new(false));
    let flag = closed.clone();
    let mut services = ServiceCollection::new();
    services.add_implementation::<Conn>(
        Lifetime::Scoped,
        Implementation::new("Conn").constructor(
            Constructor::new("open").build_instance(move |_| Ok(Instance::disposable(Arc::new(Conn(flag.clone()))))),
        ),
    );
    let provider = services.build().unwrap();

    let scope = provider.create_scope().unwrap();
    scope.get_required::<Conn>();
    assert!(!closed.load(Ordering::SeqCst));
    scope.dispose();
    assert!(closed.load(Ordering::SeqCst));
}

#[test]
fn activation_errors_propagate() {
    let mut services = ServiceCollection::new();
    services.add_implementation::<Service>(
        Lifetime::Singleton,
        Implementation::new("Service").constructor(Constructor::new("new").build(|_| -> DiResult<Arc<Service>> {
            Err(DiError::Activation {
                implementation: "Service".into(),
                message: "refused".into(),
            })
        })),
    );
    let provider = services.build().unwrap();
    assert!(matches!(provider.get::<Service>(), Err(DiError::Activation { message, .. }) if message == "refused"));
}
