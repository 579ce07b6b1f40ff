use callsite_di::{
    erase, Constructor, DiError, DiObserver, DiResult, Dispose, Implementation, Instance, Lifetime, ProviderOptions,
    Resolver, ServiceCollection, ServiceDescriptor, ServiceModule, ServiceType,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct Counter;
struct Fixed;

fn counting(lifetime: Lifetime, calls: &Arc<AtomicUsize>) -> ServiceDescriptor {
    let calls = calls.clone();
    ServiceDescriptor::factory(ServiceType::of::<Counter>(), lifetime, move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Instance::from_value(Counter))
    })
}

#[test]
fn realized_singletons_are_rebuilt_fixed_instances_are_not() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut services = ServiceCollection::new();
    services.add(counting(Lifetime::Singleton, &calls));
    services.add_singleton(Fixed);
    let provider = services.build().unwrap();

    let before = provider.get_required::<Counter>();
    let fixed_before = provider.get_required::<Fixed>();
    provider.rebuild().unwrap();
    let after = provider.get_required::<Counter>();

    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(Arc::ptr_eq(&fixed_before, &provider.get_required::<Fixed>()));
}

#[test]
fn appended_registration_becomes_the_default() {
    let mut services = ServiceCollection::new();
    services.add_singleton(1u32);
    let provider = services.build().unwrap();

    provider
        .add_registrations([ServiceDescriptor::instance(ServiceType::of::<u32>(), erase(Arc::new(2u32)))])
        .unwrap();
    assert_eq!(*provider.get_required::<u32>(), 1);

    provider.rebuild().unwrap();
    assert_eq!(*provider.get_required::<u32>(), 2);
    let all: Vec<u32> = provider.get_all::<u32>().unwrap().iter().map(|v| **v).collect();
    assert_eq!(all, vec![1, 2]);
    assert_eq!(provider.descriptors().len(), 2);
}

#[test]
fn scoped_instances_are_recreated_and_old_disposers_kept() {
    struct Conn(Arc<AtomicUsize>);
    impl Dispose for Conn {
        fn dispose(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let disposed = Arc::new(AtomicUsize::new(0));
    let d = disposed.clone();
    let mut services = ServiceCollection::new();
    services.add_disposable_factory::<Conn, _>(Lifetime::Scoped, move |_| Conn(d.clone()));
    let provider = services.build().unwrap();

    let scope = provider.create_scope().unwrap();
    let first = scope.get_required::<Conn>();
    provider.rebuild().unwrap();
    let second = scope.get_required::<Conn>();
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&second, &scope.get_required::<Conn>()));

    scope.dispose();
    assert_eq!(disposed.load(Ordering::SeqCst), 2);
}

#[test]
fn malformed_registrations_are_rejected_up_front() {
    use callsite_di::{ConfigurationError, OpenImplementation, RegisteredService, ServiceSource};

    let provider = ServiceCollection::new().build().unwrap();

    let result = provider.add_registrations([
        ServiceDescriptor::instance(ServiceType::of::<u8>(), erase(Arc::new(1u8))),
        ServiceDescriptor::new(
            RegisteredService::Closed(ServiceType::of::<u16>()),
            Lifetime::Transient,
            ServiceSource::OpenImplementation(Arc::new(OpenImplementation::new("Open", Vec::new(), |_| None))),
        ),
    ]);
    assert!(matches!(
        result,
        Err(DiError::Configuration(ConfigurationError::ClosedServiceWithOpenImplementation { .. }))
    ));
    assert!(provider.descriptors().is_empty());
}

#[test]
fn failed_rebuild_keeps_the_previous_graph() {
    struct Needy;
    struct Missing;

    let mut services = ServiceCollection::new();
    services.add_singleton(7u8);
    let provider = services
        .build_with_options(ProviderOptions::new().validate_on_build(true))
        .unwrap();

    provider
        .add_registrations([ServiceDescriptor::implementation(
            ServiceType::of::<Needy>(),
            Lifetime::Transient,
            Implementation::new("Needy")
                .constructor(Constructor::new("new").param::<Missing>().build(|_| Ok(Arc::new(Needy)))),
        )])
        .unwrap();

    assert!(matches!(provider.rebuild(), Err(DiError::AggregateConstruction(_))));
    assert_eq!(*provider.get_required::<u8>(), 7);
    assert!(!provider.is_service(&ServiceType::of::<Needy>()));
}

#[derive(Default)]
struct RebuildLog(Mutex<Vec<(u64, usize)>>);

impl DiObserver for RebuildLog {
    fn rebuilt(&self, generation: u64, registrations: usize) {
        self.0.lock().unwrap().push((generation, registrations));
    }
}

struct CacheModule;

impl ServiceModule for CacheModule {
    fn register_services(self, services: &mut ServiceCollection) -> DiResult<()> {
        services.add_singleton(String::from("redis://localhost"));
        services.add_scoped_factory::<Counter, _>(|_| Counter);
        Ok(())
    }
}

#[test]
fn load_module_appends_and_rebuilds_once() {
    let log = Arc::new(RebuildLog::default());
    let mut services = ServiceCollection::new();
    services.add_singleton(1u8);
    services.add_observer(log.clone());
    let provider = services.build().unwrap();

    assert!(!provider.is_service(&ServiceType::of::<String>()));
    provider.load_module(CacheModule).unwrap();

    assert_eq!(*provider.get_required::<String>(), "redis://localhost");
    assert!(provider.is_service(&ServiceType::of::<Counter>()));
    assert_eq!(*log.0.lock().unwrap(), vec![(1, 3)]);

    provider.rebuild().unwrap();
    assert_eq!(log.0.lock().unwrap().last(), Some(&(2, 3)));
}

#[test]
fn rebuild_after_dispose_is_rejected() {
    let provider = ServiceCollection::new().build().unwrap();
    provider.dispose();
    assert!(matches!(provider.rebuild(), Err(DiError::ObjectDisposed(_))));
    assert!(matches!(
        provider.add_registrations([ServiceDescriptor::instance(ServiceType::of::<u8>(), erase(Arc::new(1u8)))]),
        Err(DiError::ObjectDisposed(_))
    ));
}
