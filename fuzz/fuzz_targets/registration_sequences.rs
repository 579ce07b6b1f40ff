#![no_main]

use callsite_di::{Lifetime, Resolver, ServiceCollection};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

// Each byte is one registration: low two bits pick the lifetime, the rest
// is the value the factory produces.
fuzz_target!(|data: &[u8]| {
    if data.is_empty() || data.len() > 64 {
        return;
    }

    let mut services = ServiceCollection::new();
    let mut expected = Vec::with_capacity(data.len());
    let mut lifetimes = Vec::with_capacity(data.len());

    for &byte in data {
        let lifetime = match byte & 0b11 {
            0 => Lifetime::Singleton,
            1 => Lifetime::Scoped,
            _ => Lifetime::Transient,
        };
        let value = (byte >> 2) as u32;
        services.add_factory::<TestService, _>(lifetime, move |_| Ok(Arc::new(TestService { value })));
        expected.push(value);
        lifetimes.push(lifetime);
    }

    let provider = match services.build() {
        Ok(provider) => provider,
        Err(_) => return,
    };
    let scope = provider.create_scope().unwrap();

    // Last registration wins
    let single = scope.get_required::<TestService>();
    assert_eq!(single.value, *expected.last().unwrap());

    // Sequences keep registration order
    let all = scope.get_all::<TestService>().unwrap();
    let values: Vec<u32> = all.iter().map(|s| s.value).collect();
    assert_eq!(values, expected);

    // Sequence items share identity with single resolution unless transient
    let shared = Arc::ptr_eq(&single, all.last().unwrap());
    assert_eq!(shared, *lifetimes.last().unwrap() != Lifetime::Transient);

    scope.dispose();
    provider.dispose();
});

#[derive(Debug)]
struct TestService {
    value: u32,
}
