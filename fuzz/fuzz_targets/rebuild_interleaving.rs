#![no_main]

use callsite_di::{erase, Resolver, ServiceCollection, ServiceDescriptor, ServiceType};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

// Interprets the input as a small program against a running container.
fuzz_target!(|data: &[u8]| {
    if data.len() > 128 {
        return;
    }

    let mut services = ServiceCollection::new();
    services.add_singleton(0u16);
    let provider = services.build().unwrap();
    let scope = provider.create_scope().unwrap();

    let mut registered = vec![0u16];
    let mut visible = 1usize;

    for chunk in data.chunks(2) {
        let op = chunk[0] % 4;
        let arg = chunk.get(1).copied().unwrap_or(0) as u16;
        match op {
            0 => {
                provider
                    .add_registrations([ServiceDescriptor::instance(ServiceType::of::<u16>(), erase(Arc::new(arg)))])
                    .unwrap();
                registered.push(arg);
            }
            1 => {
                provider.rebuild().unwrap();
                visible = registered.len();
            }
            2 => {
                let value = scope.get_required::<u16>();
                assert_eq!(*value, registered[visible - 1]);
            }
            _ => {
                let all: Vec<u16> = provider.get_all::<u16>().unwrap().iter().map(|v| **v).collect();
                assert_eq!(all, registered[..visible]);
            }
        }
    }

    provider.dispose();
});
