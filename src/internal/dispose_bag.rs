//! Internal disposal bag for managing cleanup hooks.

use std::future::Future;
use std::pin::Pin;

use crate::instance::Disposer;

/// Future type for disposal operations.
pub(crate) type BoxFutureUnit = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Disposers in capture order, run LIFO.
#[derive(Default)]
pub(crate) struct DisposeBag {
    hooks: Vec<Disposer>,
}

impl DisposeBag {
    pub(crate) fn push(&mut self, disposer: Disposer) {
        self.hooks.push(disposer);
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.len()
    }

    pub(crate) fn take(&mut self) -> DisposeBag {
        std::mem::take(self)
    }

    /// Runs every hook in reverse order, blocking on async-only hooks.
    pub(crate) fn run_all_blocking_reverse(mut self) {
        while let Some(hook) = self.hooks.pop() {
            hook.dispose_blocking();
        }
    }

    /// Runs every hook in reverse order, awaiting async parts.
    pub(crate) async fn run_all_async_reverse(mut self) {
        while let Some(hook) = self.hooks.pop() {
            hook.dispose_async().await;
        }
    }
}
