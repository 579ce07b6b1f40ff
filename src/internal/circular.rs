//! Runtime cycle detection for factory-driven resolution.
//!
//! Call-site graphs are checked for cycles when they are compiled, but a
//! factory can re-enter the container through its [`ResolverContext`]
//! and close a loop the graph never saw. Each thread keeps the stack of
//! call sites it is currently constructing; re-entering one of them is
//! reported as [`DiError::CircularDependency`] instead of deadlocking on
//! the call site's one-shot cell.
//!
//! [`ResolverContext`]: crate::ResolverContext

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};

use crate::call_site::CacheKey;
use crate::error::{DiError, DiResult};

pub(crate) const MAX_DEPTH: usize = 256;

thread_local! {
    static RESOLUTION_TLS: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// One call site under construction on this thread.
///
/// `owner` identifies the scope whose cache the result lands in; root
/// call sites use [`ROOT_OWNER`]. The same key under another scope is a
/// different instance, not a loop.
struct Frame {
    key: CacheKey,
    owner: usize,
    implementation: Option<&'static str>,
}

pub(crate) const ROOT_OWNER: usize = 0;

impl Frame {
    fn label(&self) -> String {
        let service = self.key.service_type.to_string();
        match self.implementation {
            Some(implementation) if !service.ends_with(implementation) => format!("{service}({implementation})"),
            _ => service,
        }
    }
}

/// Panic payload raised by [`Resolver::get_required`](crate::Resolver::get_required).
///
/// Caught at the factory boundary and turned back into the carried error.
#[derive(Debug)]
pub struct ResolutionPanic {
    pub service: String,
    pub error: DiError,
}

/// Pops the current call site when construction ends, even on unwind.
pub(crate) struct StackGuard(());

impl StackGuard {
    pub(crate) fn enter(key: &CacheKey, owner: usize, implementation: Option<&'static str>) -> DiResult<Self> {
        RESOLUTION_TLS.with(|tls| {
            let mut stack = tls.borrow_mut();

            if stack.iter().any(|f| f.owner == owner && f.key == *key) {
                let mut path: Vec<String> = stack.iter().map(Frame::label).collect();
                path.push(key.service_type.to_string());
                return Err(DiError::CircularDependency {
                    service: key.service_type.to_string(),
                    path,
                });
            }

            if stack.len() >= MAX_DEPTH {
                return Err(DiError::DepthExceeded(stack.len()));
            }

            stack.push(Frame {
                key: key.clone(),
                owner,
                implementation,
            });
            Ok(StackGuard(()))
        })
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        RESOLUTION_TLS.with(|tls| {
            tls.borrow_mut().pop();
        });
    }
}

pub(crate) fn raise_resolution_panic(service: &str, error: DiError) -> ! {
    panic::panic_any(ResolutionPanic {
        service: service.to_string(),
        error,
    })
}

/// Runs user code, converting a [`ResolutionPanic`] back into its error.
/// Any other panic keeps unwinding.
pub(crate) fn catch_resolution_panic<T, F>(f: F) -> DiResult<T>
where
    F: FnOnce() -> DiResult<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => match payload.downcast::<ResolutionPanic>() {
            Ok(resolution) => Err(resolution.error),
            Err(other) => panic::resume_unwind(other),
        },
    }
}
