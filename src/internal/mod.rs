//! Internal implementation details.

pub(crate) mod circular;
pub(crate) mod dispose_bag;

pub use circular::ResolutionPanic;
pub(crate) use circular::{catch_resolution_panic, raise_resolution_panic, StackGuard, ROOT_OWNER};
pub(crate) use dispose_bag::{BoxFutureUnit, DisposeBag};
