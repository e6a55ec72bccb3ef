//! Device actions and their uniform result shape.

mod executor;
mod result;

pub use executor::{ActionExecutor, SettleTiming};
pub use result::{ActionResult, FailureKind};
