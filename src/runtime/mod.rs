// ABOUTME: Container runtime access for the deployment engine.
// ABOUTME: Capability traits plus the bollard-backed Docker implementation.

mod docker;
mod error;
mod traits;

pub use docker::BollardRuntime;
pub use error::{RuntimeError, RuntimeErrorKind};
pub use traits::*;
