// ABOUTME: Command module aggregator for the keeld CLI.
// ABOUTME: Re-exports the lifecycle, status, and env command handlers.

mod context;
mod env;
mod lifecycle;
mod status;

pub use context::Context;
pub use env::{env_ls, env_rm, env_set};
pub use lifecycle::{deploy, destroy, down, prune, up};
pub use status::{history, status};
