// ABOUTME: Library root for keel - the deployment engine behind the keeld binary.
// ABOUTME: The main binary is in main.rs.

pub mod build;
pub mod config;
pub mod containers;
pub mod data;
pub mod deploy;
pub mod error;
pub mod git;
pub mod notify;
pub mod output;
pub mod runtime;
pub mod types;
