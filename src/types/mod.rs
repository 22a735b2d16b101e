// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Phantom-typed runtime ids plus the validated project name.

mod id;
mod project_name;

pub use id::{ContainerId, ImageId};
pub use project_name::{ProjectName, ProjectNameError};
