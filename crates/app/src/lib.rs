//! Process wiring: builds the pipeline from an [`AppConfig`] and runs it.
//!
//! [`AppConfig`]: jobwatch_infra::AppConfig

pub mod system;

pub use system::{BuildError, Collaborators, JobSystem};
