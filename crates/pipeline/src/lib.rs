//! Filesystem side of workflow runs: run directory layout, YAML run
//! records, output export, result collation and task-runner dispatch.

pub mod collator;
pub mod error;
pub mod executor;
pub mod export;
pub mod layout;
pub mod runner;
pub mod store;

pub use error::PipelineError;
