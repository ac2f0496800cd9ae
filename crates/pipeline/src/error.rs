use std::path::{Path, PathBuf};

use studio_core::error::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Run not found: {workspace_id}/{unique_id}")]
    RunNotFound {
        workspace_id: String,
        unique_id: String,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Task runner failed: {0}")]
    Executor(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl PipelineError {
    /// `map_err` adapter attaching the offending path to an I/O error.
    pub fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn yaml(path: &Path) -> impl FnOnce(serde_yaml::Error) -> Self + '_ {
        move |source| PipelineError::Yaml {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn json(path: &Path) -> impl FnOnce(serde_json::Error) -> Self + '_ {
        move |source| PipelineError::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}
