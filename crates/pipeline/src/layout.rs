//! On-disk layout of run output.
//!
//! ```text
//! <data_dir>/output/<workspace_id>/<unique_id>/
//!     experiment.yaml
//!     workflow.yaml
//!     snakemake.yaml
//!     error.log
//!     <node_id>/<function>.result.json
//! ```

use std::path::{Path, PathBuf};

use studio_core::error::CoreError;
use studio_core::types::RunId;

use crate::error::PipelineError;

pub const EXPERIMENT_FILE: &str = "experiment.yaml";
pub const WORKFLOW_FILE: &str = "workflow.yaml";
pub const SNAKEMAKE_FILE: &str = "snakemake.yaml";
pub const ERROR_LOG_FILE: &str = "error.log";
pub const RESULT_SUFFIX: &str = ".result.json";

/// Fixed route segments that a workspace id may not shadow.
pub const RESERVED_WORKSPACE_IDS: &[&str] = &["delete", "download", "fetch", "import", "result"];

/// Length of generated run ids.
const RUN_ID_LEN: usize = 8;

/// A fresh run id: the first eight characters of a UUID v4.
pub fn new_run_id() -> RunId {
    uuid::Uuid::new_v4().simple().to_string()[..RUN_ID_LEN].to_string()
}

/// Reject ids that would escape their parent directory.
pub(crate) fn path_segment<'a>(kind: &str, value: &'a str) -> Result<&'a str, CoreError> {
    let valid = !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\', '\0']);
    if valid {
        Ok(value)
    } else {
        Err(CoreError::Validation(format!("Invalid {kind}: {value:?}")))
    }
}

/// Root of all persisted run output.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Uploaded input files. Relative file-node paths resolve here.
    pub fn input_dir(&self) -> PathBuf {
        self.root.join("input")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    pub fn workspace_dir(&self, workspace_id: &str) -> Result<PathBuf, CoreError> {
        if RESERVED_WORKSPACE_IDS.contains(&workspace_id) {
            return Err(CoreError::Validation(format!(
                "Workspace id {workspace_id:?} is reserved"
            )));
        }
        Ok(self
            .output_dir()
            .join(path_segment("workspace id", workspace_id)?))
    }

    pub fn run(&self, workspace_id: &str, unique_id: &str) -> Result<RunDir, CoreError> {
        let root = self
            .workspace_dir(workspace_id)?
            .join(path_segment("run id", unique_id)?);
        Ok(RunDir {
            workspace_id: workspace_id.to_string(),
            unique_id: unique_id.to_string(),
            root,
        })
    }
}

/// Directory of one run.
#[derive(Debug, Clone)]
pub struct RunDir {
    workspace_id: String,
    unique_id: String,
    root: PathBuf,
}

impl RunDir {
    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn experiment_file(&self) -> PathBuf {
        self.root.join(EXPERIMENT_FILE)
    }

    pub fn workflow_file(&self) -> PathBuf {
        self.root.join(WORKFLOW_FILE)
    }

    pub fn snakemake_file(&self) -> PathBuf {
        self.root.join(SNAKEMAKE_FILE)
    }

    pub fn error_log(&self) -> PathBuf {
        self.root.join(ERROR_LOG_FILE)
    }

    pub fn node_dir(&self, node_id: &str) -> Result<PathBuf, CoreError> {
        Ok(self.root.join(path_segment("node id", node_id)?))
    }

    /// Result artifact a node's task writes when it finishes.
    pub fn result_file(&self, node_id: &str, function: &str) -> Result<PathBuf, CoreError> {
        Ok(self
            .node_dir(node_id)?
            .join(format!("{}{RESULT_SUFFIX}", path_segment("function", function)?)))
    }

    /// A path inside the run directory given as `/`-separated segments.
    pub fn file(&self, relative: &str) -> Result<PathBuf, CoreError> {
        let mut path = self.root.clone();
        for part in relative.split('/') {
            path.push(path_segment("output path", part)?);
        }
        Ok(path)
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(self.experiment_file())
            .await
            .unwrap_or(false)
    }
}

/// Regular files in `dir` whose name ends with `suffix`, sorted. A missing
/// directory has none.
pub(crate) async fn files_with_suffix(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>, PipelineError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(PipelineError::io(dir)(e)),
    };
    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(PipelineError::io(dir))? {
        let name = entry.file_name();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file && name.to_string_lossy().ends_with(suffix) {
            found.push(entry.path());
        }
    }
    found.sort();
    Ok(found)
}
