//! YAML persistence for run records and workflows.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use studio_core::error::CoreError;
use studio_core::experiment::ExptConfig;
use studio_core::nwb::NWB_EXTENSION;
use studio_core::types::{parse_timestamp, RunId};
use studio_core::workflow::WorkflowConfig;

use crate::error::PipelineError;
use crate::layout::{files_with_suffix, DataDir, RunDir};

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

pub async fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, PipelineError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(PipelineError::io(path))?;
    serde_yaml::from_str(&raw).map_err(PipelineError::yaml(path))
}

/// Serialize `value` and replace `path` with it.
///
/// Writes a sibling temp file and renames it over the target so readers see
/// either the old or the new document.
pub async fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let raw = serde_yaml::to_string(value).map_err(PipelineError::yaml(path))?;
    write_atomic(path, raw.as_bytes()).await
}

pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(PipelineError::io(parent))?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4().simple()));
    tokio::fs::write(&tmp, contents)
        .await
        .map_err(PipelineError::io(&tmp))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(PipelineError::io(path)(e));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Experiment records
// ---------------------------------------------------------------------------

pub struct ExptConfigReader;

impl ExptConfigReader {
    /// Parse a run record. Missing required keys fail the whole read.
    pub async fn read(path: &Path) -> Result<ExptConfig, PipelineError> {
        read_yaml(path).await
    }
}

pub struct ExptConfigWriter;

impl ExptConfigWriter {
    pub async fn write(path: &Path, config: &ExptConfig) -> Result<(), PipelineError> {
        write_yaml(path, config).await
    }

    /// Replace the run's `name`, leaving every other key as stored.
    pub async fn rename(path: &Path, new_name: &str) -> Result<ExptConfig, PipelineError> {
        let mut doc: serde_yaml::Value = read_yaml(path).await?;
        let serde_yaml::Value::Mapping(map) = &mut doc else {
            return Err(PipelineError::Yaml {
                path: path.to_path_buf(),
                source: serde::de::Error::custom("experiment file is not a mapping"),
            });
        };
        map.insert("name".into(), new_name.into());
        write_yaml(path, &doc).await?;
        serde_yaml::from_value(doc).map_err(PipelineError::yaml(path))
    }
}

// ---------------------------------------------------------------------------
// Workflows
// ---------------------------------------------------------------------------

pub struct WorkflowConfigReader;

impl WorkflowConfigReader {
    /// Read a workflow, merging algorithm node parameters onto defaults.
    pub async fn read(path: &Path) -> Result<WorkflowConfig, PipelineError> {
        let config: WorkflowConfig = read_yaml(path).await?;
        Ok(config.with_default_params()?)
    }
}

pub struct WorkflowConfigWriter;

impl WorkflowConfigWriter {
    pub async fn write(path: &Path, config: &WorkflowConfig) -> Result<(), PipelineError> {
        write_yaml(path, config).await
    }
}

// ---------------------------------------------------------------------------
// Experiment store
// ---------------------------------------------------------------------------

/// Workspace-level queries over persisted runs.
#[derive(Debug, Clone)]
pub struct ExperimentStore {
    data: DataDir,
}

impl ExperimentStore {
    pub fn new(data: DataDir) -> Self {
        Self { data }
    }

    pub fn data_dir(&self) -> &DataDir {
        &self.data
    }

    /// Run directory that must already hold a run record.
    pub async fn existing_run(&self, workspace_id: &str, unique_id: &str) -> Result<RunDir, PipelineError> {
        let run = self.data.run(workspace_id, unique_id)?;
        if !run.exists().await {
            return Err(PipelineError::RunNotFound {
                workspace_id: workspace_id.to_string(),
                unique_id: unique_id.to_string(),
            });
        }
        Ok(run)
    }

    pub async fn read(&self, workspace_id: &str, unique_id: &str) -> Result<ExptConfig, PipelineError> {
        let run = self.existing_run(workspace_id, unique_id).await?;
        ExptConfigReader::read(&run.experiment_file()).await
    }

    /// Every readable run record in the workspace, oldest first.
    ///
    /// Unreadable records are skipped.
    pub async fn list_experiments(&self, workspace_id: &str) -> Result<Vec<ExptConfig>, PipelineError> {
        let dir = self.data.workspace_dir(workspace_id)?;
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(PipelineError::io(&dir))?;
        let mut configs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(PipelineError::io(&dir))?
        {
            let path = entry.path().join(crate::layout::EXPERIMENT_FILE);
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                continue;
            }
            match ExptConfigReader::read(&path).await {
                Ok(config) => configs.push(config),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable experiment");
                }
            }
        }
        configs.sort_by(|a, b| started_at_key(a).cmp(&started_at_key(b)));
        Ok(configs)
    }

    /// The most recently started run, if any.
    pub async fn last_experiment(&self, workspace_id: &str) -> Result<Option<ExptConfig>, PipelineError> {
        Ok(self
            .list_experiments(workspace_id)
            .await?
            .into_iter()
            .max_by(|a, b| started_at_key(a).cmp(&started_at_key(b))))
    }

    pub async fn rename(&self, workspace_id: &str, unique_id: &str, new_name: &str) -> Result<ExptConfig, PipelineError> {
        let run = self.existing_run(workspace_id, unique_id).await?;
        let config = ExptConfigWriter::rename(&run.experiment_file(), new_name).await?;
        tracing::info!(workspace_id, unique_id, new_name, "Experiment renamed");
        Ok(config)
    }

    /// Remove a run's whole output directory.
    pub async fn delete_run(&self, workspace_id: &str, unique_id: &str) -> Result<(), PipelineError> {
        let run = self.data.run(workspace_id, unique_id)?;
        match tokio::fs::remove_dir_all(run.path()).await {
            Ok(()) => {
                tracing::info!(workspace_id, unique_id, "Run output deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(PipelineError::RunNotFound {
                workspace_id: workspace_id.to_string(),
                unique_id: unique_id.to_string(),
            }),
            Err(e) => Err(PipelineError::io(run.path())(e)),
        }
    }

    /// Delete several runs. Missing runs are skipped; returns the ids
    /// actually deleted.
    pub async fn delete_runs(&self, workspace_id: &str, unique_ids: &[RunId]) -> Result<Vec<RunId>, PipelineError> {
        let mut deleted = Vec::with_capacity(unique_ids.len());
        for unique_id in unique_ids {
            match self.delete_run(workspace_id, unique_id).await {
                Ok(()) => deleted.push(unique_id.clone()),
                Err(PipelineError::RunNotFound { .. }) => {
                    tracing::warn!(workspace_id, unique_id = %unique_id, "Run to delete not found");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(deleted)
    }
}

// ---------------------------------------------------------------------------
// Downloads
// ---------------------------------------------------------------------------

impl ExperimentStore {
    /// First NWB export of a run, or of one node when `node_id` is given.
    pub async fn nwb_file(
        &self,
        workspace_id: &str,
        unique_id: &str,
        node_id: Option<&str>,
    ) -> Result<PathBuf, PipelineError> {
        let run = self.existing_run(workspace_id, unique_id).await?;
        let dir = match node_id {
            Some(node_id) => run.node_dir(node_id)?,
            None => run.path().to_path_buf(),
        };
        files_with_suffix(&dir, &format!(".{NWB_EXTENSION}"))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                let id = match node_id {
                    Some(node_id) => format!("{unique_id}/{node_id}"),
                    None => unique_id.to_string(),
                };
                CoreError::not_found("NWB file", id).into()
            })
    }

    /// A regular file inside the run directory, named relative to it.
    ///
    /// Symlinks are resolved first; targets outside the run directory are
    /// rejected.
    pub async fn output_file(
        &self,
        workspace_id: &str,
        unique_id: &str,
        relative: &str,
    ) -> Result<PathBuf, PipelineError> {
        let run = self.existing_run(workspace_id, unique_id).await?;
        let path = run.file(relative)?;
        let resolved = match tokio::fs::canonicalize(&path).await {
            Ok(resolved) => resolved,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CoreError::not_found("Output file", relative).into());
            }
            Err(e) => return Err(PipelineError::io(&path)(e)),
        };
        let root = tokio::fs::canonicalize(run.path())
            .await
            .map_err(PipelineError::io(run.path()))?;
        if !resolved.starts_with(&root) {
            tracing::warn!(workspace_id, unique_id, relative, "Output path leaves the run directory");
            return Err(CoreError::Validation(format!("Invalid output path: {relative:?}")).into());
        }
        let metadata = tokio::fs::metadata(&resolved)
            .await
            .map_err(PipelineError::io(&resolved))?;
        if !metadata.is_file() {
            return Err(CoreError::not_found("Output file", relative).into());
        }
        Ok(resolved)
    }
}

/// Sort key for `started_at`: parsed time first, raw string as tie-break
/// for values in an unexpected format.
fn started_at_key(config: &ExptConfig) -> (Option<impl Ord>, &str) {
    (parse_timestamp(&config.started_at), config.started_at.as_str())
}
