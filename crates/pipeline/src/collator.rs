//! Result collation.
//!
//! The task runner never reports back directly; completion is inferred from
//! the files it leaves behind. [`WorkflowResult::get`] inspects those files
//! for the requested nodes and folds what it finds into the run record.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use studio_core::experiment::{ExptConfig, Message, OutputPaths};
use studio_core::nwb::NWB_EXTENSION;
use studio_core::output::NodeResult;
use studio_core::types::{now_timestamp, NodeId};

use crate::error::PipelineError;
use crate::export::export;
use crate::layout::{files_with_suffix, RunDir, RESULT_SUFFIX};
use crate::store::{ExptConfigReader, ExptConfigWriter};

pub struct WorkflowResult {
    run: RunDir,
}

impl WorkflowResult {
    pub fn new(run: RunDir) -> Self {
        Self { run }
    }

    /// Collect outcomes for `node_ids`, in the order given.
    ///
    /// Nodes with no result artifact yet are left out of the returned map.
    /// Ids unknown to the run are reported as errors without touching the
    /// record.
    pub async fn get(&self, node_ids: &[NodeId]) -> Result<IndexMap<NodeId, Message>, PipelineError> {
        let expt_path = self.run.experiment_file();
        if !self.run.exists().await {
            return Err(PipelineError::RunNotFound {
                workspace_id: self.run.workspace_id().to_string(),
                unique_id: self.run.unique_id().to_string(),
            });
        }
        let mut config = ExptConfigReader::read(&expt_path).await?;
        let error_log = self.read_error_log().await?;

        let mut results = IndexMap::new();
        for node_id in node_ids {
            let Some(function) = config.function.get(node_id) else {
                results.insert(node_id.clone(), Message::error(format!("Unknown node {node_id}")));
                continue;
            };

            let message = match &error_log {
                Some(log) => Some(Message::error(log.clone())),
                None => {
                    NodeResultReader::new(self.run.node_dir(node_id)?, &function.name)
                        .collect()
                        .await?
                }
            };
            let Some(message) = message else {
                continue;
            };

            self.record(&mut config, node_id, &message).await?;
            results.insert(node_id.clone(), message);
        }

        if has_nwb_file(self.run.path()).await? {
            config.has_nwb = true;
        }
        if config.aggregate(now_timestamp()) {
            tracing::info!(
                workspace_id = self.run.workspace_id(),
                unique_id = self.run.unique_id(),
                success = ?config.success,
                "Run finished"
            );
        }
        ExptConfigWriter::write(&expt_path, &config).await?;

        Ok(results)
    }

    /// Store one node's outcome and persist the record.
    async fn record(&self, config: &mut ExptConfig, node_id: &str, message: &Message) -> Result<(), PipelineError> {
        let node_dir = self.run.node_dir(node_id)?;
        let Some(function) = config.function.get_mut(node_id) else {
            return Ok(());
        };
        function.record(message, now_timestamp());
        if has_nwb_file(&node_dir).await? {
            function.has_nwb = true;
        }
        tracing::debug!(
            unique_id = self.run.unique_id(),
            node_id,
            status = ?message.status,
            "Node result recorded"
        );
        ExptConfigWriter::write(&self.run.experiment_file(), config).await
    }

    /// Run-wide error log contents, if the file exists and is non-empty.
    async fn read_error_log(&self) -> Result<Option<String>, PipelineError> {
        let path = self.run.error_log();
        match tokio::fs::read_to_string(&path).await {
            Ok(text) if !text.trim().is_empty() => Ok(Some(text)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PipelineError::io(&path)(e)),
        }
    }
}

/// Reads and classifies one node's result artifact.
struct NodeResultReader<'a> {
    node_dir: PathBuf,
    function: &'a str,
}

impl<'a> NodeResultReader<'a> {
    fn new(node_dir: PathBuf, function: &'a str) -> Self {
        Self { node_dir, function }
    }

    /// `None` while the node has produced no artifact.
    async fn collect(&self) -> Result<Option<Message>, PipelineError> {
        let Some(artifact) = self.find_artifact().await? else {
            return Ok(None);
        };
        let algo_name = artifact
            .file_name()
            .map(|n| n.to_string_lossy())
            .and_then(|n| n.strip_suffix(RESULT_SUFFIX).map(str::to_string))
            .unwrap_or_else(|| self.function.to_string());

        let raw = tokio::fs::read(&artifact)
            .await
            .map_err(PipelineError::io(&artifact))?;
        // The task may still be writing the file; retry on the next poll.
        let document: serde_json::Value = match serde_json::from_slice(&raw) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(path = %artifact.display(), error = %e, "Result artifact not readable yet");
                return Ok(None);
            }
        };
        let result = match NodeResult::deserialize(&document) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(path = %artifact.display(), error = %e, "Malformed result artifact");
                return Ok(Some(Message::error(format!("Malformed result for {algo_name}: {e}"))));
            }
        };

        if let Some(text) = result.failure_message() {
            return Ok(Some(Message::error(text)));
        }

        let mut output_paths = OutputPaths::new();
        for (name, object) in &result.output_objects() {
            if let Some(path) = export(name, object, &self.node_dir).await? {
                output_paths.insert(name.clone(), path);
            }
        }
        Ok(Some(Message::success(&algo_name, output_paths)))
    }

    /// `<function>.result.json` if present, else any `*.result.json` in the
    /// node directory.
    async fn find_artifact(&self) -> Result<Option<PathBuf>, PipelineError> {
        let preferred = self.node_dir.join(format!("{}{RESULT_SUFFIX}", self.function));
        if tokio::fs::try_exists(&preferred).await.unwrap_or(false) {
            return Ok(Some(preferred));
        }
        let found = files_with_suffix(&self.node_dir, RESULT_SUFFIX).await?;
        Ok(found.into_iter().next())
    }
}

async fn has_nwb_file(dir: &Path) -> Result<bool, PipelineError> {
    Ok(!files_with_suffix(dir, &format!(".{NWB_EXTENSION}")).await?.is_empty())
}
