//! Task-runner dispatch.
//!
//! [`TaskExecutor`] is the seam between run preparation and the external
//! tool that actually executes the task graph. [`SnakemakeExecutor`] shells
//! out to `snakemake`; tests substitute their own executor.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use studio_core::snakemake::SmkParam;
use tokio::process::Command;

use crate::error::PipelineError;
use crate::store::write_atomic;

/// Everything the task runner needs for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskJob {
    pub workspace_id: String,
    pub unique_id: String,
    pub run_dir: PathBuf,
    /// Task-graph config (`snakemake.yaml`).
    pub config_file: PathBuf,
    pub error_log: PathBuf,
    pub smk: SmkParam,
    /// Final artifacts to build.
    pub targets: Vec<String>,
    /// Artifacts to rebuild even if up to date.
    pub forcerun_targets: Vec<String>,
}

#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Execute the job to completion. Failures are reported through the
    /// run's error log.
    async fn execute(&self, job: TaskJob) -> Result<(), PipelineError>;
}

/// Runs jobs with the `snakemake` command line tool.
#[derive(Debug, Clone)]
pub struct SnakemakeExecutor {
    program: PathBuf,
    snakefile: PathBuf,
}

impl SnakemakeExecutor {
    pub fn new(program: impl Into<PathBuf>, snakefile: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            snakefile: snakefile.into(),
        }
    }

    /// Command-line arguments for `job`.
    pub fn args(&self, job: &TaskJob) -> Vec<String> {
        let smk = &job.smk;
        let mut args = vec![
            "--snakefile".to_string(),
            self.snakefile.to_string_lossy().into_owned(),
            "--configfile".to_string(),
            job.config_file.to_string_lossy().into_owned(),
            "--cores".to_string(),
            smk.cores.to_string(),
        ];
        // Targets go before `--forcerun`, which consumes every value after it.
        args.extend(job.targets.iter().cloned());
        if smk.use_conda {
            args.push("--use-conda".to_string());
        }
        if smk.forceall {
            args.push("--forceall".to_string());
        }
        if smk.forcetargets && !job.forcerun_targets.is_empty() {
            args.push("--forcerun".to_string());
            args.extend(job.forcerun_targets.iter().cloned());
        }
        if !smk.lock {
            args.push("--nolock".to_string());
        }
        args
    }
}

#[async_trait]
impl TaskExecutor for SnakemakeExecutor {
    async fn execute(&self, job: TaskJob) -> Result<(), PipelineError> {
        let args = self.args(&job);
        tracing::info!(
            workspace_id = %job.workspace_id,
            unique_id = %job.unique_id,
            program = %self.program.display(),
            ?args,
            "Starting task runner"
        );

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(&job.run_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                let message = format!("Failed to start {}: {e}", self.program.display());
                write_atomic(&job.error_log, message.as_bytes()).await?;
                return Err(PipelineError::Executor(message));
            }
        };

        if output.status.success() {
            tracing::info!(unique_id = %job.unique_id, "Task runner finished");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = if stderr.trim().is_empty() {
            format!("{} exited with {}", self.program.display(), output.status)
        } else {
            stderr.into_owned()
        };
        write_atomic(&job.error_log, message.as_bytes()).await?;
        Err(PipelineError::Executor(format!(
            "{} exited with {}",
            self.program.display(),
            output.status
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn job(smk: SmkParam) -> TaskJob {
        TaskJob {
            workspace_id: "1".into(),
            unique_id: "r1".into(),
            run_dir: PathBuf::from("/data/output/1/r1"),
            config_file: PathBuf::from("/data/output/1/r1/snakemake.yaml"),
            error_log: PathBuf::from("/data/output/1/r1/error.log"),
            smk,
            targets: vec!["/data/output/1/r1/n2/pca.result.json".into()],
            forcerun_targets: vec!["/data/output/1/r1/n1/caiman_mc.result.json".into()],
        }
    }

    fn smk(use_conda: bool, forceall: bool, forcetargets: bool, lock: bool) -> SmkParam {
        SmkParam {
            use_conda,
            cores: 2,
            forceall,
            forcetargets,
            lock,
            forcerun: vec![],
        }
    }

    #[test]
    fn default_flags() {
        let exec = SnakemakeExecutor::new("snakemake", "/app/Snakefile");
        let args = exec.args(&job(smk(true, false, true, false)));
        assert_eq!(
            args,
            [
                "--snakefile",
                "/app/Snakefile",
                "--configfile",
                "/data/output/1/r1/snakemake.yaml",
                "--cores",
                "2",
                "/data/output/1/r1/n2/pca.result.json",
                "--use-conda",
                "--forcerun",
                "/data/output/1/r1/n1/caiman_mc.result.json",
                "--nolock",
            ]
        );
    }

    #[test]
    fn targets_are_not_swallowed_by_forcerun_when_locking() {
        let exec = SnakemakeExecutor::new("snakemake", "/app/Snakefile");
        let args = exec.args(&job(smk(false, false, true, true)));

        let forcerun = args.iter().position(|a| a == "--forcerun").unwrap();
        let target = args
            .iter()
            .position(|a| a == "/data/output/1/r1/n2/pca.result.json")
            .unwrap();
        assert!(target < forcerun);
        assert_eq!(args.last().map(String::as_str), Some("/data/output/1/r1/n1/caiman_mc.result.json"));
    }

    #[test]
    fn forceall_without_conda_with_lock() {
        let exec = SnakemakeExecutor::new("snakemake", "/app/Snakefile");
        let args = exec.args(&job(smk(false, true, false, true)));
        assert!(args.contains(&"--forceall".to_string()));
        assert!(!args.contains(&"--use-conda".to_string()));
        assert!(!args.contains(&"--forcerun".to_string()));
        assert!(!args.contains(&"--nolock".to_string()));
    }

    #[tokio::test]
    async fn missing_binary_writes_error_log() {
        let tmp = tempfile::tempdir().unwrap();
        let mut j = job(smk(true, false, true, false));
        j.run_dir = tmp.path().to_path_buf();
        j.error_log = tmp.path().join("error.log");
        let exec = SnakemakeExecutor::new("/nonexistent/snakemake-binary", "/app/Snakefile");

        let result = exec.execute(j).await;

        assert_matches!(result, Err(PipelineError::Executor(_)));
        let log = std::fs::read_to_string(tmp.path().join("error.log")).unwrap();
        assert!(log.contains("Failed to start"));
    }
}
