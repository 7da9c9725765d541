use std::process::Stdio;

use async_trait::async_trait;
use dispatch::{ExecutionError, JobDescription, JobExecutor};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Lines of runner stderr kept in the failure message.
const STDERR_TAIL_LINES: usize = 20;

/// Hands each job description to an external runner process.
///
/// The runner receives the description as JSON on stdin and the job name in
/// `BUILDHOOK_JOB`. Exit status 0 means the job succeeded. The runner's stdout
/// is inherited; its stderr is captured and the tail of it is reported on
/// failure.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    program: String,
    args: Vec<String>,
}

impl CommandExecutor {
    /// Creates an executor running `program` with `args` for every job.
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates an executor from an argv list. Returns `None` if `argv` is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.iter().cloned()))
    }
}

#[async_trait]
impl JobExecutor for CommandExecutor {
    async fn run(&self, job: JobDescription) -> Result<(), ExecutionError> {
        let body = serde_json::to_vec(&job)
            .map_err(|e| ExecutionError::new(format!("failed to encode job description: {e}")))?;

        debug!(program = %self.program, job = %job.job, "Starting runner");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("BUILDHOOK_JOB", job.job.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExecutionError::new(format!("failed to start runner '{}': {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExecutionError::new("runner stdin was not captured"))?;
        let feed = async move {
            stdin.write_all(&body).await?;
            stdin.shutdown().await
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output =
            output.map_err(|e| ExecutionError::new(format!("failed to wait for runner: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
            warn!(job = %job.job, status = %output.status, "Runner reported failure");
            return Err(ExecutionError::new(format!(
                "runner exited with {}: {}",
                output.status,
                tail.trim()
            )));
        }

        // A runner that exits 0 without reading its input still counts as a failure.
        fed.map_err(|e| ExecutionError::new(format!("failed to send job description to runner: {e}")))?;

        info!(job = %job.job, "Runner finished");
        Ok(())
    }
}
