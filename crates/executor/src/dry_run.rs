use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use dispatch::{ExecutionError, JobDescription, JobExecutor};
use tracing::info;

/// Prints job descriptions instead of running them.
pub struct DryRunExecutor {
    out: Mutex<Box<dyn Write + Send>>,
}

impl DryRunExecutor {
    /// Writes descriptions to `out`, one JSON document per line.
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
        }
    }

    /// Writes descriptions to standard output.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl std::fmt::Debug for DryRunExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DryRunExecutor").finish_non_exhaustive()
    }
}

#[async_trait]
impl JobExecutor for DryRunExecutor {
    async fn run(&self, job: JobDescription) -> Result<(), ExecutionError> {
        let line = serde_json::to_string(&job.redacted())
            .map_err(|e| ExecutionError::new(format!("failed to encode job description: {e}")))?;

        let mut out = self
            .out
            .lock()
            .map_err(|_| ExecutionError::new("dry-run output lock poisoned"))?;
        writeln!(out, "{line}")
            .and_then(|()| out.flush())
            .map_err(|e| ExecutionError::new(format!("failed to write job description: {e}")))?;

        info!(job = %job.job, "Dry run: job description printed, not executed");
        Ok(())
    }
}
