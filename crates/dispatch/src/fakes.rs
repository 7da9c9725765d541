//! In-memory executor fakes (testing only).
//!
//! [`RecordingExecutor`] accepts every job and keeps the descriptions it was
//! handed; [`FailingExecutor`] records the same way but reports every run as
//! failed.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{ExecutionError, JobDescription, JobExecutor};

// ---------------------------------------------------------------------------
// RecordingExecutor
// ---------------------------------------------------------------------------

/// Executor that succeeds immediately and records each description.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    runs: Mutex<Vec<JobDescription>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptions handed over so far, in call order.
    pub fn runs(&self) -> Vec<JobDescription> {
        self.runs.lock().unwrap().clone()
    }

    /// Number of executor calls so far.
    pub fn call_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }
}

#[async_trait]
impl JobExecutor for RecordingExecutor {
    async fn run(&self, job: JobDescription) -> Result<(), ExecutionError> {
        self.runs.lock().unwrap().push(job);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FailingExecutor
// ---------------------------------------------------------------------------

/// Executor that records each description and then fails with a fixed message.
#[derive(Debug)]
pub struct FailingExecutor {
    message: String,
    runs: Mutex<Vec<JobDescription>>,
}

impl FailingExecutor {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            runs: Mutex::new(Vec::new()),
        }
    }

    /// Number of executor calls so far.
    pub fn call_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }
}

#[async_trait]
impl JobExecutor for FailingExecutor {
    async fn run(&self, job: JobDescription) -> Result<(), ExecutionError> {
        self.runs.lock().unwrap().push(job);
        Err(ExecutionError::new(self.message.clone()))
    }
}
