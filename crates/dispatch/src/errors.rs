//! Error types for the buildhook dispatch domain.
//!
//! [`DispatchError`] covers every way routing a single event can fail. A push
//! to a non-release reference is deliberately absent: that path is a normal
//! [`crate::Dispatch::Skipped`] outcome, not an error.
//!
//! [`ExecutionError`] is produced by [`crate::JobExecutor`] implementations. The
//! core never inspects it; it is wrapped and propagated so the host can mark the
//! corresponding check run as failed.

use thiserror::Error;

use crate::JobName;

// ---------------------------------------------------------------------------
// Executor failures
// ---------------------------------------------------------------------------

/// Opaque failure reported by the external executor.
///
/// The dispatch layer does not classify or retry these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ExecutionError {
    message: String,
}

impl ExecutionError {
    /// Creates an execution error carrying the executor's description of the failure.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the executor's description of the failure.
    pub fn message(&self) -> &str {
        &self.message
    }
}

// ---------------------------------------------------------------------------
// Dispatch errors
// ---------------------------------------------------------------------------

/// Errors that fail the handling of one event.
///
/// None of these are retried by the router. The host runtime reports the
/// failure back to the origin of the event (usually a check run).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A rerun request named a job that is not in the registry.
    ///
    /// No executor call is made.
    #[error("No job registered under the name '{name}'")]
    UnknownJob {
        /// The job name parsed from the rerun request.
        name: String,
    },

    /// A check-run name carried the separator but not the expected project prefix,
    /// or carried the prefix with nothing after it.
    #[error("Check run name '{name}' does not follow the '{project}{separator}<job>' convention")]
    MalformedCheckRunName {
        /// The raw check-run name from the payload.
        name: String,
        /// The project whose prefix was expected.
        project: String,
        /// The configured separator between project and job name.
        separator: String,
    },

    /// The event payload is missing a field the handler needs, or cannot be decoded.
    #[error("Invalid event payload: could not read '{field}': {message}")]
    InvalidPayload {
        /// Dotted path of the field being read (e.g. `"check_run.name"`).
        field: &'static str,
        /// Decoder message.
        message: String,
    },

    /// The executor reported that the job failed.
    #[error("Job '{job}' failed: {source}")]
    Execution {
        /// The job that was handed to the executor.
        job: JobName,
        /// Failure reported by the executor.
        #[source]
        source: ExecutionError,
    },

    /// The dispatch configuration is invalid.
    ///
    /// Produced at startup; the router is never constructed from an invalid config.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}

impl DispatchError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
