//! Port traits implemented by infrastructure crates.
//!
//! The dispatch layer decides *what* to run; these traits are how it reaches
//! the outside world without depending on any transport.

use async_trait::async_trait;

use crate::{Event, ExecutionError, JobDescription};

/// Runs a job description to completion.
///
/// The description is passed by value: once handed over it belongs to the
/// executor. Implementations own any timeout or retry policy.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Runs `job` and reports whether it succeeded.
    async fn run(&self, job: JobDescription) -> Result<(), ExecutionError>;
}

/// A stream of incoming events delivered by the host runtime.
#[async_trait]
pub trait EventSource: Send {
    /// Error produced when an event cannot be read or decoded.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the next event, or `None` once the source is exhausted.
    async fn next_event(&mut self) -> Result<Option<Event>, Self::Error>;
}
