//! Core dispatch domain for buildhook.
//!
//! This crate turns source-control events into job descriptions and hands them
//! to an executor. It contains the event model, release-tag matching, the job
//! descriptor builder, the job registry, and the event router. Infrastructure
//! crates implement the port traits defined here; they never add dispatch rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It decides *what* to run; the `executor` crate decides *how*.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`JobName`, `ProjectId`, `GitRef`, etc.) |
//! | [`event`] | The incoming event and its `type:action` classification |
//! | [`types`] | Secrets, environments, and the job description |
//! | [`refs`] | Release-tag recognition |
//! | [`builder`] | Base job descriptions and their decorators |
//! | [`registry`] | Job name → constructor map |
//! | [`router`] | Event → job decision procedures |
//! | [`config`] | Dispatch configuration and validation |
//! | [`ports`] | `JobExecutor` and `EventSource` traits |
//! | [`errors`] | Dispatch and execution error types |
//! | [`fakes`] | In-memory executors for tests |

pub mod builder;
pub mod config;
pub mod errors;
pub mod event;
pub mod fakes;
pub mod identifiers;
pub mod ports;
pub mod refs;
pub mod registry;
pub mod router;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use config::{DispatchConfig, JobDefinition, VersionSource};
pub use errors::{DispatchError, ExecutionError};
pub use event::{Event, EventKind};
pub use identifiers::{DispatchId, GitRef, ImageRef, JobName, ProjectId};
pub use ports::{EventSource, JobExecutor};
pub use refs::{match_release_tag, RELEASE_TAG_PATTERN};
pub use registry::{JobConstructor, JobRegistry};
pub use router::{parse_check_run_name, Dispatch, EventRouter, SkipReason};
pub use types::{Environment, JobDescription, Secrets, Sidecar, REDACTED};
