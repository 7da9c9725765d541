//! buildhook executor adapters.
//!
//! Implements the [`dispatch::JobExecutor`] trait. buildhook does not run
//! containers itself; these adapters hand finished job descriptions to
//! whatever does.
//!
//! - [`DryRunExecutor`] writes each description as one JSON line (sensitive
//!   values redacted) and reports success. Used for inspection and as the
//!   default when no runner is configured.
//! - [`CommandExecutor`] starts an external runner process per job, writes the
//!   description as JSON to its standard input, and maps the exit status to
//!   success or failure.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Process handling and serialisation live here. The
//! [`dispatch`] crate sees only [`dispatch::JobExecutor`].
//!
//! No timeout is applied; a job runs until the runner exits.

mod command;
mod dry_run;

pub use command::CommandExecutor;
pub use dry_run::DryRunExecutor;
