//! buildhook trigger event source infrastructure.
//!
//! Implements the [`dispatch::EventSource`] trait over the envelopes the host
//! event-processing runtime forwards: one JSON object per event, carrying the
//! webhook `type`/`action`, the project and its secrets, the current Git
//! reference, and the webhook payload.
//!
//! - [`JsonLinesEventSource`] reads newline-delimited envelopes from any async
//!   reader (stdin in the `serve` command).
//! - [`decode_event`] decodes a single envelope (the `dispatch` command).
//!
//! ## Envelope
//!
//! ```json
//! {
//!   "type": "check_run",
//!   "action": "rerequested",
//!   "project": { "id": "acme/widget", "secrets": { "dockerhubOrg": "acme" } },
//!   "revision": { "ref": "refs/heads/main" },
//!   "payload": "{\"check_run\": {\"name\": \"acme/widget:build\"}}"
//! }
//! ```
//!
//! `payload` may be inline JSON or a JSON-encoded string. When `revision.ref`
//! is absent the reference is taken from the webhook payload where GitHub puts
//! it (`ref` for pushes, `head_branch` for suites and runs, `tag_name` for
//! releases).
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Transport details and deserialization live here. The
//! [`dispatch`] crate sees only [`dispatch::EventSource`] and [`dispatch::Event`].

mod envelope;
mod error;
mod source;

pub use envelope::{decode_event, EventEnvelope, PayloadEnvelope, ProjectEnvelope, RevisionEnvelope};
pub use error::ListenerError;
pub use source::JsonLinesEventSource;
