//! The incoming event model.
//!
//! An [`Event`] is owned by the host runtime and only read by the dispatch
//! layer. The router keys its behaviour on [`EventKind`], which is the
//! `type:action` pair the host delivered.

use serde_json::Value;

use crate::{GitRef, ProjectId, Secrets};

// ---------------------------------------------------------------------------
// Event kind
// ---------------------------------------------------------------------------

/// The `type:action` pair of an incoming event.
///
/// Anything the router does not subscribe to is kept verbatim in
/// [`EventKind::Other`] so it can still be logged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `check_suite:requested`: a new commit was pushed to a branch with checks.
    CheckSuiteRequested,
    /// `check_suite:rerequested`: a user asked to re-run the whole suite.
    CheckSuiteRerequested,
    /// `check_run:rerequested`: a user asked to re-run a single check.
    CheckRunRerequested,
    /// `push`: a branch or tag was pushed.
    Push,
    /// `release:published`: a release was published from an existing tag.
    ReleasePublished,
    /// Any other `type` or `type:action`.
    Other(String),
}

impl EventKind {
    /// Classifies an event from its webhook type and optional action.
    pub fn from_type_action(event_type: &str, action: Option<&str>) -> Self {
        match (event_type, action) {
            ("check_suite", Some("requested")) => Self::CheckSuiteRequested,
            ("check_suite", Some("rerequested")) => Self::CheckSuiteRerequested,
            ("check_run", Some("rerequested")) => Self::CheckRunRerequested,
            ("push", _) => Self::Push,
            ("release", Some("published")) => Self::ReleasePublished,
            (other, Some(action)) => Self::Other(format!("{other}:{action}")),
            (other, None) => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CheckSuiteRequested => f.write_str("check_suite:requested"),
            Self::CheckSuiteRerequested => f.write_str("check_suite:rerequested"),
            Self::CheckRunRerequested => f.write_str("check_run:rerequested"),
            Self::Push => f.write_str("push"),
            Self::ReleasePublished => f.write_str("release:published"),
            Self::Other(key) => f.write_str(key),
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// An immutable record of what triggered dispatch.
#[derive(Debug, Clone)]
pub struct Event {
    /// Which webhook `type:action` this is.
    pub kind: EventKind,
    /// The project the event was delivered for.
    pub project: ProjectId,
    /// The Git reference the event concerns (branch for suites, pushed ref for pushes).
    ///
    /// `None` when the host did not supply one.
    pub git_ref: Option<GitRef>,
    /// The webhook payload as delivered.
    pub payload: Value,
    /// Project-scoped secret values (registry credentials and the like).
    pub secrets: Secrets,
}

impl Event {
    /// Creates an event with no reference, an empty payload, and no secrets.
    pub fn new(kind: EventKind, project: ProjectId) -> Self {
        Self {
            kind,
            project,
            git_ref: None,
            payload: Value::Object(Default::default()),
            secrets: Secrets::default(),
        }
    }

    /// Sets the Git reference.
    pub fn with_ref(mut self, git_ref: GitRef) -> Self {
        self.git_ref = Some(git_ref);
        self
    }

    /// Sets the payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Sets the secrets.
    pub fn with_secrets(mut self, secrets: Secrets) -> Self {
        self.secrets = secrets;
        self
    }

    /// Returns the Git reference as a string slice, if any.
    pub fn git_ref_str(&self) -> Option<&str> {
        self.git_ref.as_ref().map(GitRef::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribed_kinds_round_trip_through_display() {
        for (event_type, action, key) in [
            ("check_suite", Some("requested"), "check_suite:requested"),
            ("check_suite", Some("rerequested"), "check_suite:rerequested"),
            ("check_run", Some("rerequested"), "check_run:rerequested"),
            ("push", None, "push"),
            ("release", Some("published"), "release:published"),
        ] {
            let kind = EventKind::from_type_action(event_type, action);
            assert!(!matches!(kind, EventKind::Other(_)), "{key}");
            assert_eq!(kind.to_string(), key);
        }
    }

    #[test]
    fn unsubscribed_kinds_keep_their_key() {
        let kind = EventKind::from_type_action("release", Some("created"));
        assert_eq!(kind, EventKind::Other("release:created".to_string()));

        let kind = EventKind::from_type_action("ping", None);
        assert_eq!(kind.to_string(), "ping");
    }

    #[test]
    fn push_ignores_action() {
        assert_eq!(
            EventKind::from_type_action("push", Some("anything")),
            EventKind::Push
        );
    }
}
