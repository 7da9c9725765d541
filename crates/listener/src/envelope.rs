//! Host envelope format and its conversion into [`dispatch::Event`].

use dispatch::{Event, EventKind, GitRef, ProjectId, Secrets};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::ListenerError;

/// One event as forwarded by the host runtime.
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    /// Webhook event type (e.g. `"check_suite"`, `"push"`).
    #[serde(rename = "type")]
    pub event_type: String,
    /// Webhook action (e.g. `"requested"`); absent for pushes.
    #[serde(default)]
    pub action: Option<String>,
    /// Project the event belongs to.
    pub project: ProjectEnvelope,
    /// Current Git reference, if the host resolved one.
    #[serde(default)]
    pub revision: Option<RevisionEnvelope>,
    /// The webhook payload.
    #[serde(default)]
    pub payload: Option<PayloadEnvelope>,
}

/// The project section of an envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectEnvelope {
    /// Project identifier, usually `"owner/repo"`.
    pub id: String,
    /// Project-scoped secret values.
    #[serde(default)]
    pub secrets: Secrets,
}

/// The revision section of an envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RevisionEnvelope {
    /// Fully qualified reference (e.g. `"refs/heads/main"`).
    #[serde(rename = "ref", default)]
    pub git_ref: Option<String>,
}

/// A payload delivered either inline or as a JSON-encoded string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PayloadEnvelope {
    /// JSON text that still has to be decoded.
    Encoded(String),
    /// Already-structured JSON.
    Inline(Value),
}

impl PayloadEnvelope {
    fn into_value(self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Encoded(text) if text.trim().is_empty() => Ok(Value::Object(Default::default())),
            Self::Encoded(text) => serde_json::from_str(&text),
            Self::Inline(value) => Ok(value),
        }
    }
}

impl EventEnvelope {
    /// Converts the envelope into an event. `line` is used in error messages.
    pub fn into_event(self, line: usize) -> Result<Event, ListenerError> {
        let malformed = |message: String| ListenerError::Malformed { line, message };

        let project = ProjectId::new(self.project.id)
            .ok_or_else(|| malformed("project.id must not be empty".to_string()))?;
        let kind = EventKind::from_type_action(&self.event_type, self.action.as_deref());

        let payload = match self.payload {
            Some(payload) => payload
                .into_value()
                .map_err(|e| malformed(format!("payload is not valid JSON: {e}")))?,
            None => Value::Object(Default::default()),
        };

        let git_ref = self
            .revision
            .and_then(|revision| revision.git_ref)
            .and_then(GitRef::new)
            .or_else(|| reference_from_payload(&self.event_type, &payload));

        let mut event = Event::new(kind, project)
            .with_payload(payload)
            .with_secrets(self.project.secrets);
        if let Some(git_ref) = git_ref {
            event = event.with_ref(git_ref);
        }

        debug!(
            line,
            kind = %event.kind,
            project = %event.project,
            git_ref = event.git_ref_str().unwrap_or_default(),
            "Decoded event envelope"
        );
        Ok(event)
    }
}

/// Decodes one envelope.
pub fn decode_event(json: &str) -> Result<Event, ListenerError> {
    decode_at(json, 1)
}

pub(crate) fn decode_at(json: &str, line: usize) -> Result<Event, ListenerError> {
    let envelope: EventEnvelope =
        serde_json::from_str(json).map_err(|e| ListenerError::Malformed {
            line,
            message: e.to_string(),
        })?;
    envelope.into_event(line)
}

/// Finds the reference GitHub reports in the webhook payload itself.
fn reference_from_payload(event_type: &str, payload: &Value) -> Option<GitRef> {
    let text = |pointer: &str| payload.pointer(pointer).and_then(Value::as_str);

    let reference = match event_type {
        "push" => text("/ref").map(str::to_string),
        "check_suite" => text("/check_suite/head_branch").map(|b| format!("refs/heads/{b}")),
        "check_run" => text("/check_run/check_suite/head_branch").map(|b| format!("refs/heads/{b}")),
        "release" => text("/release/tag_name").map(|t| format!("refs/tags/{t}")),
        _ => None,
    }?;
    GitRef::new(reference)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_an_encoded_payload() {
        let event = decode_event(
            r#"{
                "type": "check_run",
                "action": "rerequested",
                "project": { "id": "acme/widget", "secrets": { "dockerhubOrg": "acme" } },
                "revision": { "ref": "refs/heads/main" },
                "payload": "{\"check_run\": {\"name\": \"acme/widget:build\"}}"
            }"#,
        )
        .unwrap();

        assert_eq!(event.kind, EventKind::CheckRunRerequested);
        assert_eq!(event.project.as_str(), "acme/widget");
        assert_eq!(event.git_ref_str(), Some("refs/heads/main"));
        assert_eq!(event.secrets.get("dockerhubOrg"), Some("acme"));
        assert_eq!(
            event.payload.pointer("/check_run/name").and_then(Value::as_str),
            Some("acme/widget:build")
        );
    }

    #[test]
    fn falls_back_to_the_reference_in_the_payload() {
        let push = decode_event(
            r#"{"type": "push", "project": {"id": "acme/widget"}, "payload": {"ref": "refs/tags/v1.2.3"}}"#,
        )
        .unwrap();
        assert_eq!(push.git_ref_str(), Some("refs/tags/v1.2.3"));

        let suite = decode_event(
            r#"{"type": "check_suite", "action": "requested", "project": {"id": "acme/widget"},
                "payload": {"check_suite": {"head_branch": "main"}}}"#,
        )
        .unwrap();
        assert_eq!(suite.git_ref_str(), Some("refs/heads/main"));
    }

    #[test]
    fn explicit_revision_wins_over_payload() {
        let event = decode_event(
            r#"{"type": "push", "project": {"id": "acme/widget"},
                "revision": {"ref": "refs/heads/topic"}, "payload": {"ref": "refs/heads/other"}}"#,
        )
        .unwrap();
        assert_eq!(event.git_ref_str(), Some("refs/heads/topic"));
    }

    #[test]
    fn missing_payload_defaults_to_an_empty_object() {
        let event = decode_event(r#"{"type": "ping", "project": {"id": "acme/widget"}}"#).unwrap();
        assert!(event.payload.as_object().is_some_and(|o| o.is_empty()));
        assert_eq!(event.git_ref, None);
        assert_eq!(event.kind, EventKind::Other("ping".to_string()));
    }

    #[test]
    fn empty_project_is_malformed() {
        let err = decode_event(r#"{"type": "push", "project": {"id": ""}}"#).unwrap_err();
        assert!(matches!(err, ListenerError::Malformed { line: 1, .. }));
    }

    #[test]
    fn undecodable_encoded_payload_is_malformed() {
        let err = decode_event(r#"{"type": "push", "project": {"id": "a/b"}, "payload": "{not json"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("payload is not valid JSON"), "{err}");
    }
}
