//! Shared value types: secrets, environments, and the job description handed
//! to the executor.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{ImageRef, JobName};

/// Environment variables for a container. Keys are unique by construction.
pub type Environment = BTreeMap<String, String>;

/// Placeholder written in place of sensitive values by [`JobDescription::redacted`].
pub const REDACTED: &str = "********";

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

/// Project-scoped secret values supplied by the host with each event.
///
/// `Debug` lists the keys only.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secrets(BTreeMap<String, String>);

impl Secrets {
    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Secrets {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// Job description
// ---------------------------------------------------------------------------

/// An auxiliary container running next to the job container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sidecar {
    /// Container name; also the hostname the job container reaches it by.
    pub name: String,
    /// Image the sidecar runs.
    pub image: ImageRef,
    /// Whether the sidecar needs a privileged security context.
    pub privileged: bool,
    /// Environment of the sidecar.
    #[serde(default)]
    pub env: Environment,
}

/// A fully specified unit of work for the external executor.
///
/// Built by [`crate::builder`] and handed to [`crate::JobExecutor::run`] by
/// value; nothing in the dispatch layer touches it after that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescription {
    /// The registry name this description was built for.
    pub job: JobName,
    /// Human-visible name, also the check-run name.
    pub display_name: String,
    /// Primary container image.
    pub image: ImageRef,
    /// Working directory, which is also where the source is mounted.
    pub working_dir: String,
    /// Executable to run.
    pub command: String,
    /// Arguments passed to `command`.
    pub args: Vec<String>,
    /// Environment of the primary container.
    pub env: Environment,
    /// Keys of `env` whose values must not be printed.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub sensitive_env: BTreeSet<String>,
    /// Supporting containers started alongside the job.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sidecars: Vec<Sidecar>,
}

impl JobDescription {
    /// Returns the value of the environment variable `key`, if set.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    /// Returns a copy with every sensitive environment value replaced by [`REDACTED`].
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for key in &self.sensitive_env {
            if let Some(value) = copy.env.get_mut(key) {
                *value = REDACTED.to_string();
            }
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_debug_hides_values() {
        let secrets: Secrets = [("dockerhubPassword", "hunter2")].into_iter().collect();
        let shown = format!("{secrets:?}");
        assert!(shown.contains("dockerhubPassword"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn redacted_masks_only_sensitive_keys() {
        let description = JobDescription {
            job: JobName::new("push").unwrap(),
            display_name: "org/repo:push".to_string(),
            image: ImageRef::new("golang:1.22").unwrap(),
            working_dir: "/src".to_string(),
            command: "make".to_string(),
            args: vec!["push".to_string()],
            env: [
                ("DOCKER_PASSWORD".to_string(), "hunter2".to_string()),
                ("DOCKER_ORG".to_string(), "acme".to_string()),
            ]
            .into_iter()
            .collect(),
            sensitive_env: ["DOCKER_PASSWORD".to_string()].into_iter().collect(),
            sidecars: Vec::new(),
        };

        let redacted = description.redacted();
        assert_eq!(redacted.env_var("DOCKER_PASSWORD"), Some(REDACTED));
        assert_eq!(redacted.env_var("DOCKER_ORG"), Some("acme"));
        assert_eq!(description.env_var("DOCKER_PASSWORD"), Some("hunter2"));
    }
}
