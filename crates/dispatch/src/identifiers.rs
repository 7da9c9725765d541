//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging, for example, a
//! [`JobName`] with a [`ProjectId`] even though both are strings under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies the routing of a single incoming event.
///
/// Generated fresh for every event handed to the router and recorded on the
/// routing span so all log lines for one event can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DispatchId(Uuid);

impl DispatchId {
    /// Generates a new random dispatch identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for DispatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed (configuration / Git names)
// ---------------------------------------------------------------------------

string_id! {
    /// Stable name of a job definition (e.g. `"build"`, `"push"`).
    ///
    /// Used as the [`crate::JobRegistry`] key and as the trailing part of the
    /// check-run name shown on the pull request.
    JobName
}

string_id! {
    /// Identifies the project (repository) an event belongs to, e.g. `"org/repo"`.
    ProjectId
}

string_id! {
    /// A fully qualified Git reference (e.g. `"refs/heads/main"`, `"refs/tags/v1.0.0"`).
    GitRef
}

string_id! {
    /// A container image reference (e.g. `"docker:24-dind"`).
    ImageRef
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_ids_are_rejected() {
        assert!(JobName::new("").is_none());
        assert!(ProjectId::new(String::new()).is_none());
    }

    #[test]
    fn string_ids_display_their_value() {
        let name = JobName::new("build").unwrap();
        assert_eq!(name.to_string(), "build");
        assert_eq!(name.as_str(), "build");
    }

    #[test]
    fn dispatch_ids_are_unique() {
        assert_ne!(DispatchId::new_random(), DispatchId::new_random());
    }
}
