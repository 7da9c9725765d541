//! Event routing: which job, if any, an event triggers.
//!
//! | Event | Decision |
//! |-------|----------|
//! | `check_suite:requested` / `check_suite:rerequested` | trunk → publish job, otherwise → build job |
//! | `check_run:rerequested` | the job named by `check_run.name`, looked up in the registry |
//! | `push` | release tag → publish job with that version, otherwise nothing |
//! | `release:published` | publish job with `release.tag_name` as the version |
//!
//! Every event leads to at most one executor call. The router keeps no state
//! between events and can be shared across concurrently running handlers.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, instrument, Span};

use crate::builder::with_version;
use crate::config::{DispatchConfig, VersionSource};
use crate::refs::{match_release_tag, RELEASE_TAG_PATTERN};
use crate::{
    DispatchError, DispatchId, Event, EventKind, JobDescription, JobExecutor, JobName, JobRegistry,
    ProjectId,
};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What the router did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The job was handed to the executor and completed successfully.
    Executed {
        /// The job that ran.
        job: JobName,
    },
    /// No job was run. This is a normal outcome, not a failure.
    Skipped {
        /// Why nothing ran.
        reason: SkipReason,
    },
}

/// Why an event did not lead to a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A push whose reference is not a release tag.
    NotReleaseTag {
        /// The pushed reference, if the host supplied one.
        reference: Option<String>,
    },
    /// The router does not subscribe to this kind of event.
    Unsubscribed {
        /// The event's `type:action`.
        kind: EventKind,
    },
    /// The configured version source excludes this path.
    VersionSourceDisabled {
        /// The event's `type:action`.
        kind: EventKind,
        /// The configured strategy.
        source: VersionSource,
    },
}

// ---------------------------------------------------------------------------
// Payload shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CheckRunPayload {
    check_run: CheckRun,
}

#[derive(Deserialize)]
struct CheckRun {
    name: String,
}

#[derive(Deserialize)]
struct ReleasePayload {
    release: Release,
}

#[derive(Deserialize)]
struct Release {
    tag_name: String,
}

// ---------------------------------------------------------------------------
// Check-run names
// ---------------------------------------------------------------------------

/// Recovers the job name from a check-run name.
///
/// - `"<project><separator><job>"` yields `job`;
/// - a name without the separator is the job name itself;
/// - a name with the separator but another prefix, or nothing after the
///   separator, is [`DispatchError::MalformedCheckRunName`].
pub fn parse_check_run_name(
    raw: &str,
    project: &ProjectId,
    separator: &str,
) -> Result<JobName, DispatchError> {
    let malformed = || DispatchError::MalformedCheckRunName {
        name: raw.to_string(),
        project: project.to_string(),
        separator: separator.to_string(),
    };

    let job = match raw
        .strip_prefix(project.as_str())
        .and_then(|rest| rest.strip_prefix(separator))
    {
        Some(job) => job,
        None if !raw.contains(separator) => raw,
        None => return Err(malformed()),
    };

    JobName::new(job.trim()).ok_or_else(malformed)
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Stateless dispatch table from event kind to decision procedure.
pub struct EventRouter {
    registry: Arc<JobRegistry>,
    executor: Arc<dyn JobExecutor>,
    config: DispatchConfig,
    build_job: JobName,
    publish_job: JobName,
}

impl EventRouter {
    /// Creates a router.
    ///
    /// Fails if the configuration is invalid or names a build or publish job
    /// that is not registered.
    pub fn new(
        config: &DispatchConfig,
        registry: Arc<JobRegistry>,
        executor: Arc<dyn JobExecutor>,
    ) -> Result<Self, DispatchError> {
        config.validate()?;

        let resolve = |field: &str, value: &str| {
            JobName::new(value)
                .filter(|name| registry.contains(name))
                .ok_or_else(|| {
                    DispatchError::configuration(format!("{field} '{value}' is not registered"))
                })
        };
        let build_job = resolve("build_job", &config.build_job)?;
        let publish_job = resolve("publish_job", &config.publish_job)?;

        Ok(Self {
            registry,
            executor,
            config: config.clone(),
            build_job,
            publish_job,
        })
    }

    /// Routes one event and awaits the resulting job, if any.
    #[instrument(
        name = "route_event",
        skip_all,
        fields(
            dispatch_id = %DispatchId::new_random(),
            kind = %event.kind,
            project = %event.project,
            git_ref = event.git_ref_str().unwrap_or_default(),
            job = tracing::field::Empty,
        )
    )]
    pub async fn route(&self, event: &Event) -> Result<Dispatch, DispatchError> {
        match &event.kind {
            EventKind::CheckSuiteRequested | EventKind::CheckSuiteRerequested => {
                self.on_check_suite(event).await
            }
            EventKind::CheckRunRerequested => self.on_check_run_rerequested(event).await,
            EventKind::Push => self.on_push(event).await,
            EventKind::ReleasePublished => self.on_release_published(event).await,
            EventKind::Other(_) => {
                debug!("Event kind is not routed");
                Ok(Dispatch::Skipped {
                    reason: SkipReason::Unsubscribed {
                        kind: event.kind.clone(),
                    },
                })
            }
        }
    }

    async fn on_check_suite(&self, event: &Event) -> Result<Dispatch, DispatchError> {
        let on_trunk = event
            .git_ref_str()
            .is_some_and(|git_ref| self.config.is_trunk(git_ref));

        let job = if on_trunk {
            &self.publish_job
        } else {
            &self.build_job
        };
        debug!(on_trunk, job = %job, "Selected job for check suite");

        let description = self.construct(job, event)?;
        self.execute(description).await
    }

    async fn on_check_run_rerequested(&self, event: &Event) -> Result<Dispatch, DispatchError> {
        let payload =
            CheckRunPayload::deserialize(&event.payload).map_err(|e| DispatchError::InvalidPayload {
                field: "check_run.name",
                message: e.to_string(),
            })?;

        let job = parse_check_run_name(
            &payload.check_run.name,
            &event.project,
            &self.config.check_run_separator,
        )?;
        debug!(check_run = %payload.check_run.name, job = %job, "Re-running single check");

        let description = self.construct(&job, event)?;
        self.execute(description).await
    }

    async fn on_push(&self, event: &Event) -> Result<Dispatch, DispatchError> {
        let reference = event.git_ref_str();
        let Some(version) = reference.and_then(match_release_tag) else {
            info!(
                reference = reference.unwrap_or_default(),
                pattern = RELEASE_TAG_PATTERN,
                "Push does not reference a release tag, nothing to do"
            );
            return Ok(Dispatch::Skipped {
                reason: SkipReason::NotReleaseTag {
                    reference: reference.map(str::to_string),
                },
            });
        };

        if !self.config.version_source.allows_tag_push() {
            return Ok(self.version_source_disabled(event));
        }

        let description = self.construct(&self.publish_job, event)?;
        self.execute(with_version(description, version)).await
    }

    async fn on_release_published(&self, event: &Event) -> Result<Dispatch, DispatchError> {
        if !self.config.version_source.allows_release_payload() {
            return Ok(self.version_source_disabled(event));
        }

        let payload =
            ReleasePayload::deserialize(&event.payload).map_err(|e| DispatchError::InvalidPayload {
                field: "release.tag_name",
                message: e.to_string(),
            })?;
        let tag = payload.release.tag_name.trim();
        if tag.is_empty() {
            return Err(DispatchError::InvalidPayload {
                field: "release.tag_name",
                message: "tag name is empty".to_string(),
            });
        }

        let description = self.construct(&self.publish_job, event)?;
        self.execute(with_version(description, tag)).await
    }

    fn version_source_disabled(&self, event: &Event) -> Dispatch {
        info!(
            version_source = ?self.config.version_source,
            "Version source excludes this event, nothing to do"
        );
        Dispatch::Skipped {
            reason: SkipReason::VersionSourceDisabled {
                kind: event.kind.clone(),
                source: self.config.version_source,
            },
        }
    }

    fn construct(&self, job: &JobName, event: &Event) -> Result<JobDescription, DispatchError> {
        let constructor = self
            .registry
            .lookup(job)
            .ok_or_else(|| DispatchError::UnknownJob {
                name: job.to_string(),
            })?;
        Ok(constructor(event))
    }

    async fn execute(&self, description: JobDescription) -> Result<Dispatch, DispatchError> {
        let job = description.job.clone();
        Span::current().record("job", job.as_str());
        info!(
            display_name = %description.display_name,
            image = %description.image,
            sidecars = description.sidecars.len(),
            "Handing job to executor"
        );

        match self.executor.run(description).await {
            Ok(()) => {
                info!("Job completed");
                Ok(Dispatch::Executed { job })
            }
            Err(source) => Err(DispatchError::Execution { job, source }),
        }
    }
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("registry", &self.registry)
            .field("trunk_branch", &self.config.trunk_branch)
            .field("build_job", &self.build_job)
            .field("publish_job", &self.publish_job)
            .finish_non_exhaustive()
    }
}
