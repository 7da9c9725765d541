//! Dispatch configuration.
//!
//! Every field has a default so an empty configuration reproduces the stock
//! two-job setup (`build` on branches, `push` on the trunk and on releases).
//! The binary loads this from the `[dispatch]` table of its TOML file and calls
//! [`DispatchConfig::validate`] before constructing anything from it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{DispatchError, Environment};

const BRANCH_PREFIX: &str = "refs/heads/";

/// Which events may supply the `VERSION` of a publish job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSource {
    /// Pushing a release tag publishes; release events are ignored.
    TagPush,
    /// Publishing a release publishes; tag pushes are ignored.
    ReleasePayload,
    /// Both paths publish.
    #[default]
    Both,
}

impl VersionSource {
    /// Returns `true` if a pushed release tag should trigger a publish.
    pub fn allows_tag_push(self) -> bool {
        matches!(self, Self::TagPush | Self::Both)
    }

    /// Returns `true` if a published release should trigger a publish.
    pub fn allows_release_payload(self) -> bool {
        matches!(self, Self::ReleasePayload | Self::Both)
    }
}

/// Top-level dispatch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    /// Branch whose suites publish instead of only building (e.g. `"main"` or `"master"`).
    pub trunk_branch: String,
    /// Which events may supply a release version.
    pub version_source: VersionSource,
    /// Separator between project and job in check-run names.
    pub check_run_separator: String,
    /// Job run for suites on non-trunk branches.
    pub build_job: String,
    /// Job run for suites on the trunk, for release tags, and for releases.
    pub publish_job: String,
    /// Where and how the build tool runs.
    pub workspace: WorkspaceConfig,
    /// Settings for multi-architecture image builds.
    pub multiarch: MultiarchConfig,
    /// Secret keys holding the registry credentials.
    pub credentials: CredentialsConfig,
    /// The fixed set of jobs the registry is populated with.
    pub jobs: Vec<JobDefinition>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            trunk_branch: "main".to_string(),
            version_source: VersionSource::default(),
            check_run_separator: ":".to_string(),
            build_job: "build".to_string(),
            publish_job: "push".to_string(),
            workspace: WorkspaceConfig::default(),
            multiarch: MultiarchConfig::default(),
            credentials: CredentialsConfig::default(),
            jobs: vec![
                JobDefinition {
                    name: "build".to_string(),
                    target: "build".to_string(),
                    image: DEFAULT_BUILD_IMAGE.to_string(),
                    multiarch: false,
                    publish: false,
                    env: Environment::new(),
                },
                JobDefinition {
                    name: "push".to_string(),
                    target: "push".to_string(),
                    image: DEFAULT_BUILD_IMAGE.to_string(),
                    multiarch: true,
                    publish: true,
                    env: Environment::new(),
                },
            ],
        }
    }
}

impl DispatchConfig {
    /// Returns `true` if `git_ref` names the trunk branch.
    ///
    /// Both the bare branch name and its `refs/heads/` form are accepted.
    pub fn is_trunk(&self, git_ref: &str) -> bool {
        let branch = git_ref.strip_prefix(BRANCH_PREFIX).unwrap_or(git_ref);
        branch == self.trunk_branch.strip_prefix(BRANCH_PREFIX).unwrap_or(&self.trunk_branch)
    }

    /// Checks the configuration for values the router cannot work with.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.trunk_branch.trim().is_empty() {
            return Err(DispatchError::configuration("trunk_branch must not be empty"));
        }
        if self.check_run_separator.is_empty() {
            return Err(DispatchError::configuration(
                "check_run_separator must not be empty",
            ));
        }
        if self.workspace.mount_path.is_empty() || self.workspace.build_tool.is_empty() {
            return Err(DispatchError::configuration(
                "workspace.mount_path and workspace.build_tool must not be empty",
            ));
        }
        if self.jobs.is_empty() {
            return Err(DispatchError::configuration("at least one job must be defined"));
        }

        let mut seen = HashSet::new();
        for job in &self.jobs {
            if job.name.is_empty() || job.target.is_empty() || job.image.is_empty() {
                return Err(DispatchError::configuration(format!(
                    "job '{}' needs a non-empty name, target and image",
                    job.name
                )));
            }
            if job.name.contains(&self.check_run_separator) {
                return Err(DispatchError::configuration(format!(
                    "job name '{}' contains the check run separator '{}'",
                    job.name, self.check_run_separator
                )));
            }
            if !seen.insert(job.name.as_str()) {
                return Err(DispatchError::configuration(format!(
                    "job '{}' is defined more than once",
                    job.name
                )));
            }
        }

        for (field, name) in [("build_job", &self.build_job), ("publish_job", &self.publish_job)] {
            if !seen.contains(name.as_str()) {
                return Err(DispatchError::configuration(format!(
                    "{field} '{name}' is not among the defined jobs"
                )));
            }
        }

        let publishes = self
            .jobs
            .iter()
            .any(|job| job.name == self.publish_job && job.publish);
        if !publishes {
            return Err(DispatchError::configuration(format!(
                "publish_job '{}' must set publish = true to receive registry credentials",
                self.publish_job
            )));
        }

        if self.multiarch.daemon_image.is_empty() {
            return Err(DispatchError::configuration(
                "multiarch.daemon_image must not be empty",
            ));
        }

        Ok(())
    }
}

/// Image used by the stock jobs: a Go toolchain with a Docker client and `make`.
pub const DEFAULT_BUILD_IMAGE: &str = "quay.io/deis/lightweight-docker-go:v0.7.0";

/// Where the build tool runs inside the job container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Mount path of the checked-out source; also the working directory.
    pub mount_path: String,
    /// The build tool invoked with a single target.
    pub build_tool: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            mount_path: "/src".to_string(),
            build_tool: "make".to_string(),
        }
    }
}

/// Settings for jobs that build images for several CPU architectures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MultiarchConfig {
    /// Image of the build-daemon sidecar.
    pub daemon_image: String,
    /// Name of the sidecar container.
    pub sidecar_name: String,
    /// Address the job container uses to reach the daemon.
    pub daemon_host: String,
    /// Seconds to wait for the daemon before creating the builder.
    pub grace_period_secs: u64,
    /// Name of the throwaway builder instance.
    pub builder_name: String,
}

impl Default for MultiarchConfig {
    fn default() -> Self {
        Self {
            daemon_image: "docker:stable-dind".to_string(),
            sidecar_name: "docker".to_string(),
            daemon_host: "tcp://localhost:2375".to_string(),
            grace_period_secs: 20,
            builder_name: "multiarch-builder".to_string(),
        }
    }
}

/// Names of the event secrets holding registry credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialsConfig {
    /// Secret holding the registry organisation.
    pub org_secret: String,
    /// Secret holding the registry user name.
    pub username_secret: String,
    /// Secret holding the registry password or token.
    pub password_secret: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            org_secret: "dockerhubOrg".to_string(),
            username_secret: "dockerhubUsername".to_string(),
            password_secret: "dockerhubPassword".to_string(),
        }
    }
}

/// One entry of the job registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobDefinition {
    /// Registry name, also the trailing part of the check-run name.
    pub name: String,
    /// Build-tool target to invoke.
    pub target: String,
    /// Job container image.
    pub image: String,
    /// Build images for several architectures through a build-daemon sidecar.
    #[serde(default)]
    pub multiarch: bool,
    /// Inject registry credentials and the release version.
    #[serde(default)]
    pub publish: bool,
    /// Extra environment for the job container. `SKIP_DOCKER` and a tag-derived
    /// `VERSION` always take precedence.
    #[serde(default, skip_serializing_if = "Environment::is_empty")]
    pub env: Environment,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        DispatchConfig::default().validate().unwrap();
    }

    #[test]
    fn trunk_matches_bare_and_qualified_names() {
        let config = DispatchConfig {
            trunk_branch: "master".to_string(),
            ..DispatchConfig::default()
        };
        assert!(config.is_trunk("refs/heads/master"));
        assert!(config.is_trunk("master"));
        assert!(!config.is_trunk("refs/heads/main"));
        assert!(!config.is_trunk("refs/tags/master"));
    }

    #[test]
    fn duplicate_job_names_are_rejected() {
        let mut config = DispatchConfig::default();
        let duplicate = config.jobs[0].clone();
        config.jobs.push(duplicate);

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"), "{err}");
    }

    #[test]
    fn publish_job_must_be_defined() {
        let config = DispatchConfig {
            publish_job: "release".to_string(),
            ..DispatchConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, DispatchError::Configuration { .. }));
        assert!(err.to_string().contains("publish_job 'release'"), "{err}");
    }

    #[test]
    fn publish_job_must_carry_credentials() {
        let mut config = DispatchConfig::default();
        config.jobs.push(JobDefinition {
            name: "release".to_string(),
            target: "release".to_string(),
            image: DEFAULT_BUILD_IMAGE.to_string(),
            multiarch: false,
            publish: false,
            env: Environment::new(),
        });
        config.publish_job = "release".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must set publish = true"), "{err}");

        config.jobs[2].publish = true;
        config.validate().unwrap();
    }

    #[test]
    fn misspelled_keys_are_rejected() {
        let err = serde_json::from_str::<DispatchConfig>(r#"{"trunk_brnach": "master"}"#).unwrap_err();
        assert!(err.to_string().contains("trunk_brnach"), "{err}");

        let nested = serde_json::from_str::<DispatchConfig>(r#"{"multiarch": {"grace_period": 5}}"#);
        assert!(nested.is_err());
    }

    #[test]
    fn job_names_may_not_contain_the_separator() {
        let mut config = DispatchConfig::default();
        config.jobs[0].name = "lint:fast".to_string();
        config.build_job = "lint:fast".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn version_source_gates() {
        assert!(VersionSource::Both.allows_tag_push());
        assert!(VersionSource::Both.allows_release_payload());
        assert!(!VersionSource::TagPush.allows_release_payload());
        assert!(!VersionSource::ReleasePayload.allows_tag_push());
    }
}
