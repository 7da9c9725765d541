//! Job description construction.
//!
//! A description starts from [`build`], which produces the plain
//! "run the build tool on one target" shape with any extra environment, and is
//! then layered with the decorators in this module:
//!
//! | Decorator | Adds |
//! |-----------|------|
//! | [`with_version`] | an explicit `VERSION` override |
//! | [`with_registry_credentials`] | `DOCKER_ORG` / `DOCKER_USERNAME` / `DOCKER_PASSWORD` |
//! | [`publish`] | credentials plus, when known, the version |
//! | [`into_multiarch`] | the build-daemon sidecar and the buildx wrapper script |
//!
//! [`describe`] turns a configured [`JobDefinition`] into a description. Construction never fails;
//! bad images or missing secrets only surface when the executor runs the job.

use tracing::warn;

use crate::config::{CredentialsConfig, DispatchConfig, JobDefinition, MultiarchConfig, WorkspaceConfig};
use crate::refs::match_release_tag;
use crate::{Environment, Event, ImageRef, JobDescription, JobName, ProjectId, Secrets, Sidecar};

/// Tells the build tooling not to start its own containers.
pub const SKIP_DOCKER_VAR: &str = "SKIP_DOCKER";
/// Release version handed to the build tooling.
pub const VERSION_VAR: &str = "VERSION";
/// Address of the Docker daemon the build tooling talks to.
pub const DOCKER_HOST_VAR: &str = "DOCKER_HOST";
/// Registry organisation images are pushed to.
pub const DOCKER_ORG_VAR: &str = "DOCKER_ORG";
/// Registry user name.
pub const DOCKER_USERNAME_VAR: &str = "DOCKER_USERNAME";
/// Registry password or token.
pub const DOCKER_PASSWORD_VAR: &str = "DOCKER_PASSWORD";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// The configuration slices needed to build descriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    /// Mount path and build tool.
    pub workspace: WorkspaceConfig,
    /// Sidecar and builder settings for multi-architecture jobs.
    pub multiarch: MultiarchConfig,
    /// Secret keys for registry credentials.
    pub credentials: CredentialsConfig,
    /// Separator between project and job in check-run names.
    pub check_run_separator: String,
}

impl BuildSettings {
    /// Extracts the build settings from a dispatch configuration.
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            workspace: config.workspace.clone(),
            multiarch: config.multiarch.clone(),
            credentials: config.credentials.clone(),
            check_run_separator: config.check_run_separator.clone(),
        }
    }
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::default())
    }
}

/// Returns the check-run name for `job` in `project`: `"<project><separator><job>"`.
pub fn check_run_name(project: &ProjectId, separator: &str, job: &JobName) -> String {
    format!("{project}{separator}{job}")
}

// ---------------------------------------------------------------------------
// Base description
// ---------------------------------------------------------------------------

/// Builds the base description: `<build tool> <target>` in the workspace.
///
/// The environment starts from `extra_env`. `SKIP_DOCKER=true` is then always
/// set, and when the event's reference is a release tag its version is set as
/// `VERSION`; neither can be overridden through `extra_env`.
pub fn build(
    job: &JobName,
    target: &str,
    image: &ImageRef,
    event: &Event,
    settings: &BuildSettings,
    extra_env: Environment,
) -> JobDescription {
    let mut env = extra_env;
    env.insert(SKIP_DOCKER_VAR.to_string(), "true".to_string());

    if let Some(version) = event.git_ref_str().and_then(match_release_tag) {
        env.insert(VERSION_VAR.to_string(), version.to_string());
    }

    JobDescription {
        job: job.clone(),
        display_name: check_run_name(&event.project, &settings.check_run_separator, job),
        image: image.clone(),
        working_dir: settings.workspace.mount_path.clone(),
        command: settings.workspace.build_tool.clone(),
        args: vec![target.to_string()],
        env,
        sensitive_env: Default::default(),
        sidecars: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Decorators
// ---------------------------------------------------------------------------

/// Sets `VERSION`, replacing whatever the reference implied.
pub fn with_version(mut description: JobDescription, version: &str) -> JobDescription {
    description
        .env
        .insert(VERSION_VAR.to_string(), version.to_string());
    description
}

/// Adds the registry organisation, user name and password from the event secrets.
///
/// A missing secret becomes an empty value; the executor's push fails on it.
pub fn with_registry_credentials(
    mut description: JobDescription,
    secrets: &Secrets,
    credentials: &CredentialsConfig,
) -> JobDescription {
    for (var, secret, sensitive) in [
        (DOCKER_ORG_VAR, &credentials.org_secret, false),
        (DOCKER_USERNAME_VAR, &credentials.username_secret, true),
        (DOCKER_PASSWORD_VAR, &credentials.password_secret, true),
    ] {
        let value = secrets.get(secret).unwrap_or_else(|| {
            warn!(job = %description.job, secret = %secret, "Registry credential secret is not set");
            ""
        });
        description.env.insert(var.to_string(), value.to_string());
        if sensitive {
            description.sensitive_env.insert(var.to_string());
        }
    }
    description
}

/// Turns the description into a multi-architecture image build.
///
/// The command becomes a shell script that waits for the build-daemon sidecar,
/// creates a fresh buildx builder, lists the builders, and then runs the
/// original command. The sidecar runs privileged with TLS disabled and
/// `DOCKER_HOST` points at it. The builder disappears with the job.
pub fn into_multiarch(mut description: JobDescription, multiarch: &MultiarchConfig) -> JobDescription {
    let original = std::iter::once(description.command.as_str())
        .chain(description.args.iter().map(String::as_str))
        .map(shell_quote)
        .collect::<Vec<_>>()
        .join(" ");

    let script = format!(
        "sleep {grace} && docker buildx create --name {builder} --driver docker-container --use && docker buildx ls && {original}",
        grace = multiarch.grace_period_secs,
        builder = shell_quote(&multiarch.builder_name),
    );

    description.command = "sh".to_string();
    description.args = vec!["-c".to_string(), script];
    description
        .env
        .insert(DOCKER_HOST_VAR.to_string(), multiarch.daemon_host.clone());

    let mut sidecar_env = Environment::new();
    sidecar_env.insert("DOCKER_TLS_CERTDIR".to_string(), String::new());

    description.sidecars.push(Sidecar {
        name: multiarch.sidecar_name.clone(),
        image: ImageRef::new(multiarch.daemon_image.clone())
            .unwrap_or_else(|| description.image.clone()),
        privileged: true,
        env: sidecar_env,
    });
    description
}

/// Quotes `word` for `sh` unless it consists only of characters the shell
/// passes through unchanged.
fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+@%,".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

// ---------------------------------------------------------------------------
// Compositions
// ---------------------------------------------------------------------------

/// Turns a build description into a publish description: registry credentials
/// from `secrets` and, when known, an explicit `VERSION`.
pub fn publish(
    description: JobDescription,
    secrets: &Secrets,
    settings: &BuildSettings,
    version: Option<&str>,
) -> JobDescription {
    let description = with_registry_credentials(description, secrets, &settings.credentials);
    match version {
        Some(version) => with_version(description, version),
        None => description,
    }
}

/// A [`JobDefinition`] with its identifiers already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    /// Registry name.
    pub name: JobName,
    /// Build-tool target.
    pub target: String,
    /// Job container image.
    pub image: ImageRef,
    /// Whether the job builds multi-architecture images.
    pub multiarch: bool,
    /// Whether the job publishes.
    pub publish: bool,
    /// Extra environment for the job container.
    pub env: Environment,
}

impl JobSpec {
    /// Validates a configured job definition, returning `None` if any field is empty.
    pub fn from_definition(definition: &JobDefinition) -> Option<Self> {
        if definition.target.is_empty() {
            return None;
        }
        Some(Self {
            name: JobName::new(definition.name.clone())?,
            target: definition.target.clone(),
            image: ImageRef::new(definition.image.clone())?,
            multiarch: definition.multiarch,
            publish: definition.publish,
            env: definition.env.clone(),
        })
    }
}

/// Builds the description for a configured job.
pub fn describe(spec: &JobSpec, event: &Event, settings: &BuildSettings) -> JobDescription {
    let description = build(&spec.name, &spec.target, &spec.image, event, settings, spec.env.clone());
    let description = if spec.publish {
        publish(description, &event.secrets, settings, None)
    } else {
        description
    };

    if spec.multiarch {
        into_multiarch(description, &settings.multiarch)
    } else {
        description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventKind, GitRef};

    fn event(git_ref: &str) -> Event {
        Event::new(EventKind::Push, ProjectId::new("acme/widget").unwrap())
            .with_ref(GitRef::new(git_ref).unwrap())
            .with_secrets(
                [
                    ("dockerhubOrg", "acme"),
                    ("dockerhubUsername", "robot"),
                    ("dockerhubPassword", "hunter2"),
                ]
                .into_iter()
                .collect(),
            )
    }

    fn job(name: &str) -> JobName {
        JobName::new(name).unwrap()
    }

    fn image() -> ImageRef {
        ImageRef::new("golang:1.22").unwrap()
    }

    #[test]
    fn build_runs_the_build_tool_on_the_target() {
        let description = build(
            &job("build"),
            "build",
            &image(),
            &event("refs/heads/feature"),
            &BuildSettings::default(),
            Environment::new(),
        );

        assert_eq!(description.display_name, "acme/widget:build");
        assert_eq!(description.command, "make");
        assert_eq!(description.args, vec!["build".to_string()]);
        assert_eq!(description.working_dir, "/src");
        assert_eq!(description.env_var(SKIP_DOCKER_VAR), Some("true"));
        assert_eq!(description.env_var(VERSION_VAR), None);
        assert!(description.sidecars.is_empty());
    }

    #[test]
    fn build_injects_version_for_release_tags() {
        let description = build(
            &job("build"),
            "build",
            &image(),
            &event("refs/tags/v1.4.0"),
            &BuildSettings::default(),
            Environment::new(),
        );
        assert_eq!(description.env_var(VERSION_VAR), Some("v1.4.0"));
    }

    #[test]
    fn extra_env_is_merged() {
        let extra = [("GOFLAGS".to_string(), "-mod=vendor".to_string())]
            .into_iter()
            .collect();
        let description = build(
            &job("build"),
            "build",
            &image(),
            &event("refs/heads/main"),
            &BuildSettings::default(),
            extra,
        );
        assert_eq!(description.env_var("GOFLAGS"), Some("-mod=vendor"));
        assert_eq!(description.env_var(SKIP_DOCKER_VAR), Some("true"));
    }

    #[test]
    fn extra_env_cannot_override_skip_docker_or_the_tag_version() {
        let extra = [
            (SKIP_DOCKER_VAR.to_string(), "false".to_string()),
            (VERSION_VAR.to_string(), "v0.0.0-dev".to_string()),
        ]
        .into_iter()
        .collect();
        let description = build(
            &job("push"),
            "push",
            &image(),
            &event("refs/tags/v1.4.0"),
            &BuildSettings::default(),
            extra,
        );
        assert_eq!(description.env_var(SKIP_DOCKER_VAR), Some("true"));
        assert_eq!(description.env_var(VERSION_VAR), Some("v1.4.0"));
    }

    #[test]
    fn publish_adds_credentials_and_explicit_version() {
        let event = event("refs/tags/v9.9.9");
        let settings = BuildSettings::default();
        let description = build(&job("push"), "push", &image(), &event, &settings, Environment::new());
        let description = publish(description, &event.secrets, &settings, Some("v3.1.0"));

        assert_eq!(description.env_var(DOCKER_ORG_VAR), Some("acme"));
        assert_eq!(description.env_var(DOCKER_USERNAME_VAR), Some("robot"));
        assert_eq!(description.env_var(DOCKER_PASSWORD_VAR), Some("hunter2"));
        assert_eq!(description.env_var(VERSION_VAR), Some("v3.1.0"));
        assert!(description.sensitive_env.contains(DOCKER_PASSWORD_VAR));
    }

    #[test]
    fn missing_secrets_become_empty_values() {
        let bare = Event::new(EventKind::Push, ProjectId::new("acme/widget").unwrap());
        let settings = BuildSettings::default();
        let description = build(&job("push"), "push", &image(), &bare, &settings, Environment::new());
        let description = publish(description, &bare.secrets, &settings, None);
        assert_eq!(description.env_var(DOCKER_PASSWORD_VAR), Some(""));
    }

    #[test]
    fn multiarch_wraps_the_command_and_adds_a_privileged_daemon() {
        let settings = BuildSettings::default();
        let description = build(
            &job("push"),
            "push",
            &image(),
            &event("refs/heads/main"),
            &settings,
            Environment::new(),
        );
        let description = into_multiarch(description, &settings.multiarch);

        assert_eq!(description.command, "sh");
        assert_eq!(description.args[0], "-c");
        let script = &description.args[1];
        assert!(script.starts_with("sleep 20 && "), "{script}");
        assert!(script.contains("docker buildx create --name multiarch-builder"), "{script}");
        assert!(script.contains("docker buildx ls"), "{script}");
        assert!(script.ends_with("&& make push"), "{script}");

        assert_eq!(description.env_var(DOCKER_HOST_VAR), Some("tcp://localhost:2375"));
        assert_eq!(description.sidecars.len(), 1);
        let sidecar = &description.sidecars[0];
        assert!(sidecar.privileged);
        assert_eq!(sidecar.image.as_str(), "docker:stable-dind");
        assert_eq!(sidecar.env.get("DOCKER_TLS_CERTDIR").map(String::as_str), Some(""));
    }

    #[test]
    fn multiarch_script_quotes_the_wrapped_command() {
        let settings = BuildSettings::default();
        let description = build(
            &job("push"),
            "push images; rm -rf /",
            &image(),
            &event("refs/heads/topic"),
            &settings,
            Environment::new(),
        );
        let description = into_multiarch(description, &settings.multiarch);

        let script = &description.args[1];
        assert!(script.ends_with("&& make 'push images; rm -rf /'"), "{script}");
    }

    #[test]
    fn shell_quote_leaves_plain_words_alone() {
        assert_eq!(shell_quote("push"), "push");
        assert_eq!(shell_quote("bin/build-all.sh"), "bin/build-all.sh");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("$HOME"), "'$HOME'");
    }

    #[test]
    fn describe_follows_the_job_spec() {
        let config = DispatchConfig::default();
        let settings = BuildSettings::from_config(&config);
        let specs: Vec<_> = config
            .jobs
            .iter()
            .map(|d| JobSpec::from_definition(d).unwrap())
            .collect();

        let build_job = describe(&specs[0], &event("refs/heads/main"), &settings);
        assert_eq!(build_job.env_var(DOCKER_ORG_VAR), None);
        assert!(build_job.sidecars.is_empty());

        let push_job = describe(&specs[1], &event("refs/heads/main"), &settings);
        assert_eq!(push_job.env_var(DOCKER_ORG_VAR), Some("acme"));
        assert_eq!(push_job.sidecars.len(), 1);
    }

    #[test]
    fn describe_passes_configured_env_through() {
        let spec = JobSpec {
            name: job("build"),
            target: "build".to_string(),
            image: image(),
            multiarch: false,
            publish: false,
            env: [
                ("GOFLAGS".to_string(), "-mod=vendor".to_string()),
                (SKIP_DOCKER_VAR.to_string(), "false".to_string()),
            ]
            .into_iter()
            .collect(),
        };

        let description = describe(&spec, &event("refs/heads/topic"), &BuildSettings::default());

        assert_eq!(description.env_var("GOFLAGS"), Some("-mod=vendor"));
        assert_eq!(description.env_var(SKIP_DOCKER_VAR), Some("true"));
    }
}
