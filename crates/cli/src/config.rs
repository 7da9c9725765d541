//! Loading `buildhook.toml`.
//!
//! ```toml
//! [dispatch]
//! trunk_branch = "master"
//! version_source = "release_payload"
//!
//! [[dispatch.jobs]]
//! name = "build"
//! target = "build"
//! image = "quay.io/deis/lightweight-docker-go:v0.7.0"
//!
//! [executor]
//! kind = "command"
//! command = ["brig-run", "--namespace", "ci"]
//! ```
//!
//! Every table is optional. Declaring `[[dispatch.jobs]]` replaces the stock
//! job list entirely.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use dispatch::DispatchConfig;
use serde::Deserialize;

/// Everything the binary reads from its configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Routing and job settings.
    pub dispatch: DispatchConfig,
    /// How job descriptions are executed.
    pub executor: ExecutorConfig,
}

/// Which executor adapter to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutorKind {
    /// Print descriptions without running them.
    #[default]
    DryRun,
    /// Pipe descriptions to an external runner.
    Command,
}

/// Executor settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Adapter to use.
    pub kind: ExecutorKind,
    /// Runner argv for [`ExecutorKind::Command`].
    pub command: Vec<String>,
}

impl CliConfig {
    /// Checks the dispatch settings and the executor settings.
    pub fn validate(&self) -> Result<()> {
        self.dispatch.validate()?;
        if self.executor.kind == ExecutorKind::Command && self.executor.command.is_empty() {
            bail!("executor.command must name a runner when executor.kind = \"command\"");
        }
        Ok(())
    }
}

/// Reads and validates the configuration at `path`.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<CliConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: CliConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config file {}", path.display()))?;
    Ok(config)
}

/// Loads `path` if given, else `buildhook.toml` in the working directory if it
/// exists, else the built-in defaults.
pub fn load(path: Option<&Path>) -> Result<CliConfig> {
    match path {
        Some(path) => load_from_path(path),
        None => {
            let default = default_config_path();
            if default.is_file() {
                load_from_path(default)
            } else {
                Ok(CliConfig::default())
            }
        }
    }
}

/// Config file looked up when `--config` is not given.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("buildhook.toml")
}
