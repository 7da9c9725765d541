//! Handlers for the `dispatch`, `serve`, and `jobs` subcommands.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use dispatch::registry::JobRegistry;
use dispatch::{Dispatch, DispatchConfig, Event, EventRouter, EventSource, JobExecutor};
use executor::{CommandExecutor, DryRunExecutor};
use tokio::io::AsyncReadExt;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::{CliConfig, ExecutorKind};

/// Builds the executor named by the configuration.
///
/// `force_dry_run` overrides the configured kind.
pub fn build_executor(config: &CliConfig, force_dry_run: bool) -> Result<Arc<dyn JobExecutor>> {
    if force_dry_run {
        return Ok(Arc::new(DryRunExecutor::stdout()));
    }
    match config.executor.kind {
        ExecutorKind::DryRun => Ok(Arc::new(DryRunExecutor::stdout())),
        ExecutorKind::Command => {
            let runner = CommandExecutor::from_argv(&config.executor.command)
                .ok_or_else(|| anyhow!("executor.command must name a runner"))?;
            Ok(Arc::new(runner))
        }
    }
}

/// Builds the registry from `config` and wires it to `executor`.
pub fn build_router(config: &DispatchConfig, executor: Arc<dyn JobExecutor>) -> Result<Arc<EventRouter>> {
    let registry = JobRegistry::from_config(config).context("failed to build job registry")?;
    info!(jobs = registry.len(), "Job registry initialised");
    let router = EventRouter::new(config, Arc::new(registry), executor)
        .context("failed to construct event router")?;
    Ok(Arc::new(router))
}

/// Reads one envelope from `source` (a path, or `-` for stdin) and routes it.
pub async fn dispatch_one(router: &EventRouter, source: &str) -> Result<Dispatch> {
    let json = if source == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("failed to read event from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(Path::new(source))
            .await
            .with_context(|| format!("failed to read event file {source}"))?
    };

    let event = listener::decode_event(&json).context("failed to decode event envelope")?;
    let outcome = router
        .route(&event)
        .await
        .with_context(|| format!("failed to dispatch {} for {}", event.kind, event.project))?;
    report(&event, &outcome);
    Ok(outcome)
}

/// Totals for a `serve` run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServeSummary {
    /// Events that ran a job.
    pub executed: usize,
    /// Events that were deliberately ignored.
    pub skipped: usize,
    /// Events that failed to route or whose job failed.
    pub failed: usize,
    /// Lines that could not be decoded.
    pub unreadable: usize,
}

/// Routes every event from `source` concurrently until the source is exhausted.
///
/// A failing event is logged and counted; it never stops the loop.
pub async fn serve<S>(router: Arc<EventRouter>, mut source: S) -> Result<ServeSummary>
where
    S: EventSource,
    S::Error: std::fmt::Display,
{
    let mut summary = ServeSummary::default();
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            next = source.next_event() => match next {
                Ok(Some(event)) => {
                    let router = Arc::clone(&router);
                    in_flight.spawn(async move {
                        let outcome = router.route(&event).await;
                        (event, outcome)
                    });
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable event");
                    summary.unreadable += 1;
                }
            },
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                tally(&mut summary, joined);
            }
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        tally(&mut summary, joined);
    }

    info!(
        executed = summary.executed,
        skipped = summary.skipped,
        failed = summary.failed,
        unreadable = summary.unreadable,
        "Event stream exhausted"
    );
    Ok(summary)
}

type Routed = (Event, Result<Dispatch, dispatch::DispatchError>);

fn tally(summary: &mut ServeSummary, joined: Result<Routed, tokio::task::JoinError>) {
    match joined {
        Ok((event, Ok(outcome))) => {
            report(&event, &outcome);
            match outcome {
                Dispatch::Executed { .. } => summary.executed += 1,
                Dispatch::Skipped { .. } => summary.skipped += 1,
            }
        }
        Ok((event, Err(e))) => {
            error!(kind = %event.kind, project = %event.project, error = %e, "Dispatch failed");
            summary.failed += 1;
        }
        Err(e) => {
            error!(error = %e, "Dispatch task panicked");
            summary.failed += 1;
        }
    }
}

fn report(event: &Event, outcome: &Dispatch) {
    match outcome {
        Dispatch::Executed { job } => {
            info!(kind = %event.kind, project = %event.project, job = %job, "Job executed");
        }
        Dispatch::Skipped { reason } => {
            info!(kind = %event.kind, project = %event.project, reason = ?reason, "Event skipped");
        }
    }
}

/// Writes one line per registered job, in name order: name, target, image and
/// roles.
pub fn list_jobs(config: &DispatchConfig, out: &mut impl Write) -> Result<()> {
    let registry = JobRegistry::from_config(config).context("failed to build job registry")?;
    for name in registry.names() {
        let Some(job) = config.jobs.iter().find(|job| job.name == name.as_str()) else {
            continue;
        };
        let mut roles = Vec::new();
        if job.name == config.build_job {
            roles.push("build");
        }
        if job.name == config.publish_job {
            roles.push("publish");
        }
        if job.multiarch {
            roles.push("multiarch");
        }
        if job.publish {
            roles.push("credentials");
        }
        writeln!(
            out,
            "{}\ttarget={}\timage={}\t{}",
            job.name,
            job.target,
            job.image,
            roles.join(",")
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use dispatch::fakes::{FailingExecutor, RecordingExecutor};
    use listener::JsonLinesEventSource;

    use super::*;

    const STREAM: &str = r#"{"type":"check_suite","action":"requested","project":{"id":"acme/widget"},"revision":{"ref":"refs/heads/topic"},"payload":{}}
{"type":"push","project":{"id":"acme/widget"},"revision":{"ref":"refs/heads/topic"},"payload":{}}
not json

{"type":"push","project":{"id":"acme/widget"},"revision":{"ref":"refs/tags/v1.2.3"},"payload":{}}
{"type":"issue_comment","action":"created","project":{"id":"acme/widget"},"payload":{}}
"#;

    #[tokio::test]
    async fn serve_routes_every_readable_event() {
        let executor = Arc::new(RecordingExecutor::new());
        let router = build_router(&DispatchConfig::default(), executor.clone()).unwrap();
        let source = JsonLinesEventSource::new(STREAM.as_bytes());

        let summary = serve(router, source).await.unwrap();

        assert_eq!(
            summary,
            ServeSummary {
                executed: 2,
                skipped: 2,
                failed: 0,
                unreadable: 1,
            }
        );
        assert_eq!(executor.call_count(), 2);
    }

    #[tokio::test]
    async fn serve_keeps_going_after_failed_jobs() {
        let executor = Arc::new(FailingExecutor::new("cluster unreachable"));
        let router = build_router(&DispatchConfig::default(), executor.clone()).unwrap();
        let source = JsonLinesEventSource::new(STREAM.as_bytes());

        let summary = serve(router, source).await.unwrap();

        assert_eq!(summary.failed, 2);
        assert_eq!(summary.skipped, 2);
        assert_eq!(executor.call_count(), 2);
    }

    #[tokio::test]
    async fn dispatch_one_reads_an_envelope_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(
            &path,
            r#"{"type":"release","action":"published","project":{"id":"acme/widget"},"payload":{"release":{"tag_name":"v2.0.0"}}}"#,
        )
        .unwrap();
        let executor = Arc::new(RecordingExecutor::new());
        let router = build_router(&DispatchConfig::default(), executor.clone()).unwrap();

        let outcome = dispatch_one(&router, path.to_str().unwrap()).await.unwrap();

        assert!(matches!(outcome, Dispatch::Executed { .. }));
        assert_eq!(executor.runs()[0].env_var("VERSION"), Some("v2.0.0"));
    }

    #[tokio::test]
    async fn dispatch_one_reports_routing_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(
            &path,
            r#"{"type":"check_run","action":"rerequested","project":{"id":"acme/widget"},"payload":{"check_run":{"name":"acme/widget:lint"}}}"#,
        )
        .unwrap();
        let router = build_router(&DispatchConfig::default(), Arc::new(RecordingExecutor::new())).unwrap();

        let err = dispatch_one(&router, path.to_str().unwrap()).await.unwrap_err();

        assert!(format!("{err:#}").contains("lint"), "{err:#}");
    }

    #[test]
    fn jobs_listing_marks_roles() {
        let mut out = Vec::new();
        list_jobs(&DispatchConfig::default(), &mut out).unwrap();
        let listing = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = listing.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("build\ttarget=build"));
        assert!(lines[0].ends_with("\tbuild"));
        assert!(lines[1].starts_with("push\ttarget=push"));
        assert!(lines[1].ends_with("publish,multiarch,credentials"));
    }

    #[test]
    fn command_executor_is_selected_from_config() {
        let mut config = CliConfig::default();
        config.executor.kind = ExecutorKind::Command;
        assert!(build_executor(&config, false).is_err());

        config.executor.command = vec!["brig-run".to_string()];
        assert!(build_executor(&config, false).is_ok());
        assert!(build_executor(&config, true).is_ok());
    }
}
