use std::iter;
use std::path::Path;

use self::cli::{Cli, OutputFormat, SubCommands};
use self::config::Config;
use self::cronjob::schedule::Schedule;
use self::kubernetes_objects::apply::{ApplyError, ApplyOptions, apply_cronjobs};
use self::kubernetes_objects::cronjob::{RenderError, render_cronjob};
use chrono::{DateTime, Utc};
use clap::Parser;
use k8s_openapi::api::batch::v1::CronJob;
use thiserror::Error;
use tracing::{info, warn};
use tracing_error::ExtractSpanTrace;
use tracing_error::SpanTrace;

use crate::error::{SpannedErr, SpannedExt};

pub mod cli;
pub mod config;
pub mod cronjob;
pub mod error;
pub mod kubernetes_objects;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to load config.\n{0}")]
    ConfigError(#[from] config::ConfigLoadError),

    #[error("Failed to render manifest.\n{0}")]
    RenderError(#[from] RenderError),

    #[error("Failed to serialize manifests as YAML.\n{0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to serialize manifests as JSON.\n{0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to write manifests to '{0}'.\n{1}")]
    WriteError(String, SpannedErr<std::io::Error>),

    #[error("Failed to initialize kubernetes client.\n{0}")]
    KubeClientError(#[from] kube::Error),

    #[error("Failed to apply CronJobs.\n{0}")]
    ApplyError(#[from] ApplyError),
}

impl ExtractSpanTrace for AppError {
    fn span_trace(&self) -> Option<&SpanTrace> {
        match self {
            AppError::ConfigError(e) => e.span_trace(),
            AppError::WriteError(_, e) => e.span_trace(),
            AppError::ApplyError(e) => e.span_trace(),
            _ => None,
        }
    }
}

pub async fn app() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = Config::new_from_file(&cli.config, &cli.overrides).await?;

    info!("Config Loaded.");

    match cli.subcommand {
        SubCommands::Render { format, output } => {
            let cronjobs = render_all(&config)?;
            let document = serialize_manifests(&cronjobs, format)?;
            match output {
                Some(path) => write_manifests(&path, &document).await?,
                None => print!("{document}"),
            }
        }
        SubCommands::Validate { upcoming } => validate(&config, upcoming)?,
        SubCommands::Apply {
            dry_run,
            concurrency,
        } => {
            let cronjobs = render_all(&config)?;

            let client = kube::Client::try_default().await?;

            info!("Kubernetes Client Initialized.");

            let options = ApplyOptions {
                dry_run,
                concurrency,
            };
            apply_cronjobs(client, &config.namespace, &cronjobs, options).await?;
        }
    }

    Ok(())
}

fn render_all(config: &Config) -> Result<Vec<CronJob>, RenderError> {
    config
        .cronjobs
        .values()
        .map(|definition| render_cronjob(definition, &config.namespace))
        .collect()
}

/// YAML output is a multi-document stream; JSON output is a `v1/List`.
pub(crate) fn serialize_manifests(
    cronjobs: &[CronJob],
    format: OutputFormat,
) -> Result<String, AppError> {
    match format {
        OutputFormat::Yaml => Ok(cronjobs
            .iter()
            .map(serde_yaml::to_string)
            .collect::<Result<Vec<_>, _>>()?
            .join("---\n")),
        OutputFormat::Json => {
            let list = serde_json::json!({
                "apiVersion": "v1",
                "kind": "List",
                "items": cronjobs,
            });
            Ok(serde_json::to_string_pretty(&list)? + "\n")
        }
    }
}

async fn write_manifests(path: &Path, document: &str) -> Result<(), AppError> {
    tokio::fs::write(path, document)
        .await
        .with_span_trace()
        .map_err(|e| AppError::WriteError(path.display().to_string(), e))?;
    info!("Manifests written to '{}'.", path.display());
    Ok(())
}

fn validate(config: &Config, upcoming: usize) -> Result<(), AppError> {
    let now = Utc::now();
    for (name, definition) in &config.cronjobs {
        let spec = &definition.spec;
        let schedule = spec
            .schedule()
            .ok_or_else(|| RenderError::MissingSchedule { name: name.clone() })?;

        for line in describe_runs(name, schedule, spec.time_zone(), now, upcoming) {
            println!("{line}");
        }
    }

    info!("{} cronjob(s) are valid.", config.cronjobs.len());
    Ok(())
}

/// `<name>: '<schedule>'` followed by the next `count` fire times after `start`.
///
/// Times are evaluated in `time_zone`, or in UTC when it is not a known IANA zone.
fn describe_runs(
    name: &str,
    schedule: &Schedule,
    time_zone: Option<&str>,
    start: DateTime<Utc>,
    count: usize,
) -> Vec<String> {
    let zone = time_zone.and_then(|tz| match tz.parse::<chrono_tz::Tz>() {
        Ok(zone) => Some(zone),
        Err(_) => {
            warn!(
                "CronJob '{name}' uses time zone '{tz}', which is not a known IANA zone; \
                 the CronJob controller will reject it."
            );
            None
        }
    });
    let runs: Vec<String> = match zone {
        Some(zone) => schedule
            .after(start.with_timezone(&zone))
            .take(count)
            .map(|run| run.to_rfc3339())
            .collect(),
        None => schedule
            .after(start)
            .take(count)
            .map(|run| run.to_rfc3339())
            .collect(),
    };

    iter::once(format!("{name}: '{schedule}'"))
        .chain(runs.into_iter().map(|run| format!("  next: {run}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::cronjob::CronJobSpec;
    use crate::kubernetes_objects::cronjob::CronJobDefinition;
    use crate::kubernetes_objects::workload::WorkloadTemplate;

    fn rendered(names: &[&str]) -> Vec<CronJob> {
        names
            .iter()
            .map(|name| {
                let definition = CronJobDefinition {
                    name: name.to_string(),
                    spec: CronJobSpec::builder().schedule("0 0 * * *").build().unwrap(),
                    workload: WorkloadTemplate::new("busybox"),
                };
                render_cronjob(&definition, "batch").unwrap()
            })
            .collect()
    }

    #[test]
    fn test_serialize_manifests_yaml_stream() {
        let document =
            serialize_manifests(&rendered(&["first", "second"]), OutputFormat::Yaml).unwrap();

        assert_eq!(document.matches("kind: CronJob").count(), 2);
        assert_eq!(document.matches("---\n").count(), 1);

        let names: Vec<String> = serde_yaml::Deserializer::from_str(&document)
            .map(|doc| {
                let cronjob: CronJob = serde::Deserialize::deserialize(doc).unwrap();
                cronjob.metadata.name.unwrap()
            })
            .collect();
        assert_eq!(names, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn test_serialize_manifests_json_list() {
        let document = serialize_manifests(&rendered(&["only"]), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&document).unwrap();

        assert_eq!(value["kind"], "List");
        assert_eq!(value["items"][0]["kind"], "CronJob");
        assert_eq!(value["items"][0]["spec"]["schedule"], "0 0 * * *");
    }

    #[test]
    fn test_describe_runs_in_time_zone() {
        let schedule = Schedule::parse("0 0 13 * 5").unwrap();
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        assert_eq!(
            describe_runs("report", &schedule, Some("Asia/Tokyo"), start, 3),
            vec![
                "report: '0 0 13 * 5'",
                "  next: 2026-01-02T00:00:00+09:00",
                "  next: 2026-01-09T00:00:00+09:00",
                "  next: 2026-01-13T00:00:00+09:00",
            ]
        );
    }

    #[test]
    fn test_describe_runs_falls_back_to_utc() {
        let schedule = Schedule::parse("@daily").unwrap();
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();

        assert_eq!(
            describe_runs("cleanup", &schedule, Some("Mars/Olympus"), start, 1),
            vec!["cleanup: '@daily'", "  next: 2026-01-02T00:00:00+00:00"]
        );
        assert_eq!(describe_runs("cleanup", &schedule, None, start, 0).len(), 1);
    }

    #[test]
    fn test_validate_requires_schedule() {
        let definition = CronJobDefinition {
            name: "report".to_string(),
            spec: CronJobSpec::builder().build().unwrap(),
            workload: WorkloadTemplate::new("busybox"),
        };
        let config = Config {
            namespace: "batch".to_string(),
            cronjobs: [("report".to_string(), definition)].into_iter().collect(),
        };

        assert!(matches!(
            validate(&config, 1),
            Err(AppError::RenderError(RenderError::MissingSchedule { name })) if name == "report"
        ));
    }
}
