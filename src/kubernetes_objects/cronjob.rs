use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::{
    CronJob, CronJobSpec as KubeCronJobSpec, JobSpec, JobTemplateSpec,
};
use k8s_openapi::api::core::v1::{PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use thiserror::Error;
use tracing::{Level, instrument, trace};

use super::MANAGER_NAME;
use super::workload::WorkloadTemplate;
use crate::cronjob::CronJobSpec;
use crate::cronjob::error::ConfigurationError;
use crate::cronjob::raw::RawCronJobConfig;

pub(crate) const NAME_LABEL: &str = "app.kubernetes.io/name";
pub(crate) const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// A named CronJob: its scheduling spec plus the pod it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronJobDefinition {
    pub name: String,
    pub spec: CronJobSpec,
    pub workload: WorkloadTemplate,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error(
        "CronJob '{name}' has no schedule; 'schedule' is required to render a batch/v1 CronJob"
    )]
    MissingSchedule { name: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("CronJob manifest has no 'spec'")]
    MissingSpec,

    #[error("CronJob manifest has no 'spec.jobTemplate.spec'")]
    MissingJobSpec,

    #[error("CronJob manifest is invalid: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl CronJobDefinition {
    fn labels(&self) -> BTreeMap<String, String> {
        let mut labels = self.workload.labels.clone();
        labels.insert(NAME_LABEL.to_string(), self.name.clone());
        labels.insert(MANAGED_BY_LABEL.to_string(), MANAGER_NAME.to_string());
        labels
    }
}

/// Renders a `batch/v1` CronJob.
///
/// Fields that are unset on the spec stay `None` and are therefore omitted
/// when serialized; the history limits are the exception and fall back to
/// their Kubernetes defaults.
#[instrument(
    "render_cronjob",
    level = Level::TRACE,
    skip(definition),
    fields(cronjob_name = %definition.name)
)]
pub fn render_cronjob(
    definition: &CronJobDefinition,
    namespace: &str,
) -> Result<CronJob, RenderError> {
    let spec = &definition.spec;
    let schedule = spec
        .schedule()
        .ok_or_else(|| RenderError::MissingSchedule {
            name: definition.name.clone(),
        })?;
    let labels = definition.labels();

    let pod_spec = PodSpec {
        containers: vec![definition.workload.container()],
        restart_policy: Some(spec.restart_policy().to_string()),
        service_account_name: definition.workload.service_account_name.clone(),
        ..Default::default()
    };

    let job_spec = JobSpec {
        parallelism: spec.parallelism(),
        completions: spec.completions(),
        completion_mode: Some(spec.completion_mode().to_string()),
        backoff_limit: spec.backoff_limit(),
        active_deadline_seconds: spec.active_deadline_seconds(),
        ttl_seconds_after_finished: spec.ttl_seconds_after_finished(),
        template: PodTemplateSpec {
            metadata: Some(ObjectMeta {
                labels: Some(labels.clone()),
                ..Default::default()
            }),
            spec: Some(pod_spec),
        },
        ..Default::default()
    };

    let cronjob = CronJob {
        metadata: ObjectMeta {
            name: Some(definition.name.clone()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            annotations: (!definition.workload.annotations.is_empty())
                .then(|| definition.workload.annotations.clone()),
            ..Default::default()
        },
        spec: Some(KubeCronJobSpec {
            schedule: schedule.as_str().to_string(),
            time_zone: spec.time_zone().map(str::to_string),
            concurrency_policy: Some(spec.concurrency_policy().to_string()),
            starting_deadline_seconds: spec.starting_deadline_seconds(),
            suspend: Some(spec.suspend()),
            failed_jobs_history_limit: Some(spec.effective_failed_jobs_history_limit()),
            successful_jobs_history_limit: Some(spec.effective_successful_jobs_history_limit()),
            job_template: JobTemplateSpec {
                metadata: None,
                spec: Some(job_spec),
            },
            ..Default::default()
        }),
        status: None,
    };

    trace!("Rendered CronJob '{}'.", definition.name);
    Ok(cronjob)
}

/// Reads the scheduling fields of a CronJob manifest back into a validated spec.
pub fn extract_cronjob_spec(cronjob: &CronJob) -> Result<CronJobSpec, ExtractError> {
    let spec = cronjob.spec.as_ref().ok_or(ExtractError::MissingSpec)?;
    let job = spec
        .job_template
        .spec
        .as_ref()
        .ok_or(ExtractError::MissingJobSpec)?;

    let raw = RawCronJobConfig {
        schedule: Some(spec.schedule.clone()),
        time_zone: spec.time_zone.clone(),
        concurrency_policy: spec.concurrency_policy.clone(),
        starting_deadline_seconds: spec.starting_deadline_seconds,
        failed_jobs_history_limit: spec.failed_jobs_history_limit.map(i64::from),
        successful_jobs_history_limit: spec.successful_jobs_history_limit.map(i64::from),
        parallelism: job.parallelism.map(i64::from),
        completions: job.completions.map(i64::from),
        completion_mode: job.completion_mode.clone(),
        backoff_limit: job.backoff_limit.map(i64::from),
        active_deadline_seconds: job.active_deadline_seconds,
        ttl_seconds_after_finished: job.ttl_seconds_after_finished.map(i64::from),
        suspend: spec.suspend,
        restart_policy: job
            .template
            .spec
            .as_ref()
            .and_then(|pod| pod.restart_policy.clone()),
    };

    Ok(CronJobSpec::try_from(raw)?)
}
