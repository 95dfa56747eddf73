use futures::{StreamExt, stream};
use k8s_openapi::api::batch::v1::CronJob;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use tracing::{Instrument, error, info, instrument, trace_span};
use tracing_error::{ExtractSpanTrace, SpanTrace};

use crate::error::{SpannedErr, SpannedExt};
use crate::kubernetes_objects::MANAGER_NAME;

#[derive(thiserror::Error, Debug)]
pub enum ApplyError {
    #[error("CronJob manifest has no name")]
    MissingName(SpanTrace),

    #[error("Failed to apply CronJob '{0}': {1}")]
    KubeClient(String, SpannedErr<kube::Error>),

    #[error("{failed} of {total} CronJobs could not be applied; first error: {first}")]
    Partial {
        failed: usize,
        total: usize,
        first: Box<ApplyError>,
    },
}

impl ExtractSpanTrace for ApplyError {
    fn span_trace(&self) -> Option<&SpanTrace> {
        match self {
            ApplyError::MissingName(span_trace) => Some(span_trace),
            ApplyError::KubeClient(_, e) => e.span_trace(),
            ApplyError::Partial { first, .. } => first.span_trace(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ApplyOptions {
    /// Ask the API server to validate without persisting
    pub dry_run: bool,

    /// Maximum number of in-flight apply requests
    pub concurrency: usize,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            concurrency: 4,
        }
    }
}

#[instrument("apply_cronjob", skip(api, params, cronjob), level = "trace")]
async fn apply_cronjob(
    api: &Api<CronJob>,
    params: &PatchParams,
    cronjob: &CronJob,
) -> Result<CronJob, ApplyError> {
    let name = cronjob
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| ApplyError::MissingName(SpanTrace::capture()))?;

    api.patch(name, params, &Patch::Apply(cronjob))
        .instrument(trace_span!("server_side_apply", cronjob_name = %name))
        .await
        .with_span_trace()
        .map_err(|e| ApplyError::KubeClient(name.to_string(), e))
}

/// Server-side applies every CronJob into `namespace`.
///
/// All CronJobs are attempted even when some fail; the first failure is
/// reported together with the failure count.
#[instrument(
    "apply_cronjobs",
    skip(client, cronjobs),
    fields(kubernetes_namespace = %namespace, cronjob_count = cronjobs.len())
)]
pub async fn apply_cronjobs(
    client: Client,
    namespace: &str,
    cronjobs: &[CronJob],
    options: ApplyOptions,
) -> Result<Vec<CronJob>, ApplyError> {
    let api: Api<CronJob> = Api::namespaced(client, namespace);
    let mut params = PatchParams::apply(MANAGER_NAME).force();
    if options.dry_run {
        params = params.dry_run();
    }

    let results: Vec<Result<CronJob, ApplyError>> = stream::iter(cronjobs)
        .map(|cronjob| apply_cronjob(&api, &params, cronjob))
        .buffer_unordered(options.concurrency.max(1))
        .collect()
        .await;

    let total = results.len();
    let mut applied = Vec::with_capacity(total);
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(cronjob) => {
                info!(
                    "CronJob '{}' applied{}.",
                    cronjob.metadata.name.as_deref().unwrap_or("<unknown>"),
                    if options.dry_run { " (dry run)" } else { "" }
                );
                applied.push(cronjob);
            }
            Err(e) => {
                error!("{e}");
                errors.push(e);
            }
        }
    }

    let failed = errors.len();
    match errors.into_iter().next() {
        None => Ok(applied),
        Some(first) if total == 1 => Err(first),
        Some(first) => Err(ApplyError::Partial {
            failed,
            total,
            first: Box::new(first),
        }),
    }
}
