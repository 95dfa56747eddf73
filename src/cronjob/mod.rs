pub mod error;
pub mod policy;
pub mod raw;
pub mod schedule;

use tracing::{Level, instrument};

use self::error::ConfigurationError;
use self::policy::{CompletionMode, ConcurrencyPolicy, RestartPolicy};
use self::raw::RawCronJobConfig;
use self::schedule::Schedule;

/// Failed jobs kept when `failedJobsHistoryLimit` is not set.
pub const DEFAULT_FAILED_JOBS_HISTORY_LIMIT: i32 = 1;

/// Successful jobs kept when `successfulJobsHistoryLimit` is not set.
pub const DEFAULT_SUCCESSFUL_JOBS_HISTORY_LIMIT: i32 = 3;

/// Validated and defaulted scheduling parameters of a CronJob.
///
/// Built once from a [`RawCronJobConfig`] through [`TryFrom`] or
/// [`CronJobSpecBuilder`] and never modified afterwards; use
/// [`CronJobSpec::to_builder`] to derive a changed copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronJobSpec {
    schedule: Option<Schedule>,
    time_zone: Option<String>,
    concurrency_policy: ConcurrencyPolicy,
    starting_deadline_seconds: Option<i64>,
    failed_jobs_history_limit: Option<i32>,
    successful_jobs_history_limit: Option<i32>,
    parallelism: Option<i32>,
    completions: Option<i32>,
    completion_mode: CompletionMode,
    backoff_limit: Option<i32>,
    active_deadline_seconds: Option<i64>,
    ttl_seconds_after_finished: Option<i32>,
    suspend: bool,
    restart_policy: RestartPolicy,
}

impl CronJobSpec {
    pub fn builder() -> CronJobSpecBuilder {
        CronJobSpecBuilder::default()
    }

    /// Starts a builder pre-filled with every field that is set on `self`.
    pub fn to_builder(&self) -> CronJobSpecBuilder {
        CronJobSpecBuilder {
            raw: RawCronJobConfig::from(self),
        }
    }

    pub fn schedule(&self) -> Option<&Schedule> {
        self.schedule.as_ref()
    }

    pub fn time_zone(&self) -> Option<&str> {
        self.time_zone.as_deref()
    }

    pub fn concurrency_policy(&self) -> ConcurrencyPolicy {
        self.concurrency_policy
    }

    pub fn starting_deadline_seconds(&self) -> Option<i64> {
        self.starting_deadline_seconds
    }

    pub fn failed_jobs_history_limit(&self) -> Option<i32> {
        self.failed_jobs_history_limit
    }

    pub fn successful_jobs_history_limit(&self) -> Option<i32> {
        self.successful_jobs_history_limit
    }

    /// `failedJobsHistoryLimit`, falling back to the Kubernetes default.
    pub fn effective_failed_jobs_history_limit(&self) -> i32 {
        self.failed_jobs_history_limit
            .unwrap_or(DEFAULT_FAILED_JOBS_HISTORY_LIMIT)
    }

    /// `successfulJobsHistoryLimit`, falling back to the Kubernetes default.
    pub fn effective_successful_jobs_history_limit(&self) -> i32 {
        self.successful_jobs_history_limit
            .unwrap_or(DEFAULT_SUCCESSFUL_JOBS_HISTORY_LIMIT)
    }

    pub fn parallelism(&self) -> Option<i32> {
        self.parallelism
    }

    pub fn completions(&self) -> Option<i32> {
        self.completions
    }

    pub fn completion_mode(&self) -> CompletionMode {
        self.completion_mode
    }

    pub fn backoff_limit(&self) -> Option<i32> {
        self.backoff_limit
    }

    pub fn active_deadline_seconds(&self) -> Option<i64> {
        self.active_deadline_seconds
    }

    pub fn ttl_seconds_after_finished(&self) -> Option<i32> {
        self.ttl_seconds_after_finished
    }

    pub fn suspend(&self) -> bool {
        self.suspend
    }

    pub fn restart_policy(&self) -> RestartPolicy {
        self.restart_policy
    }
}

fn non_negative(
    field: &'static str,
    value: Option<i64>,
) -> Result<Option<i64>, ConfigurationError> {
    match value {
        Some(v) if v < 0 => Err(ConfigurationError::Negative { field, value: v }),
        other => Ok(other),
    }
}

fn non_negative_i32(
    field: &'static str,
    value: Option<i64>,
) -> Result<Option<i32>, ConfigurationError> {
    non_negative(field, value)?
        .map(|v| {
            i32::try_from(v).map_err(|_| ConfigurationError::OutOfRange {
                field,
                value: v,
                max: i64::from(i32::MAX),
            })
        })
        .transpose()
}

fn positive(field: &'static str, value: Option<i64>) -> Result<Option<i64>, ConfigurationError> {
    match value {
        Some(v) if v <= 0 => Err(ConfigurationError::NotPositive { field, value: v }),
        other => Ok(other),
    }
}

impl TryFrom<RawCronJobConfig> for CronJobSpec {
    type Error = ConfigurationError;

    #[instrument("cronjob_spec/try_from", level = Level::TRACE, skip_all)]
    fn try_from(raw: RawCronJobConfig) -> Result<Self, Self::Error> {
        Ok(CronJobSpec {
            schedule: raw.schedule.as_deref().map(Schedule::parse).transpose()?,
            time_zone: raw.time_zone,
            concurrency_policy: ConcurrencyPolicy::parse_or_default(
                raw.concurrency_policy.as_deref(),
            )?,
            starting_deadline_seconds: non_negative(
                "startingDeadlineSeconds",
                raw.starting_deadline_seconds,
            )?,
            failed_jobs_history_limit: non_negative_i32(
                "failedJobsHistoryLimit",
                raw.failed_jobs_history_limit,
            )?,
            successful_jobs_history_limit: non_negative_i32(
                "successfulJobsHistoryLimit",
                raw.successful_jobs_history_limit,
            )?,
            parallelism: non_negative_i32("parallelism", raw.parallelism)?,
            completions: non_negative_i32("completions", raw.completions)?,
            completion_mode: CompletionMode::parse_or_default(raw.completion_mode.as_deref())?,
            backoff_limit: non_negative_i32("backoffLimit", raw.backoff_limit)?,
            active_deadline_seconds: positive(
                "activeDeadlineSeconds",
                raw.active_deadline_seconds,
            )?,
            ttl_seconds_after_finished: non_negative_i32(
                "ttlSecondsAfterFinished",
                raw.ttl_seconds_after_finished,
            )?,
            suspend: raw.suspend.unwrap_or(false),
            restart_policy: RestartPolicy::parse_or_default(raw.restart_policy.as_deref())?,
        })
    }
}

impl From<&CronJobSpec> for RawCronJobConfig {
    fn from(spec: &CronJobSpec) -> Self {
        RawCronJobConfig {
            schedule: spec.schedule.as_ref().map(|s| s.as_str().to_string()),
            time_zone: spec.time_zone.clone(),
            concurrency_policy: Some(spec.concurrency_policy.to_string()),
            starting_deadline_seconds: spec.starting_deadline_seconds,
            failed_jobs_history_limit: spec.failed_jobs_history_limit.map(i64::from),
            successful_jobs_history_limit: spec.successful_jobs_history_limit.map(i64::from),
            parallelism: spec.parallelism.map(i64::from),
            completions: spec.completions.map(i64::from),
            completion_mode: Some(spec.completion_mode.to_string()),
            backoff_limit: spec.backoff_limit.map(i64::from),
            active_deadline_seconds: spec.active_deadline_seconds,
            ttl_seconds_after_finished: spec.ttl_seconds_after_finished.map(i64::from),
            suspend: Some(spec.suspend),
            restart_policy: Some(spec.restart_policy.to_string()),
        }
    }
}

/// Collects options and validates them all at once in [`CronJobSpecBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct CronJobSpecBuilder {
    raw: RawCronJobConfig,
}

impl CronJobSpecBuilder {
    pub fn schedule(mut self, schedule: impl Into<String>) -> Self {
        self.raw.schedule = Some(schedule.into());
        self
    }

    pub fn time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.raw.time_zone = Some(time_zone.into());
        self
    }

    pub fn concurrency_policy(mut self, policy: ConcurrencyPolicy) -> Self {
        self.raw.concurrency_policy = Some(policy.to_string());
        self
    }

    pub fn starting_deadline_seconds(mut self, seconds: i64) -> Self {
        self.raw.starting_deadline_seconds = Some(seconds);
        self
    }

    pub fn failed_jobs_history_limit(mut self, limit: i64) -> Self {
        self.raw.failed_jobs_history_limit = Some(limit);
        self
    }

    pub fn successful_jobs_history_limit(mut self, limit: i64) -> Self {
        self.raw.successful_jobs_history_limit = Some(limit);
        self
    }

    pub fn parallelism(mut self, parallelism: i64) -> Self {
        self.raw.parallelism = Some(parallelism);
        self
    }

    pub fn completions(mut self, completions: i64) -> Self {
        self.raw.completions = Some(completions);
        self
    }

    pub fn completion_mode(mut self, mode: CompletionMode) -> Self {
        self.raw.completion_mode = Some(mode.to_string());
        self
    }

    pub fn backoff_limit(mut self, limit: i64) -> Self {
        self.raw.backoff_limit = Some(limit);
        self
    }

    pub fn active_deadline_seconds(mut self, seconds: i64) -> Self {
        self.raw.active_deadline_seconds = Some(seconds);
        self
    }

    pub fn ttl_seconds_after_finished(mut self, seconds: i64) -> Self {
        self.raw.ttl_seconds_after_finished = Some(seconds);
        self
    }

    pub fn suspend(mut self, suspend: bool) -> Self {
        self.raw.suspend = Some(suspend);
        self
    }

    pub fn restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.raw.restart_policy = Some(policy.to_string());
        self
    }

    pub fn build(self) -> Result<CronJobSpec, ConfigurationError> {
        CronJobSpec::try_from(self.raw)
    }
}
