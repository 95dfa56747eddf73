use serde::Deserialize;

use super::error::ConfigurationError;

/// Unvalidated CronJob scheduling options as supplied by the user.
///
/// Integers are kept wide and signed, and policies are kept as strings, so that
/// out-of-range input reaches validation and is reported against its field.
#[cfg_attr(test, derive(PartialEq))]
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct RawCronJobConfig {
    /// The schedule in Cron format
    pub schedule: Option<String>,

    /// IANA time zone; the controller's local time when unset
    pub time_zone: Option<String>,

    pub concurrency_policy: Option<String>,

    /// Deadline for starting a run that missed its scheduled time
    pub starting_deadline_seconds: Option<i64>,

    pub failed_jobs_history_limit: Option<i64>,

    pub successful_jobs_history_limit: Option<i64>,

    pub parallelism: Option<i64>,

    pub completions: Option<i64>,

    pub completion_mode: Option<String>,

    /// Retries before the job is marked failed
    pub backoff_limit: Option<i64>,

    pub active_deadline_seconds: Option<i64>,

    pub ttl_seconds_after_finished: Option<i64>,

    pub suspend: Option<bool>,

    pub restart_policy: Option<String>,
}

impl RawCronJobConfig {
    /// Recognised keys, camelCase.
    pub const KEYS: &'static [&'static str] = &[
        "schedule",
        "timeZone",
        "concurrencyPolicy",
        "startingDeadlineSeconds",
        "failedJobsHistoryLimit",
        "successfulJobsHistoryLimit",
        "parallelism",
        "completions",
        "completionMode",
        "backoffLimit",
        "activeDeadlineSeconds",
        "ttlSecondsAfterFinished",
        "suspend",
        "restartPolicy",
    ];

    /// Resolves `concurrency-policy` or `concurrencyPolicy` style keys to their canonical name.
    pub fn canonical_key(key: &str) -> Option<&'static str> {
        let folded: String = key
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Self::KEYS
            .iter()
            .find(|known| known.to_ascii_lowercase() == folded)
            .copied()
    }

    /// Sets one option from its textual `key=value` form.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigurationError> {
        let field = Self::canonical_key(key)
            .ok_or_else(|| ConfigurationError::UnknownKey(key.to_string()))?;
        let int = || {
            value
                .trim()
                .parse::<i64>()
                .map_err(|_| ConfigurationError::NotAnInteger {
                    field,
                    value: value.to_string(),
                })
        };

        match field {
            "schedule" => self.schedule = Some(value.to_string()),
            "timeZone" => self.time_zone = Some(value.to_string()),
            "concurrencyPolicy" => self.concurrency_policy = Some(value.to_string()),
            "startingDeadlineSeconds" => self.starting_deadline_seconds = Some(int()?),
            "failedJobsHistoryLimit" => self.failed_jobs_history_limit = Some(int()?),
            "successfulJobsHistoryLimit" => self.successful_jobs_history_limit = Some(int()?),
            "parallelism" => self.parallelism = Some(int()?),
            "completions" => self.completions = Some(int()?),
            "completionMode" => self.completion_mode = Some(value.to_string()),
            "backoffLimit" => self.backoff_limit = Some(int()?),
            "activeDeadlineSeconds" => self.active_deadline_seconds = Some(int()?),
            "ttlSecondsAfterFinished" => self.ttl_seconds_after_finished = Some(int()?),
            "suspend" => {
                self.suspend = Some(match value.trim() {
                    "true" => true,
                    "false" => false,
                    _ => {
                        return Err(ConfigurationError::NotABoolean {
                            field,
                            value: value.to_string(),
                        });
                    }
                })
            }
            "restartPolicy" => self.restart_policy = Some(value.to_string()),
            _ => return Err(ConfigurationError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_cronjob_config_deserialize_camel_case() {
        let yaml_data = r#"
          schedule: "*/5 * * * *"
          timeZone: Asia/Tokyo
          concurrencyPolicy: Forbid
          parallelism: -1
          ttlSecondsAfterFinished: 600
          suspend: true
        "#;

        let raw: RawCronJobConfig = serde_yaml::from_str(yaml_data).unwrap();

        assert_eq!(
            raw,
            RawCronJobConfig {
                schedule: Some("*/5 * * * *".to_string()),
                time_zone: Some("Asia/Tokyo".to_string()),
                concurrency_policy: Some("Forbid".to_string()),
                parallelism: Some(-1),
                ttl_seconds_after_finished: Some(600),
                suspend: Some(true),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_raw_cronjob_config_deserialize_omitted() {
        let raw: RawCronJobConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(raw, RawCronJobConfig::default());
    }

    #[test]
    fn test_canonical_key() {
        assert_eq!(
            RawCronJobConfig::canonical_key("concurrency-policy"),
            Some("concurrencyPolicy")
        );
        assert_eq!(
            RawCronJobConfig::canonical_key("ttlSecondsAfterFinished"),
            Some("ttlSecondsAfterFinished")
        );
        assert_eq!(
            RawCronJobConfig::canonical_key("time-zone"),
            Some("timeZone")
        );
        assert_eq!(RawCronJobConfig::canonical_key("image"), None);
    }

    #[test]
    fn test_set_from_key_value() {
        let mut raw = RawCronJobConfig::default();
        raw.set("schedule", "0 0 * * *").unwrap();
        raw.set("backoff-limit", "4").unwrap();
        raw.set("suspend", "true").unwrap();
        raw.set("restart-policy", "Never").unwrap();

        assert_eq!(raw.schedule.as_deref(), Some("0 0 * * *"));
        assert_eq!(raw.backoff_limit, Some(4));
        assert_eq!(raw.suspend, Some(true));
        assert_eq!(raw.restart_policy.as_deref(), Some("Never"));
    }

    #[test]
    fn test_set_rejects_bad_input() {
        let mut raw = RawCronJobConfig::default();

        assert_eq!(
            raw.set("parallelism", "two").unwrap_err(),
            ConfigurationError::NotAnInteger {
                field: "parallelism",
                value: "two".to_string()
            }
        );
        assert!(matches!(
            raw.set("suspend", "yes").unwrap_err(),
            ConfigurationError::NotABoolean {
                field: "suspend",
                ..
            }
        ));
        assert_eq!(
            raw.set("replicas", "3").unwrap_err(),
            ConfigurationError::UnknownKey("replicas".to_string())
        );
        assert_eq!(raw, RawCronJobConfig::default());
    }
}
