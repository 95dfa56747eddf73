use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

use super::Config;
use super::overrides::Override;
use crate::cronjob::CronJobSpec;
use crate::cronjob::error::ConfigurationError;
use crate::cronjob::raw::RawCronJobConfig;
use crate::kubernetes_objects::cronjob::CronJobDefinition;
use crate::kubernetes_objects::workload::{
    RawWorkloadTemplate, WorkloadTemplate, WorkloadTemplateError,
};

/// Kubernetes appends an 11 character suffix to the names of Jobs it creates.
const MAX_CRONJOB_NAME_LENGTH: usize = 52;

#[cfg_attr(test, derive(PartialEq))]
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub(super) struct RawConfig {
    pub(super) namespace: String,
    pub(super) cronjobs: BTreeMap<String, RawCronJobEntry>,
}

#[cfg_attr(test, derive(PartialEq))]
#[derive(Deserialize, Debug, Clone)]
pub(super) struct RawCronJobEntry {
    #[serde(flatten)]
    pub(super) cronjob: RawCronJobConfig,

    #[serde(flatten)]
    pub(super) workload: RawWorkloadTemplate,

    /// Whatever neither of the above recognised
    #[serde(flatten)]
    pub(super) unknown: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigParseError {
    #[error("No cronjobs are defined")]
    NoCronJobs,

    #[error("CronJob name '{name}' is invalid: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("CronJob '{name}' has unknown keys: {}", keys.join(", "))]
    UnknownKeys { name: String, keys: Vec<String> },

    #[error("Override '{target}' refers to cronjob '{name}', which is not defined")]
    UnknownOverrideTarget { name: String, target: String },

    #[error("CronJob '{name}': {source}")]
    Spec {
        name: String,
        source: ConfigurationError,
    },

    #[error("CronJob '{name}': {source}")]
    Workload {
        name: String,
        source: WorkloadTemplateError,
    },
}

fn validate_name(name: &str) -> Result<(), ConfigParseError> {
    let invalid = |reason: &str| ConfigParseError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.len() > MAX_CRONJOB_NAME_LENGTH {
        return Err(invalid("must be at most 52 characters"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid(
            "must consist of lower case alphanumeric characters or '-'",
        ));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(invalid("must start and end with an alphanumeric character"));
    }
    Ok(())
}

impl RawConfig {
    /// Applies `key=value` overrides in order; later overrides win.
    pub(super) fn apply_overrides(
        &mut self,
        overrides: &[Override],
    ) -> Result<(), ConfigParseError> {
        for o in overrides {
            let set = |name: &String, entry: &mut RawCronJobEntry| {
                entry
                    .cronjob
                    .set(&o.key, &o.value)
                    .map_err(|source| ConfigParseError::Spec {
                        name: name.clone(),
                        source,
                    })
            };

            match &o.cronjob {
                Some(name) => {
                    let entry = self.cronjobs.get_mut(name).ok_or_else(|| {
                        ConfigParseError::UnknownOverrideTarget {
                            name: name.clone(),
                            target: o.to_string(),
                        }
                    })?;
                    set(name, entry)?;
                }
                None => {
                    for (name, entry) in self.cronjobs.iter_mut() {
                        set(name, entry)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl TryFrom<RawConfig> for Config {
    type Error = ConfigParseError;
    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        if raw.cronjobs.is_empty() {
            return Err(ConfigParseError::NoCronJobs);
        }

        let cronjobs = raw
            .cronjobs
            .into_iter()
            .map(|(name, entry)| {
                validate_name(&name)?;
                if !entry.unknown.is_empty() {
                    return Err(ConfigParseError::UnknownKeys {
                        name,
                        keys: entry.unknown.into_keys().collect(),
                    });
                }

                let spec = CronJobSpec::try_from(entry.cronjob).map_err(|source| {
                    ConfigParseError::Spec {
                        name: name.clone(),
                        source,
                    }
                })?;
                let workload = WorkloadTemplate::try_from(entry.workload).map_err(|source| {
                    ConfigParseError::Workload {
                        name: name.clone(),
                        source,
                    }
                })?;

                Ok((
                    name.clone(),
                    CronJobDefinition {
                        name,
                        spec,
                        workload,
                    },
                ))
            })
            .collect::<Result<BTreeMap<_, _>, ConfigParseError>>()?;

        Ok(Config {
            namespace: raw.namespace,
            cronjobs,
        })
    }
}
