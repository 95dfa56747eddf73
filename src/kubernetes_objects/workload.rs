use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, EnvVar};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::cronjob::error::ConfigurationError;
use crate::cronjob::policy::ImagePullPolicy;

/// Container name used for the single container of every rendered job pod.
pub(crate) const CONTAINER_NAME: &str = "job";

/// Workload keys of a config entry, before validation.
///
/// The maps stay untyped YAML so that unquoted numbers and booleans can be read
/// as strings, which serde cannot do once the entry is flattened.
#[cfg_attr(test, derive(PartialEq))]
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct RawWorkloadTemplate {
    pub image: Option<String>,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub env: Mapping,
    pub labels: Mapping,
    pub annotations: Mapping,
    pub image_pull_policy: Option<String>,
    pub service_account_name: Option<String>,
}

/// What the scheduled pod runs and how the resulting objects are labelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadTemplate {
    pub image: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
    /// In declaration order, since `$(VAR)` references only see earlier variables
    pub env: Vec<(String, String)>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub image_pull_policy: Option<ImagePullPolicy>,
    pub service_account_name: Option<String>,
}

impl WorkloadTemplate {
    pub fn new(image: impl Into<String>) -> WorkloadTemplate {
        WorkloadTemplate {
            image: image.into(),
            command: Vec::new(),
            args: Vec::new(),
            env: Vec::new(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            image_pull_policy: None,
            service_account_name: None,
        }
    }

    pub(crate) fn container(&self) -> Container {
        Container {
            name: CONTAINER_NAME.to_string(),
            image: Some(self.image.clone()),
            command: (!self.command.is_empty()).then(|| self.command.clone()),
            args: (!self.args.is_empty()).then(|| self.args.clone()),
            env: (!self.env.is_empty()).then(|| {
                self.env
                    .iter()
                    .map(|(name, value)| EnvVar {
                        name: name.clone(),
                        value: Some(value.clone()),
                        ..Default::default()
                    })
                    .collect()
            }),
            image_pull_policy: self.image_pull_policy.map(|p| p.to_string()),
            ..Default::default()
        }
    }
}

/// Why a workload template could not be built.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkloadTemplateError {
    #[error("Field 'image' is required")]
    MissingImage,

    #[error("Field '{field}' entry '{key}' must be a string, number or boolean")]
    NotAScalar { field: &'static str, key: String },

    #[error("{0}")]
    Configuration(#[from] ConfigurationError),
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Reads a YAML mapping of scalars as strings, in document order.
fn string_entries(
    field: &'static str,
    mapping: &Mapping,
) -> Result<Vec<(String, String)>, WorkloadTemplateError> {
    mapping
        .iter()
        .map(|(key, value)| {
            let not_a_scalar = || WorkloadTemplateError::NotAScalar {
                field,
                key: scalar_string(key).unwrap_or_else(|| format!("{key:?}")),
            };
            let name = scalar_string(key).ok_or_else(not_a_scalar)?;
            let value = scalar_string(value).ok_or_else(not_a_scalar)?;
            Ok((name, value))
        })
        .collect()
}

impl TryFrom<RawWorkloadTemplate> for WorkloadTemplate {
    type Error = WorkloadTemplateError;
    fn try_from(raw: RawWorkloadTemplate) -> Result<Self, Self::Error> {
        let image = raw
            .image
            .filter(|image| !image.trim().is_empty())
            .ok_or(WorkloadTemplateError::MissingImage)?;
        let image_pull_policy = raw
            .image_pull_policy
            .as_deref()
            .map(ImagePullPolicy::parse)
            .transpose()?;

        Ok(WorkloadTemplate {
            image,
            command: raw.command,
            args: raw.args,
            env: string_entries("env", &raw.env)?,
            labels: string_entries("labels", &raw.labels)?.into_iter().collect(),
            annotations: string_entries("annotations", &raw.annotations)?
                .into_iter()
                .collect(),
            image_pull_policy,
            service_account_name: raw.service_account_name,
        })
    }
}
