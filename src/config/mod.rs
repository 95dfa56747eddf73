pub mod overrides;
mod raw;

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;
use tracing::{info, instrument};
use tracing_error::{ExtractSpanTrace, SpanTrace};

use self::overrides::Override;
use self::raw::RawConfig;
use crate::error::{SpannedErr, SpannedExt};
use crate::kubernetes_objects::cronjob::CronJobDefinition;

pub use self::raw::ConfigParseError;

#[derive(Debug, Clone)]
pub struct Config {
    pub namespace: String,
    pub cronjobs: BTreeMap<String, CronJobDefinition>,
}

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        source: SpannedErr<std::io::Error>,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Yaml {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("Invalid config file '{path}': {source}")]
    Parse {
        path: String,
        source: ConfigParseError,
    },
}

impl ExtractSpanTrace for ConfigLoadError {
    fn span_trace(&self) -> Option<&SpanTrace> {
        match self {
            ConfigLoadError::Read { source, .. } => source.span_trace(),
            _ => None,
        }
    }
}

impl Config {
    /// Reads the YAML config at `path`, applies `overrides` and validates every cronjob.
    #[instrument("load_config", skip(overrides))]
    pub async fn new_from_file(
        path: &Path,
        overrides: &[Override],
    ) -> Result<Config, ConfigLoadError> {
        let display_path = path.display().to_string();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_span_trace()
            .map_err(|source| ConfigLoadError::Read {
                path: display_path.clone(),
                source,
            })?;

        let config = Self::from_yaml(&content, overrides).map_err(|e| match e {
            FromYamlError::Yaml(source) => ConfigLoadError::Yaml {
                path: display_path.clone(),
                source,
            },
            FromYamlError::Parse(source) => ConfigLoadError::Parse {
                path: display_path.clone(),
                source,
            },
        })?;

        info!(
            "Loaded {} cronjob(s) for namespace '{}' from '{}'.",
            config.cronjobs.len(),
            config.namespace,
            display_path
        );
        Ok(config)
    }

    fn from_yaml(content: &str, overrides: &[Override]) -> Result<Config, FromYamlError> {
        let mut raw: RawConfig = serde_yaml::from_str(content).map_err(FromYamlError::Yaml)?;
        raw.apply_overrides(overrides)
            .map_err(FromYamlError::Parse)?;
        Config::try_from(raw).map_err(FromYamlError::Parse)
    }
}

#[derive(Debug)]
enum FromYamlError {
    Yaml(serde_yaml::Error),
    Parse(ConfigParseError),
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const CONFIG: &str = r#"
      namespace: batch
      cronjobs:
        nightly-report:
          image: registry.example.com/report:1.4
          schedule: "0 0 * * *"
    "#;

    #[test]
    fn test_from_yaml_with_override() {
        let overrides = vec!["nightly-report.parallelism=4".parse().unwrap()];
        let config = Config::from_yaml(CONFIG, &overrides).unwrap();

        assert_eq!(
            config.cronjobs["nightly-report"].spec.parallelism(),
            Some(4)
        );
    }

    #[test]
    fn test_from_yaml_override_is_validated() {
        let overrides = vec!["parallelism=-1".parse().unwrap()];
        let err = Config::from_yaml(CONFIG, &overrides).unwrap_err();

        assert!(matches!(
            err,
            FromYamlError::Parse(ConfigParseError::Spec { .. })
        ));
    }

    #[test]
    fn test_from_yaml_rejects_unknown_top_level_keys() {
        let yaml_data = format!("{CONFIG}\n      replicas: 3\n");
        assert!(matches!(
            Config::from_yaml(&yaml_data, &[]).unwrap_err(),
            FromYamlError::Yaml(_)
        ));
    }

    #[tokio::test]
    async fn test_new_from_file() {
        let path = std::env::temp_dir().join(format!(
            "cronjob-manifest-config-{}.yaml",
            std::process::id()
        ));
        std::fs::File::create(&path)
            .unwrap()
            .write_all(CONFIG.as_bytes())
            .unwrap();

        let config = Config::new_from_file(&path, &[]).await.unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.namespace, "batch");
        assert!(config.cronjobs.contains_key("nightly-report"));
    }

    #[tokio::test]
    async fn test_new_from_file_missing() {
        let path = Path::new("/nonexistent/cronjob-manifest/config.yaml");
        let err = Config::new_from_file(path, &[]).await.unwrap_err();

        assert!(matches!(err, ConfigLoadError::Read { .. }));
        assert!(err.span_trace().is_some());
    }
}
