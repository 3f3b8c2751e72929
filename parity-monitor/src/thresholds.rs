use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use parity_engine::Thresholds;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::ThresholdsConfig;
use crate::error::ThresholdError;

/// Loads named threshold overrides.
#[async_trait]
pub trait ThresholdProvider {
    /// Where the thresholds come from, for logs.
    fn source(&self) -> String;

    async fn load(&self) -> Result<HashMap<String, f64>, ThresholdError>;
}

/// Thresholds taken as-is from the environment.
pub struct EnvThresholds {
    thresholds: Thresholds,
}

impl EnvThresholds {
    pub fn new(config: &ThresholdsConfig) -> Self {
        EnvThresholds {
            thresholds: Thresholds::from(config),
        }
    }
}

#[async_trait]
impl ThresholdProvider for EnvThresholds {
    fn source(&self) -> String {
        "environment".to_owned()
    }

    async fn load(&self) -> Result<HashMap<String, f64>, ThresholdError> {
        let t = &self.thresholds;
        Ok(HashMap::from([
            (
                "coverage_percentage_min".to_owned(),
                t.coverage_percentage_min,
            ),
            (
                "content_mismatch_rate_percent".to_owned(),
                t.content_mismatch_rate_percent,
            ),
            (
                "ordering_violations_count".to_owned(),
                t.ordering_violations_count,
            ),
            ("latency_diff_ms_max".to_owned(), t.latency_diff_ms_max),
        ]))
    }
}

/// A JSON object of threshold names to numbers. Entries that are not numbers are skipped.
pub struct FileThresholds {
    path: PathBuf,
}

impl FileThresholds {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileThresholds { path: path.into() }
    }
}

#[async_trait]
impl ThresholdProvider for FileThresholds {
    fn source(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<HashMap<String, f64>, ThresholdError> {
        let contents = tokio::fs::read(&self.path).await?;
        let raw: HashMap<String, Value> = serde_json::from_slice(&contents)?;

        Ok(raw
            .into_iter()
            .filter_map(|(name, value)| value.as_f64().map(|v| (name, v)))
            .collect())
    }
}

/// Apply each provider over the defaults in order, later ones winning. A provider that fails
/// to load is skipped.
pub async fn layer_thresholds(providers: &[&(dyn ThresholdProvider + Sync)]) -> Thresholds {
    let mut thresholds = Thresholds::default();

    for provider in providers {
        match provider.load().await {
            Ok(overrides) => {
                info!(
                    source = %provider.source(),
                    count = overrides.len(),
                    "loaded thresholds"
                );
                thresholds = thresholds.with_overrides(&overrides);
            }
            Err(e) => warn!(source = %provider.source(), "skipping thresholds: {}", e),
        }
    }

    thresholds
}

/// Environment thresholds, overlaid with the file ones when a file is configured and readable.
pub async fn resolve_thresholds(config: &ThresholdsConfig, file: Option<&str>) -> Thresholds {
    let env = EnvThresholds::new(config);

    match file.map(|path| FileThresholds::new(path)) {
        Some(file) => layer_thresholds(&[&env, &file]).await,
        None => layer_thresholds(&[&env]).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envconfig::Envconfig;
    use std::io::Write;

    fn env_config() -> ThresholdsConfig {
        ThresholdsConfig::init_from_hashmap(&HashMap::from([(
            "LATENCY_DIFF_MS_MAX".to_owned(),
            "2500".to_owned(),
        )]))
        .unwrap()
    }

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}", std::process::id(), name));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_env_provider_reports_every_threshold() {
        let loaded = EnvThresholds::new(&env_config()).load().await.unwrap();

        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded["latency_diff_ms_max"], 2500.0);
        assert_eq!(Thresholds::from_overrides(&loaded), Thresholds::from(&env_config()));
    }

    #[tokio::test]
    async fn test_file_overrides_env() {
        let path = temp_file(
            "thresholds-ok.json",
            r#"{"coverage_percentage_min": 80, "ordering_violations_count": "lots", "unknown": 1}"#,
        );

        let thresholds = resolve_thresholds(&env_config(), path.to_str()).await;

        assert_eq!(thresholds.coverage_percentage_min, 80.0);
        assert_eq!(thresholds.ordering_violations_count, 0.0);
        assert_eq!(thresholds.latency_diff_ms_max, 2500.0);
    }

    #[tokio::test]
    async fn test_later_providers_win() {
        let path = temp_file("thresholds-layered.json", r#"{"latency_diff_ms_max": 100}"#);
        let env = EnvThresholds::new(&env_config());
        let file = FileThresholds::new(&path);

        assert_eq!(layer_thresholds(&[]).await, Thresholds::default());
        assert_eq!(layer_thresholds(&[&env, &file]).await.latency_diff_ms_max, 100.0);
        assert_eq!(layer_thresholds(&[&file, &env]).await.latency_diff_ms_max, 2500.0);
    }

    #[tokio::test]
    async fn test_unreadable_file_keeps_env() {
        let broken = temp_file("thresholds-broken.json", "{not json");

        assert_eq!(
            resolve_thresholds(&env_config(), broken.to_str()).await,
            Thresholds::from(&env_config())
        );
        assert_eq!(
            resolve_thresholds(&env_config(), Some("/nonexistent/thresholds.json")).await,
            Thresholds::from(&env_config())
        );
        assert!(matches!(
            FileThresholds::new(broken).load().await,
            Err(ThresholdError::InvalidJson(_))
        ));
    }
}
