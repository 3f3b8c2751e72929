use std::collections::HashMap;
use std::str::FromStr;
use std::time;

use envconfig::Envconfig;
use parity_engine::Thresholds;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "3310")]
    pub port: u16,

    #[envconfig(default = "http://localhost:8081")]
    pub primary_url: String,

    #[envconfig(default = "http://localhost:8082")]
    pub secondary_url: String,

    #[envconfig(default = "http://localhost:8083")]
    pub team_directory_url: String,

    #[envconfig(default = "10000")]
    pub request_timeout: EnvMsDuration,

    #[envconfig(default = "true")]
    pub scheduler_enabled: bool,

    #[envconfig(default = "15")]
    pub polling_interval_minutes: u64,

    #[envconfig(default = "5")]
    pub polling_buffer_minutes: u64,

    #[envconfig(default = "false")]
    pub fetch_full_history: bool,

    #[envconfig(default = "50")]
    pub batch_size: usize,

    #[envconfig(default = "100")]
    pub max_messages_per_fetch: usize,

    #[envconfig(default = "1000")]
    pub max_pages_per_fetch: usize,

    #[envconfig(default = "team_")]
    pub channel_prefixes: CommaSeparated,

    #[envconfig(default = "")]
    pub team_ids_override: CommaSeparated,

    #[envconfig(default = "1000")]
    pub team_scan_limit: usize,

    #[envconfig(default = "5000")]
    pub fuzzy_time_tolerance_ms: u64,

    pub thresholds_file: Option<String>,

    #[envconfig(default = "true")]
    pub export_prometheus: bool,

    #[envconfig(nested = true)]
    pub thresholds: ThresholdsConfig,
}

impl Config {
    /// Produce a host:port address for binding a TcpListener.
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn polling_interval(&self) -> time::Duration {
        time::Duration::from_secs(self.polling_interval_minutes.max(1) * 60)
    }

    /// Every setting at its default, for tests.
    pub fn default_test_config() -> Self {
        Config::init_from_hashmap(&HashMap::new()).expect("defaults are valid")
    }
}

#[derive(Envconfig, Clone)]
pub struct ThresholdsConfig {
    #[envconfig(default = "90")]
    pub coverage_percentage_min: f64,

    #[envconfig(default = "1")]
    pub content_mismatch_rate_percent: f64,

    #[envconfig(default = "0")]
    pub ordering_violations_count: f64,

    #[envconfig(default = "5000")]
    pub latency_diff_ms_max: f64,
}

impl From<&ThresholdsConfig> for Thresholds {
    fn from(config: &ThresholdsConfig) -> Self {
        Thresholds {
            coverage_percentage_min: config.coverage_percentage_min,
            content_mismatch_rate_percent: config.content_mismatch_rate_percent,
            ordering_violations_count: config.ordering_violations_count,
            latency_diff_ms_max: config.latency_diff_ms_max,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}

/// A comma separated list, with blank entries dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommaSeparated(pub Vec<String>);

impl CommaSeparated {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl FromStr for CommaSeparated {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(CommaSeparated(
            s.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_owned)
                .collect(),
        ))
    }
}
