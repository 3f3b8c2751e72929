use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use parity_engine::{BatchSummary, ComparisonEngine, ComparisonResult, MetricsEmitter};
use time::OffsetDateTime;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::batch::process_batches;
use crate::channels::ChannelIdBuilder;
use crate::config::Config;
use crate::error::SchedulerError;
use crate::fetch::DualFetcher;
use crate::health::HealthHandle;
use crate::teams::TeamDiscoveryService;
use crate::time_window::TimeWindow;

const COMPARISON_FAILURES: &str = "chat_parity_comparison_failures_total";
const SCHEDULED_FAILURES: &str = "chat_parity_scheduled_comparison_failures_total";
const RUN_DURATION_MS: &str = "chat_parity_comparison_run_duration_ms";

#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    pub polling_interval_minutes: u64,
    pub polling_buffer_minutes: u64,
    pub fetch_full_history: bool,
    pub batch_size: usize,
}

impl From<&Config> for SchedulerSettings {
    fn from(config: &Config) -> Self {
        SchedulerSettings {
            polling_interval_minutes: config.polling_interval_minutes,
            polling_buffer_minutes: config.polling_buffer_minutes,
            fetch_full_history: config.fetch_full_history,
            batch_size: config.batch_size,
        }
    }
}

/// Channels named by a caller, and the results of comparing them.
#[derive(Debug)]
pub struct ManualRun {
    pub channel_ids: Vec<String>,
    pub results: Vec<ComparisonResult>,
}

#[derive(Clone)]
pub struct ComparisonScheduler {
    fetcher: DualFetcher,
    engine: ComparisonEngine,
    emitter: MetricsEmitter,
    channels: ChannelIdBuilder,
    discovery: Arc<TeamDiscoveryService>,
    settings: SchedulerSettings,
}

impl ComparisonScheduler {
    pub fn new(
        fetcher: DualFetcher,
        engine: ComparisonEngine,
        emitter: MetricsEmitter,
        channels: ChannelIdBuilder,
        discovery: TeamDiscoveryService,
        settings: SchedulerSettings,
    ) -> Self {
        ComparisonScheduler {
            fetcher,
            engine,
            emitter,
            channels,
            discovery: Arc::new(discovery),
            settings,
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    fn time_window(&self) -> TimeWindow {
        if self.settings.fetch_full_history {
            return TimeWindow::unbounded();
        }
        TimeWindow::trailing(
            OffsetDateTime::now_utc().unix_timestamp(),
            self.settings.polling_interval_minutes,
            self.settings.polling_buffer_minutes,
        )
    }

    /// Fetch, compare and emit every channel. Channels whose comparison fails are left out of the
    /// returned results.
    pub async fn run_for_channels(&self, channel_ids: Vec<String>) -> Vec<ComparisonResult> {
        let window = self.time_window();
        info!(
            channels = channel_ids.len(),
            from = ?window.from,
            to = ?window.to,
            "comparing channels"
        );

        let outcome = process_batches(channel_ids, self.settings.batch_size, |channel_id| {
            let fetcher = self.fetcher.clone();
            let engine = self.engine.clone();
            let emitter = self.emitter.clone();
            async move {
                let fetched = fetcher.fetch(&channel_id, &window).await;
                let result = engine.compare(fetched);
                emitter.emit_comparison_metrics(&result);
                Ok::<_, Infallible>(result)
            }
        })
        .await;

        if outcome.failed > 0 {
            metrics::counter!(COMPARISON_FAILURES).increment(outcome.failed as u64);
        }

        outcome.successful
    }

    /// Compare the given channels plus every channel of the given teams.
    pub async fn run_manual_comparison(
        &self,
        team_ids: Option<&[String]>,
        channel_ids: Option<&[String]>,
    ) -> Result<ManualRun, SchedulerError> {
        let mut targets: Vec<String> = channel_ids.unwrap_or_default().to_vec();
        for team_id in team_ids.unwrap_or_default() {
            targets.extend(self.channels.build_channel_ids(team_id));
        }

        if targets.is_empty() {
            return Err(SchedulerError::NoTargets);
        }

        let results = self.run_for_channels(targets.clone()).await;
        Ok(ManualRun {
            channel_ids: targets,
            results,
        })
    }

    /// One polling cycle over every discovered team. A failed discovery falls back to the last
    /// known teams.
    pub async fn run_scheduled(&self) -> Result<BatchSummary, SchedulerError> {
        let start = Instant::now();

        let teams = match self.discovery.refresh().await {
            Ok(_) => self.discovery.cached_teams(),
            Err(e) => {
                let cached = self.discovery.cached_teams();
                if cached.is_empty() {
                    error!("scheduled comparison run failed: {}", e);
                    metrics::counter!(SCHEDULED_FAILURES).increment(1);
                    return Err(e.into());
                }
                warn!(teams = cached.len(), "using previously discovered teams");
                cached
            }
        };

        if teams.is_empty() {
            warn!("no teams to compare");
            return Ok(BatchSummary::default());
        }

        let channel_ids: Vec<String> = teams
            .iter()
            .flat_map(|team| self.channels.build_channel_ids(&team.team_id))
            .collect();
        let channel_count = channel_ids.len();

        let results = self.run_for_channels(channel_ids).await;
        let summary = self.emitter.emit_batch_summary(&results);

        let duration_ms = start.elapsed().as_millis();
        metrics::gauge!(RUN_DURATION_MS).set(duration_ms as f64);
        info!(
            teams = teams.len(),
            channels = channel_count,
            comparisons = results.len(),
            duration_ms = %duration_ms,
            "scheduled comparison run completed"
        );

        Ok(summary)
    }

    /// Poll forever, one run per interval. A run that outlasts the interval delays the next one.
    pub async fn run(self, liveness: HealthHandle) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(
            self.settings.polling_interval_minutes.max(1) * 60,
        ));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            liveness.report_healthy();
            if self.run_scheduled().await.is_err() {
                warn!("retrying on the next interval");
            }
            liveness.report_healthy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthRegistry;
    use crate::test_utils::{test_scheduler, ListDirectory};
    use parity_engine::SkipReason;

    #[tokio::test]
    async fn test_manual_comparison_needs_targets() {
        let scheduler = test_scheduler(ListDirectory(Some(vec![])));
        let empty: Vec<String> = Vec::new();

        assert!(matches!(
            scheduler.run_manual_comparison(None, Some(empty.as_slice())).await,
            Err(SchedulerError::NoTargets)
        ));
    }

    #[tokio::test]
    async fn test_manual_comparison_combines_channels_and_teams() {
        let scheduler = test_scheduler(ListDirectory(Some(vec![])));
        let teams = vec!["1".to_owned()];
        let channels = vec!["team_2".to_owned()];

        let run = scheduler
            .run_manual_comparison(Some(teams.as_slice()), Some(channels.as_slice()))
            .await
            .unwrap();

        assert_eq!(run.channel_ids, vec!["team_2", "team_1"]);
        assert_eq!(run.results.len(), 2);
        assert_eq!(
            run.results[0].skip_reason(),
            Some(SkipReason::SecondaryFailed)
        );
        let metrics = run.results[1].metrics().unwrap();
        assert_eq!(metrics.coverage, 100.0);
        assert_eq!(metrics.ordering_violations, 0);
    }

    #[tokio::test]
    async fn test_scheduled_run_summarises_discovered_teams() {
        let scheduler = test_scheduler(ListDirectory(Some(vec!["1", "2"])));

        let summary = scheduler.run_scheduled().await.unwrap();

        assert_eq!(
            summary,
            BatchSummary {
                total: 2,
                successful: 1,
                skipped: 1,
                with_issues: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_scheduled_run_fails_without_any_teams() {
        let scheduler = test_scheduler(ListDirectory(None));

        assert!(matches!(
            scheduler.run_scheduled().await,
            Err(SchedulerError::Discovery(_))
        ));
    }

    #[tokio::test]
    async fn test_polling_runs_immediately_and_reports_liveness() {
        let scheduler = test_scheduler(ListDirectory(Some(vec!["1", "2"])));
        let liveness = HealthRegistry::new("liveness");
        let handle = liveness.register("scheduler", time::Duration::seconds(60));

        let poller = tokio::spawn(scheduler.clone().run(handle));
        let first_run = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while scheduler.discovery.cached_teams().len() < 2 || !liveness.get_status().healthy {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await;
        poller.abort();

        assert!(first_run.is_ok());
    }
}
