use std::future::Future;

use parity_engine::{AlertManager, ComparisonEngine, FuzzyMatcher, MetricsEmitter};
use time::Duration;
use tokio::net::TcpListener;
use tracing::info;

use crate::channels::ChannelIdBuilder;
use crate::config::Config;
use crate::fetch::{DualFetcher, HttpMessageSource, PRIMARY_SYSTEM, SECONDARY_SYSTEM};
use crate::handlers::{app, AppState};
use crate::health::HealthRegistry;
use crate::metrics::setup_metrics_recorder;
use crate::scheduler::{ComparisonScheduler, SchedulerSettings};
use crate::teams::{HttpTeamDirectory, TeamDiscoveryService};
use crate::thresholds::resolve_thresholds;

/// Wire the HTTP clients, the engine and alerting together from `config`.
pub async fn build_scheduler(config: &Config) -> ComparisonScheduler {
    let thresholds =
        resolve_thresholds(&config.thresholds, config.thresholds_file.as_deref()).await;
    let timeout = config.request_timeout.0;
    let channels = ChannelIdBuilder::new(config.channel_prefixes.0.clone());

    let fetcher = DualFetcher::new(
        HttpMessageSource::new(
            PRIMARY_SYSTEM,
            &config.primary_url,
            timeout,
            config.max_messages_per_fetch,
        )
        .with_max_pages(config.max_pages_per_fetch),
        HttpMessageSource::new(
            SECONDARY_SYSTEM,
            &config.secondary_url,
            timeout,
            config.max_messages_per_fetch,
        )
        .with_max_pages(config.max_pages_per_fetch),
        channels.clone(),
    );

    let discovery = TeamDiscoveryService::new(
        HttpTeamDirectory::new(&config.team_directory_url, timeout),
        config.team_ids_override.0.clone(),
        config.team_scan_limit,
    );

    ComparisonScheduler::new(
        fetcher,
        ComparisonEngine::new(FuzzyMatcher::new(config.fuzzy_time_tolerance_ms)),
        MetricsEmitter::new(AlertManager::new(thresholds)),
        channels,
        discovery,
        SchedulerSettings::from(config),
    )
}

/// Serve the HTTP surface until `shutdown` resolves, polling in the background when the
/// scheduler is enabled.
pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let scheduler = build_scheduler(&config).await;
    let liveness = HealthRegistry::new("liveness");

    let poller = if config.scheduler_enabled {
        // Two missed intervals before the process is reported stalled.
        let deadline = Duration::try_from(config.polling_interval() * 2).unwrap_or(Duration::DAY);
        let handle = liveness.register("scheduler", deadline);
        Some(tokio::spawn(scheduler.clone().run(handle)))
    } else {
        info!("scheduler disabled, serving on-demand comparisons only");
        liveness.register("scheduler", Duration::days(365)).report_healthy();
        None
    };

    let recorder = config.export_prometheus.then(setup_metrics_recorder);
    let router = app(
        AppState {
            scheduler,
            liveness,
        },
        recorder,
    );

    info!("listening on {:?}", listener.local_addr()?);
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await;

    if let Some(poller) = poller {
        poller.abort();
    }
    served
}
