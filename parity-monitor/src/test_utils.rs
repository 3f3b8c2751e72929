//! Fakes shared by the unit tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parity_engine::{ComparisonEngine, FuzzyMatcher, MetricsEmitter};
use serde_json::{json, Value};

use crate::channels::ChannelIdBuilder;
use crate::config::Config;
use crate::error::{DiscoveryError, FetchError};
use crate::fetch::{DualFetcher, MessageSource, PRIMARY_SYSTEM, SECONDARY_SYSTEM};
use crate::scheduler::{ComparisonScheduler, SchedulerSettings};
use crate::teams::{Team, TeamDirectory, TeamDiscoveryService};
use crate::time_window::TimeWindow;

pub struct MapSource {
    pub system: &'static str,
    pub channels: HashMap<String, Vec<Value>>,
}

#[async_trait]
impl MessageSource for MapSource {
    fn system(&self) -> &'static str {
        self.system
    }

    async fn fetch_all_messages(
        &self,
        channel: &str,
        _window: &TimeWindow,
    ) -> Result<Vec<Value>, FetchError> {
        self.channels
            .get(channel)
            .cloned()
            .ok_or_else(|| FetchError::MalformedBody {
                system: self.system,
                reason: "unknown channel".to_owned(),
            })
    }
}

pub struct ListDirectory(pub Option<Vec<&'static str>>);

#[async_trait]
impl TeamDirectory for ListDirectory {
    async fn scan_teams(&self, _limit: usize) -> Result<Vec<Team>, DiscoveryError> {
        self.0
            .as_ref()
            .map(|ids| {
                ids.iter()
                    .map(|id| Team {
                        team_id: id.to_string(),
                        channel_id: id.to_string(),
                    })
                    .collect()
            })
            .ok_or_else(|| DiscoveryError::MalformedBody("unavailable".to_owned()))
    }

    async fn teams_by_ids(&self, _ids: &[String]) -> Result<Vec<Team>, DiscoveryError> {
        self.scan_teams(0).await
    }
}

pub fn history() -> (Vec<Value>, Vec<Value>) {
    let primary = (1..=3)
        .map(|i| json!({"timetoken": format!("1700000000{}000000", i), "message": {"n": i}}))
        .collect();
    let secondary = (1..=3)
        .map(|i| {
            json!({
                "message": {
                    "id": format!("1700000000{}000000", i),
                    "offset": i,
                    "createdAt": 1_700_000_000_000_i64 + i * 100,
                    "content": {"n": i},
                }
            })
        })
        .collect();
    (primary, secondary)
}

pub fn test_scheduler(directory: ListDirectory) -> ComparisonScheduler {
    let (primary, secondary) = history();
    let fetcher = DualFetcher::new(
        MapSource {
            system: PRIMARY_SYSTEM,
            channels: HashMap::from([
                ("team_1".to_owned(), primary.clone()),
                ("team_2".to_owned(), primary),
            ]),
        },
        MapSource {
            system: SECONDARY_SYSTEM,
            channels: HashMap::from([("team_1".to_owned(), secondary)]),
        },
        ChannelIdBuilder::default(),
    );

    ComparisonScheduler::new(
        fetcher,
        ComparisonEngine::new(FuzzyMatcher::default()),
        MetricsEmitter::default(),
        ChannelIdBuilder::default(),
        TeamDiscoveryService::new(directory, Vec::new(), 100),
        SchedulerSettings::from(&Config::default_test_config()),
    )
}

