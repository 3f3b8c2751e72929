use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{error, info};

use crate::error::DiscoveryError;

const DISCOVERED_TEAMS: &str = "chat_parity_discovered_teams";
const DISCOVERY_FAILURES: &str = "chat_parity_team_discovery_failures_total";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub team_id: String,
    pub channel_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamRecord {
    team_id: String,
    channel_id: Option<String>,
}

impl From<TeamRecord> for Team {
    fn from(record: TeamRecord) -> Self {
        let channel_id = record
            .channel_id
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| record.team_id.clone());
        Team {
            team_id: record.team_id,
            channel_id,
        }
    }
}

/// Where the set of monitored teams comes from.
#[async_trait]
pub trait TeamDirectory {
    async fn scan_teams(&self, limit: usize) -> Result<Vec<Team>, DiscoveryError>;

    async fn teams_by_ids(&self, ids: &[String]) -> Result<Vec<Team>, DiscoveryError>;
}

/// Team directory served at `GET {base}/v1/teams`.
pub struct HttpTeamDirectory {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTeamDirectory {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("chat-parity-monitor")
            .timeout(timeout)
            .build()
            .expect("failed to construct reqwest client for team directory");

        HttpTeamDirectory {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client,
        }
    }

    async fn get_teams(&self, query: &[(&str, String)]) -> Result<Vec<Team>, DiscoveryError> {
        let response = self
            .client
            .get(format!("{}/v1/teams", self.base_url))
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DiscoveryError::BadStatus(response.status()));
        }

        let body: Value = response.json().await?;
        let records = match body {
            Value::Object(mut map) => map.remove("teams").unwrap_or(Value::Null),
            other => other,
        };

        let records: Vec<TeamRecord> = serde_json::from_value(records)
            .map_err(|e| DiscoveryError::MalformedBody(e.to_string()))?;

        Ok(records.into_iter().map(Team::from).collect())
    }
}

#[async_trait]
impl TeamDirectory for HttpTeamDirectory {
    async fn scan_teams(&self, limit: usize) -> Result<Vec<Team>, DiscoveryError> {
        self.get_teams(&[("limit", limit.to_string())]).await
    }

    async fn teams_by_ids(&self, ids: &[String]) -> Result<Vec<Team>, DiscoveryError> {
        self.get_teams(&[("ids", ids.join(","))]).await
    }
}

#[derive(Debug, Clone, Default)]
struct Snapshot {
    teams: Vec<Team>,
    last_update: Option<OffsetDateTime>,
}

/// The last successfully discovered set of teams.
#[derive(Clone, Default)]
pub struct TeamCache {
    inner: Arc<RwLock<Snapshot>>,
}

impl TeamCache {
    pub fn set_teams(&self, teams: Vec<Team>) {
        if let Ok(mut snapshot) = self.inner.write() {
            *snapshot = Snapshot {
                teams,
                last_update: Some(OffsetDateTime::now_utc()),
            };
        }
    }

    pub fn teams(&self) -> Vec<Team> {
        self.inner
            .read()
            .map(|snapshot| snapshot.teams.clone())
            .unwrap_or_default()
    }

    pub fn size(&self) -> usize {
        self.inner.read().map(|s| s.teams.len()).unwrap_or(0)
    }

    pub fn last_update(&self) -> Option<OffsetDateTime> {
        self.inner.read().ok().and_then(|s| s.last_update)
    }
}

/// Keeps the team cache fresh. Configured team ids win over a full directory scan.
pub struct TeamDiscoveryService {
    directory: Arc<dyn TeamDirectory + Send + Sync>,
    cache: TeamCache,
    override_ids: Vec<String>,
    scan_limit: usize,
}

impl TeamDiscoveryService {
    pub fn new<D>(directory: D, override_ids: Vec<String>, scan_limit: usize) -> Self
    where
        D: TeamDirectory + Send + Sync + 'static,
    {
        TeamDiscoveryService {
            directory: Arc::new(directory),
            cache: TeamCache::default(),
            override_ids,
            scan_limit,
        }
    }

    pub fn cache(&self) -> &TeamCache {
        &self.cache
    }

    pub fn cached_teams(&self) -> Vec<Team> {
        self.cache.teams()
    }

    /// A failed refresh keeps the previous snapshot.
    pub async fn refresh(&self) -> Result<usize, DiscoveryError> {
        info!("refreshing teams");

        let discovered = if self.override_ids.is_empty() {
            self.directory.scan_teams(self.scan_limit).await
        } else {
            info!(count = self.override_ids.len(), "using team id override");
            self.directory.teams_by_ids(&self.override_ids).await
        };

        match discovered {
            Ok(teams) => {
                let count = teams.len();
                self.cache.set_teams(teams);
                metrics::gauge!(DISCOVERED_TEAMS).set(count as f64);
                info!(count, "teams refreshed");
                Ok(count)
            }
            Err(e) => {
                error!("failed to refresh teams: {}", e);
                metrics::counter!(DISCOVERY_FAILURES).increment(1);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeDirectory {
        fail: Arc<AtomicBool>,
    }

    #[async_trait]
    impl TeamDirectory for FakeDirectory {
        async fn scan_teams(&self, limit: usize) -> Result<Vec<Team>, DiscoveryError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DiscoveryError::MalformedBody("down".to_owned()));
            }
            Ok((0..limit.min(3))
                .map(|i| Team {
                    team_id: format!("scan{}", i),
                    channel_id: format!("scan{}", i),
                })
                .collect())
        }

        async fn teams_by_ids(&self, ids: &[String]) -> Result<Vec<Team>, DiscoveryError> {
            Ok(ids
                .iter()
                .map(|id| Team {
                    team_id: id.clone(),
                    channel_id: id.clone(),
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_override_ids_win_over_scan() {
        let service = TeamDiscoveryService::new(
            FakeDirectory {
                fail: Arc::new(AtomicBool::new(false)),
            },
            vec!["a".to_owned(), "b".to_owned()],
            100,
        );

        assert_eq!(service.refresh().await.unwrap(), 2);
        assert_eq!(service.cached_teams()[0].team_id, "a");
        assert!(service.cache().last_update().is_some());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let fail = Arc::new(AtomicBool::new(false));
        let service = TeamDiscoveryService::new(
            FakeDirectory { fail: fail.clone() },
            Vec::new(),
            100,
        );

        assert_eq!(service.refresh().await.unwrap(), 3);

        fail.store(true, Ordering::SeqCst);
        assert!(service.refresh().await.is_err());
        assert_eq!(service.cache().size(), 3);
    }

    #[tokio::test]
    async fn test_http_directory() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/teams").query_param("limit", "10");
                then.status(200).json_body(json!({
                    "teams": [
                        {"teamId": "1", "channelId": "team_1"},
                        {"teamId": "2"},
                    ]
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/teams").query_param("ids", "7,8");
                then.status(200)
                    .json_body(json!([{"teamId": "7"}, {"teamId": "8", "channelId": ""}]));
            })
            .await;

        let directory = HttpTeamDirectory::new(&server.base_url(), Duration::from_secs(5));

        let scanned = directory.scan_teams(10).await.unwrap();
        assert_eq!(
            scanned,
            vec![
                Team {
                    team_id: "1".to_owned(),
                    channel_id: "team_1".to_owned()
                },
                Team {
                    team_id: "2".to_owned(),
                    channel_id: "2".to_owned()
                },
            ]
        );

        let by_id = directory
            .teams_by_ids(&["7".to_owned(), "8".to_owned()])
            .await
            .unwrap();
        assert_eq!(by_id[1].channel_id, "8");
    }
}
