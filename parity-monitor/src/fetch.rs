use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parity_engine::FetchResult;
use reqwest::header;
use serde_json::Value;
use tracing::{error, warn};

use crate::channels::ChannelIdBuilder;
use crate::error::FetchError;
use crate::time_window::TimeWindow;

pub const PRIMARY_SYSTEM: &str = "realtime";
pub const SECONDARY_SYSTEM: &str = "chat";

const API_FAILURES: &str = "chat_parity_api_failures_total";
const FETCH_DURATION_MS: &str = "chat_parity_fetch_duration_ms";
const MESSAGE_FETCHES: &str = "chat_parity_message_fetches_total";

pub const DEFAULT_MAX_PAGES: usize = 1000;

/// One system's message history API.
#[async_trait]
pub trait MessageSource {
    /// Label used in logs and metrics.
    fn system(&self) -> &'static str;

    /// Every message the system holds for `channel` within `window`.
    async fn fetch_all_messages(
        &self,
        channel: &str,
        window: &TimeWindow,
    ) -> Result<Vec<Value>, FetchError>;
}

/// Reads history from `GET {base}/v1/channels/{channel}/messages`.
///
/// Pages are requested with `limit` and followed through the `next` cursor until a page
/// arrives without one, or repeats the cursor it was asked for. Following more than
/// `max_pages` pages fails the fetch.
pub struct HttpMessageSource {
    system: &'static str,
    base_url: String,
    page_size: usize,
    max_pages: usize,
    client: reqwest::Client,
}

impl HttpMessageSource {
    pub fn new(system: &'static str, base_url: &str, timeout: Duration, page_size: usize) -> Self {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent("chat-parity-monitor")
            .timeout(timeout)
            .build()
            .expect("failed to construct reqwest client for message source");

        HttpMessageSource {
            system,
            base_url: base_url.trim_end_matches('/').to_owned(),
            page_size: page_size.max(1),
            max_pages: DEFAULT_MAX_PAGES,
            client,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// The channel id is a single path segment, so `/`, `?` and `#` in it are escaped.
    fn messages_url(&self, channel: &str) -> Result<reqwest::Url, FetchError> {
        let invalid = |reason: String| FetchError::InvalidUrl {
            system: self.system,
            reason,
        };

        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid(format!("{} cannot have a path", self.base_url)))?
            .pop_if_empty()
            .extend(["v1", "channels", channel, "messages"]);
        Ok(url)
    }

    async fn fetch_page(
        &self,
        channel: &str,
        window: &TimeWindow,
        cursor: Option<&str>,
    ) -> Result<Page, FetchError> {
        let mut query = window.query_pairs();
        query.push(("limit", self.page_size.to_string()));
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_owned()));
        }

        let response = self
            .client
            .get(self.messages_url(channel)?)
            .query(&query)
            .send()
            .await
            .map_err(|source| FetchError::RequestError {
                system: self.system,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus {
                system: self.system,
                status,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchError::MalformedBody {
                system: self.system,
                reason: e.to_string(),
            })?;

        Page::from_body(body).ok_or_else(|| FetchError::MalformedBody {
            system: self.system,
            reason: "expected an array or an object with a messages array".to_owned(),
        })
    }
}

struct Page {
    messages: Vec<Value>,
    next: Option<String>,
}

impl Page {
    fn from_body(body: Value) -> Option<Page> {
        match body {
            Value::Array(messages) => Some(Page {
                messages,
                next: None,
            }),
            Value::Object(mut map) => {
                let messages = match map.remove("messages")? {
                    Value::Array(messages) => messages,
                    _ => return None,
                };
                let next = map
                    .remove("next")
                    .and_then(|next| next.as_str().map(str::to_owned))
                    .filter(|next| !next.is_empty());
                Some(Page { messages, next })
            }
            _ => None,
        }
    }
}

#[async_trait]
impl MessageSource for HttpMessageSource {
    fn system(&self) -> &'static str {
        self.system
    }

    async fn fetch_all_messages(
        &self,
        channel: &str,
        window: &TimeWindow,
    ) -> Result<Vec<Value>, FetchError> {
        let mut messages = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..self.max_pages {
            let page = self.fetch_page(channel, window, cursor.as_deref()).await?;
            let empty = page.messages.is_empty();
            messages.extend(page.messages);

            match page.next {
                Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                    warn!(
                        system = self.system,
                        channel,
                        cursor = %next,
                        "cursor points back at its own page, stopping"
                    );
                    return Ok(messages);
                }
                Some(next) if !empty => cursor = Some(next),
                _ => return Ok(messages),
            }
        }

        Err(FetchError::TooManyPages {
            system: self.system,
            pages: self.max_pages,
        })
    }
}

/// Queries both systems for the same channel and window at once.
#[derive(Clone)]
pub struct DualFetcher {
    primary: Arc<dyn MessageSource + Send + Sync>,
    secondary: Arc<dyn MessageSource + Send + Sync>,
    channels: ChannelIdBuilder,
}

impl DualFetcher {
    pub fn new<P, S>(primary: P, secondary: S, channels: ChannelIdBuilder) -> Self
    where
        P: MessageSource + Send + Sync + 'static,
        S: MessageSource + Send + Sync + 'static,
    {
        DualFetcher {
            primary: Arc::new(primary),
            secondary: Arc::new(secondary),
            channels,
        }
    }

    /// A failing side is reported as unsuccessful with no messages, it never fails the call.
    pub async fn fetch(&self, channel_id: &str, window: &TimeWindow) -> FetchResult {
        let start = Instant::now();
        let team_id = self.channels.extract_team_id(channel_id).to_owned();

        let (primary, secondary) = tokio::join!(
            self.primary.fetch_all_messages(channel_id, window),
            self.secondary.fetch_all_messages(channel_id, window),
        );

        let (primary_messages, primary_success) = settle(self.primary.system(), channel_id, primary);
        let (secondary_messages, secondary_success) =
            settle(self.secondary.system(), channel_id, secondary);

        metrics::gauge!(FETCH_DURATION_MS, "channel" => channel_id.to_owned())
            .set(start.elapsed().as_millis() as f64);

        let labels = [
            ("team", team_id.clone()),
            ("realtime_success", primary_success.to_string()),
            ("chat_success", secondary_success.to_string()),
        ];
        metrics::counter!(MESSAGE_FETCHES, &labels).increment(1);

        FetchResult {
            team_id,
            channel_id: channel_id.to_owned(),
            primary_messages,
            secondary_messages,
            primary_success,
            secondary_success,
        }
    }
}

fn settle(
    system: &'static str,
    channel_id: &str,
    result: Result<Vec<Value>, FetchError>,
) -> (Vec<Value>, bool) {
    match result {
        Ok(messages) => (messages, true),
        Err(e) => {
            error!(system, channel_id, "fetch failed: {}", e);
            metrics::counter!(API_FAILURES, "system" => system).increment(1);
            (Vec::new(), false)
        }
    }
}
