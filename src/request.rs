use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::parse::{parse_feed, parse_lookup};
use crate::provider::{Platform, ReviewProvider, SortOrder};
use crate::review::RawReviewRecord;
use crate::{Error, Result, MAX_FEED_PAGE};

pub const DEFAULT_FEED_BASE_URL: &str = "https://itunes.apple.com";

#[derive(Debug, Clone)]
pub struct ItunesConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ItunesConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_FEED_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// App Store reviews read from the public customer review RSS feed.
pub struct ItunesProvider {
    // Client uses Arc internally so it is cheap to share.
    client: Client,
    base_url: String,
    /// (bundle id, country) -> numeric track id
    track_ids: Mutex<HashMap<(String, String), String>>,
}

impl ItunesProvider {
    pub fn new(config: ItunesConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            track_ids: Mutex::new(HashMap::new()),
        })
    }

    /// The feed only takes numeric ids, bundle ids are looked up first.
    async fn resolve_track_id(&self, app_id: &str, country: &str) -> Result<String> {
        if app_id.chars().all(|c| c.is_ascii_digit()) {
            return Ok(app_id.to_string());
        }

        let key = (app_id.to_string(), country.to_string());
        if let Some(id) = self.track_ids.lock().await.get(&key) {
            return Ok(id.clone());
        }

        debug!(app_id, country, "looking up track id");
        let doc = self
            .get_json(
                self.client
                    .get(format!("{}/lookup", self.base_url))
                    .query(&[("bundleId", app_id), ("country", country)]),
            )
            .await?;

        let id = parse_lookup(&doc)?.ok_or_else(|| Error::AppNotFound {
            app_id: app_id.to_string(),
            country: country.to_string(),
        })?;
        self.track_ids.lock().await.insert(key, id.clone());
        Ok(id)
    }

    async fn get_json(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let res = request.send().await?.error_for_status()?;
        Ok(res.json().await?)
    }
}

#[async_trait]
impl ReviewProvider for ItunesProvider {
    fn platform(&self) -> Platform {
        Platform::Ios
    }

    async fn fetch_reviews_page(
        &self,
        app_id: &str,
        country: &str,
        page: u32,
        sort: SortOrder,
    ) -> Result<Vec<RawReviewRecord>> {
        if page == 0 {
            return Err(Error::PageOutOfRange(page));
        }
        // The feed ends after its last page, whether or not the app has more reviews.
        if page > MAX_FEED_PAGE {
            debug!(app_id, country, page, "past the last feed page");
            return Ok(Vec::new());
        }

        let id = self.resolve_track_id(app_id, country).await?;
        let url = feed_url(&self.base_url, country, &id, page, sort);
        debug!(%url, "requesting review page");

        let doc = self.get_json(self.client.get(url)).await?;
        parse_feed(&doc)
    }
}

fn feed_url(base_url: &str, country: &str, id: &str, page: u32, sort: SortOrder) -> String {
    let sort = match sort {
        SortOrder::Recent => "mostrecent",
    };
    format!("{base_url}/{country}/rss/customerreviews/page={page}/id={id}/sortby={sort}/json")
}
