use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;

use crate::parse::{parse_play_batch, PlayPage};
use crate::provider::{Platform, ReviewProvider, SortOrder};
use crate::review::RawReviewRecord;
use crate::{Error, Result, PAGE_SIZE};

pub const DEFAULT_PLAY_BASE_URL: &str = "https://play.google.com";

const REVIEWS_RPC: &str = "UsvDTd";

#[derive(Debug, Clone)]
pub struct PlayConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
    /// Interface language, reviews are not filtered by it.
    pub lang: String,
}

impl Default for PlayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PLAY_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            lang: "en".to_string(),
        }
    }
}

/// Where the next page of a (package, country) review stream starts.
#[derive(Debug, Clone, PartialEq)]
enum Cursor {
    Start,
    Token(String),
    End,
}

/// Google Play reviews read through the store's `batchexecute` endpoint.
///
/// Play pages by continuation token rather than by number, so the token that
/// leads to each page is remembered per (package, country, page).
pub struct PlayProvider {
    client: Client,
    base_url: String,
    lang: String,
    cursors: Mutex<HashMap<(String, String, u32), Cursor>>,
}

impl PlayProvider {
    pub fn new(config: PlayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            lang: config.lang,
            cursors: Mutex::new(HashMap::new()),
        })
    }

    /// The closest page at or before `page` whose cursor is known. Page 1 always is.
    async fn nearest_cursor(&self, app_id: &str, country: &str, page: u32) -> (u32, Cursor) {
        let cursors = self.cursors.lock().await;
        (2..=page)
            .rev()
            .find_map(|p| {
                cursors
                    .get(&(app_id.to_string(), country.to_string(), p))
                    .map(|cursor| (p, cursor.clone()))
            })
            .unwrap_or((1, Cursor::Start))
    }

    async fn request_batch(
        &self,
        app_id: &str,
        country: &str,
        token: Option<&str>,
        sort: SortOrder,
    ) -> Result<PlayPage> {
        let sort = match sort {
            SortOrder::Recent => 2,
        };
        let request = json!([null, null, [2, sort, [PAGE_SIZE, null, token], null, []], [app_id, 7]]);
        let f_req = json!([[[REVIEWS_RPC, request.to_string(), null, "generic"]]]);

        let body = self
            .client
            .post(format!("{}/_/PlayStoreUi/data/batchexecute", self.base_url))
            .query(&[
                ("rpcids", REVIEWS_RPC),
                ("hl", self.lang.as_str()),
                ("gl", country),
                ("authuser", ""),
                ("soc-app", "121"),
                ("soc-platform", "1"),
                ("soc-device", "1"),
            ])
            .form(&[("f.req", f_req.to_string())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_play_batch(&body)
    }
}

#[async_trait]
impl ReviewProvider for PlayProvider {
    fn platform(&self) -> Platform {
        Platform::Android
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

        // Pages whose token is unknown are walked to from the nearest known one.
        let (mut at, mut cursor) = self.nearest_cursor(app_id, country, page).await;
        loop {
            let token = match cursor {
                Cursor::Start => None,
                Cursor::Token(token) => Some(token),
                Cursor::End => return Ok(Vec::new()),
            };
            debug!(app_id, country, page = at, "requesting review batch");
            let batch = self.request_batch(app_id, country, token.as_deref(), sort).await?;

            let next = batch.next_token.map_or(Cursor::End, Cursor::Token);
            self.cursors
                .lock()
                .await
                .insert((app_id.to_string(), country.to_string(), at + 1), next.clone());

            if at == page {
                return Ok(batch.records);
            }
            at += 1;
            cursor = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex as StdMutex};

    use axum::{
        extract::{Query, State},
        routing::post,
        Form, Router,
    };
    use serde_json::Value;

    use super::*;

    type Seen = Arc<StdMutex<Vec<(String, Option<String>)>>>;

    /// Two pages for `com.example.app`: 50 reviews then 3, chained by token `t2`.
    async fn fake_play(
        State(seen): State<Seen>,
        Query(query): Query<HashMap<String, String>>,
        Form(form): Form<HashMap<String, String>>,
    ) -> String {
        let f_req: Value = serde_json::from_str(&form["f.req"]).unwrap();
        let request: Value = serde_json::from_str(f_req[0][0][1].as_str().unwrap()).unwrap();
        assert_eq!(request[3][0], "com.example.app");
        assert_eq!(request[2][2][0], PAGE_SIZE);

        let token = request[2][2][2].as_str().map(String::from);
        seen.lock().unwrap().push((query["gl"].clone(), token.clone()));

        let (count, next) = match token.as_deref() {
            None => (50, Some("t2")),
            Some("t2") => (3, None),
            Some(other) => panic!("unexpected token {other}"),
        };
        let entries: Vec<Value> = (0..count)
            .map(|i| json!(["gp:id", [format!("user {i}")], 5, null, "ok", [1_700_000_000, 0]]))
            .collect();
        let payload = json!([entries, [null, next]]).to_string();
        format!(")]}}'\n\n{}", json!([["wrb.fr", REVIEWS_RPC, payload, null, null, null, "generic"]]))
    }

    async fn serve_fake_play() -> (String, Seen) {
        let seen = Seen::default();
        let app = Router::new()
            .route("/_/PlayStoreUi/data/batchexecute", post(fake_play))
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}"), seen)
    }

    fn provider(base_url: String) -> PlayProvider {
        PlayProvider::new(PlayConfig {
            base_url,
            ..Default::default()
        })
        .unwrap()
    }

    fn tokens(seen: &Seen) -> Vec<Option<String>> {
        seen.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }

    #[tokio::test]
    async fn follows_continuation_tokens() {
        let (base_url, seen) = serve_fake_play().await;
        let play = provider(base_url);

        let first = play
            .fetch_reviews_page("com.example.app", "vn", 1, SortOrder::Recent)
            .await
            .unwrap();
        let second = play
            .fetch_reviews_page("com.example.app", "vn", 2, SortOrder::Recent)
            .await
            .unwrap();
        let third = play
            .fetch_reviews_page("com.example.app", "vn", 3, SortOrder::Recent)
            .await
            .unwrap();

        assert_eq!(first.len(), 50);
        assert_eq!(second.len(), 3);
        assert!(third.is_empty());
        assert_eq!(first[0].date.as_deref(), Some("2023-11-14T22:13:20.000Z"));
        // The third page is known to be past the end, so it is never requested.
        assert_eq!(tokens(&seen), [None, Some("t2".to_string())]);
        assert_eq!(seen.lock().unwrap()[0].0, "vn");
    }

    #[tokio::test]
    async fn later_page_walks_from_the_first() {
        let (base_url, seen) = serve_fake_play().await;
        let play = provider(base_url);

        let second = play
            .fetch_reviews_page("com.example.app", "us", 2, SortOrder::Recent)
            .await
            .unwrap();

        assert_eq!(second.len(), 3);
        assert_eq!(second[0].user_name.as_deref(), Some("user 0"));
        assert_eq!(tokens(&seen), [None, Some("t2".to_string())]);
    }

    #[tokio::test]
    async fn page_zero_is_rejected() {
        let play = provider("http://127.0.0.1:9".into());

        let res = play
            .fetch_reviews_page("com.example.app", "us", 0, SortOrder::Recent)
            .await;
        assert!(matches!(res, Err(Error::PageOutOfRange(0))));
    }

    #[tokio::test]
    async fn unreachable_store_is_a_provider_error() {
        let play = provider("http://127.0.0.1:9".into());

        let res = play
            .fetch_reviews_page("com.example.app", "us", 1, SortOrder::Recent)
            .await;
        assert!(matches!(res, Err(Error::Reqwest(_))));
    }
}
