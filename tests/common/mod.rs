#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use revscrap::provider::{Platform, ReviewProvider, SortOrder};
use revscrap::review::RawReviewRecord;
use revscrap::{Error, Result};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub enum Page {
    Records(usize),
    Fail,
}

/// In-memory provider serving scripted pages per (app, country).
/// Anything without a script is an empty page.
#[derive(Default)]
pub struct ScriptedProvider {
    pages: HashMap<(String, String), Vec<Page>>,
    /// Every (app, country) whose country code is in here fails on every page.
    failing_countries: Vec<String>,
    /// Per-call delay, varied by country so completion order scrambles.
    jitter: bool,
    /// Defaults to `Platform::Ios`.
    platform: Option<Platform>,
    /// Cancelled as soon as the n-th call comes in.
    cancel_on_call: Option<(usize, CancellationToken)>,
    pub calls: Mutex<Vec<(String, String, u32)>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(mut self, app_id: &str, country: &str, pages: &[Page]) -> Self {
        self.pages.insert(
            (app_id.to_string(), country.to_ascii_lowercase()),
            pages.to_vec(),
        );
        self
    }

    pub fn failing_in(mut self, country: &str) -> Self {
        self.failing_countries.push(country.to_ascii_lowercase());
        self
    }

    pub fn on(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    pub fn cancelling_on_call(mut self, n: usize, cancel: CancellationToken) -> Self {
        self.cancel_on_call = Some((n, cancel));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ReviewProvider for ScriptedProvider {
    fn platform(&self) -> Platform {
        self.platform.unwrap_or(Platform::Ios)
    }

    async fn fetch_reviews_page(
        &self,
        app_id: &str,
        country: &str,
        page: u32,
        _sort: SortOrder,
    ) -> Result<Vec<RawReviewRecord>> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((app_id.to_string(), country.to_string(), page));
            calls.len()
        };
        if let Some((n, cancel)) = &self.cancel_on_call {
            if call == *n {
                cancel.cancel();
            }
        }

        if self.jitter {
            let spread = country.bytes().map(u64::from).sum::<u64>() % 7;
            tokio::time::sleep(Duration::from_millis(spread)).await;
        }

        if self.failing_countries.iter().any(|c| c == country) {
            return Err(Error::UnexpectedShape(format!("{country} is down")));
        }

        let script = self.pages.get(&(app_id.to_string(), country.to_string()));
        match script.and_then(|pages| pages.get(page as usize - 1)) {
            Some(Page::Records(n)) => Ok(records(app_id, country, page, *n)),
            Some(Page::Fail) => Err(Error::UnexpectedShape("scripted failure".into())),
            None => Ok(Vec::new()),
        }
    }
}

/// Records named `{app}/{COUNTRY}/p{page}/{i}`.
pub fn records(app_id: &str, country: &str, page: u32, n: usize) -> Vec<RawReviewRecord> {
    (0..n)
        .map(|i| RawReviewRecord {
            user_name: Some(format!(
                "{app_id}/{}/p{page}/{i}",
                country.to_ascii_uppercase()
            )),
            updated: Some("2024-06-01T08:00:00-07:00".into()),
            score: Some(5),
            text: Some("great app".into()),
            version: Some("2.0".into()),
            ..Default::default()
        })
        .collect()
}
