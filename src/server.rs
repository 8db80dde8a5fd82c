//! HTTP surface: `GET /scrape-{platform}?appIds=..&limit=..` returning a CSV download.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::encode::{encode_csv, export_filename};
use crate::input::{resolve_limit, IdentifierSet};
use crate::process::{harvest, HarvestConfig};
use crate::provider::{Platform, ReviewProvider};
use crate::Error;

pub const NO_REVIEWS_MESSAGE: &str = "No reviews found for the given app IDs.";

#[derive(Clone)]
pub struct AppState {
    providers: HashMap<Platform, Arc<dyn ReviewProvider>>,
    config: Arc<HarvestConfig>,
}

impl AppState {
    pub fn new(config: HarvestConfig) -> Self {
        Self {
            providers: HashMap::new(),
            config: Arc::new(config),
        }
    }

    /// Registers `provider` under its own platform, replacing any previous one.
    pub fn with_provider(mut self, provider: Arc<dyn ReviewProvider>) -> Self {
        self.providers.insert(provider.platform(), provider);
        self
    }
}

/// Mounts `/scrape-{platform}` for every registered provider.
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new();
    for platform in state.providers.keys().copied() {
        router = router.route(
            &format!("/scrape-{platform}"),
            get(move |state: State<AppState>, query: Query<ScrapeQuery>| {
                scrape(state, query, platform)
            }),
        );
    }
    router.with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ScrapeQuery {
    #[serde(rename = "appIds")]
    pub app_ids: Option<String>,
    pub limit: Option<String>,
}

/// API error type
#[derive(Debug)]
pub enum ApiError {
    /// Invalid request (400)
    BadRequest(String),
    /// Internal server error (500)
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NoValidAppIds => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => {
                error!(%msg, "scrape request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn scrape(
    State(state): State<AppState>,
    Query(query): Query<ScrapeQuery>,
    platform: Platform,
) -> Result<Response, ApiError> {
    let ids = IdentifierSet::parse(query.app_ids.as_deref());
    if ids.is_empty() {
        return Err(Error::NoValidAppIds.into());
    }
    let Some(provider) = state.providers.get(&platform).cloned() else {
        return Err(ApiError::Internal(format!("no provider for {platform}")));
    };

    let config = HarvestConfig {
        limit_per_country: resolve_limit(query.limit.as_deref()),
        ..(*state.config).clone()
    };

    // Dropping the request future (client went away) stops the harvest.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let report = harvest(&ids, &config, provider, cancel).await?;

    if report.is_empty() {
        return Ok((StatusCode::OK, NO_REVIEWS_MESSAGE).into_response());
    }

    let filename = export_filename(platform, Utc::now());
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        encode_csv(&report.bundles),
    )
        .into_response())
}
