use std::sync::Arc;

use chrono::Local;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::collect::collect_country;
use crate::country::CountryCode;
use crate::fetch::{RetryPolicy, ReviewPageFetcher};
use crate::input::IdentifierSet;
use crate::provider::ReviewProvider;
use crate::review::{AppReviewBundle, CountryHarvest, TaggedReview};
use crate::{info_time, Error, Result, DEFAULT_LIMIT_PER_COUNTRY};

/// Position of an (app, country) unit in the output: (app index, country index).
pub type UnitKey = (usize, usize);

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Storefronts to query, in output order.
    pub countries: Vec<CountryCode>,
    pub limit_per_country: usize,
    /// Number of (app, country) units in flight at once. 1 runs everything sequentially.
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            countries: CountryCode::catalog(),
            limit_per_country: DEFAULT_LIMIT_PER_COUNTRY,
            concurrency: 4,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HarvestReport {
    /// One bundle per app that produced at least one review, in input order.
    pub bundles: Vec<AppReviewBundle>,
    /// (app, country) units whose collection ended on a failed page.
    pub failed_units: usize,
    /// Pages successfully fetched across all units.
    pub pages_fetched: u32,
    /// Set when the run was cut short, `bundles` then holds what was collected so far.
    pub cancelled: bool,
}

impl HarvestReport {
    pub fn total_reviews(&self) -> usize {
        self.bundles.iter().map(|b| b.reviews.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

/// Collects reviews for every app in `ids` from every country in `config`.
///
/// Units run concurrently but the result is ordered by app input order, then
/// country order, then page order. Provider failures stay inside their unit.
/// Once `cancel` fires no new unit or page is started.
pub async fn harvest(
    ids: &IdentifierSet,
    config: &HarvestConfig,
    provider: Arc<dyn ReviewProvider>,
    cancel: CancellationToken,
) -> Result<HarvestReport> {
    if ids.is_empty() {
        return Err(Error::NoValidAppIds);
    }

    let start_time = Local::now();
    info_time!(
        "Started harvesting {} app(s) from {} countries, {} reviews per country",
        ids.len(),
        config.countries.len(),
        config.limit_per_country
    );

    let fetcher = ReviewPageFetcher::new(provider, config.retry);
    let (harvest_tx, harvest_rx) = mpsc::channel(256);
    let collect_handle = tokio::spawn(async move { collect_harvests(harvest_rx).await });

    process_units(ids, config, fetcher, &cancel, harvest_tx).await?;
    let harvests = collect_handle.await?;

    let failed_units = harvests.iter().filter(|(_, h)| h.is_failed()).count();
    let pages_fetched = harvests.iter().map(|(_, h)| h.pages_fetched).sum();
    let bundles = bundle_by_app(ids, harvests);
    for bundle in &bundles {
        info!(app_id = %bundle.app_id, count = bundle.reviews.len(), "total reviews for app");
    }

    let report = HarvestReport {
        bundles,
        failed_units,
        pages_fetched,
        cancelled: cancel.is_cancelled(),
    };
    if report.cancelled {
        warn!("harvest cancelled, result is partial");
    }
    info_time!(
        start_time,
        "Finished harvesting: {} app(s) with reviews, {} reviews from {} pages, {} failed unit(s)",
        report.bundles.len(),
        report.total_reviews(),
        report.pages_fetched,
        report.failed_units
    );

    Ok(report)
}

/// Spawns one task per (app, country) unit, at most `config.concurrency` at a time.
/// Every finished unit is sent through `harvest_tx` together with its [`UnitKey`].
async fn process_units(
    ids: &IdentifierSet,
    config: &HarvestConfig,
    fetcher: ReviewPageFetcher,
    cancel: &CancellationToken,
    harvest_tx: mpsc::Sender<(UnitKey, CountryHarvest)>,
) -> Result<()> {
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut units = JoinSet::new();

    'apps: for (app_idx, app_id) in ids.iter().enumerate() {
        for (country_idx, country) in config.countries.iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break 'apps,
                permit = semaphore.clone().acquire_owned() => permit,
            };
            // The semaphore is never closed.
            let Ok(permit) = permit else { break 'apps };

            units.spawn({
                let fetcher = fetcher.clone();
                let app_id = app_id.to_string();
                let country = country.clone();
                let cancel = cancel.clone();
                let harvest_tx = harvest_tx.clone();
                let limit = config.limit_per_country;

                async move {
                    let harvest = collect_country(&fetcher, &app_id, &country, limit, &cancel).await;
                    drop(permit);
                    harvest_tx.send(((app_idx, country_idx), harvest)).await?;
                    Ok::<_, Error>(())
                }
            });
        }
    }
    drop(harvest_tx);

    while let Some(task) = units.join_next().await {
        task??;
    }
    Ok(())
}

/// Uses a `mpsc` Receiver to collect every finished unit and sorts them by their
/// [`UnitKey`], so the completion order of the workers doesn't leak into the output.
async fn collect_harvests(
    mut harvest_rx: mpsc::Receiver<(UnitKey, CountryHarvest)>,
) -> Vec<(UnitKey, CountryHarvest)> {
    let mut col = Vec::new();
    while let Some(unit) = harvest_rx.recv().await {
        col.push(unit);
    }
    // Keys are unique.
    col.sort_unstable_by_key(|(key, _)| *key);
    col
}

/// Concatenates the sorted units per app and drops apps without reviews.
fn bundle_by_app(
    ids: &IdentifierSet,
    harvests: Vec<(UnitKey, CountryHarvest)>,
) -> Vec<AppReviewBundle> {
    let mut per_app: Vec<Vec<TaggedReview>> = vec![Vec::new(); ids.len()];
    for ((app_idx, _), harvest) in harvests {
        per_app[app_idx].extend(harvest.reviews);
    }

    ids.iter()
        .zip(per_app)
        .filter(|(_, reviews)| !reviews.is_empty())
        .map(|(app_id, reviews)| AppReviewBundle {
            app_id: app_id.to_string(),
            reviews,
        })
        .collect()
}
