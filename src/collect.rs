use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::country::CountryCode;
use crate::fetch::{PageOutcome, ReviewPageFetcher};
use crate::review::{CountryHarvest, TaggedReview};
use crate::PAGE_SIZE;

/// Pages through the reviews of one app in one country.
///
/// Stops on an empty page, a short page (fewer than [`PAGE_SIZE`] records), a failed
/// page, once `limit` reviews are accumulated, or when `cancel` fires. The limit is
/// checked before every fetch, so a provider that never runs dry still stops.
/// Returns at most `limit` reviews in fetch order.
pub async fn collect_country(
    fetcher: &ReviewPageFetcher,
    app_id: &str,
    country: &CountryCode,
    limit: usize,
    cancel: &CancellationToken,
) -> CountryHarvest {
    let mut reviews: Vec<TaggedReview> = Vec::new();
    let mut failure = None;
    let mut page = 1;

    while reviews.len() < limit && !cancel.is_cancelled() {
        let records = match fetcher.fetch(app_id, country, page, cancel).await {
            PageOutcome::Page(records) => records,
            PageOutcome::Cancelled => break,
            PageOutcome::Failed(reason) => {
                warn!(app_id, %country, page, %reason, "failed to fetch reviews, skipping rest of country");
                failure = Some(reason);
                break;
            }
        };
        page += 1;

        let page_len = records.len();
        if page_len == 0 {
            break;
        }
        reviews.extend(
            records
                .into_iter()
                .map(|record| TaggedReview::new(record, country.clone())),
        );

        // Short page, nothing left behind it.
        if page_len < PAGE_SIZE {
            break;
        }
    }
    reviews.truncate(limit);

    info!(app_id, %country, count = reviews.len(), pages = page - 1, "collected reviews");
    CountryHarvest {
        country: country.clone(),
        reviews,
        pages_fetched: page - 1,
        failure,
    }
}
