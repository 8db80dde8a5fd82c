//! CSV export of harvested reviews.

use std::borrow::Cow;

use chrono::{DateTime, Utc};

use crate::provider::Platform;
use crate::review::AppReviewBundle;

pub const HEADERS: [&str; 7] = [
    "App ID",
    "User Name",
    "Date",
    "Score",
    "Review Text",
    "Version",
    "Country",
];

/// Quotes a field when it contains a comma, a double quote or a newline, doubling
/// any quotes inside it.
pub fn escape_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Renders the header row followed by one row per review. Rows are joined with
/// `\n`, without a trailing newline.
pub fn encode_csv(bundles: &[AppReviewBundle]) -> String {
    let mut rows = Vec::with_capacity(1 + bundles.iter().map(|b| b.reviews.len()).sum::<usize>());
    rows.push(join_row(HEADERS));

    for bundle in bundles {
        for review in &bundle.reviews {
            let record = review.record();
            let score = record.score.map(|s| s.to_string());
            rows.push(join_row([
                bundle.app_id.as_str(),
                record.user_name.as_deref().unwrap_or_default(),
                record.review_date().unwrap_or_default(),
                score.as_deref().unwrap_or_default(),
                record.text.as_deref().unwrap_or_default(),
                record.version.as_deref().unwrap_or_default(),
                review.country().as_str(),
            ]));
        }
    }

    rows.join("\n")
}

#[inline]
fn join_row<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    fields
        .into_iter()
        .map(escape_field)
        .collect::<Vec<_>>()
        .join(",")
}

/// `reviews_{platform}_{timestamp}.csv`, the timestamp being the UTC instant to
/// the second with `:` and `.` swapped for `-`, e.g. `2025-01-02T03-04-05`.
pub fn export_filename(platform: Platform, now: DateTime<Utc>) -> String {
    format!("reviews_{}_{}.csv", platform, now.format("%Y-%m-%dT%H-%M-%S"))
}
