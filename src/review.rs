use crate::country::CountryCode;

/// One review as the provider hands it over. Every field is optional, the
/// provider is not trusted to fill them in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawReviewRecord {
    pub user_name: Option<String>,
    /// Review date on storefronts that call it `date`.
    pub date: Option<String>,
    /// Review date on storefronts that call it `updated` (the App Store feed).
    pub updated: Option<String>,
    pub score: Option<u32>,
    pub text: Option<String>,
    pub version: Option<String>,
}

impl RawReviewRecord {
    /// `date` when present and non-empty, else `updated`.
    ///
    /// Whether both fields mean the same thing (submitted vs last edited) is not
    /// verified across storefronts.
    pub fn review_date(&self) -> Option<&str> {
        self.date
            .as_deref()
            .filter(|d| !d.is_empty())
            .or(self.updated.as_deref())
    }
}

/// A review together with the storefront it was fetched from.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedReview {
    record: RawReviewRecord,
    country: CountryCode,
}

impl TaggedReview {
    pub fn new(record: RawReviewRecord, country: CountryCode) -> Self {
        Self { record, country }
    }

    pub fn record(&self) -> &RawReviewRecord {
        &self.record
    }

    pub fn country(&self) -> &CountryCode {
        &self.country
    }
}

/// Outcome of collecting one (app, country) unit.
///
/// `failure` is set when a page fetch failed; `reviews` then holds whatever the
/// earlier pages produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryHarvest {
    pub country: CountryCode,
    pub reviews: Vec<TaggedReview>,
    pub pages_fetched: u32,
    pub failure: Option<String>,
}

impl CountryHarvest {
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// All reviews gathered for one app, across every country.
#[derive(Debug, Clone, PartialEq)]
pub struct AppReviewBundle {
    pub app_id: String,
    pub reviews: Vec<TaggedReview>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_date_prefers_date_over_updated() {
        let mut record = RawReviewRecord {
            date: Some("2024-05-01".into()),
            updated: Some("2024-05-02T10:00:00-07:00".into()),
            ..Default::default()
        };
        assert_eq!(record.review_date(), Some("2024-05-01"));

        record.date = Some(String::new());
        assert_eq!(record.review_date(), Some("2024-05-02T10:00:00-07:00"));

        record.date = None;
        record.updated = None;
        assert_eq!(record.review_date(), None);
    }
}
