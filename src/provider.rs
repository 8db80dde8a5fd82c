use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use crate::review::RawReviewRecord;
use crate::{Error, Result};

/// Storefront family a provider serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Google Play.
    Android,
    /// The App Store.
    Ios,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
        }
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            other => Err(Error::UnknownPlatform(other.to_string())),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order pages are requested in. Harvesting always pages newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Recent,
}

/// Remote source of paged reviews. Implementations may fail or return junk on
/// any call; callers must not trust them.
#[async_trait]
pub trait ReviewProvider: Send + Sync {
    fn platform(&self) -> Platform;

    /// Returns one page (1-based) of reviews. `country` is already lowercase.
    async fn fetch_reviews_page(
        &self,
        app_id: &str,
        country: &str,
        page: u32,
        sort: SortOrder,
    ) -> Result<Vec<RawReviewRecord>>;
}
