use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Storefronts queried for every app, in output order.
pub const CATALOG: [&str; 20] = [
    "US", "VN", "GB", "DE", "FR", "JP", "KR", "IN", "BR", "CA", "AU", "IT", "ES", "MX", "TH",
    "ID", "PH", "SG", "MY", "TW",
];

/// Two letter storefront code, always held in uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CountryCode(String);

impl CountryCode {
    /// The full [`CATALOG`] as codes.
    pub fn catalog() -> Vec<CountryCode> {
        CATALOG.iter().map(|c| CountryCode(c.to_string())).collect()
    }

    /// Parses a comma separated list of codes, e.g. a `--countries` override.
    pub fn parse_list(raw: &str) -> Result<Vec<CountryCode>> {
        raw.split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(CountryCode::from_str)
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Storefront APIs are case sensitive and want lowercase.
    pub fn for_provider(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl FromStr for CountryCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() == 2 && s.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(CountryCode(s.to_ascii_uppercase()))
        } else {
            Err(Error::InvalidCountry(s.to_string()))
        }
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
