//! Parsing of the two user-supplied knobs: the app identifier list and the
//! per-country review limit.

use std::collections::HashSet;

use crate::DEFAULT_LIMIT_PER_COUNTRY;

/// Ordered, duplicate-free list of app identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierSet(Vec<String>);

impl IdentifierSet {
    /// Splits on commas, trims every token, drops empty ones and keeps the first
    /// occurrence of each identifier.
    ///
    /// Malformed input never fails, it just yields fewer (or zero) identifiers.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };

        let mut seen = HashSet::new();
        let ids = raw
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .filter(|id| seen.insert(*id))
            .map(String::from)
            .collect();
        Self(ids)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Resolves the per-country limit the way a lenient integer prompt would:
/// the leading digits are used, absent, non-numeric and zero values fall back to
/// [`DEFAULT_LIMIT_PER_COUNTRY`]. A negative limit is kept as a limit of nothing,
/// so no page is fetched at all.
pub fn resolve_limit(raw: Option<&str>) -> usize {
    let Some(raw) = raw else {
        return DEFAULT_LIMIT_PER_COUNTRY;
    };

    let raw = raw.trim_start();
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());

    match digits[..end].parse::<u64>() {
        Ok(0) | Err(_) => DEFAULT_LIMIT_PER_COUNTRY,
        Ok(_) if negative => 0,
        Ok(limit) => usize::try_from(limit).unwrap_or(usize::MAX),
    }
}
