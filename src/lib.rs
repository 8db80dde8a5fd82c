//! App store review harvester.
//!
//! Pages through the most recent reviews of a set of apps in every storefront of a
//! fixed country catalog and flattens them into a single CSV export. Google Play
//! ([`play`]) and the App Store ([`request`]) are supported.

mod error;
mod macros;
mod parse;

pub mod collect;
pub mod country;
pub mod encode;
pub mod fetch;
pub mod input;
pub mod play;
pub mod process;
pub mod provider;
pub mod request;
pub mod review;
pub mod server;

pub use error::{Error, Result};

/// Records in a full page, a shorter page means the storefront ran out of reviews.
pub const PAGE_SIZE: usize = 50;
pub const DEFAULT_LIMIT_PER_COUNTRY: usize = 50;
/// The App Store review feed serves at most this many pages.
pub const MAX_FEED_PAGE: u32 = 10;
