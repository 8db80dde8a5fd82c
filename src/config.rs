use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use revscrap::country::CountryCode;
use revscrap::fetch::RetryPolicy;
use revscrap::process::HarvestConfig;
use revscrap::play::{PlayConfig, DEFAULT_PLAY_BASE_URL};
use revscrap::provider::Platform;
use revscrap::request::{ItunesConfig, DEFAULT_FEED_BASE_URL};
use revscrap::DEFAULT_LIMIT_PER_COUNTRY;

#[derive(Parser, Debug)]
#[command(name = "revscrap", version, about = "App store review harvester")]
pub struct Cli {
    #[command(flatten)]
    pub harvest: HarvestArgs,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve `/scrape-android` and `/scrape-ios` over HTTP.
    Serve {
        #[arg(long, env = "REVSCRAP_BIND", default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
    },
    /// Harvest once and write the CSV next to `--output-dir`. Missing values are prompted for.
    Scrape {
        /// Comma separated app ids or bundle ids.
        #[arg(long)]
        app_ids: Option<String>,
        /// Reviews per country.
        #[arg(long)]
        limit: Option<String>,
        #[arg(long, env = "REVSCRAP_OUTPUT_DIR", default_value = ".")]
        output_dir: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct HarvestArgs {
    /// Storefront the `scrape` command reads from.
    #[arg(long, global = true, env = "REVSCRAP_PLATFORM", default_value = "android")]
    pub platform: Platform,
    #[arg(long, global = true, env = "REVSCRAP_FEED_BASE_URL", default_value = DEFAULT_FEED_BASE_URL)]
    pub feed_base_url: String,
    #[arg(long, global = true, env = "REVSCRAP_PLAY_BASE_URL", default_value = DEFAULT_PLAY_BASE_URL)]
    pub play_base_url: String,
    /// Play Store interface language.
    #[arg(long, global = true, env = "REVSCRAP_LANG", default_value = "en")]
    pub lang: String,
    #[arg(long, global = true, env = "REVSCRAP_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,
    /// (app, country) pairs fetched at once; 1 is fully sequential.
    #[arg(long, global = true, env = "REVSCRAP_CONCURRENCY", default_value_t = 4)]
    pub concurrency: usize,
    #[arg(long, global = true, env = "REVSCRAP_RETRIES", default_value_t = 0)]
    pub retries: u32,
    #[arg(long, global = true, env = "REVSCRAP_RETRY_DELAY_MS", default_value_t = 500)]
    pub retry_delay_ms: u64,
    /// Overrides the built-in country catalog, e.g. `US,VN,JP`.
    #[arg(long, global = true, env = "REVSCRAP_COUNTRIES", value_parser = CountryCode::parse_list)]
    pub countries: Option<std::vec::Vec<CountryCode>>,
}

impl HarvestArgs {
    pub fn harvest_config(&self) -> HarvestConfig {
        HarvestConfig {
            countries: self
                .countries
                .clone()
                .unwrap_or_else(CountryCode::catalog),
            limit_per_country: DEFAULT_LIMIT_PER_COUNTRY,
            concurrency: self.concurrency,
            retry: RetryPolicy {
                retries: self.retries,
                base_delay: Duration::from_millis(self.retry_delay_ms),
            },
        }
    }

    pub fn play_config(&self) -> PlayConfig {
        PlayConfig {
            base_url: self.play_base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            lang: self.lang.clone(),
            ..Default::default()
        }
    }

    pub fn itunes_config(&self) -> ItunesConfig {
        ItunesConfig {
            base_url: self.feed_base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            ..Default::default()
        }
    }
}
