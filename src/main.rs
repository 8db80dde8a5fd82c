use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::{Local, Utc};
use clap::Parser;
use revscrap::encode::{encode_csv, export_filename};
use revscrap::input::{resolve_limit, IdentifierSet};
use revscrap::play::PlayProvider;
use revscrap::process::{harvest, HarvestConfig};
use revscrap::provider::{Platform, ReviewProvider};
use revscrap::request::ItunesProvider;
use revscrap::server::{build_router, AppState};
use revscrap::{info_time, Error};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let start_time = Local::now();
    let cli = Cli::parse();
    let play: Arc<dyn ReviewProvider> = Arc::new(PlayProvider::new(cli.harvest.play_config())?);
    let itunes: Arc<dyn ReviewProvider> = Arc::new(ItunesProvider::new(cli.harvest.itunes_config())?);
    let config = cli.harvest.harvest_config();

    match cli.command {
        Commands::Serve { bind } => {
            let app = build_router(
                AppState::new(config)
                    .with_provider(play)
                    .with_provider(itunes),
            );
            let listener = tokio::net::TcpListener::bind(bind).await?;
            info!("Listening on http://{bind}/scrape-android and http://{bind}/scrape-ios");
            axum::serve(listener, app).await?;
        }
        Commands::Scrape {
            app_ids,
            limit,
            output_dir,
        } => {
            let provider = match cli.harvest.platform {
                Platform::Android => play,
                Platform::Ios => itunes,
            };
            scrape_to_file(provider, config, app_ids, limit, &output_dir).await?;
            info_time!(start_time, "Full program time:");
        }
    }

    Ok(())
}

/// One-shot harvest into `reviews_{platform}_{timestamp}.csv`. Ctrl-C stops fetching
/// and still writes whatever was collected.
async fn scrape_to_file(
    provider: Arc<dyn ReviewProvider>,
    config: HarvestConfig,
    app_ids: Option<String>,
    limit: Option<String>,
    output_dir: &Path,
) -> Result<()> {
    let platform = provider.platform();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    let app_ids = match app_ids {
        Some(ids) => ids,
        None => prompt(&mut stdin, "App IDs (comma separated):\n> ").await?,
    };
    let ids = IdentifierSet::parse(Some(&app_ids));
    if ids.is_empty() {
        bail!(Error::NoValidAppIds);
    }
    for (n, id) in ids.iter().enumerate() {
        info!("{}. {id}", n + 1);
    }

    let limit = match limit {
        Some(limit) => limit,
        None => prompt(&mut stdin, "Reviews per country (default 50): ").await?,
    };
    let config = HarvestConfig {
        limit_per_country: resolve_limit(Some(&limit)),
        ..config
    };
    let countries: Vec<_> = config.countries.iter().map(|c| c.as_str()).collect();
    info!(
        countries = %countries.join(", "),
        limit = config.limit_per_country,
        "expecting up to {} reviews per app",
        config.countries.len() * config.limit_per_country
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, finishing in-flight requests");
                cancel.cancel();
            }
        }
    });

    let report = harvest(&ids, &config, provider, cancel).await?;
    if report.is_empty() {
        warn!("No reviews found for the given app IDs, nothing to export");
        return Ok(());
    }

    let path = output_dir.join(export_filename(platform, Utc::now()));
    let local_now = Local::now();
    tokio::fs::write(&path, encode_csv(&report.bundles)).await?;
    info_time!(local_now, "Wrote the results to file: {}", path.display());

    info!(
        apps = report.bundles.len(),
        reviews = report.total_reviews(),
        pages = report.pages_fetched,
        failed_units = report.failed_units,
        partial = report.cancelled,
        file = %path.display(),
        "export done"
    );
    Ok(())
}

async fn prompt<R>(lines: &mut tokio::io::Lines<R>, question: &str) -> Result<String>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut stdout = tokio::io::stdout();
    stdout.write_all(question.as_bytes()).await?;
    stdout.flush().await?;
    Ok(lines.next_line().await?.unwrap_or_default())
}
