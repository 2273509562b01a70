use std::path::PathBuf;
use std::time::Duration;

use bookscrap::config::ScraperParams;
use bookscrap::process::process_catalog;
use bookscrap::{
    info_time, Result, DEFAULT_BASE_URL, DEFAULT_CONCURRENCY, DEFAULT_COVER_DIR,
    DEFAULT_END_DATE, DEFAULT_ENTRIES_PER_PAGE, DEFAULT_IMG_SIZE, DEFAULT_JSON_DIR,
    DEFAULT_PUBLISHERS, DEFAULT_START_DATE, DEFAULT_TIMEOUT_SECS,
};
use chrono::Local;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Scrape book metadata and covers from the catalog search API.
#[derive(Parser, Debug)]
#[command(about, version, author)]
struct Args {
    /// Only books issued after this date (YYYY-MM-DD).
    #[arg(long, default_value = DEFAULT_START_DATE)]
    start_date: String,

    /// Only books issued before this date (YYYY-MM-DD).
    #[arg(long, default_value = DEFAULT_END_DATE)]
    end_date: String,

    #[arg(short, long, default_value_t = DEFAULT_ENTRIES_PER_PAGE)]
    entries_per_page: u32,

    /// Directory for the per-page JSON files. Every `N.json` in it is merged, including pages
    /// left over from earlier runs.
    #[arg(long, default_value = DEFAULT_JSON_DIR)]
    json_dir: PathBuf,

    #[arg(long, default_value = DEFAULT_COVER_DIR)]
    cover_dir: PathBuf,

    /// Merged dataset path. Defaults to `<JSON_DIR>/dataset.json`.
    #[arg(long)]
    dest: Option<PathBuf>,

    /// Max requests in flight, pages and covers combined.
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(long, default_value = DEFAULT_IMG_SIZE)]
    img_size: String,

    /// Publisher to filter on, repeatable. Defaults to the built-in list.
    #[arg(long = "publisher")]
    publishers: Vec<String>,
}

impl From<Args> for ScraperParams {
    fn from(args: Args) -> Self {
        let publishers = if args.publishers.is_empty() {
            DEFAULT_PUBLISHERS.iter().map(|p| p.to_string()).collect()
        } else {
            args.publishers
        };
        Self {
            start_date: args.start_date,
            end_date: args.end_date,
            entries_per_page: args.entries_per_page,
            json_dir: args.json_dir,
            cover_img_dir: args.cover_dir,
            dest: args.dest,
            concurrency: args.concurrency,
            timeout: Duration::from_secs(args.timeout_secs),
            base_url: args.base_url,
            img_size: args.img_size,
            publishers,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let start_time = Local::now();
    let report = process_catalog(Args::parse().into()).await?;
    if !report.passes.missing.is_empty() {
        let pages: Vec<u32> = report.passes.missing.iter().map(|r| r.page).collect();
        tracing::warn!("Pages missing from the dataset: {pages:?}");
    }
    info_time!(start_time, "Full program time:");

    // Exit non-zero only once everything above was reported.
    report.merge.map(|_| ())
}
