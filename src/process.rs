use std::path::Path;
use std::sync::Arc;

use chrono::Local;

use crate::config::{ensure_dirs, ScraperParams};
use crate::limiter::RequestLimiter;
use crate::merge::{join_data_files, MergeSummary};
use crate::plan::{plan, Plan};
use crate::request::{Fetcher, PageOutcome, PageRequest};
use crate::serialize::{serialize_results, Tally};
use crate::{info_time, Result, MAX_PAGE_DIGITS};

/// What a full run did.
#[derive(Debug)]
pub struct RunReport {
    pub plan: Plan,
    pub passes: PassReport,
    /// A failed merge doesn't discard the fetch results above.
    pub merge: Result<MergeSummary>,
}

impl RunReport {
    /// True if the dataset was written.
    pub fn is_complete(&self) -> bool {
        self.merge.is_ok()
    }
}

/// Outcome of the fetch passes.
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub tally: Tally,
    /// Pages retrieved by the first pass.
    pub retrieved: usize,
    /// Pages that failed the first pass but were retrieved by the retry.
    pub recovered: usize,
    /// Pages that failed both passes. They are not part of the dataset.
    pub missing: Vec<PageRequest>,
}

enum PassState {
    FirstPass(Vec<PageRequest>),
    RetryPass(Vec<PageRequest>),
    Done(Vec<PageRequest>),
}

/// Plans, fetches, retries, and merges. The whole crawl.
pub async fn process_catalog(params: ScraperParams) -> Result<RunReport> {
    let start_time = Local::now();
    params.validate()?;
    ensure_dirs(&[params.json_dir.as_path(), params.cover_img_dir.as_path()]).await?;
    let params = Arc::new(params);

    // One pooled client for every request of the run.
    let client = params.build_client()?;

    let plan = plan(&client, &params).await?;
    info_time!("Total number of books: {}", plan.total);
    info_time!("Planned pages: {}", plan.pages);
    if plan.pages >= 10u32.pow(MAX_PAGE_DIGITS as u32) {
        tracing::warn!(
            pages = plan.pages,
            "Pages past {} won't be picked up by the merge",
            10u32.pow(MAX_PAGE_DIGITS as u32) - 1
        );
    }

    let requests = params.build_page_requests(plan.pages)?;
    let limiter = RequestLimiter::new(params.concurrency)?;
    let fetcher = Fetcher::new(client, Arc::clone(&params), limiter);
    let passes = run_passes(&fetcher, requests, &params.json_dir).await?;
    info_time!(start_time, "Finished fetching.");

    let dest = params.dest_path();
    let merge = join_data_files(&params.json_dir, &dest).await;
    match &merge {
        Ok(summary) => info_time!(
            "Merged {} pages ({} books) into {}",
            summary.pages.len(),
            summary.records,
            dest.display()
        ),
        Err(e) => tracing::error!("Dataset not written: {e}"),
    }

    info_time!(start_time, "Finished.");
    info_time!("Book count: {}", passes.tally.books);
    info_time!("Cover count: {}", passes.tally.covers);

    Ok(RunReport {
        plan,
        passes,
        merge,
    })
}

/// Fetches all `requests`, then retries the failed ones once.
///
/// Every retrieved page is serialized as soon as its pass ends. Pages still failing after the retry
/// are returned in [`PassReport::missing`], there is no third pass.
pub async fn run_passes(
    fetcher: &Fetcher,
    requests: Vec<PageRequest>,
    json_dir: &Path,
) -> Result<PassReport> {
    let mut report = PassReport::default();
    let mut state = PassState::FirstPass(requests);

    loop {
        state = match state {
            PassState::FirstPass(requests) => {
                let (retrieved, missing) = fetch_partitioned(fetcher, requests).await?;
                info_time!("Retrieved pages: {}", retrieved.len());
                info_time!("Missing pages: {}", missing.len());

                report.retrieved = retrieved.len();
                report.tally = serialize_results(&retrieved, json_dir, Tally::default()).await?;

                if missing.is_empty() {
                    PassState::Done(missing)
                } else {
                    PassState::RetryPass(missing)
                }
            }
            PassState::RetryPass(requests) => {
                info_time!("Retrying {} pages", requests.len());
                let (retrieved, missing) = fetch_partitioned(fetcher, requests).await?;

                report.recovered = retrieved.len();
                report.tally = serialize_results(&retrieved, json_dir, report.tally).await?;
                PassState::Done(missing)
            }
            PassState::Done(missing) => {
                for request in &missing {
                    tracing::error!(page = request.page, url = %request.url, "Failed 2nd attempt");
                }
                report.missing = missing;
                return Ok(report);
            }
        };
    }
}

/// Runs one pass and splits it into retrieved outcomes and the requests that failed.
async fn fetch_partitioned(
    fetcher: &Fetcher,
    requests: Vec<PageRequest>,
) -> Result<(Vec<PageOutcome>, Vec<PageRequest>)> {
    let outcomes = fetcher.fetch_pages(requests).await?;
    tracing::info!(
        peak_in_flight = fetcher.limiter().peak(),
        limit = fetcher.limiter().capacity(),
        "Pass done"
    );

    let (retrieved, failed): (Vec<_>, Vec<_>) = outcomes.into_iter().partition(|o| o.ok);
    let mut missing: Vec<PageRequest> = failed.into_iter().map(|o| o.request).collect();
    missing.sort_unstable_by_key(|r| r.page);
    Ok((retrieved, missing))
}
