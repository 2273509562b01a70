use std::sync::Arc;

use futures::future::join_all;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::task::JoinSet;
use url::Url;

use crate::config::ScraperParams;
use crate::limiter::RequestLimiter;
use crate::parse::{parse_products, BookRecord};
use crate::{Error, Result};

/// One page of search results to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub url: Url,
}

impl PageRequest {
    pub fn new(page: u32, url: Url) -> Self {
        Self { page, url }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverFetchOutcome {
    Fetched,
    Failed,
}

impl CoverFetchOutcome {
    pub fn is_fetched(self) -> bool {
        self == Self::Fetched
    }
}

/// Result of fetching one page. `ok` only reflects the page request itself, a page with failed
/// covers is still retrieved.
#[derive(Debug, Clone)]
pub struct PageOutcome {
    pub request: PageRequest,
    pub books: Vec<(BookRecord, CoverFetchOutcome)>,
    pub ok: bool,
}

impl PageOutcome {
    fn failed(request: PageRequest) -> Self {
        Self {
            request,
            books: Vec::new(),
            ok: false,
        }
    }

    pub fn page(&self) -> u32 {
        self.request.page
    }

    /// The records, in response order.
    pub fn records(&self) -> impl Iterator<Item = &BookRecord> {
        self.books.iter().map(|(record, _)| record)
    }

    pub fn covers_fetched(&self) -> u64 {
        self.books
            .iter()
            .filter(|(_, cover)| cover.is_fetched())
            .count() as u64
    }
}

/// Fetches pages and covers through one shared client and one shared [`RequestLimiter`].
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    params: Arc<ScraperParams>,
    limiter: RequestLimiter,
}

impl Fetcher {
    pub fn new(client: Client, params: Arc<ScraperParams>, limiter: RequestLimiter) -> Self {
        Self {
            client,
            params,
            limiter,
        }
    }

    pub fn limiter(&self) -> &RequestLimiter {
        &self.limiter
    }

    /// Spawns a task per page and waits for all of them.
    ///
    /// Outcomes come back in completion order. Failed pages are reported in their outcome,
    /// the only errors returned are a closed limiter or a panicked task.
    pub async fn fetch_pages(&self, requests: Vec<PageRequest>) -> Result<Vec<PageOutcome>> {
        let total = requests.len();
        let mut task_set = JoinSet::new();
        for request in requests {
            task_set.spawn({
                // Client and limiter are both Arcs inside, cheap to clone.
                let fetcher = self.clone();
                async move { fetcher.fetch_page(request).await }
            });
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(task) = task_set.join_next().await {
            let outcome = task??;
            tracing::info!(
                page = outcome.page(),
                ok = outcome.ok,
                "Fetched page {} ({}/{total})",
                outcome.page(),
                outcomes.len() + 1
            );
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Fetches one page, then all of its covers concurrently.
    pub async fn fetch_page(&self, request: PageRequest) -> Result<PageOutcome> {
        let records = match self.request_records(&request).await {
            Ok(records) => records,
            Err(e @ Error::PageFetch { .. }) => {
                tracing::warn!(url = %request.url, "{e}");
                return Ok(PageOutcome::failed(request));
            }
            Err(e) => return Err(e),
        };

        let covers = join_all(records.iter().map(|record| self.fetch_cover(record))).await;
        let books = records
            .into_iter()
            .zip(covers)
            .map(|(record, cover)| Ok((record, cover?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(PageOutcome {
            request,
            books,
            ok: true,
        })
    }

    /// Holds a slot only for the page request itself.
    async fn request_records(&self, request: &PageRequest) -> Result<Vec<BookRecord>> {
        let _slot = self.limiter.acquire().await?;
        let page_err = |reason: String| Error::PageFetch {
            page: request.page,
            reason,
        };

        let response = self
            .client
            .get(request.url.clone())
            .send()
            .await
            .map_err(|e| page_err(format!("connection error: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(page_err(format!("search API answered {status}")));
        }
        let content: Value = response
            .json()
            .await
            .map_err(|e| page_err(format!("invalid response body: {e}")))?;

        parse_products(&content).ok_or_else(|| page_err("response has no `data.products`".into()))
    }

    /// Downloads the cover of `record` into the cover directory.
    /// Only a closed limiter is an error, everything else is a failed cover.
    async fn fetch_cover(&self, record: &BookRecord) -> Result<CoverFetchOutcome> {
        let (Some(base_url), Some(stem)) = (record.cover_base_url(), record.cover_file_stem())
        else {
            tracing::debug!(product = ?record.product_id, "No cover to fetch");
            return Ok(CoverFetchOutcome::Failed);
        };
        let url = self.params.build_cover_img_url(base_url);

        let image = {
            let _slot = self.limiter.acquire().await?;
            match self.download_cover(&url).await {
                Ok(image) => image,
                Err(e) => {
                    tracing::warn!("{e}");
                    return Ok(CoverFetchOutcome::Failed);
                }
            }
        };

        let path = self.params.cover_path(&stem);
        if let Err(e) = tokio::fs::write(&path, image.as_ref()).await {
            tracing::warn!(path = %path.display(), error = %e, "Couldn't write cover");
            return Ok(CoverFetchOutcome::Failed);
        }
        tracing::debug!(path = %path.display(), "Wrote cover");
        Ok(CoverFetchOutcome::Fetched)
    }

    async fn download_cover(&self, url: &str) -> Result<impl AsRef<[u8]>> {
        let cover_err = |reason: String| Error::CoverFetch {
            url: url.to_string(),
            reason,
        };
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| cover_err(format!("connection error: {e}")))?;
        if response.status() != StatusCode::OK {
            return Err(cover_err(format!("answered {}", response.status())));
        }
        response
            .bytes()
            .await
            .map_err(|e| cover_err(format!("body error: {e}")))
    }
}
