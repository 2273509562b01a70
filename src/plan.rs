use reqwest::Client;
use serde_json::Value;

use crate::config::ScraperParams;
use crate::parse::parse_total;
use crate::{Error, Result};

/// Size of the crawl, as reported by the reconnaissance request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub total: u64,
    pub pages: u32,
}

impl Plan {
    pub fn from_total(total: u64, entries_per_page: u32) -> Result<Self> {
        if entries_per_page == 0 {
            return Err(Error::Config("entries per page must be at least 1".into()));
        }
        let pages = total.div_ceil(u64::from(entries_per_page));
        let pages = u32::try_from(pages)
            .map_err(|_| Error::Planning(format!("{pages} pages is more than can be requested")))?;
        Ok(Self { total, pages })
    }
}

/// Issues one request for the first page and derives the page count from `data.total`.
///
/// Any failure here is fatal: without a total there is no page range to crawl.
pub async fn plan(client: &Client, params: &ScraperParams) -> Result<Plan> {
    let url = params.build_book_page_url(1)?;
    tracing::debug!(%url, "Planning request");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Planning(format!("connection error: {e}")))?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Planning(format!("search API answered {status}")));
    }
    let content: Value = response
        .json()
        .await
        .map_err(|e| Error::Planning(format!("invalid response body: {e}")))?;
    let total = parse_total(&content)
        .ok_or_else(|| Error::Planning("response has no `data.total`".into()))?;

    Plan::from_total(total, params.entries_per_page)
}
