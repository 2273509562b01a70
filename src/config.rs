use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::{header, Client};
use url::Url;

use crate::request::PageRequest;
use crate::{
    Error, Result, DATASET_FILE_NAME, DEFAULT_BASE_URL, DEFAULT_CONCURRENCY, DEFAULT_COVER_DIR,
    DEFAULT_END_DATE, DEFAULT_ENTRIES_PER_PAGE, DEFAULT_IMG_SIZE, DEFAULT_JSON_DIR,
    DEFAULT_PUBLISHERS, DEFAULT_START_DATE, DEFAULT_TIMEOUT_SECS,
};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

/// Everything a crawl needs to know. Built by the caller, shared read-only by all tasks.
#[derive(Debug, Clone)]
pub struct ScraperParams {
    pub start_date: String,
    pub end_date: String,
    pub entries_per_page: u32,
    /// Per-page files go here. The merge picks up every `N.json` in this directory, so a stale page
    /// from an earlier run is merged even if this run lists it as missing.
    pub json_dir: PathBuf,
    pub cover_img_dir: PathBuf,
    /// Where the merged dataset goes. Defaults to `{json_dir}/dataset.json`.
    pub dest: Option<PathBuf>,
    pub concurrency: usize,
    pub timeout: Duration,
    pub base_url: String,
    pub img_size: String,
    pub publishers: Vec<String>,
}

impl Default for ScraperParams {
    fn default() -> Self {
        Self {
            start_date: DEFAULT_START_DATE.into(),
            end_date: DEFAULT_END_DATE.into(),
            entries_per_page: DEFAULT_ENTRIES_PER_PAGE,
            json_dir: DEFAULT_JSON_DIR.into(),
            cover_img_dir: DEFAULT_COVER_DIR.into(),
            dest: None,
            concurrency: DEFAULT_CONCURRENCY,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            base_url: DEFAULT_BASE_URL.into(),
            img_size: DEFAULT_IMG_SIZE.into(),
            publishers: DEFAULT_PUBLISHERS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl ScraperParams {
    pub fn validate(&self) -> Result<()> {
        if self.entries_per_page == 0 {
            return Err(Error::Config("entries per page must be at least 1".into()));
        }
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency limit must be at least 1".into()));
        }
        let start = parse_date(&self.start_date)?;
        let end = parse_date(&self.end_date)?;
        if start > end {
            return Err(Error::Config(format!(
                "start date {start} is after end date {end}"
            )));
        }
        Url::parse(&self.base_url)?;
        Ok(())
    }

    pub fn dest_path(&self) -> PathBuf {
        self.dest
            .clone()
            .unwrap_or_else(|| self.json_dir.join(DATASET_FILE_NAME))
    }

    pub fn page_path(&self, page: u32) -> PathBuf {
        self.json_dir.join(format!("{page}.json"))
    }

    pub fn cover_path(&self, stem: &str) -> PathBuf {
        self.cover_img_dir.join(format!("{stem}.jpeg"))
    }

    /// Search URL for one page of results. Pages start at 1.
    pub fn build_book_page_url(&self, page: u32) -> Result<Url> {
        let rows = self.entries_per_page.to_string();
        let page = page.to_string();
        let mut query = vec![
            ("q", "*"),
            ("type", "book"),
            ("rows", rows.as_str()),
            ("page", page.as_str()),
            ("issued_after", self.start_date.as_str()),
            ("issued_before", self.end_date.as_str()),
        ];
        query.extend(self.publishers.iter().map(|p| ("publishers", p.as_str())));
        query.push(("order_by", "created_at"));

        Ok(Url::parse_with_params(&self.base_url, &query)?)
    }

    /// Requests for pages `1..=pages`, in order.
    pub fn build_page_requests(&self, pages: u32) -> Result<Vec<PageRequest>> {
        (1..=pages)
            .map(|page| Ok(PageRequest::new(page, self.build_book_page_url(page)?)))
            .collect()
    }

    pub fn build_cover_img_url(&self, base_url: &str) -> String {
        format!("{base_url}{}", self.img_size)
    }

    /// The one pooled client every request of a run goes through.
    pub fn build_client(&self) -> Result<Client> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("*/*"));
        headers.insert(
            "authority",
            header::HeaderValue::from_static("www.oreilly.com"),
        );
        headers.insert(
            header::REFERER,
            header::HeaderValue::from_static("https://www.oreilly.com/"),
        );

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(self.timeout)
            .pool_max_idle_per_host(self.concurrency)
            .build()?;
        Ok(client)
    }
}

fn parse_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| Error::Config(format!("invalid date {date:?}: {e}")))
}

/// Creates the output directories if they are missing.
pub async fn ensure_dirs(dirs: &[&Path]) -> Result<()> {
    for dir in dirs {
        tokio::fs::create_dir_all(dir).await?;
    }
    Ok(())
}
