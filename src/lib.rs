//! Book catalog scraper.
//!
//! Plans a paginated crawl of the search API, fetches every page (and the cover of every book on it)
//! under one global request limit, retries the pages that failed once, writes each page to
//! `{json_dir}/{page}.json` and finally merges the pages into one dataset file.

pub mod config;
mod error;
pub mod limiter;
mod macros;
pub mod merge;
pub mod parse;
pub mod plan;
pub mod process;
pub mod request;
pub mod serialize;

pub use error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://www.oreilly.com/search/api/search/";
pub const DEFAULT_START_DATE: &str = "2018-01-01";
pub const DEFAULT_END_DATE: &str = "2023-12-31";
pub const DEFAULT_ENTRIES_PER_PAGE: u32 = 50;
/// Max requests (pages + covers) in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 250;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_IMG_SIZE: &str = "500w";
pub const DEFAULT_JSON_DIR: &str = "data";
pub const DEFAULT_COVER_DIR: &str = "cover_images";
pub const DATASET_FILE_NAME: &str = "dataset.json";
/// The merge stage only picks up page files with up to this many digits.
pub const MAX_PAGE_DIGITS: usize = 3;

pub const DEFAULT_PUBLISHERS: [&str; 9] = [
    "Apress",
    "O'Reilly Media, Inc.",
    "Manning Publications",
    "Packt Publishing",
    "Pearson",
    "Addison-Wesley Professional",
    "Microsoft Press",
    "Pragmatic Bookshelf",
    "No Starch Press",
];
