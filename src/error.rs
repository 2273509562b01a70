use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The reconnaissance request failed. Fatal, there is no valid plan.
    #[error("Couldn't plan the crawl: {0}")]
    Planning(String),

    #[error("Failed to fetch page {page}: {reason}")]
    PageFetch { page: u32, reason: String },
    #[error("Failed to fetch cover {url}: {reason}")]
    CoverFetch { url: String, reason: String },

    #[error("Couldn't serialize page {page}: {source}")]
    Serialization {
        page: u32,
        #[source]
        source: std::io::Error,
    },
    #[error("Merge into {dest} failed: {reason}")]
    Merge { dest: PathBuf, reason: String },

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Request limiter was closed: {0}")]
    LimiterClosed(#[from] tokio::sync::AcquireError),
    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
}
