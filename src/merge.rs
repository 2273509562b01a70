//! Joins the per-page files into one dataset.
//!
//! Pages are merged by ascending page number (`2.json` before `10.json`). The destination is written
//! to a temporary file first and renamed over `dest` only once everything was read and written, so a
//! failed merge leaves any previous dataset untouched.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::serialize::to_pretty_json;
use crate::{Error, Result, MAX_PAGE_DIGITS};

static PAGE_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^([0-9]{{1,{MAX_PAGE_DIGITS}}})\.json$"))
        .expect("page file pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    /// Page numbers that went into the dataset, in merge order.
    pub pages: Vec<u32>,
    pub records: usize,
}

pub async fn join_data_files(source_dir: &Path, dest: &Path) -> Result<MergeSummary> {
    let tmp = tmp_path(dest);
    let res = merge_into(source_dir, dest, &tmp).await;
    if res.is_err() {
        // Nothing to clean up if the failure happened before the temporary file was created.
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    res
}

async fn merge_into(source_dir: &Path, dest: &Path, tmp: &Path) -> Result<MergeSummary> {
    let merge_err = |reason: String| Error::Merge {
        dest: dest.to_path_buf(),
        reason,
    };

    let pages = ordered_page_files(source_dir)
        .await
        .map_err(|e| merge_err(format!("couldn't list {}: {e}", source_dir.display())))?;

    let mut grouped: Vec<Value> = Vec::new();
    for (page, path) in &pages {
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| merge_err(format!("couldn't read {}: {e}", path.display())))?;
        let records: Vec<Value> = serde_json::from_slice(&content)
            .map_err(|e| merge_err(format!("page {page} is not a JSON array: {e}")))?;
        grouped.extend(records);
    }

    let content = to_pretty_json(&grouped)?;
    tokio::fs::write(tmp, content)
        .await
        .map_err(|e| merge_err(format!("couldn't write {}: {e}", tmp.display())))?;
    tokio::fs::rename(tmp, dest)
        .await
        .map_err(|e| merge_err(format!("couldn't move {} into place: {e}", tmp.display())))?;

    Ok(MergeSummary {
        pages: pages.into_iter().map(|(page, _)| page).collect(),
        records: grouped.len(),
    })
}

/// Page files in `dir`, sorted by page number.
async fn ordered_page_files(dir: &Path) -> Result<Vec<(u32, PathBuf)>> {
    let mut pages = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(page) = name
            .to_str()
            .and_then(|name| PAGE_FILE.captures(name))
            .and_then(|cap| cap[1].parse::<u32>().ok())
        else {
            continue;
        };
        pages.push((page, entry.path()));
    }
    pages.sort_unstable_by_key(|(page, _)| *page);
    Ok(pages)
}

fn tmp_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    dest.with_file_name(name)
}
