use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::request::PageOutcome;
use crate::{Error, Result};

/// Running totals over everything written so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub books: u64,
    pub covers: u64,
}

/// Writes every outcome's records to `{json_dir}/{page}.json` and adds them to `tally`.
///
/// Rewriting a page replaces only that page's file. The caller passes retrieved pages only,
/// a failed outcome would be written as an empty page.
pub async fn serialize_results(
    outcomes: &[PageOutcome],
    json_dir: &Path,
    mut tally: Tally,
) -> Result<Tally> {
    for outcome in outcomes {
        let page = outcome.page();
        let records: Vec<_> = outcome.records().collect();
        let content = to_pretty_json(&records)?;

        let page_path = json_dir.join(format!("{page}.json"));
        tokio::fs::write(&page_path, content)
            .await
            .map_err(|source| Error::Serialization { page, source })?;
        tracing::info!(page, books = records.len(), "Serialized page {page}");

        tally.books += records.len() as u64;
        tally.covers += outcome.covers_fetched();
    }
    Ok(tally)
}

/// Pretty-printed JSON with a three space indent.
pub(crate) fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"   ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}
