//! Downloads and caches the quarterly master index, then parses and
//! deduplicates it into [`FilingRow`]s.

pub mod parser;

pub use parser::FilingRow;

use crate::error::Result;
use crate::http_client::HttpClient;
use crate::storage;
use std::path::Path;

/// `archive_base` is the `/Archives/edgar` root, overridable so tests can
/// point it at a mock server instead of the real publisher.
pub fn master_index_url(archive_base: &str, year: i32, quarter: u8) -> String {
    format!("{archive_base}/full-index/{year}/QTR{quarter}/master.idx")
}

/// Downloads the master index for `(year, quarter)`, caching the raw bytes at
/// `{data}/index/master/{year}/QTR{q}/master.idx`. A prior cache hit skips the
/// network call unless `force` is set.
pub async fn fetch_master_index(
    client: &HttpClient,
    data_dir: &Path,
    archive_base: &str,
    year: i32,
    quarter: u8,
    force: bool,
) -> Result<String> {
    let cache_dir = storage::quarter_index_dir(data_dir, year, quarter);
    let cache_path = cache_dir.join("master.idx");

    if !force {
        if let Ok(text) = tokio::fs::read_to_string(&cache_path).await {
            return Ok(text);
        }
    }

    let text = client.get_text(&master_index_url(archive_base, year, quarter)).await?;
    tokio::fs::create_dir_all(&cache_dir).await?;
    tokio::fs::write(&cache_path, &text).await?;
    Ok(text)
}

/// Fetches, parses, and deduplicates the filing rows for one quarter.
pub async fn load_quarter_rows(
    client: &HttpClient,
    data_dir: &Path,
    archive_base: &str,
    year: i32,
    quarter: u8,
    force: bool,
) -> Result<Vec<FilingRow>> {
    let text = fetch_master_index(client, data_dir, archive_base, year, quarter, force).await?;
    let rows = parser::parse_master_index(&text)?;
    Ok(parser::dedup_by_accession(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_index_url_matches_archive_layout() {
        assert_eq!(
            master_index_url("https://www.sec.gov/Archives/edgar", 2024, 1),
            "https://www.sec.gov/Archives/edgar/full-index/2024/QTR1/master.idx"
        );
    }
}
