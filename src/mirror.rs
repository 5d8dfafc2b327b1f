//! Mirror-tar acquisition path: an external collaborator's pre-packaged tar
//! endpoint, reached with the same scheduling/idempotence shape as the
//! regular FilingFetcher but bypassing folder enumeration entirely.

use crate::error::Result;
use crate::fetcher::{FilingResult, FilingStatus};
use crate::index::FilingRow;
use crate::manifest::{Manifest, ManifestEntry};
use crate::storage;
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::warn;

const STRATEGY: &str = "index_tar";

fn mirror_url(mirror_base: &str, accession_no_dash_zpad18: &str) -> String {
    format!("{mirror_base}/{accession_no_dash_zpad18}.tar")
}

#[derive(Clone)]
pub struct MirrorClient {
    client: reqwest::Client,
    user_agent: String,
    api_key: Option<String>,
    data_dir: PathBuf,
    mirror_base: String,
}

impl MirrorClient {
    pub fn new(user_agent: String, api_key: Option<String>, data_dir: PathBuf, mirror_base: String) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            user_agent,
            api_key,
            data_dir,
            mirror_base,
        })
    }

    /// Downloads one accession's pre-packaged tar, writing it atomically at
    /// the tar tree's canonical path and recording a manifest entry with
    /// strategy `index_tar`. Idempotent: an existing artifact with a matching
    /// manifest entry short-circuits to `skipped`.
    pub async fn fetch_one(&self, row: &FilingRow, manifest: &Arc<Mutex<Manifest>>) -> FilingResult {
        let accession = row.accession();
        let final_tar = storage::filing_tar_path(&self.data_dir, &row.form_type, &row.cik, &accession);

        {
            let manifest = manifest.lock().await;
            if let Some(entry) = manifest.get(&accession) {
                if entry.strategy == STRATEGY && final_tar.exists() {
                    return FilingResult {
                        accession,
                        cik: row.cik.clone(),
                        form_type: row.form_type.clone(),
                        date_filed: row.filing_date.to_string(),
                        status: FilingStatus::Skipped,
                        error: None,
                        output_path: Some(final_tar),
                    };
                }
            }
        }

        match self.download_and_commit(row, &final_tar).await {
            Ok(()) => {
                manifest.lock().await.upsert(ManifestEntry {
                    accession: accession.clone(),
                    form_type: row.form_type.clone(),
                    cik: row.cik.clone(),
                    date_filed: row.filing_date.to_string(),
                    strategy: STRATEGY.to_string(),
                });
                FilingResult {
                    accession,
                    cik: row.cik.clone(),
                    form_type: row.form_type.clone(),
                    date_filed: row.filing_date.to_string(),
                    status: FilingStatus::Downloaded,
                    error: None,
                    output_path: Some(final_tar),
                }
            }
            Err(err) => {
                warn!(accession = %accession, error = %err, "mirror tar download failed");
                let staging = storage::staging_tar_path(&final_tar);
                let _ = tokio::fs::remove_file(&staging).await;
                FilingResult {
                    accession,
                    cik: row.cik.clone(),
                    form_type: row.form_type.clone(),
                    date_filed: row.filing_date.to_string(),
                    status: FilingStatus::Error,
                    error: Some(err.to_string()),
                    output_path: None,
                }
            }
        }
    }

    async fn download_and_commit(&self, row: &FilingRow, final_tar: &std::path::Path) -> Result<()> {
        let accession_no_dash_zpad18 = format!("{:0>18}", row.accession_no_dash());
        let url = mirror_url(&self.mirror_base, &accession_no_dash_zpad18);

        let mut request = self.client.get(&url).header(USER_AGENT, &self.user_agent);
        if let Some(key) = &self.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {key}"));
        }
        let response = request.send().await?;
        let response = response.error_for_status()?;
        let bytes = response.bytes().await?;

        if let Some(parent) = final_tar.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = storage::staging_tar_path(final_tar);
        tokio::fs::write(&staging, &bytes).await?;
        if final_tar.exists() {
            tokio::fs::remove_file(final_tar).await?;
        }
        tokio::fs::rename(&staging, final_tar).await?;
        Ok(())
    }

    /// Runs the mirror path over every row with bounded parallelism (default
    /// concurrency 20 by default), then saves the manifest. Unconditionally
    /// clears `{data}/index/master/{year}/QTR{q}/` once the run completes,
    /// matching the master-index-driven path's "clear the cache when the
    /// quarter is done" behavior.
    pub async fn run_quarter(
        &self,
        rows: &[FilingRow],
        manifest: Arc<Mutex<Manifest>>,
        concurrency: usize,
        year: i32,
        quarter: u8,
        observer: Option<Arc<dyn crate::scheduler::ProgressObserver>>,
    ) -> Result<Vec<FilingResult>> {
        let results = self.run_rows(rows, manifest, concurrency, observer).await?;

        let quarter_dir = storage::quarter_index_dir(&self.data_dir, year, quarter);
        let _ = tokio::fs::remove_dir_all(&quarter_dir).await;

        Ok(results)
    }

    /// Runs the mirror path over every row with bounded parallelism, then
    /// saves the manifest. Does not touch the quarter-index cache: used
    /// directly by callers (e.g. the single-entity lookup) that never
    /// populated it in the first place.
    pub async fn run_rows(
        &self,
        rows: &[FilingRow],
        manifest: Arc<Mutex<Manifest>>,
        concurrency: usize,
        observer: Option<Arc<dyn crate::scheduler::ProgressObserver>>,
    ) -> Result<Vec<FilingResult>> {
        let total = rows.len();
        if let Some(obs) = &observer {
            obs.notify(0, total, None, 0);
        }

        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let this = Arc::new(self.clone());
        let progress = Arc::new(Mutex::new((0usize, 0usize)));
        let mut tasks = Vec::with_capacity(rows.len());

        for row in rows.iter().cloned() {
            let semaphore = semaphore.clone();
            let manifest = manifest.clone();
            let this = this.clone();
            let progress = progress.clone();
            let observer = observer.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");

                {
                    let mut p = progress.lock().await;
                    p.1 += 1;
                    if let Some(obs) = &observer {
                        obs.notify(p.0, total, None, p.1);
                    }
                }

                let result = this.fetch_one(&row, &manifest).await;

                {
                    let mut p = progress.lock().await;
                    p.1 -= 1;
                    p.0 += 1;
                    if let Some(obs) = &observer {
                        obs.notify(p.0, total, Some(&result), p.1);
                    }
                }

                result
            }));
        }

        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            results.push(task.await.expect("mirror task panicked"));
        }

        manifest.lock().await.save_atomic().await?;
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_url_matches_published_endpoint() {
        assert_eq!(
            mirror_url("https://sec-library.tar.datamule.xyz", "000100004524000001"),
            "https://sec-library.tar.datamule.xyz/000100004524000001.tar"
        );
    }
}
