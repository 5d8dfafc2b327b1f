//! Drives bounded-parallel acquisition over a filtered row list, aggregating
//! progress and owning the quarter-index cache cleanup policy.

use crate::error::Result;
use crate::fetcher::{FilingFetcher, FilingResult, FilingStatus};
use crate::index::FilingRow;
use crate::manifest::Manifest;
use crate::storage;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, instrument};

/// Observer interface for progress notifications. Absence (a no-op closure)
/// is the default.
pub trait ProgressObserver: Send + Sync {
    fn notify(&self, completed: usize, total: usize, last_result: Option<&FilingResult>, in_progress: usize);
}

impl<F: Fn(usize, usize, Option<&FilingResult>, usize) + Send + Sync> ProgressObserver for F {
    fn notify(&self, completed: usize, total: usize, last_result: Option<&FilingResult>, in_progress: usize) {
        self(completed, total, last_result, in_progress)
    }
}

struct Progress {
    completed: usize,
    in_progress: usize,
    total: usize,
}

pub struct Scheduler {
    concurrency: usize,
}

impl Scheduler {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    /// Runs `fetcher` over every row with bounded parallelism, then saves the
    /// manifest and applies the quarter-cache cleanup policy.
    #[instrument(skip(self, rows, fetcher, manifest, data_dir, observer), fields(year, quarter, total = rows.len()))]
    pub async fn run_quarter(
        &self,
        rows: &[FilingRow],
        fetcher: Arc<FilingFetcher>,
        manifest: Arc<Mutex<Manifest>>,
        data_dir: &Path,
        year: i32,
        quarter: u8,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> Result<Vec<FilingResult>> {
        let total = rows.len();
        if let Some(obs) = &observer {
            obs.notify(0, total, None, 0);
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let progress = Arc::new(Mutex::new(Progress {
            completed: 0,
            in_progress: 0,
            total,
        }));

        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows.iter().cloned() {
            let semaphore = semaphore.clone();
            let fetcher = fetcher.clone();
            let manifest = manifest.clone();
            let progress = progress.clone();
            let observer = observer.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");

                {
                    let mut p = progress.lock().await;
                    p.in_progress += 1;
                    if let Some(obs) = &observer {
                        obs.notify(p.completed, p.total, None, p.in_progress);
                    }
                }

                let result = fetcher.fetch(&row, &manifest).await;

                {
                    let mut p = progress.lock().await;
                    p.in_progress -= 1;
                    p.completed += 1;
                    if let Some(obs) = &observer {
                        obs.notify(p.completed, p.total, Some(&result), p.in_progress);
                    }
                }

                result
            }));
        }

        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            results.push(task.await.expect("filing task panicked"));
        }

        manifest.lock().await.save_atomic().await?;

        let any_errors = results.iter().any(|r| r.status == FilingStatus::Error);
        let quarter_dir = storage::quarter_index_dir(data_dir, year, quarter);
        if !any_errors {
            debug!(year, quarter, "all filings succeeded, removing quarter index cache");
            let _ = tokio::fs::remove_dir_all(&quarter_dir).await;
        } else {
            info!(year, quarter, "run had errors, retaining quarter index cache for retry");
        }

        Ok(results)
    }
}
