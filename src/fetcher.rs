//! Per-filing acquisition: lists the remote folder, selects files, downloads
//! them, and commits the result atomically.

use crate::config::OutputMode;
use crate::error::{FetchError, Result};
use crate::http_client::HttpClient;
use crate::index::FilingRow;
use crate::manifest::{Manifest, ManifestEntry};
use crate::storage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilingResult {
    pub accession: String,
    pub cik: String,
    pub form_type: String,
    pub date_filed: String,
    pub status: FilingStatus,
    pub error: Option<String>,
    pub output_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilingStatus {
    Downloaded,
    Skipped,
    Error,
}

#[derive(Deserialize)]
struct FolderListing {
    directory: FolderDirectory,
}

#[derive(Deserialize)]
struct FolderDirectory {
    item: Vec<FolderItem>,
}

#[derive(Deserialize)]
struct FolderItem {
    name: Option<serde_json::Value>,
}

fn folder_base_url(archive_base: &str, cik: &str, accession_no_dash: &str) -> String {
    let numeric_cik: u64 = cik.parse().unwrap_or(0);
    format!("{archive_base}/data/{numeric_cik}/{accession_no_dash}/")
}

/// Extracts non-empty string file names from the folder listing payload,
/// failing on anything malformed (non-object payload, missing array, or a
/// member whose `name` isn't a non-empty string).
fn extract_file_names(listing: &FolderListing) -> Result<Vec<String>> {
    let mut names = Vec::with_capacity(listing.directory.item.len());
    for item in &listing.directory.item {
        match &item.name {
            Some(serde_json::Value::String(s)) if !s.is_empty() => names.push(s.clone()),
            _ => {
                return Err(FetchError::FolderListingMalformed(
                    "directory.item entries must have a non-empty string name".to_string(),
                ));
            }
        }
    }
    Ok(names)
}

fn matches_extensions(name: &str, extensions: &[String]) -> bool {
    let lower = name.to_lowercase();
    extensions.iter().any(|ext| lower.ends_with(ext.as_str()))
}

pub struct FilingFetcher {
    client: HttpClient,
    data_dir: PathBuf,
    archive_base: String,
    output_mode: OutputMode,
    extensions: Vec<String>,
    group_label: Option<String>,
}

impl FilingFetcher {
    pub fn new(
        client: HttpClient,
        data_dir: PathBuf,
        archive_base: String,
        output_mode: OutputMode,
        extensions: Vec<String>,
        group_label: Option<String>,
    ) -> Result<Self> {
        if extensions.is_empty() {
            return Err(FetchError::EmptyExtensionList);
        }
        Ok(Self {
            client,
            data_dir,
            archive_base,
            output_mode,
            extensions: normalize_extensions(extensions),
            group_label,
        })
    }

    #[instrument(skip(self, manifest), fields(accession = %row.accession(), cik = %row.cik))]
    pub async fn fetch(&self, row: &FilingRow, manifest: &Arc<Mutex<Manifest>>) -> FilingResult {
        match self.fetch_inner(row, manifest).await {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "filing acquisition failed");
                FilingResult {
                    accession: row.accession(),
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

    async fn fetch_inner(&self, row: &FilingRow, manifest: &Arc<Mutex<Manifest>>) -> Result<FilingResult> {
        let accession = row.accession();
        let final_dir = storage::filing_dir(&self.data_dir, &row.form_type, &row.cik, &accession, self.group_label.as_deref());
        let final_tar = storage::filing_tar_path(&self.data_dir, &row.form_type, &row.cik, &accession);
        let staging_dir = storage::staging_dir(&final_dir);
        let staging_tar = storage::staging_tar_path(&final_tar);

        // 1. Idempotence check.
        {
            let manifest = manifest.lock().await;
            if let Some(entry) = manifest.get(&accession) {
                let strategy_matches = entry.strategy == self.output_mode.strategy();
                let artifact_exists = match self.output_mode {
                    OutputMode::Files => final_dir.exists(),
                    OutputMode::Tar => final_tar.exists(),
                };
                if strategy_matches && artifact_exists {
                    return Ok(FilingResult {
                        accession,
                        cik: row.cik.clone(),
                        form_type: row.form_type.clone(),
                        date_filed: row.filing_date.to_string(),
                        status: FilingStatus::Skipped,
                        error: None,
                        output_path: Some(match self.output_mode {
                            OutputMode::Files => final_dir,
                            OutputMode::Tar => final_tar,
                        }),
                    });
                }
            }
        }

        let result = self.stage_and_commit(row, &accession, &final_dir, &final_tar, &staging_dir, &staging_tar).await;

        match result {
            Ok(output_path) => {
                let mut manifest = manifest.lock().await;
                manifest.upsert(ManifestEntry {
                    accession: accession.clone(),
                    form_type: row.form_type.clone(),
                    cik: row.cik.clone(),
                    date_filed: row.filing_date.to_string(),
                    strategy: self.output_mode.strategy().to_string(),
                });
                info!(path = %output_path.display(), "filing downloaded");
                Ok(FilingResult {
                    accession,
                    cik: row.cik.clone(),
                    form_type: row.form_type.clone(),
                    date_filed: row.filing_date.to_string(),
                    status: FilingStatus::Downloaded,
                    error: None,
                    output_path: Some(output_path),
                })
            }
            Err(err) => {
                let _ = tokio::fs::remove_dir_all(&staging_dir).await;
                let _ = tokio::fs::remove_file(&staging_tar).await;
                Err(err)
            }
        }
    }

    async fn stage_and_commit(
        &self,
        row: &FilingRow,
        accession: &str,
        final_dir: &std::path::Path,
        final_tar: &std::path::Path,
        staging_dir: &std::path::Path,
        staging_tar: &std::path::Path,
    ) -> Result<PathBuf> {
        // 2. Stage reset.
        let _ = tokio::fs::remove_dir_all(staging_dir).await;
        let _ = tokio::fs::remove_file(staging_tar).await;
        tokio::fs::create_dir_all(staging_dir).await?;

        // 3. Enumerate.
        let accession_no_dash = row.accession_no_dash();
        let base_url = folder_base_url(&self.archive_base, &row.cik, &accession_no_dash);
        let listing: FolderListing = self.client.get_json(&format!("{base_url}index.json")).await?;
        let names = extract_file_names(&listing)?;

        // 4. Select.
        let selected: Vec<String> = names.into_iter().filter(|name| matches_extensions(name, &self.extensions)).collect();
        if selected.is_empty() {
            return Err(FetchError::NoMatchingFiles {
                accession: accession.to_string(),
            });
        }

        // 5. Download.
        for name in &selected {
            let bytes = self.client.get_bytes(&format!("{base_url}{name}")).await?;
            tokio::fs::write(staging_dir.join(name), bytes).await?;
        }

        // 6. Commit.
        match self.output_mode {
            OutputMode::Files => {
                if let Some(parent) = final_dir.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                if final_dir.exists() {
                    tokio::fs::remove_dir_all(final_dir).await?;
                }
                tokio::fs::rename(staging_dir, final_dir).await?;
                Ok(final_dir.to_path_buf())
            }
            OutputMode::Tar => {
                let staging_dir = staging_dir.to_path_buf();
                let staging_tar = staging_tar.to_path_buf();
                let accession = accession.to_string();
                let cik = row.cik.clone();
                let form_type = row.form_type.clone();
                let date_filed = row.filing_date.to_string();
                tokio::task::spawn_blocking(move || {
                    crate::tar_packager::write_tar(&staging_tar, &staging_dir, &accession, &cik, &form_type, &date_filed, &selected)
                })
                .await
                .expect("tar writer task panicked")?;
                if final_tar.exists() {
                    tokio::fs::remove_file(final_tar).await?;
                }
                tokio::fs::rename(&staging_tar, final_tar).await?;
                tokio::fs::remove_dir_all(&staging_dir).await?;
                Ok(final_tar.to_path_buf())
            }
        }
    }
}

/// Lower-cases, leading-dots, sorts, and deduplicates the requested
/// extensions: `["XML","htm"]` -> `[".htm",".xml"]`.
pub fn normalize_extensions(extensions: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = extensions
        .into_iter()
        .map(|e| {
            let lower = e.to_lowercase();
            if lower.starts_with('.') {
                lower
            } else {
                format!(".{lower}")
            }
        })
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}
