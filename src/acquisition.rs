//! Top-level facade: resolves the tagged input variant, wires the
//! components together, and exposes the crate's public async API.

use crate::config::{FetchConfig, OutputMode, TarProvider};
use crate::entities::EntityResolver;
use crate::error::{FetchError, Result};
use crate::fetcher::{FilingFetcher, FilingResult, FilingStatus};
use crate::filter::FilingFilter;
use crate::forms::FormCatalog;
use crate::http_client::HttpClient;
use crate::index::{self, FilingRow};
use crate::manifest::Manifest;
use crate::mirror::MirrorClient;
use crate::scheduler::{ProgressObserver, Scheduler};
use crate::storage;
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The tagged input variant: either a quarterly bulk acquisition, or
/// a single latest-filing lookup for one entity. Mixing fields from both
/// shapes is rejected by [`Fetcher::acquire`] as a configuration error.
pub enum Acquisition {
    Quarter {
        year: i32,
        quarter: u8,
        forms: Vec<String>,
    },
    LatestForEntity {
        entity_id: String,
    },
}

pub struct Fetcher {
    config: FetchConfig,
    client: HttpClient,
    form_catalog: FormCatalog,
    entity_resolver: EntityResolver,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = HttpClient::new(&config)?;
        if config.extensions.is_empty() {
            return Err(FetchError::EmptyExtensionList);
        }
        let form_catalog = FormCatalog::load(&config.data_dir)?;
        let entity_resolver = EntityResolver::from_packaged_default();
        Ok(Self {
            config,
            client,
            form_catalog,
            entity_resolver,
        })
    }

    /// Runs one acquisition, optionally restricted to an entity/ticker
    /// allow-set, reporting progress to `observer` if given.
    pub async fn acquire(
        &self,
        input: Acquisition,
        entity_ids: &[String],
        tickers: &[String],
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> Result<Vec<FilingResult>> {
        let resolution = self.entity_resolver.resolve(entity_ids, tickers);

        match input {
            Acquisition::Quarter { year, quarter, forms } => {
                self.form_catalog.validate(&forms)?;
                self.acquire_quarter(year, quarter, &forms, resolution.entity_ids.into_iter().collect(), resolution.group_label, observer)
                    .await
            }
            Acquisition::LatestForEntity { entity_id } => {
                if !entity_ids.is_empty() || !tickers.is_empty() {
                    return Err(FetchError::ConflictingAcquisitionInput);
                }
                let row = self.fetch_latest_row(&entity_id).await?;
                let group_label = Some(crate::entities::normalize_entity_id(&entity_id));
                self.run_rows(&[row], group_label, observer).await
            }
        }
    }

    async fn acquire_quarter(
        &self,
        year: i32,
        quarter: u8,
        forms: &[String],
        entity_ids: Vec<String>,
        group_label: Option<String>,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> Result<Vec<FilingResult>> {
        let rows = index::load_quarter_rows(&self.client, &self.config.data_dir, &self.config.archive_base, year, quarter, false).await?;
        let filter = FilingFilter::new(forms.iter().cloned(), false).with_entity_ids(entity_ids);
        let selected: Vec<FilingRow> = filter.select(&rows).into_iter().cloned().collect();

        let manifest = Arc::new(Mutex::new(Manifest::load(storage::manifest_path(&self.config.data_dir))?));

        if self.config.output_mode == OutputMode::Tar && self.config.tar_provider == TarProvider::DatamuleMirror {
            let mirror = self.build_mirror_client()?;
            return mirror
                .run_quarter(&selected, manifest, self.config.resolved_concurrency(), year, quarter, observer)
                .await;
        }

        let fetcher = Arc::new(FilingFetcher::new(
            self.client.clone(),
            self.config.data_dir.clone(),
            self.config.archive_base.clone(),
            self.config.output_mode,
            self.config.extensions.clone(),
            group_label,
        )?);

        let scheduler = Scheduler::new(self.config.resolved_concurrency());
        scheduler
            .run_quarter(&selected, fetcher, manifest, &self.config.data_dir, year, quarter, observer)
            .await
    }

    fn build_mirror_client(&self) -> Result<MirrorClient> {
        MirrorClient::new(
            self.config.resolve_user_agent()?,
            self.config.resolve_datamule_api_key(),
            self.config.data_dir.clone(),
            self.config.mirror_base.clone(),
        )
    }

    async fn run_rows(&self, rows: &[FilingRow], group_label: Option<String>, observer: Option<Arc<dyn ProgressObserver>>) -> Result<Vec<FilingResult>> {
        let manifest = Arc::new(Mutex::new(Manifest::load(storage::manifest_path(&self.config.data_dir))?));

        if self.config.output_mode == OutputMode::Tar && self.config.tar_provider == TarProvider::DatamuleMirror {
            let mirror = self.build_mirror_client()?;
            return mirror.run_rows(rows, manifest, self.config.resolved_concurrency(), observer).await;
        }

        let fetcher = Arc::new(FilingFetcher::new(
            self.client.clone(),
            self.config.data_dir.clone(),
            self.config.archive_base.clone(),
            self.config.output_mode,
            self.config.extensions.clone(),
            group_label,
        )?);

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(obs) = &observer {
                obs.notify(0, rows.len(), None, 1);
            }
            let result = fetcher.fetch(row, &manifest).await;
            if let Some(obs) = &observer {
                obs.notify(1, rows.len(), Some(&result), 0);
            }
            results.push(result);
        }
        manifest.lock().await.save_atomic().await?;
        Ok(results)
    }

    /// Resolves the single most recent filing for `entity_id` via the entity
    /// submissions JSON, synthesizing a [`FilingRow`] from it.
    async fn fetch_latest_row(&self, entity_id: &str) -> Result<FilingRow> {
        let cik10 = crate::entities::normalize_entity_id(entity_id);
        let url = format!("{}/CIK{cik10}.json", self.config.submissions_base);
        let submission: Submission = self.client.get_json(&url).await?;

        let recent = &submission.filings.recent;
        let idx = 0;
        let accession = recent
            .accession_number
            .get(idx)
            .ok_or_else(|| FetchError::FolderListingMalformed("submissions payload has no recent filings".to_string()))?;
        let form = recent
            .form
            .get(idx)
            .cloned()
            .ok_or_else(|| FetchError::FolderListingMalformed("submissions payload missing form".to_string()))?;
        let date_str = recent
            .filing_date
            .get(idx)
            .cloned()
            .ok_or_else(|| FetchError::FolderListingMalformed("submissions payload missing filing date".to_string()))?;
        let filing_date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
            .map_err(|e| FetchError::FolderListingMalformed(format!("bad filing date {date_str:?}: {e}")))?;

        let accession_no_dash = accession.replace('-', "");
        let numeric_cik: u64 = cik10.parse().unwrap_or(0);
        let archive_path = format!("edgar/data/{numeric_cik}/{accession_no_dash}/{accession}.txt");

        Ok(FilingRow {
            cik: cik10,
            company_name: submission.name.unwrap_or_default(),
            form_type: form,
            filing_date,
            archive_path,
        })
    }
}

#[derive(Deserialize)]
struct Submission {
    name: Option<String>,
    filings: SubmissionFilings,
}

#[derive(Deserialize)]
struct SubmissionFilings {
    recent: RecentFilings,
}

#[derive(Deserialize, Default)]
struct RecentFilings {
    #[serde(rename = "accessionNumber", default)]
    accession_number: Vec<String>,
    #[serde(default)]
    form: Vec<String>,
    #[serde(rename = "filingDate", default)]
    filing_date: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_and_latest_variants_are_distinct() {
        let quarter = Acquisition::Quarter {
            year: 2024,
            quarter: 1,
            forms: vec!["10-Q".to_string()],
        };
        assert!(matches!(quarter, Acquisition::Quarter { .. }));

        let latest = Acquisition::LatestForEntity {
            entity_id: "1000045".to_string(),
        };
        assert!(matches!(latest, Acquisition::LatestForEntity { .. }));
    }

    #[test]
    fn status_downloaded_is_not_error() {
        assert_ne!(FilingStatus::Downloaded, FilingStatus::Error);
    }
}
