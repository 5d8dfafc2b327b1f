//! Persistent record of completed filings, keyed by accession.
//!
//! A flat JSON map from accession to entry, written in the same
//! write-to-temp-then-rename style as the rest of this crate's on-disk
//! state, so a crash mid-write never leaves a truncated manifest.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    pub accession: String,
    pub form_type: String,
    pub cik: String,
    pub date_filed: String,
    pub strategy: String,
}

pub struct Manifest {
    path: PathBuf,
    entries: HashMap<String, ManifestEntry>,
}

impl Manifest {
    /// Loads the manifest from `path`, tolerating a missing file as empty.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, entries })
    }

    pub fn get(&self, accession: &str) -> Option<&ManifestEntry> {
        self.entries.get(accession)
    }

    pub fn upsert(&mut self, entry: ManifestEntry) {
        self.entries.insert(entry.accession.clone(), entry);
    }

    /// Writes the full manifest to a temporary path and renames it over the
    /// live file, so a crash mid-write never leaves a truncated manifest.
    pub async fn save_atomic(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = crate::storage::staging_tar_path(&self.path);
        let json = serde_json::to_string_pretty(&self.entries)?;
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
