//! FormCatalog: validates requested form types against an accepted set that
//! is seeded on first access from a packaged default.

use crate::error::{FetchError, Result};
use crate::storage;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

const PACKAGED_DEFAULT: &str = include_str!("resources/form_types.json");
const MAX_UNKNOWN_SAMPLE: usize = 12;

#[derive(Serialize, Deserialize)]
struct FormTypesFile {
    accepted_form_types: Vec<String>,
}

pub struct FormCatalog {
    accepted: HashSet<String>,
}

impl FormCatalog {
    /// Loads the accepted-form list from `{data}/config/form_types.json`,
    /// writing the packaged default there first if it doesn't exist yet.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = storage::form_types_path(data_dir);
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, PACKAGED_DEFAULT)?;
        }
        let text = std::fs::read_to_string(&path)?;
        let parsed: FormTypesFile = serde_json::from_str(&text)?;
        Ok(Self {
            accepted: parsed.accepted_form_types.into_iter().collect(),
        })
    }

    pub fn from_packaged_default() -> Self {
        let parsed: FormTypesFile = serde_json::from_str(PACKAGED_DEFAULT).expect("packaged default is valid json");
        Self {
            accepted: parsed.accepted_form_types.into_iter().collect(),
        }
    }

    /// Non-empty, every requested form must be in the accepted set.
    pub fn validate(&self, forms: &[String]) -> Result<()> {
        if forms.is_empty() {
            return Err(FetchError::UnknownFormTypes {
                unknown: Vec::new(),
                truncated: false,
            });
        }
        let unknown: Vec<String> = forms.iter().filter(|f| !self.accepted.contains(*f)).cloned().collect();
        if !unknown.is_empty() {
            let truncated = unknown.len() > MAX_UNKNOWN_SAMPLE;
            return Err(FetchError::UnknownFormTypes {
                unknown: unknown.into_iter().take(MAX_UNKNOWN_SAMPLE).collect(),
                truncated,
            });
        }
        Ok(())
    }
}
