//! Pure selection logic over parsed filing rows.

use crate::index::FilingRow;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct FilingFilter {
    pub forms: HashSet<String>,
    pub include_amended: bool,
    /// 10-digit zero-padded CIKs. Empty means "no filter".
    pub entity_ids: HashSet<String>,
}

impl FilingFilter {
    pub fn new(forms: impl IntoIterator<Item = String>, include_amended: bool) -> Self {
        Self {
            forms: forms.into_iter().collect(),
            include_amended,
            entity_ids: HashSet::new(),
        }
    }

    pub fn with_entity_ids(mut self, entity_ids: impl IntoIterator<Item = String>) -> Self {
        self.entity_ids = entity_ids.into_iter().collect();
        self
    }

    pub fn matches(&self, row: &FilingRow) -> bool {
        if !self.forms.contains(&row.form_type) {
            return false;
        }
        if row.form_type.contains("/A") && !self.include_amended {
            return false;
        }
        if !self.entity_ids.is_empty() && !self.entity_ids.contains(&row.cik) {
            return false;
        }
        true
    }

    pub fn select<'a>(&self, rows: &'a [FilingRow]) -> Vec<&'a FilingRow> {
        rows.iter().filter(|row| self.matches(row)).collect()
    }
}
