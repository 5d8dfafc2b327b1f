//! Parses the pipe-delimited quarterly master index into typed [`FilingRow`]s
//! The state machine mirrors the publisher's own index format exactly:
//! a run of free-text header lines, the literal column header, a dash rule,
//! then data.

use crate::error::{FetchError, Result};
use chrono::NaiveDate;

const HEADER_LINE: &str = "CIK|Company Name|Form Type|Date Filed|Filename";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilingRow {
    pub cik: String,
    pub company_name: String,
    pub form_type: String,
    pub filing_date: NaiveDate,
    pub archive_path: String,
}

impl FilingRow {
    /// The accession number, e.g. `0001000045-24-000001`, taken from the
    /// archive path's basename with the `.txt` suffix removed.
    pub fn accession(&self) -> String {
        self.archive_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.archive_path)
            .trim_end_matches(".txt")
            .to_string()
    }

    pub fn accession_no_dash(&self) -> String {
        self.accession().replace('-', "")
    }
}

fn zero_pad_cik(raw: &str) -> String {
    format!("{:0>10}", raw.trim())
}

enum Mode {
    Preamble,
    SeenHeader,
    Data,
}

/// Parses master-index text into rows, in input order, without deduplicating.
pub fn parse_master_index(text: &str) -> Result<Vec<FilingRow>> {
    let mut mode = Mode::Preamble;
    let mut rows = Vec::new();

    for line in text.lines() {
        match mode {
            Mode::Preamble => {
                if line.trim() == HEADER_LINE {
                    mode = Mode::SeenHeader;
                }
            }
            Mode::SeenHeader => {
                if line.trim_start().starts_with("----") {
                    mode = Mode::Data;
                }
                // Any other line here is unexpected preamble noise; original
                // feeds never emit one, so we simply keep waiting for the rule.
            }
            Mode::Data => {
                if line.trim().is_empty() {
                    continue;
                }
                let fields: Vec<&str> = line.split('|').collect();
                if fields.len() != 5 {
                    return Err(FetchError::MasterIndexParse(format!(
                        "expected 5 pipe-delimited fields, got {}: {line:?}",
                        fields.len()
                    )));
                }
                let filing_date = NaiveDate::parse_from_str(fields[3].trim(), "%Y-%m-%d")
                    .map_err(|e| FetchError::MasterIndexParse(format!("bad date {:?}: {e}", fields[3])))?;
                rows.push(FilingRow {
                    cik: zero_pad_cik(fields[0]),
                    company_name: fields[1].trim().to_string(),
                    form_type: fields[2].trim().to_string(),
                    filing_date,
                    archive_path: fields[4].trim().to_string(),
                });
            }
        }
    }

    if rows.is_empty() {
        return Err(FetchError::MasterIndexParse(
            "no data rows found (header/dash-rule never encountered, or zero rows)".to_string(),
        ));
    }

    Ok(rows)
}

/// Keeps the first occurrence of each accession, preserving input order.
pub fn dedup_by_accession(rows: Vec<FilingRow>) -> Vec<FilingRow> {
    let mut seen = std::collections::HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.accession()))
        .collect()
}
