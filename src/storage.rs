//! Computes canonical on-disk paths from filing metadata.

use std::path::{Path, PathBuf};

/// Strips whitespace, replaces `/` with `_`, and removes internal whitespace:
/// `10-Q/A` -> `10-Q_A`.
pub fn form_dir_name(form_type: &str) -> String {
    form_type
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '/' { '_' } else { c })
        .collect()
}

/// `{data}/filings/{form_dir}/{group_label or cik10}/{accession}`
pub fn filing_dir(data_dir: &Path, form_type: &str, cik10: &str, accession: &str, group_label: Option<&str>) -> PathBuf {
    data_dir
        .join("filings")
        .join(form_dir_name(form_type))
        .join(group_label.unwrap_or(cik10))
        .join(accession)
}

/// `{data}/filings_tar/{form_dir}/{cik10}/{accession}.tar`
///
/// The tar tree always keys by `cik10`, not the group label: the tar path
/// must be independently derivable from a `ManifestEntry` (which stores only
/// the cik), so it cannot depend on output of `EntityResolver` at read time.
pub fn filing_tar_path(data_dir: &Path, form_type: &str, cik10: &str, accession: &str) -> PathBuf {
    data_dir
        .join("filings_tar")
        .join(form_dir_name(form_type))
        .join(cik10)
        .join(format!("{accession}.tar"))
}

pub fn staging_dir(dir: &Path) -> PathBuf {
    let mut tmp = dir.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

pub fn staging_tar_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

pub fn quarter_index_dir(data_dir: &Path, year: i32, quarter: u8) -> PathBuf {
    data_dir
        .join("index")
        .join("master")
        .join(year.to_string())
        .join(format!("QTR{quarter}"))
}

pub fn manifest_path(data_dir: &Path) -> PathBuf {
    data_dir.join("_state").join("manifest.json")
}

pub fn form_types_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config").join("form_types.json")
}
