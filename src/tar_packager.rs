//! Writes a filing's selected files into a single tar archive, and safely
//! extracts externally produced tars back into a directory tree.

use crate::error::Result;
use serde::Serialize;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

#[derive(Serialize)]
struct TarMetadata<'a> {
    accession: &'a str,
    cik: &'a str,
    form_type: &'a str,
    date_filed: &'a str,
    files: &'a [String],
}

/// Writes `metadata.json` followed by each named file read from `source_dir`,
/// flat at the archive's top level, to `dest_path`. Uncompressed, exact sizes.
pub fn write_tar(
    dest_path: &Path,
    source_dir: &Path,
    accession: &str,
    cik: &str,
    form_type: &str,
    date_filed: &str,
    files: &[String],
) -> Result<()> {
    if let Some(parent) = dest_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(dest_path)?;
    let mut builder = tar::Builder::new(file);

    let metadata = TarMetadata {
        accession,
        cik,
        form_type,
        date_filed,
        files,
    };
    let metadata_bytes = serde_json::to_vec_pretty(&metadata)?;
    let mut header = tar::Header::new_gnu();
    header.set_size(metadata_bytes.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, "metadata.json", metadata_bytes.as_slice())?;

    for name in files {
        let path = source_dir.join(name);
        let mut f = std::fs::File::open(&path)?;
        let len = f.metadata()?.len();
        let mut header = tar::Header::new_gnu();
        header.set_size(len);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, &mut f)?;
    }

    builder.into_inner()?.sync_all()?;
    Ok(())
}

/// An accession directory component is a purely numeric path segment of
/// length 18 or 20 (dash-free accession, optionally zero-padded further).
fn looks_like_accession_dir(segment: &str) -> bool {
    (segment.len() == 18 || segment.len() == 20) && segment.chars().all(|c| c.is_ascii_digit())
}

/// Extracts `tar_path` into `dest_dir`, refusing any member that would escape
/// `dest_dir` after normalization, and stripping one leading accession-number
/// directory component when the archive was produced with one.
pub fn safe_extract(tar_path: &Path, dest_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dest_dir)?;
    let dest_dir = dest_dir.canonicalize().unwrap_or_else(|_| dest_dir.to_path_buf());

    let file = std::fs::File::open(tar_path)?;
    let mut archive = tar::Archive::new(file);

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let raw_path = entry.path()?.into_owned();
        let relative = strip_leading_accession_dir(&raw_path);

        let mut normalized = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => normalized.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    continue;
                }
            }
        }
        if normalized.as_os_str().is_empty() {
            continue;
        }

        let target = dest_dir.join(&normalized);
        let resolved_parent = target
            .parent()
            .map(|p| {
                std::fs::create_dir_all(p).ok();
                p.canonicalize().unwrap_or_else(|_| p.to_path_buf())
            })
            .unwrap_or_else(|| dest_dir.clone());
        if !resolved_parent.starts_with(&dest_dir) {
            continue;
        }

        let mut buf = Vec::new();
        entry.read_to_end(&mut buf)?;
        std::fs::write(&target, buf)?;
    }

    Ok(())
}

fn strip_leading_accession_dir(path: &Path) -> PathBuf {
    let mut components = path.components();
    let mut peekable = components.clone().peekable();
    if let Some(Component::Normal(first)) = peekable.next() {
        if peekable.peek().is_some() {
            if let Some(first_str) = first.to_str() {
                if looks_like_accession_dir(&first_str.replace('-', "")) {
                    components.next();
                    return components.as_path().to_path_buf();
                }
            }
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_metadata_then_files_flat() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doc.xml"), b"<xml/>").unwrap();

        let tar_path = dir.path().join("out.tar");
        write_tar(
            &tar_path,
            dir.path(),
            "0001000045-24-000001",
            "0001000045",
            "10-Q",
            "2024-01-02",
            &["doc.xml".to_string()],
        )
        .unwrap();

        let file = std::fs::File::open(&tar_path).unwrap();
        let mut archive = tar::Archive::new(file);
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["metadata.json".to_string(), "doc.xml".to_string()]);
    }

    #[test]
    fn strips_leading_accession_directory() {
        let path = Path::new("000100004524000001/doc.xml");
        assert_eq!(strip_leading_accession_dir(path), Path::new("doc.xml"));
    }

    #[test]
    fn leaves_non_accession_paths_untouched() {
        let path = Path::new("doc.xml");
        assert_eq!(strip_leading_accession_dir(path), Path::new("doc.xml"));
    }

    #[test]
    fn safe_extract_rejects_traversal() {
        let src_dir = tempfile::tempdir().unwrap();
        let tar_path = src_dir.path().join("evil.tar");
        {
            let file = std::fs::File::create(&tar_path).unwrap();
            let mut builder = tar::Builder::new(file);
            let data = b"pwned";
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_cksum();
            builder.append_data(&mut header, "../../etc/evil.txt", &data[..]).unwrap();
            builder.finish().unwrap();
        }

        let dest = tempfile::tempdir().unwrap();
        safe_extract(&tar_path, dest.path()).unwrap();
        assert!(!dest.path().parent().unwrap().join("etc").exists());
    }
}
