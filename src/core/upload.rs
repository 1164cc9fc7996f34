//! Export intake - Accepts a vendor export and yields its CSV content.
//!
//! Only `.csv` and `.zip` uploads are accepted; anything else is rejected before
//! any state changes. Zip archives are expected to hold one CSV, and the first
//! CSV entry is used. The SHA-256 of the CSV content identifies the export for
//! the re-processing guard.

use crate::errors::{Error, Result};
use sha2::{Digest, Sha256};
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Kind of upload, decided by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// Plain CSV export
    Csv,
    /// Zip archive wrapping a CSV export
    Zip,
}

/// CSV content of an accepted upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    /// Name of the uploaded file
    pub file_name: String,
    /// Name of the CSV inside the archive, or the file name for plain CSVs
    pub source_name: String,
    /// Raw CSV bytes
    pub content: Vec<u8>,
    /// Hex-encoded SHA-256 of `content`
    pub content_hash: String,
}

/// Classifies an upload by its extension, case-insensitively.
///
/// # Errors
/// Returns [`Error::UnsupportedFile`] for anything but `.csv` and `.zip`.
pub fn detect_upload_kind(file_name: &str) -> Result<UploadKind> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("csv") => Ok(UploadKind::Csv),
        Some("zip") => Ok(UploadKind::Zip),
        _ => Err(Error::UnsupportedFile {
            file_name: file_name.to_string(),
        }),
    }
}

/// Reads an export from disk.
#[instrument]
pub fn read_export(path: &Path) -> Result<ExportFile> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();
    // Reject before touching the filesystem
    detect_upload_kind(&file_name)?;
    let bytes = std::fs::read(path)?;
    load_export(&file_name, bytes)
}

/// Builds an [`ExportFile`] from uploaded bytes.
pub fn load_export(file_name: &str, bytes: Vec<u8>) -> Result<ExportFile> {
    let (source_name, content) = match detect_upload_kind(file_name)? {
        UploadKind::Csv => (file_name.to_string(), bytes),
        UploadKind::Zip => extract_first_csv(file_name, bytes)?,
    };

    let content_hash = hash_content(&content);
    info!(
        "Accepted export '{}' ({} bytes, source '{}')",
        file_name,
        content.len(),
        source_name
    );

    Ok(ExportFile {
        file_name: file_name.to_string(),
        source_name,
        content,
        content_hash,
    })
}

fn extract_first_csv(file_name: &str, bytes: Vec<u8>) -> Result<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if !entry.is_file() || !entry.name().to_ascii_lowercase().ends_with(".csv") {
            continue;
        }
        let entry_name = entry.name().to_string();
        debug!("Extracting '{}' from '{}'", entry_name, file_name);
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        return Ok((entry_name, content));
    }

    Err(Error::EmptyArchive {
        file_name: file_name.to_string(),
    })
}

/// Hex-encoded SHA-256 of the given bytes
#[must_use]
pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn zip_with(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_detect_upload_kind() {
        assert_eq!(detect_upload_kind("sales.csv").unwrap(), UploadKind::Csv);
        assert_eq!(detect_upload_kind("SALES.CSV").unwrap(), UploadKind::Csv);
        assert_eq!(detect_upload_kind("april.zip").unwrap(), UploadKind::Zip);
    }

    #[test]
    fn test_detect_upload_kind_rejects_other_extensions() {
        for name in ["sales.xlsx", "sales", "csv", "sales.csv.bak"] {
            let result = detect_upload_kind(name);
            assert!(
                matches!(result, Err(Error::UnsupportedFile { .. })),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_load_csv_export() {
        let export = load_export("sales.csv", b"a,b\n1,2\n".to_vec()).unwrap();
        assert_eq!(export.source_name, "sales.csv");
        assert_eq!(export.content, b"a,b\n1,2\n");
        assert_eq!(export.content_hash.len(), 64);
    }

    #[test]
    fn test_load_zip_export_uses_first_csv() {
        let bytes = zip_with(&[
            ("readme.txt", "ignore me"),
            ("report/april.csv", "id,name\n1,Foo\n"),
            ("may.csv", "id,name\n2,Bar\n"),
        ]);

        let export = load_export("bundle.zip", bytes).unwrap();
        assert_eq!(export.file_name, "bundle.zip");
        assert_eq!(export.source_name, "report/april.csv");
        assert_eq!(export.content, b"id,name\n1,Foo\n");
    }

    #[test]
    fn test_load_zip_without_csv() {
        let bytes = zip_with(&[("readme.txt", "nothing here")]);
        let result = load_export("bundle.zip", bytes);
        assert!(matches!(result, Err(Error::EmptyArchive { .. })));
    }

    #[test]
    fn test_same_content_same_hash() {
        let csv = load_export("a.csv", b"x,y\n".to_vec()).unwrap();
        let zipped = load_export("b.zip", zip_with(&[("inner.csv", "x,y\n")])).unwrap();
        assert_eq!(csv.content_hash, zipped.content_hash);
        assert_ne!(csv.content_hash, hash_content(b"x,z\n"));
    }

    #[test]
    fn test_read_export_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        std::fs::write(&path, "productId,productName\n").unwrap();

        let export = read_export(&path).unwrap();
        assert_eq!(export.file_name, "export.csv");

        let rejected = read_export(&dir.path().join("export.pdf"));
        assert!(matches!(rejected, Err(Error::UnsupportedFile { .. })));
    }
}
