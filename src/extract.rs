//! Raw text extraction and upload naming.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, TimeZone};
use tokio::process::Command;

/// Extracts UTF-8 text from a document on disk.
///
/// `.txt` and `.md` files are read as-is; everything else goes through
/// `pdftotext -enc UTF-8 <path> -`.
pub async fn extract_raw_text(path: &Path) -> Result<String> {
    if is_plain_text(path) {
        return tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()));
    }

    let output = Command::new("pdftotext")
        .arg("-enc")
        .arg("UTF-8")
        .arg(path)
        .arg("-")
        .output()
        .await
        .context("failed to run pdftotext (is poppler-utils installed?)")?;
    if !output.status.success() {
        bail!(
            "pdftotext exited with {} for {}: {}",
            output.status,
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn is_plain_text(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("txt") || ext.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}

/// Stored name for an upload: `YYYYMMDD_HHMMSS__<name>`.
pub fn timestamped_name(original: &str) -> String {
    timestamped_name_at(original, Local::now())
}

fn timestamped_name_at<Tz: TimeZone>(original: &str, at: DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}__{}", at.format("%Y%m%d_%H%M%S"), file_name_only(original))
}

/// Strips directory components a client may have put in an upload name.
pub fn file_name_only(original: &str) -> String {
    let name = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original)
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        "upload".to_string()
    } else {
        name.to_string()
    }
}

/// Writes an uploaded payload under `dir` with a timestamped name and
/// returns the stored path.
pub async fn save_upload(dir: &Path, original: &str, bytes: &[u8]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(timestamped_name(original));
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn plain_text_is_read_directly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello\tworld\n").unwrap();
        assert_eq!(extract_raw_text(&path).await.unwrap(), "hello\tworld\n");
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(extract_raw_text(&dir.path().join("gone.md")).await.is_err());
    }

    #[test]
    fn names_carry_a_sortable_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(timestamped_name_at("report.pdf", at), "20240309_070501__report.pdf");
    }

    #[test]
    fn upload_names_lose_directories() {
        assert_eq!(file_name_only("../../etc/passwd"), "passwd");
        assert_eq!(file_name_only("C:\\docs\\a.pdf"), "a.pdf");
        assert_eq!(file_name_only(".."), "upload");
    }

    #[tokio::test]
    async fn uploads_land_in_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_upload(&dir.path().join("pdfs"), "a.txt", b"x y")
            .await
            .unwrap();
        assert!(path.starts_with(dir.path()));
        assert!(path.to_string_lossy().ends_with("__a.txt"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "x y");
    }
}
