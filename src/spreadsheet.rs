//! The generated workbook and its delivery to the local file system.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::info;

/// A workbook fetched from `GET /download/{file_id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spreadsheet {
    /// Name to save under; already stripped of any directory components.
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Spreadsheet {
    /// Save into `dir`, creating it if needed.
    ///
    /// Writes to a sibling `.tmp` file first and renames it into place so a
    /// failed write never leaves a truncated workbook behind.
    pub async fn save_to(&self, dir: impl AsRef<Path>) -> std::io::Result<PathBuf> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;

        let path = dir.join(&self.filename);
        let tmp_path = dir.join(format!("{}.tmp", self.filename));
        tokio::fs::write(&tmp_path, &self.bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e);
        }

        info!("Saved spreadsheet to {} ({} bytes)", path.display(), self.bytes.len());
        Ok(path)
    }
}

static RE_FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)filename\s*=\s*"?([^";]+)"?"#).unwrap());

/// Filename for a downloaded workbook.
///
/// Taken from the `filename=` token of a `Content-Disposition` header (quoted
/// or not), else `{file_id}.xlsx`. Directory components are dropped so a
/// hostile header cannot write outside the output directory.
pub fn resolve_filename(content_disposition: Option<&str>, file_id: &str) -> String {
    content_disposition
        .and_then(|header| RE_FILENAME.captures(header))
        .and_then(|caps| sanitize(caps[1].trim()))
        .unwrap_or_else(|| format!("{file_id}.xlsx"))
}

fn sanitize(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next()?.trim();
    match base {
        "" | "." | ".." => None,
        _ => Some(base.to_string()),
    }
}
