//! The user's chosen input document.

use crate::error::ClientError;
use std::path::Path;

const OCTET_STREAM: &str = "application/octet-stream";

/// A document selected for upload: bytes plus the metadata shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    name: String,
    media_type: String,
    bytes: Vec<u8>,
}

impl SelectedFile {
    /// Build a selection from in-memory bytes.
    ///
    /// The media type is sniffed from the content, falling back to the file
    /// extension when the bytes are not recognised.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let media_type = sniff_media_type(&name, &bytes).to_string();
        Self {
            name,
            media_type,
            bytes,
        }
    }

    /// Build a selection with an explicitly declared media type.
    pub fn with_media_type(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Read a file from disk.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ClientError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => ClientError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => ClientError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::from_bytes(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Whether a local preview can be shown for this file.
    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }

    /// Size in megabytes with two decimals, e.g. `"1.50 MB"`.
    pub fn display_size(&self) -> String {
        format!("{:.2} MB", self.bytes.len() as f64 / 1024.0 / 1024.0)
    }

    /// Short upper-case type label, e.g. `PDF`, `PNG`; `FILE` when unknown.
    pub fn type_badge(&self) -> String {
        match self.media_type.split_once('/') {
            Some((_, sub)) if !sub.is_empty() && self.media_type != OCTET_STREAM => {
                sub.to_uppercase()
            }
            _ => "FILE".to_string(),
        }
    }
}

fn sniff_media_type(name: &str, bytes: &[u8]) -> &'static str {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type();
    }

    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("pdf") => "application/pdf",
        _ => OCTET_STREAM,
    }
}
