//! Local preview handles for selected images.
//!
//! A preview is a temporary copy of the selected image that a front end can
//! open or display before upload. The handle owns the copy: dropping it
//! deletes the file, so releasing a preview is just letting go of the value.
//! [`PreviewTracker`] counts live handles so callers (and tests) can verify
//! that at most one exists per selection.

use crate::selection::SelectedFile;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempPath;
use tracing::debug;

/// Creates preview handles and counts the ones still alive.
#[derive(Debug, Clone, Default)]
pub struct PreviewTracker {
    live: Arc<AtomicUsize>,
    created: Arc<AtomicUsize>,
}

impl PreviewTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a temporary copy of `file` and return the handle owning it.
    pub fn create(&self, file: &SelectedFile) -> std::io::Result<PreviewHandle> {
        let suffix = Path::new(file.name())
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut tmp = tempfile::Builder::new()
            .prefix("batchsheet-preview-")
            .suffix(&suffix)
            .tempfile()?;
        tmp.write_all(file.bytes())?;
        tmp.flush()?;
        let path = tmp.into_temp_path();

        self.live.fetch_add(1, Ordering::SeqCst);
        self.created.fetch_add(1, Ordering::SeqCst);
        debug!("Created preview {}", path.display());

        Ok(PreviewHandle {
            path,
            live: Arc::clone(&self.live),
        })
    }

    /// Handles created and not yet dropped.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Handles created over the tracker's lifetime.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

/// A temporary image copy; deleted when dropped.
#[derive(Debug)]
pub struct PreviewHandle {
    path: TempPath,
    live: Arc<AtomicUsize>,
}

impl PreviewHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        debug!("Released preview {}", self.path.display());
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}
