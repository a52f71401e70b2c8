//! Run orchestration: one selected file, one upload → extract → download →
//! cleanup sequence at a time.
//!
//! ## State machine
//!
//! ```text
//!            select_file            run                 ┌──▶ Succeeded
//!  Idle ────────────────▶ Selected ─────▶ Running ──────┤
//!   ▲                        ▲                          └──▶ Failed
//!   │        reset           │   select_file                  │
//!   └────────────────────────┴────────────────────────────────┘
//! ```
//!
//! [`Session::run`] takes `&mut self`, so the borrow checker is what keeps a
//! second run from starting while one is in flight.
//!
//! ## Failure policy
//!
//! * Upload and extraction failures, and an `error` string reported by the
//!   backend, end the run in [`RunState::Failed`] with a [`RunError`].
//! * A failed spreadsheet download is logged and recorded as
//!   [`DownloadOutcome::Failed`]; the run still succeeds because the
//!   extracted data is already on screen.
//! * The spreadsheet is fetched only when the backend reports an
//!   `excel_path`; OCR-only runs usually have none.
//! * Cleanup runs only after the spreadsheet was saved. Its failure is
//!   logged and recorded, never shown as the run error, never retried.

use crate::config::ClientConfig;
use crate::error::{ClientError, RunError};
use crate::preview::{PreviewHandle, PreviewTracker};
use crate::progress::{NoopProgressObserver, ProgressTicker, SharedProgressObserver};
use crate::response::{ExtractRequest, ExtractResponse};
use crate::selection::SelectedFile;
use crate::transport::{HttpTransport, Transport};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Visible state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Selected,
    Running,
    Succeeded,
    Failed,
}

/// What happened to the generated spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Saved to this path.
    Saved(PathBuf),
    /// Not attempted: downloads disabled, no workbook generated, or
    /// extraction reported an error.
    Skipped,
    /// Fetching or saving failed; logged only.
    Failed(String),
}

/// What happened to the backend's temporary files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// Backend deleted these files.
    Done(Vec<String>),
    Skipped,
    /// Logged only.
    Failed(String),
}

/// Everything a run produced once extraction answered.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub file_id: String,
    pub response: ExtractResponse,
    pub download: DownloadOutcome,
    pub cleanup: CleanupOutcome,
    pub duration_ms: u64,
}

/// Holds the selection and drives runs against a [`Transport`].
pub struct Session<T: Transport> {
    transport: T,
    config: ClientConfig,
    previews: PreviewTracker,
    observer: SharedProgressObserver,
    state: RunState,
    file: Option<SelectedFile>,
    preview: Option<PreviewHandle>,
    report: Option<RunReport>,
    error: Option<RunError>,
    loading: bool,
    ocr_only: bool,
}

impl Session<HttpTransport> {
    /// Session talking HTTP to `config.base_url`.
    pub fn http(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::new(transport, config))
    }
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            previews: PreviewTracker::new(),
            observer: Arc::new(NoopProgressObserver),
            state: RunState::Idle,
            file: None,
            preview: None,
            report: None,
            error: None,
            loading: false,
            ocr_only: false,
        }
    }

    /// Receive progress-estimate updates while runs are in flight.
    pub fn with_observer(mut self, observer: SharedProgressObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Share a preview tracker, e.g. to count live previews from outside.
    pub fn with_preview_tracker(mut self, previews: PreviewTracker) -> Self {
        self.previews = previews;
        self
    }

    /// Record `file` as the current selection.
    ///
    /// Clears any previous result and error. Image files get a preview
    /// handle; the previous handle is released first.
    pub fn select_file(&mut self, file: SelectedFile) {
        self.preview = None;
        self.report = None;
        self.error = None;

        if file.is_image() {
            match self.previews.create(&file) {
                Ok(handle) => self.preview = Some(handle),
                Err(e) => warn!("Could not create preview for '{}': {}", file.name(), e),
            }
        }

        debug!(
            "Selected '{}' ({}, {} bytes)",
            file.name(),
            file.media_type(),
            file.size()
        );
        self.file = Some(file);
        self.state = RunState::Selected;
    }

    /// Forward `run_ocr_only` on the next extraction.
    pub fn set_ocr_only(&mut self, ocr_only: bool) {
        self.ocr_only = ocr_only;
    }

    /// Upload, extract, then fetch the spreadsheet and clean up.
    ///
    /// Without a selected file this does nothing and returns the current
    /// state. Otherwise returns [`RunState::Succeeded`] or
    /// [`RunState::Failed`]; the preview handle is released either way.
    pub async fn run(&mut self) -> RunState {
        let Some(file) = self.file.as_ref() else {
            debug!("Run requested with no file selected; ignoring");
            return self.state;
        };

        self.state = RunState::Running;
        self.loading = true;
        self.error = None;
        self.report = None;
        info!("Processing '{}'", file.name());

        let mut ticker = ProgressTicker::start(Arc::clone(&self.observer));
        let outcome = execute(&self.transport, &self.config, file, self.ocr_only).await;
        ticker.stop();

        self.loading = false;
        self.preview = None;

        match outcome {
            Ok(report) => {
                info!(
                    "Run complete for file_id={} in {}ms",
                    report.file_id, report.duration_ms
                );
                self.report = Some(report);
                self.state = RunState::Succeeded;
            }
            Err((error, report)) => {
                warn!("Run failed: {}", error);
                self.report = report;
                self.error = Some(error);
                self.state = RunState::Failed;
            }
        }
        self.state
    }

    /// Back to [`RunState::Idle`]: drop selection, preview, result and error.
    pub fn reset(&mut self) {
        self.preview = None;
        self.file = None;
        self.report = None;
        self.error = None;
        self.loading = false;
        self.ocr_only = false;
        self.state = RunState::Idle;
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.preview.as_ref()
    }

    pub fn report(&self) -> Option<&RunReport> {
        self.report.as_ref()
    }

    /// The extraction response of the last run, if extraction answered.
    pub fn response(&self) -> Option<&ExtractResponse> {
        self.report.as_ref().map(|r| &r.response)
    }

    pub fn error(&self) -> Option<&RunError> {
        self.error.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn ocr_only(&self) -> bool {
        self.ocr_only
    }

    pub fn previews(&self) -> &PreviewTracker {
        &self.previews
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

type RunOutcome = Result<RunReport, (RunError, Option<RunReport>)>;

async fn execute<T: Transport>(
    transport: &T,
    config: &ClientConfig,
    file: &SelectedFile,
    ocr_only: bool,
) -> RunOutcome {
    let start = Instant::now();

    // ── Step 1: Upload ───────────────────────────────────────────────────
    let upload = transport
        .submit_file(file)
        .await
        .map_err(|e| (RunError::from(e), None))?;

    // ── Step 2: Extract ──────────────────────────────────────────────────
    let request = ExtractRequest {
        file_id: upload.file_id.clone(),
        run_ocr_only: ocr_only,
    };
    let response = transport
        .request_extraction(&request)
        .await
        .map_err(|e| (RunError::from(e), None))?;

    let file_id = if response.file_id.is_empty() {
        upload.file_id
    } else {
        response.file_id.clone()
    };

    // ── Step 3: Backend-reported failure ends the run ────────────────────
    if let Some(message) = response.pipeline_error() {
        let error = RunError::Pipeline(message.to_string());
        let report = RunReport {
            file_id,
            response,
            download: DownloadOutcome::Skipped,
            cleanup: CleanupOutcome::Skipped,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        return Err((error, Some(report)));
    }

    // ── Step 4: Download, when a workbook was generated ──────────────────
    let generated = response
        .excel_path
        .as_deref()
        .is_some_and(|p| !p.is_empty());
    let download = if config.download_spreadsheet && generated {
        download_spreadsheet(transport, config, &file_id).await
    } else {
        if config.download_spreadsheet {
            debug!("No spreadsheet generated for file_id={}", file_id);
        }
        DownloadOutcome::Skipped
    };

    // ── Step 5: Cleanup ──────────────────────────────────────────────────
    let cleanup = match download {
        DownloadOutcome::Saved(_) if config.cleanup_after_download => {
            match transport.request_cleanup(&file_id).await {
                Ok(res) => {
                    debug!(
                        "Cleanup for file_id={}: {} ({} files)",
                        file_id,
                        res.message,
                        res.deleted_files.len()
                    );
                    CleanupOutcome::Done(res.deleted_files)
                }
                Err(e) => {
                    warn!("Cleanup failed for file_id={}: {}", file_id, e);
                    CleanupOutcome::Failed(e.message)
                }
            }
        }
        _ => CleanupOutcome::Skipped,
    };

    Ok(RunReport {
        file_id,
        response,
        download,
        cleanup,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

async fn download_spreadsheet<T: Transport>(
    transport: &T,
    config: &ClientConfig,
    file_id: &str,
) -> DownloadOutcome {
    let sheet = match transport.fetch_spreadsheet(file_id).await {
        Ok(sheet) => sheet,
        Err(e) => {
            warn!("Auto-download failed for file_id={}: {}", file_id, e);
            return DownloadOutcome::Failed(e.message);
        }
    };

    match sheet.save_to(&config.output_dir).await {
        Ok(path) => DownloadOutcome::Saved(path),
        Err(e) => {
            let message = format!("Failed to save '{}': {}", sheet.filename, e);
            warn!("{}", message);
            DownloadOutcome::Failed(message)
        }
    }
}
