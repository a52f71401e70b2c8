//! # batchsheet-client
//!
//! Client for a document OCR/LLM extraction service. Upload a scanned form
//! (JPG, PNG or PDF), let the backend run OCR and language-model extraction,
//! inspect the structured result and save the spreadsheet it generates.
//!
//! All document understanding happens server-side; this crate orchestrates
//! the calls and renders what comes back.
//!
//! ## Run Overview
//!
//! ```text
//! file
//!  │
//!  ├─ 1. Select   read bytes, sniff media type, temp preview for images
//!  ├─ 2. Upload   POST /upload            → file_id
//!  ├─ 3. Extract  POST /extract           → fields, tables, OCR text
//!  ├─ 4. Download GET  /download/{id}     → <id>.xlsx saved locally
//!  └─ 5. Cleanup  DELETE /cleanup/{id}    → backend temp files removed
//! ```
//!
//! While steps 2–5 run, a client-side [`progress`] estimate animates; the
//! backend reports no real progress.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batchsheet_client::{views, ClientConfig, RunState, SelectedFile, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .base_url("http://localhost:8000/api")
//!         .output_dir("out")
//!         .build()?;
//!     let mut session = Session::http(config)?;
//!
//!     session.select_file(SelectedFile::from_path("batch_sheet.png").await?);
//!     if session.run().await == RunState::Succeeded {
//!         let response = session.response().expect("succeeded runs have a response");
//!         println!("{}", views::render_view(views::View::Fields, response));
//!     } else if let Some(err) = session.error() {
//!         eprintln!("{err}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `batchsheet` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod preview;
pub mod progress;
pub mod response;
pub mod selection;
pub mod session;
pub mod spreadsheet;
pub mod transport;
pub mod views;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ClientConfig, ClientConfigBuilder, DEFAULT_BASE_URL};
pub use error::{ClientError, Operation, RunError, TransportError};
pub use preview::{PreviewHandle, PreviewTracker};
pub use progress::{
    NoopProgressObserver, ProgressObserver, ProgressSnapshot, ProgressTicker,
    SharedProgressObserver,
};
pub use response::{
    CleanupResponse, ExtractRequest, ExtractResponse, ExtractedData, Table, Timing,
    UploadResponse,
};
pub use selection::SelectedFile;
pub use session::{CleanupOutcome, DownloadOutcome, RunReport, RunState, Session};
pub use spreadsheet::{resolve_filename, Spreadsheet};
pub use transport::{HttpTransport, Transport};
