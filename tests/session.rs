//! `Session` orchestration against a scripted in-memory transport, plus one
//! end-to-end run through `HttpTransport` and a mock backend.

use async_trait::async_trait;
use batchsheet_client::{
    CleanupOutcome, CleanupResponse, ClientConfig, DownloadOutcome, ExtractRequest,
    ExtractResponse, Operation, PreviewTracker, ProgressObserver, ProgressSnapshot, RunError,
    RunState, SelectedFile, Session, Spreadsheet, Transport, TransportError, UploadResponse,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Scripted transport ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Upload(String),
    Extract { file_id: String, ocr_only: bool },
    Download(String),
    Cleanup(String),
}

struct FakeTransport {
    calls: Mutex<Vec<Call>>,
    upload: Result<UploadResponse, TransportError>,
    extract: Result<ExtractResponse, TransportError>,
    download: Result<Spreadsheet, TransportError>,
    cleanup: Result<CleanupResponse, TransportError>,
}

impl FakeTransport {
    fn happy() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            upload: Ok(UploadResponse {
                file_id: "abc".into(),
                filename: "sheet.png".into(),
                path: "/srv/uploads/abc.png".into(),
            }),
            extract: Ok(extraction(None)),
            download: Ok(Spreadsheet {
                filename: "abc.xlsx".into(),
                bytes: b"PK\x03\x04".to_vec(),
            }),
            cleanup: Ok(CleanupResponse {
                file_id: "abc".into(),
                deleted_files: vec!["abc.png".into(), "abc.xlsx".into()],
                message: "Cleaned up 2 files".into(),
            }),
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn submit_file(&self, file: &SelectedFile) -> Result<UploadResponse, TransportError> {
        self.record(Call::Upload(file.name().to_string()));
        self.upload.clone()
    }

    async fn request_extraction(
        &self,
        request: &ExtractRequest,
    ) -> Result<ExtractResponse, TransportError> {
        self.record(Call::Extract {
            file_id: request.file_id.clone(),
            ocr_only: request.run_ocr_only,
        });
        self.extract.clone()
    }

    async fn fetch_spreadsheet(&self, file_id: &str) -> Result<Spreadsheet, TransportError> {
        self.record(Call::Download(file_id.to_string()));
        self.download.clone()
    }

    async fn request_cleanup(&self, file_id: &str) -> Result<CleanupResponse, TransportError> {
        self.record(Call::Cleanup(file_id.to_string()));
        self.cleanup.clone()
    }
}

#[derive(Default)]
struct CountingObserver {
    activated: AtomicUsize,
    deactivated: AtomicUsize,
}

impl ProgressObserver for CountingObserver {
    fn on_activate(&self, _snapshot: &ProgressSnapshot) {
        self.activated.fetch_add(1, Ordering::SeqCst);
    }

    fn on_deactivate(&self) {
        self.deactivated.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Test helpers ─────────────────────────────────────────────────────────────

fn extraction(error: Option<&str>) -> ExtractResponse {
    ExtractResponse {
        file_id: "abc".into(),
        filename: "sheet.png".into(),
        extracted_json: Some(json!({
            "document_type": "batch_record",
            "fields": {"batch_number": "B-42"},
            "tables": []
        })),
        excel_path: Some("/srv/outputs/abc.xlsx".into()),
        error: error.map(str::to_string),
        timing: None,
    }
}

fn config_in(dir: &Path) -> ClientConfig {
    ClientConfig::builder()
        .output_dir(dir)
        .build()
        .expect("valid config")
}

fn png() -> SelectedFile {
    SelectedFile::with_media_type("sheet.png", "image/png", vec![0x89, b'P', b'N', b'G'])
}

fn pdf() -> SelectedFile {
    SelectedFile::with_media_type("sheet.pdf", "application/pdf", b"%PDF-1.7".to_vec())
}

fn session_with(transport: FakeTransport, dir: &Path) -> Session<FakeTransport> {
    Session::new(transport, config_in(dir))
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn successful_run_downloads_once_then_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with(FakeTransport::happy(), dir.path());
    session.select_file(png());

    let state = session.run().await;

    assert_eq!(state, RunState::Succeeded);
    assert_eq!(session.state(), RunState::Succeeded);
    assert!(!session.is_loading());
    assert!(session.error().is_none());
    assert_eq!(
        session.transport().calls(),
        vec![
            Call::Upload("sheet.png".into()),
            Call::Extract {
                file_id: "abc".into(),
                ocr_only: false
            },
            Call::Download("abc".into()),
            Call::Cleanup("abc".into()),
        ]
    );

    let report = session.report().expect("report after success");
    assert_eq!(report.file_id, "abc");
    let saved = dir.path().join("abc.xlsx");
    assert_eq!(report.download, DownloadOutcome::Saved(saved.clone()));
    assert_eq!(std::fs::read(&saved).unwrap(), b"PK\x03\x04");
    assert_eq!(
        report.cleanup,
        CleanupOutcome::Done(vec!["abc.png".into(), "abc.xlsx".into()])
    );
    assert_eq!(
        session.response().and_then(|r| r.extracted()).unwrap().document_type,
        "batch_record"
    );
}

#[tokio::test]
async fn ocr_only_is_forwarded_and_cleared_by_reset() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with(FakeTransport::happy(), dir.path());
    session.set_ocr_only(true);
    session.select_file(pdf());
    session.run().await;

    assert!(session.transport().calls().contains(&Call::Extract {
        file_id: "abc".into(),
        ocr_only: true
    }));

    session.reset();
    assert!(!session.ocr_only());
}

#[tokio::test]
async fn response_file_id_falls_back_to_upload_id() {
    let dir = tempfile::tempdir().unwrap();
    let mut transport = FakeTransport::happy();
    transport.extract = Ok(ExtractResponse {
        file_id: String::new(),
        ..extraction(None)
    });
    let mut session = session_with(transport, dir.path());
    session.select_file(pdf());

    assert_eq!(session.run().await, RunState::Succeeded);
    assert!(session.transport().calls().contains(&Call::Download("abc".into())));
}

#[tokio::test]
async fn no_generated_spreadsheet_means_no_download() {
    let dir = tempfile::tempdir().unwrap();
    for excel_path in [None, Some(String::new())] {
        let mut transport = FakeTransport::happy();
        transport.extract = Ok(ExtractResponse {
            excel_path,
            ..extraction(None)
        });
        let mut session = session_with(transport, dir.path());
        session.set_ocr_only(true);
        session.select_file(png());

        assert_eq!(session.run().await, RunState::Succeeded);
        assert_eq!(
            session.transport().calls(),
            vec![
                Call::Upload("sheet.png".into()),
                Call::Extract {
                    file_id: "abc".into(),
                    ocr_only: true
                },
            ]
        );
        let report = session.report().unwrap();
        assert_eq!(report.download, DownloadOutcome::Skipped);
        assert_eq!(report.cleanup, CleanupOutcome::Skipped);
    }
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn pipeline_error_fails_run_without_download() {
    let dir = tempfile::tempdir().unwrap();
    let mut transport = FakeTransport::happy();
    transport.extract = Ok(extraction(Some("OCR provider unavailable")));
    let mut session = session_with(transport, dir.path());
    session.select_file(png());

    assert_eq!(session.run().await, RunState::Failed);
    assert_eq!(
        session.error(),
        Some(&RunError::Pipeline("OCR provider unavailable".into()))
    );
    assert_eq!(
        session.error().unwrap().message(),
        "OCR provider unavailable"
    );
    assert!(!session.is_loading());

    let calls = session.transport().calls();
    assert!(!calls.iter().any(|c| matches!(c, Call::Download(_))));
    assert!(!calls.iter().any(|c| matches!(c, Call::Cleanup(_))));

    let report = session.report().expect("extraction answered");
    assert_eq!(report.download, DownloadOutcome::Skipped);
    assert_eq!(report.cleanup, CleanupOutcome::Skipped);
}

#[tokio::test]
async fn upload_failure_stops_before_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let mut transport = FakeTransport::happy();
    transport.upload = Err(TransportError::new(
        Operation::Upload,
        Some(400),
        "Unsupported file type",
    ));
    let mut session = session_with(transport, dir.path());
    session.select_file(pdf());

    assert_eq!(session.run().await, RunState::Failed);
    assert_eq!(session.error().unwrap().message(), "Unsupported file type");
    assert!(session.report().is_none());
    assert_eq!(
        session.transport().calls(),
        vec![Call::Upload("sheet.pdf".into())]
    );
}

#[tokio::test]
async fn extraction_failure_surfaces_transport_message() {
    let dir = tempfile::tempdir().unwrap();
    let mut transport = FakeTransport::happy();
    transport.extract = Err(TransportError::fallback(Operation::Extract, Some(500)));
    let mut session = session_with(transport, dir.path());
    session.select_file(pdf());

    assert_eq!(session.run().await, RunState::Failed);
    assert_eq!(session.error().unwrap().to_string(), "Extraction failed");
    assert!(session.response().is_none());
}

#[tokio::test]
async fn download_failure_is_not_a_run_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut transport = FakeTransport::happy();
    transport.download = Err(TransportError::new(
        Operation::Download,
        Some(404),
        "Excel file not found",
    ));
    let mut session = session_with(transport, dir.path());
    session.select_file(png());

    assert_eq!(session.run().await, RunState::Succeeded);
    assert!(session.error().is_none());

    let report = session.report().unwrap();
    assert_eq!(
        report.download,
        DownloadOutcome::Failed("Excel file not found".into())
    );
    assert_eq!(report.cleanup, CleanupOutcome::Skipped);
    assert!(!session
        .transport()
        .calls()
        .iter()
        .any(|c| matches!(c, Call::Cleanup(_))));
}

#[tokio::test]
async fn cleanup_failure_is_recorded_but_not_surfaced() {
    let dir = tempfile::tempdir().unwrap();
    let mut transport = FakeTransport::happy();
    transport.cleanup = Err(TransportError::fallback(Operation::Cleanup, Some(500)));
    let mut session = session_with(transport, dir.path());
    session.select_file(png());

    assert_eq!(session.run().await, RunState::Succeeded);
    assert!(session.error().is_none());
    assert_eq!(
        session.report().unwrap().cleanup,
        CleanupOutcome::Failed("Failed to cleanup files".into())
    );
}

#[tokio::test]
async fn disabled_download_skips_download_and_cleanup() {
    let dir = tempfile::tempdir().unwrap();
    let config = ClientConfig::builder()
        .output_dir(dir.path())
        .download_spreadsheet(false)
        .build()
        .unwrap();
    let mut session = Session::new(FakeTransport::happy(), config);
    session.select_file(png());

    assert_eq!(session.run().await, RunState::Succeeded);
    assert_eq!(session.transport().calls().len(), 2);
    let report = session.report().unwrap();
    assert_eq!(report.download, DownloadOutcome::Skipped);
    assert_eq!(report.cleanup, CleanupOutcome::Skipped);
}

#[tokio::test]
async fn disabled_cleanup_keeps_download() {
    let dir = tempfile::tempdir().unwrap();
    let config = ClientConfig::builder()
        .output_dir(dir.path())
        .cleanup_after_download(false)
        .build()
        .unwrap();
    let mut session = Session::new(FakeTransport::happy(), config);
    session.select_file(png());

    assert_eq!(session.run().await, RunState::Succeeded);
    let report = session.report().unwrap();
    assert!(matches!(report.download, DownloadOutcome::Saved(_)));
    assert_eq!(report.cleanup, CleanupOutcome::Skipped);
}

// ── State machine ────────────────────────────────────────────────────────────

#[tokio::test]
async fn run_without_selection_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with(FakeTransport::happy(), dir.path());

    assert_eq!(session.run().await, RunState::Idle);
    assert!(session.transport().calls().is_empty());
    assert!(session.report().is_none());
    assert!(session.error().is_none());
}

#[tokio::test]
async fn reset_returns_to_idle_from_terminal_states() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with(FakeTransport::happy(), dir.path());
    session.select_file(png());
    session.run().await;
    session.reset();
    assert_eq!(session.state(), RunState::Idle);
    assert!(session.file().is_none());
    assert!(session.report().is_none());

    let mut transport = FakeTransport::happy();
    transport.extract = Ok(extraction(Some("boom")));
    let mut session = session_with(transport, dir.path());
    session.select_file(png());
    assert_eq!(session.run().await, RunState::Failed);
    session.reset();
    assert_eq!(session.state(), RunState::Idle);
    assert!(session.error().is_none());
}

#[tokio::test]
async fn selecting_after_a_run_clears_previous_result() {
    let dir = tempfile::tempdir().unwrap();
    let mut transport = FakeTransport::happy();
    transport.extract = Ok(extraction(Some("boom")));
    let mut session = session_with(transport, dir.path());
    session.select_file(png());
    session.run().await;
    assert!(session.error().is_some());

    session.select_file(pdf());
    assert_eq!(session.state(), RunState::Selected);
    assert!(session.error().is_none());
    assert!(session.report().is_none());
    assert_eq!(session.file().unwrap().name(), "sheet.pdf");
}

#[tokio::test]
async fn observer_sees_one_activation_per_run() {
    let dir = tempfile::tempdir().unwrap();
    let observer = Arc::new(CountingObserver::default());
    let mut session = session_with(FakeTransport::happy(), dir.path())
        .with_observer(Arc::clone(&observer) as Arc<dyn ProgressObserver>);

    session.select_file(png());
    session.run().await;
    session.select_file(png());
    session.run().await;

    assert_eq!(observer.activated.load(Ordering::SeqCst), 2);
    assert_eq!(observer.deactivated.load(Ordering::SeqCst), 2);
}

// ── Previews ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn only_images_get_a_preview() {
    let dir = tempfile::tempdir().unwrap();
    let previews = PreviewTracker::new();
    let mut session =
        session_with(FakeTransport::happy(), dir.path()).with_preview_tracker(previews.clone());

    session.select_file(pdf());
    assert!(session.preview().is_none());
    assert_eq!(previews.created(), 0);

    session.select_file(png());
    let preview_path = session.preview().expect("image preview").path().to_path_buf();
    assert!(preview_path.exists());
    assert_eq!(previews.live(), 1);
}

#[tokio::test]
async fn reselecting_releases_the_previous_preview() {
    let dir = tempfile::tempdir().unwrap();
    let previews = PreviewTracker::new();
    let mut session =
        session_with(FakeTransport::happy(), dir.path()).with_preview_tracker(previews.clone());

    session.select_file(png());
    let first = session.preview().unwrap().path().to_path_buf();
    session.select_file(png());

    assert!(!first.exists());
    assert_eq!(previews.created(), 2);
    assert_eq!(previews.live(), 1);

    session.reset();
    assert_eq!(previews.live(), 0);
}

#[tokio::test]
async fn preview_is_released_after_success_and_failure() {
    let dir = tempfile::tempdir().unwrap();
    let previews = PreviewTracker::new();
    let mut session =
        session_with(FakeTransport::happy(), dir.path()).with_preview_tracker(previews.clone());
    session.select_file(png());
    assert_eq!(session.run().await, RunState::Succeeded);
    assert!(session.preview().is_none());
    assert_eq!(previews.live(), 0);

    let mut transport = FakeTransport::happy();
    transport.upload = Err(TransportError::fallback(Operation::Upload, None));
    let mut session = session_with(transport, dir.path()).with_preview_tracker(previews.clone());
    session.select_file(png());
    assert_eq!(previews.live(), 1);
    assert_eq!(session.run().await, RunState::Failed);
    assert_eq!(previews.live(), 0);
}

// ── End to end over HTTP ─────────────────────────────────────────────────────

#[tokio::test]
async fn http_session_runs_the_whole_sequence() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "file_id": "abc",
            "filename": "sheet.pdf",
            "path": "/srv/uploads/abc.pdf"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/extract"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "file_id": "abc",
            "filename": "sheet.pdf",
            "extracted_json": {"fields": {"lot": "L-7"}, "tables": []},
            "excel_path": "/srv/outputs/abc.xlsx",
            "error": null
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/download/abc"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Disposition", r#"attachment; filename="abc.xlsx""#)
                .set_body_bytes(b"PK\x03\x04".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/cleanup/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "file_id": "abc",
            "deleted_files": ["abc.pdf", "abc.xlsx"],
            "message": "Cleaned up 2 files"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = ClientConfig::builder()
        .base_url(format!("{}/api", server.uri()))
        .output_dir(dir.path())
        .build()
        .unwrap();
    let mut session = Session::http(config).unwrap();
    session.select_file(pdf());

    assert_eq!(session.run().await, RunState::Succeeded);
    assert_eq!(
        session.report().unwrap().download,
        DownloadOutcome::Saved(dir.path().join("abc.xlsx"))
    );
    assert!(dir.path().join("abc.xlsx").exists());
}
