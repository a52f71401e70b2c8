//! CLI binary for batchsheet-client.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ClientConfig`, drives one `Session` run and prints the chosen views.

use anyhow::{Context, Result};
use batchsheet_client::views::{self, View};
use batchsheet_client::{
    ClientConfig, DownloadOutcome, ProgressObserver, ProgressSnapshot, RunState,
    SelectedFile, Session, SharedProgressObserver, DEFAULT_BASE_URL,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress observer using indicatif ────────────────────────────────────

/// Renders the client-side estimate as a percentage bar whose prefix is the
/// current step name and whose message is the step description.
struct CliProgressObserver {
    bar: ProgressBar,
}

impl CliProgressObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::hidden();
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}%  {msg:.dim}  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_length(100);
        Arc::new(Self { bar })
    }

    fn show(&self, snapshot: &ProgressSnapshot) {
        let step = snapshot.current_step();
        self.bar.set_prefix(step.name);
        self.bar.set_message(step.description);
        self.bar.set_position(u64::from(snapshot.rounded_percent()));
    }
}

impl ProgressObserver for CliProgressObserver {
    fn on_activate(&self, snapshot: &ProgressSnapshot) {
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
        self.bar.reset_elapsed();
        self.show(snapshot);
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_tick(&self, snapshot: &ProgressSnapshot) {
        self.show(snapshot);
    }

    fn on_deactivate(&self) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract a scanned batch sheet, show fields, save the .xlsx here
  batchsheet batch_sheet.jpg

  # Against a remote backend, saving into ./out
  batchsheet --base-url https://extract.example.com/api -o out scan.pdf

  # OCR only, print the recognised text
  batchsheet --ocr-only --view ocr scan.png

  # Every view, no spreadsheet download
  batchsheet --view all --no-download scan.png

  # Raw extraction response as JSON (for scripting)
  batchsheet --json scan.png > result.json

ENVIRONMENT VARIABLES:
  BATCHSHEET_API_BASE_URL   Extraction backend base URL
  BATCHSHEET_OUTPUT_DIR     Directory for the downloaded spreadsheet
  BATCHSHEET_VIEW           Default view (fields, tables, ocr, json, all)
  RUST_LOG                  Override log filtering (e.g. batchsheet_client=debug)
"#;

/// Extract fields and tables from a scanned document via the extraction backend.
#[derive(Parser, Debug)]
#[command(
    name = "batchsheet",
    version,
    about = "Extract fields and tables from scanned documents via an OCR/LLM backend",
    long_about = "Upload a document image or PDF to the extraction backend, wait for OCR and \
language-model extraction, print the structured result and save the generated Excel workbook.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Document to process (JPG, PNG or PDF).
    input: PathBuf,

    /// Extraction backend base URL.
    #[arg(long, env = "BATCHSHEET_API_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Ask the backend for OCR only (skip LLM field extraction).
    #[arg(long, env = "BATCHSHEET_OCR_ONLY")]
    ocr_only: bool,

    /// Directory to save the generated spreadsheet into.
    #[arg(short, long, env = "BATCHSHEET_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Which result view to print.
    #[arg(long, env = "BATCHSHEET_VIEW", value_enum, default_value = "fields")]
    view: ViewArg,

    /// Do not download the generated spreadsheet (implies --no-cleanup).
    #[arg(long)]
    no_download: bool,

    /// Keep the backend's temporary files after downloading.
    #[arg(long, env = "BATCHSHEET_NO_CLEANUP")]
    no_cleanup: bool,

    /// Print the raw extraction response as JSON instead of a view.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except the result and errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ViewArg {
    Fields,
    Tables,
    Ocr,
    Json,
    All,
}

impl ViewArg {
    fn views(self) -> Vec<View> {
        match self {
            ViewArg::Fields => vec![View::Fields],
            ViewArg::Tables => vec![View::Tables],
            ViewArg::Ocr => vec![View::Ocr],
            ViewArg::Json => vec![View::Json],
            ViewArg::All => View::ALL.to_vec(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config and session ─────────────────────────────────────────
    let config = build_config(&cli)?;
    let mut session = Session::http(config).context("Failed to create HTTP client")?;
    if show_progress {
        let observer: SharedProgressObserver = CliProgressObserver::new();
        session = session.with_observer(observer);
    }

    let file = SelectedFile::from_path(&cli.input)
        .await
        .context("Failed to read input document")?;

    if !cli.quiet {
        eprintln!(
            "{} {}  {}  {}",
            cyan("◆"),
            bold(file.name()),
            dim(&file.display_size()),
            dim(&file.type_badge()),
        );
    }

    session.set_ocr_only(cli.ocr_only);
    session.select_file(file);
    if let Some(preview) = session.preview() {
        tracing::debug!("Preview available at {}", preview.path().display());
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let state = session.run().await;

    if state == RunState::Failed {
        let message = session
            .error()
            .map(|e| e.message().to_string())
            .unwrap_or_else(|| "Processing failed".to_string());
        eprintln!("{} {}", red("✘"), red(&message));
        return Ok(ExitCode::FAILURE);
    }

    let Some(report) = session.report() else {
        anyhow::bail!("run finished without a result");
    };

    // ── Output ───────────────────────────────────────────────────────────
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if cli.json {
        let json = serde_json::to_string_pretty(&report.response)
            .context("Failed to serialise response")?;
        writeln!(handle, "{json}").context("Failed to write to stdout")?;
    } else {
        let selected = cli.view.views();
        let many = selected.len() > 1;
        for view in selected {
            if many {
                writeln!(handle, "{}", bold(&format!("── {} ──", view.title())))
                    .context("Failed to write to stdout")?;
            }
            let text = views::render_view(view, &report.response);
            handle
                .write_all(text.as_bytes())
                .context("Failed to write to stdout")?;
            if !text.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
            if many {
                handle.write_all(b"\n").ok();
            }
        }
    }

    // Summary goes to stderr so stdout stays clean for piping.
    if !cli.quiet {
        eprintln!("{} {}", green("✔"), views::render_summary(report));
        if let DownloadOutcome::Failed(_) = &report.download {
            eprintln!("  {}", cyan("⚠ spreadsheet not saved; run again to retry"));
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli) -> Result<ClientConfig> {
    ClientConfig::builder()
        .base_url(cli.base_url.clone())
        .output_dir(cli.output_dir.clone())
        .download_spreadsheet(!cli.no_download)
        .cleanup_after_download(!cli.no_cleanup)
        .build()
        .context("Invalid configuration")
}
