//! Text renderers for an extraction result.
//!
//! Four independent projections of the payload: fields, tables, OCR text and
//! the raw JSON. Each is a pure function over borrowed, possibly malformed
//! input (`None`, JSON `null`, an array where an object was expected, …) and
//! degrades to an explicit placeholder rather than an empty layout.

use crate::response::ExtractResponse;
use crate::session::{DownloadOutcome, RunReport};
use serde_json::Value;
use std::fmt::Write;

pub const NO_FIELDS: &str = "No fields extracted";
pub const NO_TABLES: &str = "No tables extracted";
pub const NO_OCR_TEXT: &str = "No OCR text available";
pub const NO_DATA: &str = "No data available";

/// Shown in place of an empty table cell.
pub const EMPTY_CELL: &str = "—";

/// Which projection to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Fields,
    Tables,
    Ocr,
    Json,
}

impl View {
    pub const ALL: [View; 4] = [View::Fields, View::Tables, View::Ocr, View::Json];

    pub fn title(self) -> &'static str {
        match self {
            View::Fields => "Fields",
            View::Tables => "Tables",
            View::Ocr => "Ocr",
            View::Json => "Json",
        }
    }
}

/// Render one projection of `response`.
pub fn render_view(view: View, response: &ExtractResponse) -> String {
    match view {
        View::Fields => render_fields(response.fields_value()),
        View::Tables => render_tables(response.tables_value()),
        View::Ocr => render_ocr(response.ocr_text()),
        View::Json => render_raw(response.extracted_json.as_ref()),
    }
}

/// `batch_no` → `batch no`.
pub fn humanize_key(key: &str) -> String {
    key.replace('_', " ")
}

/// Non-empty, non-null field entries as `LABEL  value` lines.
pub fn render_fields(fields: Option<&Value>) -> String {
    let Some(Value::Object(map)) = fields else {
        return NO_FIELDS.to_string();
    };

    let entries: Vec<(String, String)> = map
        .iter()
        .filter_map(|(key, value)| {
            scalar_text(value)
                .filter(|text| !text.is_empty())
                .map(|text| (humanize_key(key).to_uppercase(), text))
        })
        .collect();

    if entries.is_empty() {
        return NO_FIELDS.to_string();
    }

    let width = entries.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
    let mut out = String::from("Extracted Fields\n\n");
    for (label, text) in entries {
        let mut lines = text.lines();
        let first = lines.next().unwrap_or_default();
        let _ = writeln!(out, "{label:<width$}  {first}");
        for line in lines {
            let _ = writeln!(out, "{:width$}  {line}", "");
        }
    }
    out
}

/// Each table as a pipe-delimited grid with aligned columns.
pub fn render_tables(tables: Option<&Value>) -> String {
    let Some(Value::Array(list)) = tables else {
        return NO_TABLES.to_string();
    };

    let rendered: Vec<String> = list
        .iter()
        .enumerate()
        .filter_map(|(idx, table)| render_table(idx, table))
        .collect();

    if rendered.is_empty() {
        return NO_TABLES.to_string();
    }
    rendered.join("\n")
}

fn render_table(idx: usize, table: &Value) -> Option<String> {
    let obj = table.as_object()?;

    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| format!("Table {}", idx + 1));

    let headers: Vec<String> = match obj.get("headers") {
        Some(Value::Array(cells)) => cells.iter().map(header_text).collect(),
        _ => Vec::new(),
    };
    let rows: Vec<Vec<String>> = match obj.get("rows") {
        Some(Value::Array(rows)) => rows
            .iter()
            .filter_map(Value::as_array)
            .map(|row| row.iter().map(cell_text).collect())
            .collect(),
        _ => Vec::new(),
    };

    let columns = rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(headers.len()))
        .max()
        .unwrap_or(0);

    let mut widths = vec![0usize; columns];
    for line in std::iter::once(&headers).chain(rows.iter()) {
        for (i, cell) in line.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = format!("{name}\n");
    if columns == 0 {
        return Some(out);
    }
    if !headers.is_empty() {
        out.push_str(&grid_line(&headers, &widths));
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat((*w).max(1))).collect();
        out.push_str(&grid_line(&rule, &widths));
    }
    for row in &rows {
        out.push_str(&grid_line(row, &widths));
    }
    Some(out)
}

fn grid_line(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::from("|");
    for (i, width) in widths.iter().enumerate() {
        let cell = cells.get(i).map(String::as_str).unwrap_or("");
        let pad = width.saturating_sub(cell.chars().count());
        let _ = write!(line, " {cell}{} |", " ".repeat(pad));
    }
    line.push('\n');
    line
}

/// Raw OCR text, verbatim.
pub fn render_ocr(text: Option<&str>) -> String {
    match text {
        Some(text) if !text.is_empty() => format!("OCR Text Preview\n\n{text}"),
        _ => NO_OCR_TEXT.to_string(),
    }
}

/// Pretty-printed JSON with right-aligned line numbers.
pub fn render_raw(data: Option<&Value>) -> String {
    let data = match data {
        None | Some(Value::Null) => return NO_DATA.to_string(),
        Some(data) => data,
    };

    let json = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
    let lines: Vec<&str> = json.lines().collect();
    let width = lines.len().to_string().len();

    let mut out = String::from("Complete JSON\n\n");
    for (i, line) in lines.iter().enumerate() {
        let _ = writeln!(out, "{:>width$}  {line}", i + 1);
    }
    out
}

/// One-line completion banner: timing and where the spreadsheet went.
///
/// Cleanup outcomes are logged by the session and never shown here.
pub fn render_summary(report: &RunReport) -> String {
    let mut out = String::from("Extraction Complete");

    let document_type = report
        .response
        .extracted()
        .map(|d| d.document_type)
        .filter(|t| !t.is_empty());
    if let Some(t) = document_type {
        let _ = write!(out, " ({})", humanize_key(&t));
    }

    if let Some(total) = report.response.timing.as_ref().and_then(|t| t.total_time_ms) {
        let _ = write!(out, " • Processed in {total:.0}ms");
    }

    match &report.download {
        DownloadOutcome::Saved(path) => {
            let _ = write!(out, " • Excel saved to {}", path.display());
        }
        DownloadOutcome::Failed(msg) => {
            let _ = write!(out, " • Excel download failed: {msg}");
        }
        DownloadOutcome::Skipped => {}
    }
    out
}

/// Display text for a field value; `None` for JSON `null`.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn header_text(value: &Value) -> String {
    scalar_text(value).unwrap_or_default()
}

fn cell_text(value: &Value) -> String {
    match scalar_text(value) {
        Some(text) if !text.is_empty() => text,
        _ => EMPTY_CELL.to_string(),
    }
}
