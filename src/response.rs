//! Wire types exchanged with the extraction backend.
//!
//! The extracted payload has an open schema: field names are decided by the
//! backend's language model and cannot be enumerated in advance. The raw
//! payload is therefore kept as a [`serde_json::Value`] on
//! [`ExtractResponse`], and [`ExtractedData`] is a lenient typed projection
//! over it. A member of the wrong shape falls back to its default instead of
//! failing the whole response.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Response of `POST /upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub file_id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub path: String,
}

/// Body of `POST /extract`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractRequest {
    pub file_id: String,
    #[serde(default)]
    pub run_ocr_only: bool,
}

/// Backend timing breakdown in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    #[serde(default)]
    pub ocr_time_ms: Option<f64>,
    #[serde(default)]
    pub llm_time_ms: Option<f64>,
    #[serde(default)]
    pub total_time_ms: Option<f64>,
}

/// Response of `POST /extract`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractResponse {
    #[serde(default)]
    pub file_id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub extracted_json: Option<Value>,
    #[serde(default)]
    pub excel_path: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub timing: Option<Timing>,
}

impl ExtractResponse {
    /// The backend-reported pipeline error, if any. Empty strings count as no error.
    pub fn pipeline_error(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }

    /// Typed view of `extracted_json`; `None` when absent or not an object.
    pub fn extracted(&self) -> Option<ExtractedData> {
        self.extracted_json.as_ref().and_then(ExtractedData::from_value)
    }

    /// The raw `fields` member of the payload.
    pub fn fields_value(&self) -> Option<&Value> {
        self.member("fields")
    }

    /// The raw `tables` member of the payload.
    pub fn tables_value(&self) -> Option<&Value> {
        self.member("tables")
    }

    /// OCR text for display: `ocr_text`, falling back to `raw_text` when empty.
    pub fn ocr_text(&self) -> Option<&str> {
        let text = |key| self.member(key).and_then(Value::as_str).filter(|s| !s.is_empty());
        text("ocr_text").or_else(|| text("raw_text"))
    }

    fn member(&self, key: &str) -> Option<&Value> {
        self.extracted_json.as_ref()?.as_object()?.get(key)
    }
}

/// Typed projection of the `extracted_json` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedData {
    #[serde(default, deserialize_with = "lenient")]
    pub document_type: String,
    /// Open mapping of field name to value; keys are backend-defined.
    #[serde(default, deserialize_with = "lenient")]
    pub fields: Map<String, Value>,
    #[serde(default, deserialize_with = "tables")]
    pub tables: Vec<Table>,
    #[serde(default, deserialize_with = "lenient")]
    pub entities: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub handwritten: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub raw_text: String,
    #[serde(default, deserialize_with = "lenient")]
    pub ocr_text: String,
    #[serde(default, deserialize_with = "lenient")]
    pub ocr_result: Option<OcrResult>,
    #[serde(default, deserialize_with = "lenient")]
    pub metadata: Metadata,
}

impl ExtractedData {
    /// Project a raw payload. Returns `None` for anything but a JSON object.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }
}

/// A named header-plus-rows grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
    #[serde(default, deserialize_with = "cells")]
    pub headers: Vec<String>,
    #[serde(default, deserialize_with = "cell_rows")]
    pub rows: Vec<Vec<String>>,
}

/// Extraction metadata reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, deserialize_with = "lenient")]
    pub model: String,
    #[serde(default, deserialize_with = "lenient")]
    pub warnings: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub confidence: Map<String, Value>,
}

/// Raw OCR provider output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default, deserialize_with = "lenient")]
    pub quality_metrics: QualityMetrics,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// OCR quality heuristics computed by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    #[serde(default)]
    pub total_chars: u64,
    #[serde(default)]
    pub total_lines: u64,
    #[serde(default)]
    pub non_empty_lines: u64,
    #[serde(default)]
    pub has_numbers: bool,
    #[serde(default)]
    pub has_letters: bool,
    #[serde(default)]
    pub has_special_chars: bool,
    #[serde(default)]
    pub quality_score: f64,
}

/// Response of `DELETE /cleanup/{file_id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupResponse {
    #[serde(default)]
    pub file_id: String,
    #[serde(default)]
    pub deleted_files: Vec<String>,
    #[serde(default)]
    pub message: String,
}

/// Deserialize `T`, substituting its default when the value has the wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

/// Keep the well-formed table entries of an array; anything else is no tables.
fn tables<'de, D>(deserializer: D) -> Result<Vec<Table>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| Table::deserialize(item).ok())
        .collect())
}

/// Cell text: strings verbatim, `null` as empty, other scalars as JSON text.
fn cell_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn cells<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().map(cell_text).collect(),
        _ => Vec::new(),
    })
}

fn cell_rows<'de, D>(deserializer: D) -> Result<Vec<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(rows) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(rows
        .into_iter()
        .filter_map(|row| match row {
            Value::Array(items) => Some(items.into_iter().map(cell_text).collect()),
            _ => None,
        })
        .collect())
}
