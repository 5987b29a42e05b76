//! Turning a request body into a downloadable `.docx` response.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::config::EngineConfig;
use crate::data::Warning;
use crate::error::RenderError;
use crate::package::TemplateCache;
use crate::payload::Payload;
use crate::render::render_payload;

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const CACHE_CONTROL: &str = "no-store";

const DEFAULT_STEM: &str = "project";
const MAX_ASCII_CHARS: usize = 80;

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
    static ref NON_PORTABLE_RUN: Regex = Regex::new(r"[^a-zA-Z0-9._-]+").unwrap();
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Invalid JSON payload")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Payload is empty or invalid.")]
    Empty,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl ExportError {
    /// 400 for a bad request body, 500 for everything that failed after it.
    pub fn status_code(&self) -> u16 {
        match self {
            ExportError::Payload(_) => 400,
            ExportError::Render(_) => 500,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocxResponse {
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
    pub warnings: Vec<Warning>,
}

impl DocxResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// `Проект_<topic>.docx`, or `Проект_project.docx` for a blank topic.
pub fn download_filename(topic: Option<&str>) -> String {
    let topic = topic.map(str::trim).filter(|t| !t.is_empty()).unwrap_or(DEFAULT_STEM);
    format!("Проект_{topic}.docx")
}

/// Reduces `name` to `[A-Za-z0-9._-]`, suitable for the plain `filename=`
/// parameter. Never empty.
pub fn ascii_filename(name: &str) -> String {
    let stripped: String = name
        .trim()
        .chars()
        .filter(|&c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | '\0'..='\u{1f}'))
        .collect();
    let base: String = WHITESPACE_RUN
        .replace_all(&stripped, "_")
        .chars()
        .take(MAX_ASCII_CHARS)
        .collect();
    let base = if base.is_empty() { DEFAULT_STEM.to_string() } else { base };

    let portable = NON_PORTABLE_RUN.replace_all(&base, "_");
    if portable.is_empty() {
        DEFAULT_STEM.to_string()
    } else {
        portable.into_owned()
    }
}

/// Percent-encodes everything outside `A-Za-z0-9-_.~`, as RFC 5987
/// `ext-value`s require.
pub fn encode_rfc5987(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

pub fn content_disposition(filename: &str) -> String {
    let mut ascii = ascii_filename(filename);
    if !ascii.to_ascii_lowercase().ends_with(".docx") {
        ascii.push_str(".docx");
    }
    format!(
        "attachment; filename=\"{ascii}\"; filename*=UTF-8''{}",
        encode_rfc5987(filename)
    )
}

/// Parses a request body. A missing body, `null`, a non-object or `{}` is
/// [`PayloadError::Empty`].
pub fn parse_payload(body: &[u8]) -> Result<Payload, PayloadError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(PayloadError::Empty);
    }
    let value: serde_json::Value = serde_json::from_slice(body).map_err(PayloadError::InvalidJson)?;
    match &value {
        serde_json::Value::Object(map) if !map.is_empty() => {}
        _ => return Err(PayloadError::Empty),
    }
    serde_json::from_value(value).map_err(PayloadError::InvalidJson)
}

/// Parses `body`, renders it against the cached template and builds the
/// response headers.
pub fn export(cache: &TemplateCache, body: &[u8], config: &EngineConfig) -> Result<DocxResponse, ExportError> {
    let payload = parse_payload(body)?;
    let output = render_payload(cache, &payload, config).inspect_err(|err| {
        tracing::error!(error = %err, "DOCX export failed");
    })?;

    let filename = download_filename(payload.topic.as_deref());
    let headers = vec![
        ("Content-Type", DOCX_CONTENT_TYPE.to_string()),
        ("Content-Disposition", content_disposition(&filename)),
        ("Content-Length", output.bytes.len().to_string()),
        ("Cache-Control", CACHE_CONTROL.to_string()),
    ];
    Ok(DocxResponse {
        headers,
        body: output.bytes,
        warnings: output.warnings,
    })
}
