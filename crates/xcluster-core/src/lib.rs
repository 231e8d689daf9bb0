//! Core types for the log-processing pipeline.
//! this crate contains shared data strcture used acrosss all components.

pub mod category;
pub mod normalize;
pub mod parser;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use category::ErrorCategory;

// LOG LEVEL //

/// Log severity levels (ordered from lowest to highest)

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    /// Parse log level from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" | "err" => Some(Self::Error),
            "fatal" | "critical" | "crit" => Some(Self::Fatal),
            _ => None,
        }
    }

    /// only these levels progress to extraction
    pub fn is_error_level(&self) -> bool {
        matches!(self, Self::Error | Self::Fatal)
    }
}

// RAW LOG ENTRY (what the ingress API / fetcher adapters receive)

/// Raw log entry as received from HTTP API or a pull adapter.
/// This is the unprocessed input before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLogEntry {
    pub message: String,

    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub service_id: Option<String>,

    #[serde(default)]
    pub level: Option<LogLevel>,

    #[serde(default)]
    pub logger: Option<String>,

    #[serde(default)]
    pub exception_type: Option<String>,

    #[serde(default)]
    pub exception_message: Option<String>,

    #[serde(default)]
    pub stack_trace: Option<String>,

    #[serde(default)]
    pub hostname: Option<String>,

    #[serde(default)]
    pub trace_id: Option<String>,

    #[serde(default)]
    pub request_id: Option<String>,

    #[serde(default)]
    pub fields: std::collections::HashMap<String, serde_json::Value>,
}

// NORMALIZED LOG (after RawLogEntry + normalization) //

/// fully normalized log entry, ready for extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedLog {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub service_id: String,
    pub logger: Option<String>,
    pub message: String,
    pub normalized_message: String,
    pub raw: String,

    #[serde(default)]
    pub exception_type: Option<String>,

    #[serde(default)]
    pub exception_message: Option<String>,

    #[serde(default)]
    pub stack_trace: Option<String>,

    #[serde(default)]
    pub hostname: Option<String>,

    #[serde(default)]
    pub trace_id: Option<String>,

    #[serde(default)]
    pub request_id: Option<String>,

    #[serde(default)]
    pub fields: std::collections::HashMap<String, serde_json::Value>,

    pub ingested_at: DateTime<Utc>,
}

impl NormalizedLog {
    /// build a normalized log from a raw entry. normalization never fails;
    /// on any internal error it falls back to the lowercased original.
    pub fn from_raw(raw: RawLogEntry, service_id: String) -> Self {
        let now = Utc::now();
        let raw_json = serde_json::to_string(&raw).unwrap_or_else(|_| raw.message.clone());
        let normalized_message = normalize::normalize(&raw.message);

        Self {
            id: Uuid::new_v4(),
            timestamp: raw.timestamp.unwrap_or(now),
            level: raw.level.unwrap_or(LogLevel::Info),
            service_id,
            logger: raw.logger,
            message: raw.message,
            normalized_message,
            raw: raw_json,
            exception_type: raw.exception_type,
            exception_message: raw.exception_message,
            stack_trace: raw.stack_trace,
            hostname: raw.hostname,
            trace_id: raw.trace_id,
            request_id: raw.request_id,
            fields: raw.fields,
            ingested_at: now,
        }
    }
}

// STACK FRAME //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameLanguage {
    Java,
    Python,
    Js,
    Go,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackFrame {
    pub file: String,
    pub symbol: String,
    pub line: Option<u32>,
    pub language: FrameLanguage,
    pub own_code: bool,
}

// EXCEPTION RECORD (the extractor's output) //

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprints {
    pub exact: String,
    pub template: String,
    pub semantic: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionRecord {
    pub log_id: Uuid,
    pub exception_type: String,
    pub message: String,
    pub logger: Option<String>,
    pub frames: Vec<StackFrame>,
    pub has_stack_trace: bool,
    pub fingerprints: Fingerprints,
    /// the fingerprint chosen as the cluster key, per the Extractor selection rule
    pub fingerprint_static: String,
    pub error_category: ErrorCategory,
    pub content_hash: String,
}

impl ExceptionRecord {
    pub fn top_frames(&self, n: usize) -> &[StackFrame] {
        let end = self.frames.len().min(n);
        &self.frames[..end]
    }
}
