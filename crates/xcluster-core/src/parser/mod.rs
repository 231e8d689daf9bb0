//! exception extractor - parses stack traces into structured frames and
//! derives the cluster-key fingerprint for a NormalizedLog.

pub mod java;
pub mod javascript;
pub mod python;

pub use java::JavaParser;
pub use javascript::JsParser;
pub use python::PythonParser;

use crate::category::categorize;
use crate::{ErrorCategory, ExceptionRecord, Fingerprints, NormalizedLog, StackFrame};
use sha2::{Digest, Sha256};

/// default vendor prefixes for the own-code heuristic; overridable via
/// `extractor.vendor_prefixes` configuration.
pub const DEFAULT_VENDOR_PREFIXES: &[&str] = &[
    "java.", "javax.", "sun.", "org.springframework.", "org.apache.",
    "site-packages/", "node_modules/", "go/pkg/mod/",
];

// stack trace parser trait - every language strategy implements this
pub trait StackTraceParser: Send + Sync {
    fn name(&self) -> &'static str;
    /// cheap heuristic: does this text look like this parser's format?
    fn detect(&self, text: &str) -> bool;
    /// parse frames; only called after detect() returned true
    fn parse(&self, text: &str) -> Vec<StackFrame>;
}

// Registry to hold all parsers, tried in registration order
pub struct ParserRegistry {
    parsers: Vec<Box<dyn StackTraceParser>>,
    vendor_prefixes: Vec<String>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
            vendor_prefixes: DEFAULT_VENDOR_PREFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_vendor_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.vendor_prefixes = prefixes;
        self
    }

    pub fn register(&mut self, parser: Box<dyn StackTraceParser>) {
        self.parsers.push(parser);
    }

    pub fn default_registry() -> Self {
        let mut reg = Self::new();
        reg.register(Box::new(JavaParser::new()));
        reg.register(Box::new(PythonParser::new()));
        reg.register(Box::new(JsParser::new()));
        reg
    }

    /// find frames for a stack trace string. returns empty vec (Unknown) when
    /// no registered parser recognizes the text - this is never an error.
    fn parse_frames(&self, text: &str) -> Vec<StackFrame> {
        for parser in &self.parsers {
            if parser.detect(text) {
                let mut frames = parser.parse(text);
                for f in &mut frames {
                    f.own_code = !self.vendor_prefixes.iter().any(|p| f.file.starts_with(p.as_str()));
                }
                return frames;
            }
        }
        Vec::new()
    }

    /// Extract(normalized_log) -> ExceptionRecord, or None when the log's
    /// level is outside the error set or there is no evidence of an exception.
    pub fn extract(&self, log: &NormalizedLog) -> Option<ExceptionRecord> {
        if !log.level.is_error_level() {
            return None;
        }

        let trace_source = log.stack_trace.as_deref().unwrap_or(&log.message);
        let frames = self.parse_frames(trace_source);
        let has_stack_trace = !frames.is_empty();

        if !has_stack_trace && log.exception_type.is_none() {
            // no stack frames and no explicit exception header: no evidence
            // of an exception, nothing to cluster.
            return None;
        }

        let exception_type = log
            .exception_type
            .clone()
            .unwrap_or_else(|| frames.first().map(|f| f.symbol.clone()).unwrap_or_else(|| "Unknown".to_string()));

        let message = log.exception_message.clone().unwrap_or_else(|| log.message.clone());
        let error_category = categorize(&log.normalized_message);

        let fingerprints = Fingerprints {
            exact: short_hash(&log.message),
            template: short_hash(&log.normalized_message),
            semantic: short_hash(&format!(
                "{}|{}|{}|{}",
                exception_type,
                category_tag(error_category),
                log.logger.as_deref().unwrap_or(""),
                &log.normalized_message.chars().take(100).collect::<String>(),
            )),
            category: short_hash(&format!("{}|{}", exception_type, category_tag(error_category))),
        };

        let fingerprint_static = if has_stack_trace {
            let top3 = frames
                .iter()
                .take(3)
                .map(|f| format!("{}:{}", f.file, f.symbol))
                .collect::<Vec<_>>()
                .join("|");
            short_hash(&format!("{}|{}", exception_type, top3))
        } else {
            fingerprints.template.clone()
        };

        let content_hash = short_hash(&format!(
            "{}|{:?}|{}|{}",
            log.message,
            log.level,
            log.logger.as_deref().unwrap_or(""),
            log.timestamp.format("%Y-%m-%dT%H:%M:%S"),
        ));

        Some(ExceptionRecord {
            log_id: log.id,
            exception_type,
            message,
            logger: log.logger.clone(),
            frames,
            has_stack_trace,
            fingerprints,
            fingerprint_static,
            error_category,
            content_hash,
        })
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::default_registry()
    }
}

fn category_tag(c: ErrorCategory) -> &'static str {
    match c {
        ErrorCategory::ConnectionError => "connection_error",
        ErrorCategory::TimeoutError => "timeout_error",
        ErrorCategory::AuthError => "auth_error",
        ErrorCategory::DatabaseError => "database_error",
        ErrorCategory::NetworkError => "network_error",
        ErrorCategory::FilesystemError => "filesystem_error",
        ErrorCategory::MemoryError => "memory_error",
        ErrorCategory::NullError => "null_error",
        ErrorCategory::ValidationError => "validation_error",
        ErrorCategory::RateLimitError => "rate_limit_error",
        ErrorCategory::Unknown => "unknown",
    }
}

/// 16-hex-char truncation of a sha256 content hash.
pub fn short_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    hex_encode(&digest)[..16].to_string()
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}
