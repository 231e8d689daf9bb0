//! Error category derivation - keyword table, first match wins.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

// categorized error types for better anaylsis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    ConnectionError,
    TimeoutError,
    AuthError,
    DatabaseError,
    NetworkError,
    FilesystemError,
    MemoryError,
    NullError,
    ValidationError,
    RateLimitError,
    Unknown,
}

struct CategoryRule {
    category: ErrorCategory,
    pattern: Regex,
}

// declared-order table; first match wins
fn rules() -> &'static Vec<CategoryRule> {
    static RULES: OnceLock<Vec<CategoryRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        let table: &[(ErrorCategory, &str)] = &[
            (ErrorCategory::TimeoutError, r"(?i)\btime(?:d)?[\s_-]?out\b|\bdeadline exceeded\b"),
            (ErrorCategory::ConnectionError, r"(?i)\bconnection (?:refused|reset|closed)\b|\bconnect failed\b|\bbroken pipe\b"),
            (ErrorCategory::AuthError, r"(?i)\b(?:unauthoriz|forbidden|permission denied|invalid (?:token|credentials)|auth(?:entication)? failed)\b"),
            (ErrorCategory::DatabaseError, r"(?i)\b(?:sql|query|deadlock|constraint violation|duplicate key|database)\b.*\berror\b|\berror\b.*\b(?:sql|database)\b"),
            (ErrorCategory::NetworkError, r"(?i)\b(?:network unreachable|no route to host|dns (?:lookup|resolution) failed|socket error)\b"),
            (ErrorCategory::FilesystemError, r"(?i)\b(?:no such file or directory|file not found|disk full|no space left|enoent|eacces)\b"),
            (ErrorCategory::MemoryError, r"(?i)\b(?:out of memory|oom|heap space|memory exhausted|allocation failed)\b"),
            (ErrorCategory::NullError, r"(?i)\b(?:null ?pointer|nullreferenceexception|attributeerror.*none|cannot read propert(?:y|ies) of (?:null|undefined))\b"),
            (ErrorCategory::ValidationError, r"(?i)\b(?:validation failed|invalid (?:input|argument|request)|malformed|schema violation)\b"),
            (ErrorCategory::RateLimitError, r"(?i)\b(?:rate limit|too many requests|quota exceeded|throttled)\b"),
        ];
        table
            .iter()
            .map(|(cat, pat)| CategoryRule {
                category: *cat,
                pattern: Regex::new(pat).expect("static category pattern must compile"),
            })
            .collect()
    })
}

/// derive the error category for a message. no match -> Unknown.
pub fn categorize(message: &str) -> ErrorCategory {
    for rule in rules() {
        if rule.pattern.is_match(message) {
            return rule.category;
        }
    }
    ErrorCategory::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_timeout() {
        assert_eq!(categorize("Connection timed out after 30s"), ErrorCategory::TimeoutError);
    }

    #[test]
    fn detects_connection_error() {
        assert_eq!(categorize("connection refused by peer"), ErrorCategory::ConnectionError);
    }

    #[test]
    fn detects_null_error() {
        assert_eq!(categorize("NullPointerException at line 4"), ErrorCategory::NullError);
    }

    #[test]
    fn unknown_when_no_match() {
        assert_eq!(categorize("everything is fine"), ErrorCategory::Unknown);
    }

    #[test]
    fn timeout_wins_over_connection_when_both_present() {
        // timeout rule is earlier in the table
        assert_eq!(
            categorize("connection timed out while connecting"),
            ErrorCategory::TimeoutError
        );
    }
}
