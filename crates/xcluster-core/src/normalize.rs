//! Message normalization - strips volatile tokens so structurally identical
//! messages collapse to the same template.

use regex::Regex;
use std::sync::OnceLock;

struct Substitution {
    pattern: Regex,
    placeholder: &'static str,
}

// order matters: greedy patterns (URL) must run before their substrings (PATH, NUMBER)
fn substitutions() -> &'static Vec<Substitution> {
    static SUBS: OnceLock<Vec<Substitution>> = OnceLock::new();
    SUBS.get_or_init(|| {
        let table: &[(&str, &str)] = &[
            (r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}", "<UUID>"),
            (r"https?://[^\s'\"]+", "<URL>"),
            (r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}", "<EMAIL>"),
            (r"(?:/[\w.\-]+){2,}|(?:[A-Za-z]:\\[\w.\-\\]+)|\./[\w./\-]+", "<PATH>"),
            (r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?", "<TIMESTAMP>"),
            (r"\b(?:\d{1,3}\.){3}\d{1,3}\b|\b(?:[0-9a-fA-F]{1,4}:){2,7}[0-9a-fA-F]{0,4}\b", "<IP>"),
            (r"\{[^{}]*\}|\[[^\[\]]*\]", "<JSON>"),
            (r"\b[0-9a-fA-F]{16,}\b|\b(?:id|user)[_-]\d+\b", "<ID>"),
            (r"\b\d{3,}(?:\.\d+)?\b", "<NUMBER>"),
        ];
        table
            .iter()
            .map(|(pat, ph)| Substitution {
                pattern: Regex::new(pat).expect("static normalize pattern must compile"),
                placeholder: ph,
            })
            .collect()
    })
}

/// Normalize a raw message: replace volatile tokens, lowercase, collapse whitespace.
/// Never fails - falls back to the lowercased original on any internal error.
pub fn normalize(message: &str) -> String {
    let mut out = message.to_string();
    for sub in substitutions() {
        out = sub.pattern.replace_all(&out, sub.placeholder).into_owned();
    }
    let lowered = out.to_lowercase();
    collapse_whitespace(&lowered)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent() {
        let msg = "Connection failed to 10.0.0.1:5432 at 2025-01-01T00:00:00Z";
        let once = normalize(msg);
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn ip_and_timestamp_collapse() {
        let a = normalize("Connection failed to 10.0.0.1:5432 at 2025-01-01T00:00:00Z");
        let b = normalize("Connection failed to 10.0.0.2:5432 at 2025-01-01T00:01:00Z");
        assert_eq!(a, b);
    }

    #[test]
    fn uuid_becomes_placeholder() {
        let msg = "user 550e8400-e29b-41d4-a716-446655440000 not found";
        assert!(normalize(msg).contains("<uuid>"));
    }

    #[test]
    fn url_collapses_before_path() {
        let msg = "failed GET https://api.example.com/v1/users/123";
        let out = normalize(msg);
        assert!(out.contains("<url>"));
        assert!(!out.contains("api.example.com"));
    }

    #[test]
    fn never_panics_on_garbage() {
        let _ = normalize("\u{0}\u{1}\u{2}ÿÿÿ{{{{{{");
    }
}
