// Java-style stack trace parser

use super::StackTraceParser;
use crate::{FrameLanguage, StackFrame};
use regex::Regex;
use std::sync::OnceLock;

pub struct JavaParser {
    frame_pattern: Regex,
    caused_by_pattern: Regex,
}

fn frame_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*at\s+([\w$.]+)\.(\w+)\(([^:()]+)(?::(\d+))?\)").unwrap())
}

fn caused_by_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Caused by:\s*([\w.$]+)").unwrap())
}

impl JavaParser {
    pub fn new() -> Self {
        Self {
            frame_pattern: frame_re().clone(),
            caused_by_pattern: caused_by_re().clone(),
        }
    }
}

impl StackTraceParser for JavaParser {
    fn name(&self) -> &'static str {
        "java"
    }

    fn detect(&self, text: &str) -> bool {
        text.lines().any(|l| self.frame_pattern.is_match(l))
    }

    fn parse(&self, text: &str) -> Vec<StackFrame> {
        // the chain root (outermost "Caused by:") is discarded; the
        // originating frame block stays at position 0. we keep the first
        // contiguous run of "at ..." lines after the last "Caused by:".
        let mut last_caused_by_idx = None;
        for (i, line) in text.lines().enumerate() {
            if self.caused_by_pattern.is_match(line) {
                last_caused_by_idx = Some(i);
            }
        }

        let lines: Vec<&str> = text.lines().collect();
        let start = last_caused_by_idx.map(|i| i + 1).unwrap_or(0);

        lines[start..]
            .iter()
            .filter_map(|line| {
                self.frame_pattern.captures(line).map(|caps| {
                    let class = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                    let method = caps.get(2).map(|m| m.as_str()).unwrap_or("");
                    let file = caps.get(3).map(|m| m.as_str()).unwrap_or("");
                    let line_no: Option<u32> = caps.get(4).and_then(|m| m.as_str().parse().ok());

                    StackFrame {
                        file: file.to_string(),
                        symbol: format!("{}.{}", class, method),
                        line: line_no,
                        language: FrameLanguage::Java,
                        own_code: true,
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_trace() {
        let parser = JavaParser::new();
        let trace = "java.lang.NullPointerException\n\tat com.x.UserService.getUser(UserService.java:45)\n\tat com.x.Handler.handle(Handler.java:12)";
        assert!(parser.detect(trace));
        let frames = parser.parse(trace);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].symbol, "com.x.UserService.getUser");
        assert_eq!(frames[0].file, "UserService.java");
        assert_eq!(frames[0].line, Some(45));
    }

    #[test]
    fn drops_chain_root_keeps_originating_frame() {
        let parser = JavaParser::new();
        let trace = "com.x.OuterException: wrapped\n\tat com.x.Outer.call(Outer.java:10)\nCaused by: java.sql.SQLException: timeout\n\tat com.x.Dao.query(Dao.java:30)";
        let frames = parser.parse(trace);
        assert_eq!(frames[0].file, "Dao.java");
    }

    #[test]
    fn no_match_on_plain_text() {
        let parser = JavaParser::new();
        assert!(!parser.detect("just a regular log line"));
    }
}
