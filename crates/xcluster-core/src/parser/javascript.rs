// JS/Node-style stack trace parser

use super::StackTraceParser;
use crate::{FrameLanguage, StackFrame};
use regex::Regex;
use std::sync::OnceLock;

pub struct JsParser {
    named_pattern: Regex,
    anon_pattern: Regex,
}

fn named_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*at\s+([^\s(]+)\s+\(([^:]+):(\d+):(\d+)\)").unwrap())
}

fn anon_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*at\s+([^:\s]+):(\d+):(\d+)").unwrap())
}

impl JsParser {
    pub fn new() -> Self {
        Self {
            named_pattern: named_re().clone(),
            anon_pattern: anon_re().clone(),
        }
    }
}

impl StackTraceParser for JsParser {
    fn name(&self) -> &'static str {
        "js"
    }

    fn detect(&self, text: &str) -> bool {
        text.lines().any(|l| self.named_pattern.is_match(l) || self.anon_pattern.is_match(l))
    }

    fn parse(&self, text: &str) -> Vec<StackFrame> {
        text.lines()
            .filter_map(|line| {
                if let Some(caps) = self.named_pattern.captures(line) {
                    let func = caps.get(1).map(|m| m.as_str()).unwrap_or("<anonymous>");
                    let file = caps.get(2).map(|m| m.as_str()).unwrap_or("");
                    let line_no: Option<u32> = caps.get(3).and_then(|m| m.as_str().parse().ok());
                    return Some(StackFrame {
                        file: file.to_string(),
                        symbol: func.to_string(),
                        line: line_no,
                        language: FrameLanguage::Js,
                        own_code: true,
                    });
                }
                if let Some(caps) = self.anon_pattern.captures(line) {
                    let file = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                    let line_no: Option<u32> = caps.get(2).and_then(|m| m.as_str().parse().ok());
                    return Some(StackFrame {
                        file: file.to_string(),
                        symbol: "<anonymous>".to_string(),
                        line: line_no,
                        language: FrameLanguage::Js,
                        own_code: true,
                    });
                }
                None
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_frames() {
        let parser = JsParser::new();
        let trace = "TypeError: Cannot read properties of undefined (reading 'id')\n    at getUser (/app/src/user.js:15:10)\n    at processRequest (/app/src/handler.js:40:5)";
        assert!(parser.detect(trace));
        let frames = parser.parse(trace);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].symbol, "getUser");
        assert_eq!(frames[0].file, "/app/src/user.js");
        assert_eq!(frames[0].line, Some(15));
    }

    #[test]
    fn parses_anonymous_frames() {
        let parser = JsParser::new();
        let trace = "Error: boom\n    at /app/src/index.js:3:1";
        let frames = parser.parse(trace);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].symbol, "<anonymous>");
    }
}
