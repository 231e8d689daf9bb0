// Python-style traceback parser (paired File/line + source line)

use super::StackTraceParser;
use crate::{FrameLanguage, StackFrame};
use regex::Regex;
use std::sync::OnceLock;

pub struct PythonParser {
    frame_pattern: Regex,
}

fn frame_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^\s*File "([^"]+)", line (\d+), in (\S+)"#).unwrap())
}

impl PythonParser {
    pub fn new() -> Self {
        Self { frame_pattern: frame_re().clone() }
    }
}

impl StackTraceParser for PythonParser {
    fn name(&self) -> &'static str {
        "python"
    }

    fn detect(&self, text: &str) -> bool {
        text.contains("Traceback (most recent call last)") || text.lines().any(|l| self.frame_pattern.is_match(l))
    }

    fn parse(&self, text: &str) -> Vec<StackFrame> {
        text.lines()
            .filter_map(|line| {
                self.frame_pattern.captures(line).map(|caps| {
                    let file = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                    let line_no: Option<u32> = caps.get(2).and_then(|m| m.as_str().parse().ok());
                    let func = caps.get(3).map(|m| m.as_str()).unwrap_or("");

                    StackFrame {
                        file: file.to_string(),
                        symbol: func.to_string(),
                        line: line_no,
                        language: FrameLanguage::Python,
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
    fn parses_traceback() {
        let parser = PythonParser::new();
        let trace = "Traceback (most recent call last):\n  File \"/app/handlers.py\", line 42, in handle_request\n    raise ValueError(\"bad input\")\nValueError: bad input";
        assert!(parser.detect(trace));
        let frames = parser.parse(trace);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].file, "/app/handlers.py");
        assert_eq!(frames[0].symbol, "handle_request");
        assert_eq!(frames[0].line, Some(42));
    }

    #[test]
    fn multiple_frames_in_order() {
        let parser = PythonParser::new();
        let trace = "Traceback (most recent call last):\n  File \"a.py\", line 1, in foo\n  File \"b.py\", line 2, in bar";
        let frames = parser.parse(trace);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].symbol, "foo");
        assert_eq!(frames[1].symbol, "bar");
    }
}
