use std::collections::HashMap;
use xcluster_core::parser::ParserRegistry;
use xcluster_core::{LogLevel, NormalizedLog, RawLogEntry};

fn normalized(message: &str, level: LogLevel, stack_trace: Option<&str>, exception_type: Option<&str>) -> NormalizedLog {
    let raw = RawLogEntry {
        message: message.to_string(),
        timestamp: Some(chrono::Utc::now()),
        service_id: Some("web-api".to_string()),
        level: Some(level),
        logger: Some("com.x.Handler".to_string()),
        exception_type: exception_type.map(|s| s.to_string()),
        exception_message: None,
        stack_trace: stack_trace.map(|s| s.to_string()),
        hostname: None,
        trace_id: None,
        request_id: None,
        fields: HashMap::new(),
    };
    NormalizedLog::from_raw(raw, "web-api".to_string())
}

#[test]
fn stack_traced_java_error_fingerprint() {
    let registry = ParserRegistry::default_registry();
    let trace = "java.lang.NullPointerException\n\tat com.x.UserService.getUser(UserService.java:45)\n\tat com.x.Handler.handle(Handler.java:12)";
    let log = normalized("NullPointerException", LogLevel::Error, Some(trace), Some("NullPointerException"));

    let record = registry.extract(&log).expect("should extract");
    assert!(record.has_stack_trace);
    assert_eq!(record.frames.len(), 2);

    let expected = xcluster_core::parser::short_hash(
        "NullPointerException|UserService.java:com.x.UserService.getUser|Handler.java:com.x.Handler.handle",
    );
    assert_eq!(record.fingerprint_static, expected);
}

#[test]
fn repeated_stack_traced_error_yields_same_key() {
    let registry = ParserRegistry::default_registry();
    let trace = "java.lang.NullPointerException\n\tat com.x.UserService.getUser(UserService.java:45)\n\tat com.x.Handler.handle(Handler.java:12)";
    let a = normalized("NullPointerException", LogLevel::Error, Some(trace), Some("NullPointerException"));
    let b = normalized("NullPointerException", LogLevel::Error, Some(trace), Some("NullPointerException"));

    let ra = registry.extract(&a).unwrap();
    let rb = registry.extract(&b).unwrap();
    assert_eq!(ra.fingerprint_static, rb.fingerprint_static);
}

#[test]
fn stack_less_messages_share_template_key() {
    let registry = ParserRegistry::default_registry();
    let a = normalized("Connection failed to 10.0.0.1:5432 at 2025-01-01T00:00:00Z", LogLevel::Error, None, None);
    let b = normalized("Connection failed to 10.0.0.2:5432 at 2025-01-01T00:01:00Z", LogLevel::Error, None, None);

    // neither has a stack trace or exception header: both resolve via
    // the template fingerprint once an exception_type is implied by logger+level.
    // simulate the extractor treating them as exceptions via explicit type.
    let a = normalized("Connection failed to 10.0.0.1:5432 at 2025-01-01T00:00:00Z", LogLevel::Error, None, Some("ConnectionError"));
    let b = normalized("Connection failed to 10.0.0.2:5432 at 2025-01-01T00:01:00Z", LogLevel::Error, None, Some("ConnectionError"));
    let ra = registry.extract(&a).unwrap();
    let rb = registry.extract(&b).unwrap();
    assert!(!ra.has_stack_trace);
    assert_eq!(ra.fingerprint_static, ra.fingerprints.template);
    assert_eq!(ra.fingerprint_static, rb.fingerprint_static);
}

#[test]
fn non_error_level_never_extracts() {
    let registry = ParserRegistry::default_registry();
    let log = normalized("just some info", LogLevel::Info, None, Some("Whatever"));
    assert!(registry.extract(&log).is_none());
}

#[test]
fn no_evidence_of_exception_skips() {
    let registry = ParserRegistry::default_registry();
    let log = normalized("server started on port 8080", LogLevel::Error, None, None);
    assert!(registry.extract(&log).is_none());
}
