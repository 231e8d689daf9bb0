//! `cloudwatch` source adapter: a thin wrapper over the CloudWatch Logs
//! client, paginating `FilterLogEvents` by the window the Fetcher computed.

use async_trait::async_trait;
use aws_sdk_cloudwatchlogs::Client;
use serde_json::Value;

use xcluster_core::{LogLevel, RawLogEntry};
use xcluster_store::LogSource;

use crate::adapter::{FetchError, FetchResult, FetchWindow, SourceAdapter};

pub struct CloudWatchAdapter {
    client: Client,
}

impl CloudWatchAdapter {
    pub async fn new() -> Self {
        let region = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self { client: Client::new(&region) }
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn log_group(&self, source: &LogSource) -> FetchResult<String> {
        source
            .connection_descriptor
            .get("log_group_pattern")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(FetchError::BadDescriptor("log_group_pattern"))
    }
}

#[async_trait]
impl SourceAdapter for CloudWatchAdapter {
    fn name(&self) -> &'static str {
        "cloudwatch"
    }

    async fn fetch(&self, source: &LogSource, window: FetchWindow) -> FetchResult<Vec<RawLogEntry>> {
        let log_group = self.log_group(source)?;
        let mut entries = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .filter_log_events()
                .log_group_name(&log_group)
                .start_time(window.start.timestamp_millis())
                .end_time(window.end.timestamp_millis());

            if let Some(token) = &next_token {
                request = request.next_token(token);
            }
            if let Some(filter) = &source.query_filter {
                request = request.filter_pattern(filter);
            }

            let page = request.send().await.map_err(|e| FetchError::Transport(e.to_string()))?;

            for event in page.events() {
                entries.push(event_to_raw_log(event));
            }

            next_token = page.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }

        Ok(entries)
    }
}

fn event_to_raw_log(event: &aws_sdk_cloudwatchlogs::types::FilteredLogEvent) -> RawLogEntry {
    let message = event.message().unwrap_or_default().to_string();
    let timestamp = event.timestamp().and_then(|ms| chrono::DateTime::from_timestamp_millis(ms));

    // CloudWatch events have no structured level/logger fields of their own;
    // the extractor's own detection (exception_type / stack trace heuristics)
    // is what classifies these, so level defaults to ERROR and lets the
    // extractor decide based on message content.
    RawLogEntry {
        message,
        timestamp,
        service_id: None,
        level: Some(LogLevel::Error),
        logger: None,
        exception_type: None,
        exception_message: None,
        stack_trace: None,
        hostname: None,
        trace_id: None,
        request_id: None,
        fields: Default::default(),
    }
}
