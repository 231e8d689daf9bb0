//! Shared adapter for `opensearch` and `elasticsearch` sources: both speak
//! the same query-DSL-over-REST wire format, and only differ in their
//! default port and a handful of response-shape quirks, so one adapter
//! covers both type tags.

use async_trait::async_trait;
use serde_json::{json, Value};

use xcluster_core::{LogLevel, RawLogEntry};
use xcluster_store::{LogSource, SourceType};

use crate::adapter::{FetchError, FetchResult, FetchWindow, SourceAdapter};

pub struct SearchAdapter {
    client: reqwest::Client,
}

impl SearchAdapter {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }

    fn endpoint(&self, source: &LogSource) -> FetchResult<String> {
        let host = source.connection_descriptor.get("host").and_then(Value::as_str).ok_or(FetchError::BadDescriptor("host"))?;
        let default_port = match source.source_type {
            SourceType::Elasticsearch => 9200,
            _ => 9200,
        };
        let port = source.connection_descriptor.get("port").and_then(Value::as_u64).unwrap_or(default_port);
        let scheme = if source.connection_descriptor.get("tls").and_then(Value::as_bool).unwrap_or(true) { "https" } else { "http" };
        Ok(format!("{scheme}://{host}:{port}/{}/_search", source.index_pattern))
    }

    fn auth(&self, source: &LogSource) -> Option<(String, String)> {
        let creds = source.connection_descriptor.get("credentials")?;
        let user = creds.get("username").and_then(Value::as_str)?.to_string();
        let pass = creds.get("password").and_then(Value::as_str).unwrap_or("").to_string();
        Some((user, pass))
    }

    fn build_query(&self, source: &LogSource, window: FetchWindow) -> Value {
        let mut must = vec![json!({
            "range": {
                "@timestamp": {
                    "gte": window.start.to_rfc3339(),
                    "lte": window.end.to_rfc3339(),
                }
            }
        })];

        if let Some(filter) = &source.query_filter {
            must.push(json!({ "query_string": { "query": filter } }));
        }

        json!({
            "query": { "bool": { "must": must } },
            "sort": [{ "@timestamp": "asc" }],
            "size": 1000,
        })
    }
}

impl Default for SearchAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for SearchAdapter {
    fn name(&self) -> &'static str {
        "opensearch/elasticsearch"
    }

    async fn fetch(&self, source: &LogSource, window: FetchWindow) -> FetchResult<Vec<RawLogEntry>> {
        let url = self.endpoint(source)?;
        let body = self.build_query(source, window);

        let mut request = self.client.post(&url).json(&body);
        if let Some((user, pass)) = self.auth(source) {
            request = request.basic_auth(user, Some(pass));
        }

        let response = request.send().await.map_err(|e| FetchError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Transport(format!("{status}: {body}")));
        }

        let payload: Value = response.json().await.map_err(|e| FetchError::MalformedResponse(e.to_string()))?;
        let hits = payload
            .get("hits")
            .and_then(|h| h.get("hits"))
            .and_then(Value::as_array)
            .ok_or_else(|| FetchError::MalformedResponse("missing hits.hits array".to_string()))?;

        Ok(hits.iter().filter_map(hit_to_raw_log).collect())
    }
}

fn hit_to_raw_log(hit: &Value) -> Option<RawLogEntry> {
    let source = hit.get("_source")?;
    let message = source.get("message").and_then(Value::as_str)?.to_string();

    let timestamp = source
        .get("@timestamp")
        .and_then(Value::as_str)
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc));

    let level = source
        .get("level")
        .and_then(Value::as_str)
        .and_then(LogLevel::from_str);

    Some(RawLogEntry {
        message,
        timestamp,
        service_id: source.get("service_id").and_then(Value::as_str).map(str::to_string),
        level,
        logger: source.get("logger").and_then(Value::as_str).map(str::to_string),
        exception_type: source.get("exception_type").and_then(Value::as_str).map(str::to_string),
        exception_message: source.get("exception_message").and_then(Value::as_str).map(str::to_string),
        stack_trace: source.get("stack_trace").and_then(Value::as_str).map(str::to_string),
        hostname: source.get("hostname").and_then(Value::as_str).map(str::to_string),
        trace_id: source.get("trace_id").and_then(Value::as_str).map(str::to_string),
        request_id: source.get("request_id").and_then(Value::as_str).map(str::to_string),
        fields: Default::default(),
    })
}
