//! `file` source adapter: tails a path/glob pattern from local disk. Tracks
//! a per-file byte offset across calls so a process restart resumes from
//! where it left off instead of re-reading the whole file.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader, SeekFrom};

use xcluster_core::{LogLevel, RawLogEntry};
use xcluster_store::LogSource;

use crate::adapter::{FetchError, FetchResult, FetchWindow, SourceAdapter};

pub struct FileAdapter {
    offsets: Mutex<HashMap<PathBuf, u64>>,
}

impl FileAdapter {
    pub fn new() -> Self {
        Self { offsets: Mutex::new(HashMap::new()) }
    }

    fn glob_pattern(&self, source: &LogSource) -> FetchResult<String> {
        source
            .connection_descriptor
            .get("glob")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(FetchError::BadDescriptor("glob"))
    }

    fn matching_paths(&self, pattern: &str) -> Vec<PathBuf> {
        glob::glob(pattern)
            .into_iter()
            .flatten()
            .filter_map(Result::ok)
            .collect()
    }

    async fn tail_one(&self, path: &PathBuf, _window: FetchWindow) -> FetchResult<Vec<RawLogEntry>> {
        let offset = self.offsets.lock().unwrap().get(path).copied().unwrap_or(0);

        let mut file = File::open(path).await.map_err(|e| FetchError::Transport(e.to_string()))?;
        let len = file.metadata().await.map_err(|e| FetchError::Transport(e.to_string()))?.len();
        if offset >= len {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(offset)).await.map_err(|e| FetchError::Transport(e.to_string()))?;
        let mut reader = BufReader::new(file);
        let mut entries = Vec::new();
        let mut bytes_read: u64 = 0;
        let mut line = String::new();

        loop {
            line.clear();
            let n = reader.read_line(&mut line).await.map_err(|e| FetchError::Transport(e.to_string()))?;
            if n == 0 {
                break;
            }
            bytes_read += n as u64;
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if !trimmed.is_empty() {
                entries.push(line_to_raw_log(trimmed));
            }
        }

        self.offsets.lock().unwrap().insert(path.clone(), offset + bytes_read);
        Ok(entries)
    }
}

impl Default for FileAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn line_to_raw_log(line: &str) -> RawLogEntry {
    // a JSON line is treated as a structured record matching the ingress
    // shape; anything else is wrapped as a bare message at INFO so the
    // extractor can still find an `exception_type`/stack trace inside it.
    if let Ok(parsed) = serde_json::from_str::<RawLogEntry>(line) {
        return parsed;
    }

    RawLogEntry {
        message: line.to_string(),
        timestamp: None,
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

#[async_trait]
impl SourceAdapter for FileAdapter {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch(&self, source: &LogSource, window: FetchWindow) -> FetchResult<Vec<RawLogEntry>> {
        let pattern = self.glob_pattern(source)?;
        let paths = self.matching_paths(&pattern);

        let mut all = Vec::new();
        for path in &paths {
            all.extend(self.tail_one(path, window).await?);
        }
        Ok(all)
    }
}
