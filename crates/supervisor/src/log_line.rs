//! Backend log-line protocol: line assembly and severity classification.
//! 後端日誌行協定：組合完整行並分類嚴重程度。

use std::fmt;

use tracing::{debug, error, info, warn};

/// Severity assigned to one backend output line.
/// 後端輸出行的嚴重程度。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogSeverity::Debug => "debug",
            LogSeverity::Info => "info",
            LogSeverity::Warning => "warning",
            LogSeverity::Error => "error",
        };
        f.write_str(name)
    }
}

const TAGS: [(&str, LogSeverity); 4] = [
    ("INFO:", LogSeverity::Info),
    ("WARNING:", LogSeverity::Warning),
    ("ERROR:", LogSeverity::Error),
    ("DEBUG:", LogSeverity::Debug),
];

/// Splits a leading severity tag off `line`; untagged lines are debug.
/// 拆出行首的嚴重程度標記；沒有標記的行視為 debug。
pub fn classify_line(line: &str) -> (LogSeverity, &str) {
    let line = line.trim();
    for (tag, severity) in TAGS {
        if let Some(rest) = line.strip_prefix(tag) {
            return (severity, rest.trim_start());
        }
    }
    (LogSeverity::Debug, line)
}

/// Emits a classified backend line through `tracing` under the `backend` target.
pub fn forward(severity: LogSeverity, message: &str) {
    match severity {
        LogSeverity::Debug => debug!(target: "backend", "{message}"),
        LogSeverity::Info => info!(target: "backend", "{message}"),
        LogSeverity::Warning => warn!(target: "backend", "{message}"),
        LogSeverity::Error => error!(target: "backend", "{message}"),
    }
}

/// Reassembles complete lines from arbitrarily split output chunks.
/// 將任意切割的輸出片段重新組合為完整的行。
#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every completed, non-empty line (trimmed).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(newline) = self.pending.iter().position(|byte| *byte == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=newline).collect();
            if let Some(line) = normalize(&raw) {
                lines.push(line);
            }
        }
        lines
    }

    /// Flushes a trailing line that was never terminated.
    /// 輸出結束時送出尚未換行的最後一行。
    pub fn finish(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.pending);
        normalize(&raw)
    }
}

fn normalize(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
