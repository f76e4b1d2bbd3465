//! Fixed-schema timing lines.
//!
//! Each completed request produces exactly one JSON object on one line. The
//! server writes a [`TimingRecord`], the client a [`ClientTimingLine`]; both
//! carry the correlation ID so a log pipeline can join them.

use std::fmt::Debug;
use std::io::{self, Write};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

// ─── Records ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Info,
    Warning,
}

/// Server-side record, one per successful request. Field order is the
/// serialized order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingRecord {
    pub uuid: String,
    /// Rendered as `INFO` when unset.
    #[serde(default)]
    pub severity: Option<Severity>,
    pub request_received: String,
    pub api_call_start: String,
    /// Query phase duration in microseconds, as a decimal string.
    pub api_call_response: String,
    /// Whole handler duration in microseconds, as a decimal string.
    pub api_process_elapsed: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_scanned: Option<String>,
}

impl TimingRecord {
    pub fn render(&self) -> String {
        let record = Self {
            severity: Some(self.severity.unwrap_or_default()),
            ..self.clone()
        };
        to_line(&record)
    }
}

/// Client-side counterpart printed by every timed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientTimingLine {
    pub uuid: String,
    pub severity: Severity,
    pub start_request: String,
    pub get_response: String,
    pub client_elapsed: u64,
}

impl ClientTimingLine {
    pub fn render(&self) -> String {
        to_line(self)
    }
}

/// Serialize to one line. Never fails: on error a diagnostic goes to the
/// tracing output and the `Debug` form is returned instead.
pub fn to_line<T: Serialize + Debug>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        warn!(error = %e, "timing line serialization failed");
        format!("{value:?}")
    })
}

/// Human-readable timestamp in the configured zone, microsecond precision.
pub fn local_timestamp(at: DateTime<Utc>, zone: Tz) -> String {
    at.with_timezone(&zone)
        .format("%Y-%m-%d %H:%M:%S%.6f %z %Z")
        .to_string()
}

/// Microseconds from `start` to `end`; zero if the wall clock stepped back.
pub fn elapsed_micros(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start)
        .num_microseconds()
        .map_or(0, |us| us.max(0) as u64)
}

// ─── Sink ────────────────────────────────────────────────────────

/// Line-oriented output shared by concurrent tasks. Each line is written and
/// flushed under the lock, so lines never interleave.
#[derive(Clone)]
pub struct LineSink {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl LineSink {
    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// A sink that keeps everything in memory, plus a handle to read it back.
    pub fn memory() -> (Self, CapturedLines) {
        let captured = CapturedLines::default();
        (Self::from_writer(captured.clone()), captured)
    }

    pub fn write_line(&self, line: &str) {
        let mut out = self.out.lock();
        if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
            warn!(error = %e, "cannot write timing line");
        }
    }
}

#[derive(Clone, Default)]
pub struct CapturedLines(Arc<Mutex<Vec<u8>>>);

impl CapturedLines {
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock())
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

impl Write for CapturedLines {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
