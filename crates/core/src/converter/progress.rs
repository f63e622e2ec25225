//! Parser for ffmpeg's machine-readable `-progress` output.
//!
//! ffmpeg writes blocks of `key=value` lines. Fields are collected into a
//! [`ProgressAccumulator`] and a [`ProgressSnapshot`] is emitted every time the
//! `out_time_ms` marker is seen. Fields carry over between snapshots until
//! ffmpeg reports a new value.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::types::ProgressSnapshot;

/// `out_time_ms` units that count as "complete" for the progress estimate.
pub const PROGRESS_UNITS: f64 = 1_000_000.0;

/// Pending bytes without a newline beyond this are discarded.
const MAX_PENDING_LINE: usize = 64 * 1024;

static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"time=(\d+:\d+:\d+\.\d+)").expect("valid time regex"));
static FRAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"frame=(\d+)").expect("valid frame regex"));
static FPS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"fps=(\d+\.?\d*)").expect("valid fps regex"));
static BITRATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"bitrate=(\d+\.?\d*kb/s)").expect("valid bitrate regex"));
static MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"out_time_ms=(\d+)").expect("valid marker regex"));

fn capture<'a>(re: &Regex, line: &'a str) -> Option<&'a str> {
    re.captures(line).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Fields seen since the stream started.
#[derive(Debug, Clone, Default)]
pub struct ProgressAccumulator {
    current: ProgressSnapshot,
}

impl ProgressAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one line and returns a snapshot if the line carried the progress marker.
    ///
    /// Unknown lines and unparsable numbers leave the accumulator untouched.
    pub fn apply_line(&mut self, line: &str) -> Option<ProgressSnapshot> {
        if let Some(time) = capture(&TIME_RE, line) {
            self.current.time = time.to_string();
        }
        if let Some(frame) = capture(&FRAME_RE, line).and_then(|v| v.parse().ok()) {
            self.current.frame = frame;
        }
        if let Some(fps) = capture(&FPS_RE, line).and_then(|v| v.parse().ok()) {
            self.current.fps = fps;
        }
        if let Some(bitrate) = capture(&BITRATE_RE, line) {
            self.current.bitrate = bitrate.to_string();
        }

        let out_time = capture(&MARKER_RE, line).and_then(|v| v.parse::<u64>().ok())?;
        self.current.progress = out_time as f64 / PROGRESS_UNITS;
        Some(self.current.clone())
    }

    /// Latest values, including fields not yet emitted.
    pub fn current(&self) -> &ProgressSnapshot {
        &self.current
    }
}

/// Incremental parser over raw stdout chunks.
///
/// Chunks may split lines anywhere; the trailing partial line is kept until
/// the rest of it arrives.
#[derive(Debug, Default)]
pub struct ProgressParser {
    accumulator: ProgressAccumulator,
    pending: Vec<u8>,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns the snapshots completed by it, in stream order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ProgressSnapshot> {
        let mut snapshots = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            rest = &tail[1..];

            if self.pending.is_empty() {
                self.parse_bytes(head, &mut snapshots);
            } else {
                self.pending.extend_from_slice(head);
                let line = std::mem::take(&mut self.pending);
                self.parse_bytes(&line, &mut snapshots);
            }
        }

        self.pending.extend_from_slice(rest);
        if self.pending.len() > MAX_PENDING_LINE {
            tracing::warn!(
                bytes = self.pending.len(),
                "Discarding oversized progress line"
            );
            self.pending.clear();
        }

        snapshots
    }

    /// Parses whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<ProgressSnapshot> {
        if self.pending.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.pending);
        let mut snapshots = Vec::with_capacity(1);
        self.parse_bytes(&line, &mut snapshots);
        snapshots.pop()
    }

    pub fn accumulator(&self) -> &ProgressAccumulator {
        &self.accumulator
    }

    fn parse_bytes(&mut self, bytes: &[u8], out: &mut Vec<ProgressSnapshot>) {
        let line = String::from_utf8_lossy(bytes);
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            return;
        }
        if let Some(snapshot) = self.accumulator.apply_line(line) {
            out.push(snapshot);
        }
    }
}
