//! Testing utilities and mock implementations.
//!
//! This module provides a mock [`Converter`](crate::converter::Converter),
//! allowing callers of the conversion API to be tested without ffmpeg.
//!
//! # Example
//!
//! ```rust,ignore
//! use vidconv_core::testing::{fixtures, MockConverter};
//!
//! let converter = Arc::new(MockConverter::new());
//! converter.set_step_delay(Duration::from_millis(10)).await;
//!
//! let handle = spawn_conversion(converter, fixtures::request("clip.h265", OutputFormat::Mp4), 8);
//! ```

mod mock_converter;

pub use mock_converter::{MockConverter, RecordedConversion};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::converter::{ConversionRequest, OutputFormat, ProgressSnapshot};

    /// Create a request with the default quality (23).
    pub fn request(input: &str, format: OutputFormat) -> ConversionRequest {
        ConversionRequest::new(input, format, 23).expect("quality 23 is valid")
    }

    /// Create a snapshot as the parser would emit it after `out_time_ms`.
    pub fn progress_snapshot(frame: u64, out_time_ms: u64) -> ProgressSnapshot {
        ProgressSnapshot {
            frame,
            fps: 25.0,
            bitrate: "1200kb/s".to_string(),
            time: "00:00:00.00".to_string(),
            progress: out_time_ms as f64 / 1_000_000.0,
        }
    }

    /// A complete `-progress` block, as ffmpeg writes it to stdout.
    pub fn progress_block(frame: u64, fps: f64, bitrate: &str, time: &str, out_time_ms: u64) -> String {
        format!(
            "frame={frame}\nfps={fps}\nbitrate={bitrate}\ntime={time}\nout_time_ms={out_time_ms}\nprogress=continue\n"
        )
    }
}
