//! Configuration for the converter module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the FFmpeg-based converter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Explicit path to the ffmpeg binary. When unset, `ffmpeg_name` is looked up in `PATH`.
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Executable name used for the `PATH` lookup.
    #[serde(default = "default_ffmpeg_name")]
    pub ffmpeg_name: String,

    /// Video encoder passed to `-c:v`.
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    /// Encoder preset passed to `-preset`.
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Pass `-y` so an existing output file is overwritten.
    #[serde(default)]
    pub overwrite: bool,

    /// Capacity of the progress update channel.
    #[serde(default = "default_progress_buffer")]
    pub progress_buffer: usize,

    /// Kill the conversion after this many seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Number of trailing stderr lines kept for error reports.
    #[serde(default = "default_stderr_tail_lines")]
    pub stderr_tail_lines: usize,

    /// Additional ffmpeg arguments, inserted before the output path.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,
}

fn default_ffmpeg_name() -> String {
    "ffmpeg".to_string()
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_preset() -> String {
    "medium".to_string()
}

fn default_progress_buffer() -> usize {
    64
}

fn default_stderr_tail_lines() -> usize {
    20
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffmpeg_name: default_ffmpeg_name(),
            video_codec: default_video_codec(),
            preset: default_preset(),
            overwrite: false,
            progress_buffer: default_progress_buffer(),
            timeout_secs: None,
            stderr_tail_lines: default_stderr_tail_lines(),
            extra_ffmpeg_args: Vec::new(),
        }
    }
}

impl ConverterConfig {
    /// Creates a config pointing at a specific ffmpeg binary.
    pub fn with_ffmpeg_path(path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    /// Enables or disables overwriting existing output files.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Sets the progress channel capacity.
    pub fn with_progress_buffer(mut self, capacity: usize) -> Self {
        self.progress_buffer = capacity;
        self
    }
}
