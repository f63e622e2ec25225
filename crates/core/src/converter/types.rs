//! Types for the converter module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::error::ConverterError;

/// Highest accepted quality value (x264 CRF scale).
pub const MAX_QUALITY: u8 = 51;

/// Output container format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// MPEG-4 Part 14 (.mp4)
    #[default]
    Mp4,
    /// Audio Video Interleave (.avi)
    Avi,
    /// Matroska (.mkv)
    Mkv,
    /// WebM (.webm)
    Webm,
}

impl OutputFormat {
    /// All supported formats, in menu order.
    pub const ALL: [OutputFormat; 4] = [Self::Mp4, Self::Avi, Self::Mkv, Self::Webm];

    /// Returns the file extension for this container.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Avi => "avi",
            Self::Mkv => "mkv",
            Self::Webm => "webm",
        }
    }

    /// Format-specific codec arguments appended after the common video arguments.
    ///
    /// WebM overrides the video codec as well, since libx264 cannot be muxed into it.
    pub fn codec_overrides(&self) -> &'static [&'static str] {
        match self {
            Self::Mp4 => &["-c:a", "aac"],
            Self::Avi => &["-c:a", "mp3"],
            Self::Mkv => &["-c:a", "aac"],
            Self::Webm => &["-c:v", "libvpx-vp9", "-c:a", "libopus"],
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = ConverterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_start_matches('.').to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.extension() == normalized)
            .ok_or_else(|| {
                ConverterError::invalid_request(format!("unsupported output format: {}", s))
            })
    }
}

/// A single conversion request.
///
/// Built through [`ConversionRequest::new`], which rejects out-of-range quality values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    input_path: PathBuf,
    format: OutputFormat,
    quality: u8,
}

impl ConversionRequest {
    /// Creates a request, validating the quality range (0-51, lower is better).
    pub fn new(
        input_path: impl Into<PathBuf>,
        format: OutputFormat,
        quality: u8,
    ) -> Result<Self, ConverterError> {
        if quality > MAX_QUALITY {
            return Err(ConverterError::invalid_request(format!(
                "quality must be between 0 and {}, got {}",
                MAX_QUALITY, quality
            )));
        }

        Ok(Self {
            input_path: input_path.into(),
            format,
            quality,
        })
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Path the converted file will be written to.
    pub fn output_path(&self) -> PathBuf {
        change_extension(&self.input_path, self.format.extension())
    }
}

/// Replaces the extension of `path` with `extension`, appending it when there is none.
///
/// Directory and base name are preserved.
pub fn change_extension(path: &Path, extension: &str) -> PathBuf {
    path.with_extension(extension)
}

/// One progress update parsed from ffmpeg's `-progress` output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Frames encoded so far.
    pub frame: u64,
    /// Current encoding speed in frames per second.
    pub fps: f64,
    /// Bitrate token as reported, e.g. "1200kb/s".
    pub bitrate: String,
    /// Media time processed, "HH:MM:SS.frac".
    pub time: String,
    /// Completion estimate: `out_time_ms / 1_000_000`.
    ///
    /// This is not derived from the input duration and is not clamped, so it can exceed 1.0.
    pub progress: f64,
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame: {} | FPS: {:.2} | Bitrate: {} | Time: {}",
            self.frame, self.fps, self.bitrate, self.time
        )
    }
}

/// Lifecycle of a single conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionState {
    Idle,
    Starting,
    /// The process is running and producing updates.
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl ConversionState {
    /// Terminal states have no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Terminal state matching a conversion outcome.
    pub fn from_outcome<T>(outcome: &Result<T, ConverterError>) -> Self {
        match outcome {
            Ok(_) => Self::Succeeded,
            Err(ConverterError::Cancelled) => Self::Cancelled,
            Err(_) => Self::Failed,
        }
    }
}
