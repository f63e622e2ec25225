//! Converter module for transcoding video files through ffmpeg.
//!
//! This module provides the `Converter` trait and an ffmpeg implementation that
//! reports live progress while the conversion runs.
//!
//! # Features
//!
//! - MP4, AVI, MKV and WebM output
//! - Incremental parsing of ffmpeg's `-progress` stream
//! - Progress delivered over a bounded channel that closes before the outcome is reported
//! - Cancellation and optional timeout
//!
//! # Example
//!
//! ```ignore
//! use vidconv_core::converter::{spawn_conversion, ConversionRequest, FfmpegConverter, OutputFormat};
//!
//! let converter = Arc::new(FfmpegConverter::with_defaults()?);
//! let request = ConversionRequest::new("clip.h265", OutputFormat::Mp4, 23)?;
//!
//! let mut handle = spawn_conversion(converter, request, 64);
//! while let Some(update) = handle.next_update().await {
//!     println!("{:.0}% {}", update.progress * 100.0, update);
//! }
//! let output = handle.wait().await?;
//! println!("Saved to {}", output.display());
//! ```

mod config;
mod error;
mod ffmpeg;
mod progress;
mod session;
mod traits;
mod types;

pub use config::ConverterConfig;
pub use error::ConverterError;
pub use ffmpeg::FfmpegConverter;
pub use progress::{ProgressAccumulator, ProgressParser, PROGRESS_UNITS};
pub use session::{spawn_conversion, ConversionHandle};
pub use traits::Converter;
pub use types::{
    change_extension, ConversionRequest, ConversionState, OutputFormat, ProgressSnapshot,
    MAX_QUALITY,
};
