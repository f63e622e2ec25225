//! Trait definitions for the converter module.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error::ConverterError;
use super::types::{ConversionRequest, ProgressSnapshot};

/// A converter that transcodes a video file and reports progress while doing so.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Returns the name of this converter implementation.
    fn name(&self) -> &str;

    /// Converts a file, sending progress updates to `updates`.
    ///
    /// `updates` is closed before this returns, whatever the outcome.
    /// If the receiver is dropped, the conversion continues without progress reporting.
    async fn convert(
        &self,
        request: ConversionRequest,
        updates: mpsc::Sender<ProgressSnapshot>,
    ) -> Result<PathBuf, ConverterError> {
        self.convert_with_cancel(request, updates, CancellationToken::new())
            .await
    }

    /// Like [`Converter::convert`], aborting with [`ConverterError::Cancelled`] when
    /// `cancel` fires.
    async fn convert_with_cancel(
        &self,
        request: ConversionRequest,
        updates: mpsc::Sender<ProgressSnapshot>,
        cancel: CancellationToken,
    ) -> Result<PathBuf, ConverterError>;
}
