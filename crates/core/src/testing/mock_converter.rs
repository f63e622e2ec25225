//! Mock converter for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::converter::{
    ConversionRequest, Converter, ConverterError, ProgressSnapshot,
};

/// A recorded conversion request for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedConversion {
    /// The request that was submitted.
    pub request: ConversionRequest,
    /// Whether the conversion succeeded.
    pub success: bool,
}

/// Mock implementation of the Converter trait.
///
/// Provides controllable behavior for testing:
/// - Track conversion requests for assertions
/// - Simulate success/failure
/// - Script the progress updates sent during conversion
/// - Hang until cancelled
///
/// # Example
///
/// ```rust,ignore
/// use vidconv_core::testing::MockConverter;
///
/// let converter = MockConverter::new();
/// converter.set_snapshots(vec![fixtures::progress_snapshot(10, 500_000)]).await;
///
/// let output = converter.convert(request, tx).await?;
///
/// let conversions = converter.recorded_conversions().await;
/// assert_eq!(conversions.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockConverter {
    /// Recorded conversions.
    conversions: Arc<RwLock<Vec<RecordedConversion>>>,
    /// Snapshots sent during each conversion, in order.
    snapshots: Arc<RwLock<Vec<ProgressSnapshot>>>,
    /// If set, the next conversion fails with this error after sending its snapshots.
    next_error: Arc<RwLock<Option<ConverterError>>>,
    /// Delay before each snapshot.
    step_delay_ms: Arc<RwLock<u64>>,
    /// After sending snapshots, wait for cancellation instead of finishing.
    hang: Arc<RwLock<bool>>,
}

impl Default for MockConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConverter {
    /// Create a new mock converter.
    pub fn new() -> Self {
        Self {
            conversions: Arc::new(RwLock::new(Vec::new())),
            snapshots: Arc::new(RwLock::new(Self::default_snapshots())),
            next_error: Arc::new(RwLock::new(None)),
            step_delay_ms: Arc::new(RwLock::new(0)),
            hang: Arc::new(RwLock::new(false)),
        }
    }

    /// Five evenly spaced snapshots ending at progress 1.0.
    pub fn default_snapshots() -> Vec<ProgressSnapshot> {
        (1..=5u64)
            .map(|i| ProgressSnapshot {
                frame: i * 30,
                fps: 30.0,
                bitrate: "1000.0kb/s".to_string(),
                time: format!("00:00:{:02}.00", i),
                progress: i as f64 / 5.0,
            })
            .collect()
    }

    /// Get all recorded conversions.
    pub async fn recorded_conversions(&self) -> Vec<RecordedConversion> {
        self.conversions.read().await.clone()
    }

    /// Clear recorded conversions.
    pub async fn clear_recorded(&self) {
        self.conversions.write().await.clear();
    }

    /// Get the number of conversions performed.
    pub async fn conversion_count(&self) -> usize {
        self.conversions.read().await.len()
    }

    /// Replace the scripted snapshots.
    pub async fn set_snapshots(&self, snapshots: Vec<ProgressSnapshot>) {
        *self.snapshots.write().await = snapshots;
    }

    /// Configure the next conversion to fail with the given error.
    pub async fn set_next_error(&self, error: ConverterError) {
        *self.next_error.write().await = Some(error);
    }

    /// Clear any pending error.
    pub async fn clear_next_error(&self) {
        *self.next_error.write().await = None;
    }

    /// Set the delay before each snapshot.
    pub async fn set_step_delay(&self, delay: Duration) {
        *self.step_delay_ms.write().await = delay.as_millis() as u64;
    }

    /// Make conversions wait for cancellation after their snapshots.
    pub async fn set_hang(&self, hang: bool) {
        *self.hang.write().await = hang;
    }

    /// Take the next error if set.
    async fn take_error(&self) -> Option<ConverterError> {
        self.next_error.write().await.take()
    }

    async fn record(&self, request: ConversionRequest, success: bool) {
        self.conversions
            .write()
            .await
            .push(RecordedConversion { request, success });
    }
}

#[async_trait]
impl Converter for MockConverter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn convert_with_cancel(
        &self,
        request: ConversionRequest,
        updates: mpsc::Sender<ProgressSnapshot>,
        cancel: CancellationToken,
    ) -> Result<PathBuf, ConverterError> {
        let error = self.take_error().await;
        let snapshots = self.snapshots.read().await.clone();
        let delay = Duration::from_millis(*self.step_delay_ms.read().await);
        let hang = *self.hang.read().await;

        for snapshot in snapshots {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.record(request, false).await;
                    return Err(ConverterError::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }
            let _ = updates.send(snapshot).await;
        }

        if hang {
            cancel.cancelled().await;
            self.record(request, false).await;
            return Err(ConverterError::Cancelled);
        }

        // Close the stream before reporting, like the real converter.
        drop(updates);

        if let Some(err) = error {
            self.record(request, false).await;
            return Err(err);
        }

        let output = request.output_path();
        self.record(request, true).await;
        Ok(output)
    }
}
