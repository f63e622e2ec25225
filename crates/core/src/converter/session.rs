//! Background conversion sessions.
//!
//! [`spawn_conversion`] runs a conversion on its own task so the caller can
//! drain progress updates while it runs, then collect the outcome.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::error::ConverterError;
use super::traits::Converter;
use super::types::{ConversionRequest, ConversionState, ProgressSnapshot};

/// Handle to a conversion running in the background.
///
/// Updates stop (the receiver yields `None`) before the state becomes terminal
/// and before [`ConversionHandle::wait`] returns.
pub struct ConversionHandle {
    updates: mpsc::Receiver<ProgressSnapshot>,
    state: watch::Receiver<ConversionState>,
    cancel: CancellationToken,
    outcome: JoinHandle<Result<PathBuf, ConverterError>>,
}

impl ConversionHandle {
    /// Next progress update, or `None` once the stream is closed.
    pub async fn next_update(&mut self) -> Option<ProgressSnapshot> {
        self.updates.recv().await
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConversionState {
        *self.state.borrow()
    }

    /// Watch receiver for lifecycle changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConversionState> {
        self.state.clone()
    }

    /// Requests cancellation. The outcome becomes [`ConverterError::Cancelled`]
    /// unless the conversion already finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the conversion outcome.
    ///
    /// Updates not yet received are discarded.
    pub async fn wait(self) -> Result<PathBuf, ConverterError> {
        let Self {
            updates, outcome, ..
        } = self;
        // Unblocks the forwarder if it is waiting on a full channel.
        drop(updates);

        match outcome.await {
            Ok(result) => result,
            Err(e) => Err(ConverterError::conversion_failed(format!(
                "conversion task failed: {}",
                e
            ))),
        }
    }
}

/// Starts `request` on a background task and returns a handle to it.
///
/// `capacity` bounds the number of buffered progress updates (minimum 1).
pub fn spawn_conversion<C>(
    converter: Arc<C>,
    request: ConversionRequest,
    capacity: usize,
) -> ConversionHandle
where
    C: Converter + ?Sized + 'static,
{
    let capacity = capacity.max(1);
    let (inner_tx, mut inner_rx) = mpsc::channel(capacity);
    let (outer_tx, outer_rx) = mpsc::channel(capacity);
    let (state_tx, state_rx) = watch::channel(ConversionState::Idle);
    let state_tx = Arc::new(state_tx);
    let cancel = CancellationToken::new();

    let forwarder = {
        let state_tx = Arc::clone(&state_tx);
        tokio::spawn(async move {
            let mut receiver_open = true;
            while let Some(snapshot) = inner_rx.recv().await {
                state_tx.send_if_modified(|state| {
                    if *state == ConversionState::Starting {
                        *state = ConversionState::Running;
                        true
                    } else {
                        false
                    }
                });
                if receiver_open && outer_tx.send(snapshot).await.is_err() {
                    receiver_open = false;
                }
            }
        })
    };

    let token = cancel.clone();
    let outcome = tokio::spawn(async move {
        state_tx.send_replace(ConversionState::Starting);
        let result = converter.convert_with_cancel(request, inner_tx, token).await;

        if let Err(e) = forwarder.await {
            warn!("Progress forwarder failed: {}", e);
        }
        state_tx.send_replace(ConversionState::from_outcome(&result));
        result
    });

    ConversionHandle {
        updates: outer_rx,
        state: state_rx,
        cancel,
        outcome,
    }
}
