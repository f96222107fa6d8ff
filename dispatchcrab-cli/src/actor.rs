use async_trait::async_trait;
use dispatchcrab::{Acquisition, Clock, Gate, Throttle, ThrottleError, ThrottleStats};
use tokio::sync::{mpsc, oneshot};

/// Message types for the throttle actor
pub enum ThrottleMessage {
    Acquire {
        response_tx: oneshot::Sender<Result<Acquisition, ThrottleError>>,
    },
    AcquireBatch {
        batch_size: usize,
        response_tx: oneshot::Sender<Result<Acquisition, ThrottleError>>,
    },
    Stats {
        response_tx: oneshot::Sender<ThrottleStats>,
    },
    Reset {
        response_tx: oneshot::Sender<()>,
    },
}

/// Handle to communicate with the throttle actor
///
/// Cloned into every job that shares the provider quota. Acquisitions from
/// all handles are admitted one at a time, in arrival order.
#[derive(Clone)]
pub struct ThrottleHandle {
    tx: mpsc::Sender<ThrottleMessage>,
}

impl ThrottleHandle {
    #[cfg(test)]
    pub(crate) fn from_sender(tx: mpsc::Sender<ThrottleMessage>) -> Self {
        ThrottleHandle { tx }
    }

    /// Admit one unit
    pub async fn acquire(&self) -> Result<Acquisition, ThrottleError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(ThrottleMessage::Acquire { response_tx }).await?;
        response_rx.await.map_err(|_| ThrottleError::Closed)?
    }

    /// Admit a bulk send of `batch_size` units
    pub async fn acquire_batch(&self, batch_size: usize) -> Result<Acquisition, ThrottleError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(ThrottleMessage::AcquireBatch {
            batch_size,
            response_tx,
        })
        .await?;
        response_rx.await.map_err(|_| ThrottleError::Closed)?
    }

    /// Current counters of the shared throttle
    pub async fn stats(&self) -> Result<ThrottleStats, ThrottleError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(ThrottleMessage::Stats { response_tx }).await?;
        response_rx.await.map_err(|_| ThrottleError::Closed)
    }

    /// Clear the shared counters
    pub async fn reset(&self) -> Result<(), ThrottleError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(ThrottleMessage::Reset { response_tx }).await?;
        response_rx.await.map_err(|_| ThrottleError::Closed)
    }

    async fn send(&self, msg: ThrottleMessage) -> Result<(), ThrottleError> {
        self.tx.send(msg).await.map_err(|_| {
            tracing::error!("Throttle actor has shut down");
            ThrottleError::Closed
        })
    }
}

#[async_trait]
impl Gate for ThrottleHandle {
    async fn acquire(&mut self) -> Result<Acquisition, ThrottleError> {
        ThrottleHandle::acquire(self).await
    }

    async fn acquire_batch(&mut self, batch_size: usize) -> Result<Acquisition, ThrottleError> {
        ThrottleHandle::acquire_batch(self, batch_size).await
    }
}

/// The throttle actor
pub struct ThrottleActor;

impl ThrottleActor {
    /// Spawn a task owning `throttle` and return a handle to it
    ///
    /// The task ends once every handle has been dropped.
    pub fn spawn<C>(buffer_size: usize, throttle: Throttle<C>) -> ThrottleHandle
    where
        C: Clock + 'static,
    {
        let (tx, rx) = mpsc::channel(buffer_size);

        tokio::spawn(async move {
            run_actor(rx, throttle).await;
        });

        ThrottleHandle { tx }
    }
}

async fn run_actor<C: Clock>(mut rx: mpsc::Receiver<ThrottleMessage>, mut throttle: Throttle<C>) {
    while let Some(msg) = rx.recv().await {
        match msg {
            ThrottleMessage::Acquire { response_tx } => {
                let result = throttle.acquire().await;
                // Ignore send errors - the job may have been cancelled
                let _ = response_tx.send(result);
            }
            ThrottleMessage::AcquireBatch {
                batch_size,
                response_tx,
            } => {
                let result = throttle.acquire_batch(batch_size).await;
                let _ = response_tx.send(result);
            }
            ThrottleMessage::Stats { response_tx } => {
                let _ = response_tx.send(throttle.stats());
            }
            ThrottleMessage::Reset { response_tx } => {
                throttle.reset();
                let _ = response_tx.send(());
            }
        }
    }

    tracing::info!(
        dispatched_today = throttle.stats().dispatched_today,
        "Throttle actor shutting down"
    );
}
