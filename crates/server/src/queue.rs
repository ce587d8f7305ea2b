//! In-process queue transport and the worker loop that drains it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

use callbridge_core::domain::sync::WorkItem;
use callbridge_core::errors::ClientError;
use callbridge_core::ports::QueueTransport;
use callbridge_sync::WorkDispatcher;

#[derive(Clone, Debug)]
pub struct Envelope {
    pub destination: String,
    pub item: WorkItem,
    pub attempt: u32,
}

#[derive(Clone)]
pub struct LocalQueue {
    sender: mpsc::UnboundedSender<Envelope>,
}

pub fn channel() -> (LocalQueue, mpsc::UnboundedReceiver<Envelope>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (LocalQueue { sender }, receiver)
}

impl LocalQueue {
    fn enqueue(&self, envelope: Envelope) -> Result<(), ClientError> {
        self.sender
            .send(envelope)
            .map_err(|_| ClientError::Remote("work queue is closed".to_string()))
    }
}

#[async_trait]
impl QueueTransport for LocalQueue {
    async fn batch_send(&self, items: Vec<WorkItem>, destination: &str) -> Result<(), ClientError> {
        for item in items {
            self.enqueue(Envelope { destination: destination.to_string(), item, attempt: 1 })?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerSettings {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self { max_attempts: 5, retry_delay: Duration::from_secs(2) }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub succeeded: usize,
    pub retried: usize,
    pub dropped: usize,
}

/// Puts `envelope` back on the queue once `delay` has elapsed, without
/// holding up the worker loop.
fn schedule_redelivery(queue: LocalQueue, envelope: Envelope, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let kind = envelope.item.kind();
        let destination = envelope.destination.clone();
        let attempt = envelope.attempt;
        if queue.enqueue(envelope).is_err() {
            warn!(
                event_name = "server.worker.redelivery_lost",
                destination = %destination,
                kind,
                attempt,
                "work queue closed before redelivery"
            );
        }
    });
}

/// Drains the queue until `shutdown` flips. Items already queued are
/// processed before the shutdown signal is observed.
pub async fn run_worker(
    mut receiver: mpsc::UnboundedReceiver<Envelope>,
    dispatcher: Arc<WorkDispatcher>,
    requeue: LocalQueue,
    settings: WorkerSettings,
    mut shutdown: watch::Receiver<bool>,
) -> WorkerStats {
    let mut stats = WorkerStats::default();

    loop {
        let envelope = tokio::select! {
            biased;
            Some(envelope) = receiver.recv() => envelope,
            _ = shutdown.changed() => break,
            else => break,
        };

        let kind = envelope.item.kind();
        match dispatcher.dispatch(envelope.item.clone()).await {
            Ok(outcome) => {
                stats.succeeded += 1;
                debug!(
                    event_name = "server.worker.completed",
                    destination = %envelope.destination,
                    kind,
                    outcome = ?outcome,
                    "work item completed"
                );
            }
            Err(err) if err.is_retryable() && envelope.attempt < settings.max_attempts => {
                warn!(
                    event_name = "server.worker.retry",
                    destination = %envelope.destination,
                    kind,
                    attempt = envelope.attempt,
                    error = %err,
                    "work item failed, redelivering"
                );
                let retry = Envelope { attempt: envelope.attempt + 1, ..envelope };
                if settings.retry_delay.is_zero() {
                    match requeue.enqueue(retry) {
                        Ok(()) => stats.retried += 1,
                        Err(_) => stats.dropped += 1,
                    }
                } else {
                    stats.retried += 1;
                    schedule_redelivery(requeue.clone(), retry, settings.retry_delay);
                }
            }
            Err(err) => {
                stats.dropped += 1;
                error!(
                    event_name = "server.worker.dropped",
                    destination = %envelope.destination,
                    kind,
                    attempt = envelope.attempt,
                    retryable = err.is_retryable(),
                    error = %err,
                    "work item dropped"
                );
            }
        }
    }

    stats
}
