use tokio::sync::{broadcast, mpsc, oneshot};

use crate::approval::{DecisionEvent, Resolution, ResolveError};

use super::{DecisionEnvelope, OrchestratorError, OrchestratorStatus};

pub(super) type StatusRequest = oneshot::Sender<OrchestratorStatus>;

/// Cloneable handle to a running execution context.
///
/// Every decision source (Telegram poller, HTTP API) goes through the same
/// queue, so ordering and idempotence do not depend on where a press came
/// from.
#[derive(Clone)]
pub struct OrchestratorHandle {
    decisions: mpsc::Sender<DecisionEnvelope>,
    status: mpsc::Sender<StatusRequest>,
    shutdown: broadcast::Sender<()>,
}

impl OrchestratorHandle {
    pub(super) fn new(
        decisions: mpsc::Sender<DecisionEnvelope>,
        status: mpsc::Sender<StatusRequest>,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self {
            decisions,
            status,
            shutdown,
        }
    }

    /// Queue a decision and wait for its resolution.
    pub async fn submit(
        &self,
        event: DecisionEvent,
    ) -> Result<Result<Resolution, ResolveError>, OrchestratorError> {
        let (tx, rx) = oneshot::channel();
        self.decisions
            .send(DecisionEnvelope {
                event,
                reply: Some(tx),
            })
            .await
            .map_err(|_| OrchestratorError::Stopped)?;
        rx.await.map_err(|_| OrchestratorError::NoReply)
    }

    /// Queue a decision without waiting for the outcome.
    pub async fn send(&self, event: DecisionEvent) -> Result<(), OrchestratorError> {
        self.decisions
            .send(DecisionEnvelope { event, reply: None })
            .await
            .map_err(|_| OrchestratorError::Stopped)
    }

    /// Ask the loop for a status snapshot.
    pub async fn status(&self) -> Result<OrchestratorStatus, OrchestratorError> {
        let (tx, rx) = oneshot::channel();
        self.status
            .send(tx)
            .await
            .map_err(|_| OrchestratorError::Stopped)?;
        rx.await.map_err(|_| OrchestratorError::Stopped)
    }

    /// Signal the loop and every subscriber to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Receiver for the shutdown signal, for tasks that live beside the loop.
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }
}
