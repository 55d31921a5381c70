use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use super::{Rcon, RconError, SessionPhase};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("The command queue has stopped")]
    Closed,
    #[error(transparent)]
    Rcon(#[from] RconError),
}

struct QueuedCommand {
    line: String,
    /// `None` for fire-and-forget commands.
    reply: Option<oneshot::Sender<Result<String, RconError>>>,
}

/// Producer side of the command queue. Cheap to clone; every clone feeds the
/// same consumer, so commands go out in submission order.
#[derive(Clone)]
pub struct CommandQueue {
    tx: mpsc::UnboundedSender<QueuedCommand>,
}

impl CommandQueue {
    #[must_use]
    pub fn new() -> (Self, QueueConsumer) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self { tx },
            QueueConsumer {
                rx,
                responses: None,
            },
        )
    }

    /// Queues a command without waiting for it. Its response goes to the
    /// consumer's response handler, if there is one.
    ///
    /// # Errors
    /// If the consumer has stopped
    pub fn enqueue(&self, line: impl Into<String>) -> Result<(), QueueError> {
        self.tx
            .send(QueuedCommand {
                line: line.into(),
                reply: None,
            })
            .map_err(|_| QueueError::Closed)
    }

    /// Queues a command and waits for its response.
    ///
    /// # Errors
    /// * `Closed` if the consumer stopped before answering
    /// * `Rcon` if sending the command failed
    pub async fn request(&self, line: impl Into<String>) -> Result<String, QueueError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(QueuedCommand {
                line: line.into(),
                reply: Some(reply),
            })
            .map_err(|_| QueueError::Closed)?;

        Ok(response.await.map_err(|_| QueueError::Closed)??)
    }
}

/// The single consumer that owns the session and drains the queue.
pub struct QueueConsumer {
    rx: mpsc::UnboundedReceiver<QueuedCommand>,
    responses: Option<mpsc::UnboundedSender<String>>,
}

impl QueueConsumer {
    /// Subscribes to the responses of fire-and-forget commands. Without a
    /// subscriber those responses are discarded.
    pub fn responses(&mut self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.responses = Some(tx);
        rx
    }

    /// Sends queued commands one at a time until every producer is dropped or
    /// the session fails. Commands queued before this is called are kept, not
    /// dropped.
    ///
    /// # Errors
    /// * `NotReady` if the session isn't authenticated
    /// * `Failed` once the session has failed
    pub async fn run(mut self, mut rcon: Rcon) -> Result<(), RconError> {
        if rcon.phase() != SessionPhase::Ready {
            return Err(RconError::NotReady(rcon.phase()));
        }

        while let Some(command) = self.rx.recv().await {
            tracing::debug!("Sending command: {}", command.line);
            let result = rcon.send(&command.line).await;

            if let Some(reply) = command.reply {
                if reply.send(result).is_err() {
                    tracing::debug!("Requester of {:?} went away", command.line);
                }
            } else {
                match result {
                    Ok(response) => self.dispatch(response),
                    Err(e) => tracing::error!("Command {:?} failed: {e}", command.line),
                }
            }

            if rcon.phase() == SessionPhase::Failed {
                return Err(RconError::Failed);
            }
        }

        tracing::debug!("All command producers dropped, stopping queue.");
        Ok(())
    }

    fn dispatch(&mut self, response: String) {
        if response.is_empty() {
            return;
        }

        if let Some(responses) = &self.responses {
            if responses.send(response).is_err() {
                tracing::warn!("Response handler went away, discarding further responses.");
                self.responses = None;
            }
        }
    }
}
