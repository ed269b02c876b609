//! Conflict UI collaborators.

use tokio::sync::{mpsc, oneshot};

use crate::models::{ResolutionChoice, SaveConflict};

/// Asks the player how to resolve a conflict.
#[allow(async_fn_in_trait)]
pub trait ConflictPrompt {
    /// Present both sides and wait for an answer.
    ///
    /// `None` means the UI went away without answering; it is treated as a cancel.
    async fn choose(&self, conflict: &SaveConflict) -> Option<ResolutionChoice>;
}

/// Answers every conflict the same way; for headless runs and scripted syncs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPrompt {
    choice: Option<ResolutionChoice>,
}

impl FixedPrompt {
    pub const fn new(choice: Option<ResolutionChoice>) -> Self {
        Self { choice }
    }
}

impl ConflictPrompt for FixedPrompt {
    async fn choose(&self, _conflict: &SaveConflict) -> Option<ResolutionChoice> {
        self.choice
    }
}

/// A conflict published to a UI thread, answered through [`ConflictRequest::respond`]
#[derive(Debug)]
pub struct ConflictRequest {
    pub conflict: SaveConflict,
    reply: oneshot::Sender<ResolutionChoice>,
}

impl ConflictRequest {
    /// Send the answer. Returns `false` when the sync stopped waiting.
    pub fn respond(self, choice: ResolutionChoice) -> bool {
        self.reply.send(choice).is_ok()
    }
}

/// Publishes conflicts over a channel so any UI loop can answer them.
#[derive(Debug, Clone)]
pub struct ChannelPrompt {
    requests: mpsc::Sender<ConflictRequest>,
}

impl ChannelPrompt {
    /// Create the prompt and the receiving end the UI polls.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<ConflictRequest>) {
        let (requests, receiver) = mpsc::channel(buffer.max(1));
        (Self { requests }, receiver)
    }
}

impl ConflictPrompt for ChannelPrompt {
    async fn choose(&self, conflict: &SaveConflict) -> Option<ResolutionChoice> {
        let (reply, response) = oneshot::channel();
        let request = ConflictRequest {
            conflict: conflict.clone(),
            reply,
        };
        if self.requests.send(request).await.is_err() {
            tracing::warn!("Conflict UI is gone; deferring resolution");
            return None;
        }
        response.await.ok()
    }
}
