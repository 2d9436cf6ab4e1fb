//! Bounded multi-producer command ingress.
//!
//! Producers never block: a full queue rejects the command immediately.
//! Every accepted command carries a oneshot the tick thread answers once
//! the command has been applied.

use std::time::Instant;

use tokio::sync::{mpsc, oneshot};

use subbrawl_core::commands::{Command, CommandOutcome};
use subbrawl_core::errors::CommandError;
use subbrawl_core::types::AccountId;

use crate::error::HandleError;

pub type Reply = Result<CommandOutcome, CommandError>;

/// A command waiting for the next tick boundary.
#[derive(Debug)]
pub struct PendingCommand {
    pub issuer: AccountId,
    pub command: Command,
    pub reply: oneshot::Sender<Reply>,
}

/// Producer side. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    tx: mpsc::Sender<PendingCommand>,
}

/// Consumer side, owned by the tick thread.
#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::Receiver<PendingCommand>,
}

impl CommandQueue {
    pub fn bounded(capacity: usize) -> (CommandQueue, CommandReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (CommandQueue { tx }, CommandReceiver { rx })
    }

    /// Validate and enqueue. Malformed commands are refused here and never
    /// reach the tick thread.
    pub fn submit(
        &self,
        issuer: AccountId,
        command: Command,
    ) -> Result<oneshot::Receiver<Reply>, HandleError> {
        command.validate()?;
        let (reply, rx) = oneshot::channel();
        self.tx
            .try_send(PendingCommand {
                issuer,
                command,
                reply,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => HandleError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => HandleError::Stopped,
            })?;
        Ok(rx)
    }
}

impl CommandReceiver {
    /// Take up to `max` commands in arrival order, stopping early once
    /// `deadline` has passed.
    pub fn drain(&mut self, max: usize, deadline: Instant) -> Vec<PendingCommand> {
        let mut batch = Vec::new();
        while batch.len() < max && Instant::now() < deadline {
            match self.rx.try_recv() {
                Ok(pending) => batch.push(pending),
                Err(_) => break,
            }
        }
        batch
    }
}
