//! Request/response correlation.
//!
//! Every request registers a slot under its message id. A caller that
//! wants the reply holds the receiving half of a oneshot; fire-and-forget
//! requests register a placeholder so the eventual reply is recognised and
//! discarded. The appliance does not reliably echo ids on error replies,
//! so lookups may miss; a miss is logged and otherwise ignored.

use std::collections::HashMap;

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::Error;
use crate::message::Message;

/// Outcome delivered to a waiting caller.
pub type Reply = Result<Message, Error>;

#[derive(Debug)]
enum Slot {
    Waiting(oneshot::Sender<Reply>),
    Discard,
}

/// What happened to an inbound response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Delivered to a waiting caller.
    Delivered,
    /// Matched a fire-and-forget placeholder.
    Discarded,
    /// No slot for this id.
    Unmatched,
}

#[derive(Debug, Default)]
pub struct PendingRequests {
    slots: HashMap<String, Slot>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiting caller for `message_id`.
    pub fn register(&mut self, message_id: String) -> oneshot::Receiver<Reply> {
        let (tx, rx) = oneshot::channel();
        self.slots.insert(message_id, Slot::Waiting(tx));
        rx
    }

    /// Register a placeholder whose reply will be dropped.
    pub fn register_placeholder(&mut self, message_id: String) {
        self.slots.insert(message_id, Slot::Discard);
    }

    /// Resolve the slot matching a response message.
    ///
    /// `"200"` delivers the message itself; any other code delivers
    /// [`Error::Command`] carrying that code.
    pub fn resolve(&mut self, message: Message) -> Resolution {
        match self.slots.remove(&message.message_id) {
            Some(Slot::Waiting(tx)) => {
                let reply = if message.is_success() {
                    Ok(message)
                } else {
                    Err(Error::Command {
                        code: message.response.clone().unwrap_or_default(),
                        command: message.command,
                    })
                };
                // Receiver gone means the caller stopped waiting.
                let _ = tx.send(reply);
                Resolution::Delivered
            }
            Some(Slot::Discard) => Resolution::Discarded,
            None => {
                debug!(
                    message_id = %message.message_id,
                    command = %message.command,
                    response = ?message.response,
                    "response matches no pending request"
                );
                Resolution::Unmatched
            }
        }
    }

    /// Fail every slot. Returns how many waiting callers were notified.
    pub fn fail_all<F>(&mut self, error: F) -> usize
    where
        F: Fn() -> Error,
    {
        self.slots
            .drain()
            .map(|(_, slot)| Self::fail_slot(slot, &error))
            .filter(|&delivered| delivered)
            .count()
    }

    fn fail_slot<F>(slot: Slot, error: &F) -> bool
    where
        F: Fn() -> Error,
    {
        match slot {
            Slot::Waiting(tx) => {
                let _ = tx.send(Err(error()));
                true
            }
            Slot::Discard => false,
        }
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.slots.contains_key(message_id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
