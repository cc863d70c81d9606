//! Single-in-flight flow control.
//!
//! The appliance cannot parse more than one outstanding request, so at
//! most one frame is on the wire at any time. Further frames wait in a
//! FIFO queue and are released one per received response.
//!
//! [`FlowControl`] is plain state; the caller holds it under a lock and
//! writes whatever frame a method returns.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

/// A request frame waiting for its turn on the wire.
#[derive(Debug, Clone)]
pub struct QueuedFrame {
    pub message_id: String,
    pub frame: Bytes,
}

#[derive(Debug)]
pub struct FlowControl {
    pending: usize,
    queue: VecDeque<QueuedFrame>,
    last_activity: Instant,
}

impl FlowControl {
    pub fn new(now: Instant) -> Self {
        Self {
            pending: 0,
            queue: VecDeque::new(),
            last_activity: now,
        }
    }

    /// Admit a request. Returns the frame if it should be written now,
    /// `None` if it was queued behind an outstanding request.
    pub fn submit(&mut self, message_id: String, frame: Bytes, now: Instant) -> Option<Bytes> {
        let ready = if self.pending == 0 {
            Some(frame)
        } else {
            self.queue.push_back(QueuedFrame { message_id, frame });
            None
        };
        self.pending += 1;
        self.last_activity = now;
        ready
    }

    /// Record a response. Returns the next queued frame to write, if any.
    ///
    /// Called for every response, matched or not, so orphaned replies
    /// still return their credit.
    pub fn response_received(&mut self, now: Instant) -> Option<Bytes> {
        let next = self.queue.pop_front().map(|q| q.frame);
        self.pending = self.pending.saturating_sub(1);
        self.last_activity = now;
        next
    }

    /// A request is outstanding and nothing has moved for `window`.
    pub fn is_stalled(&self, now: Instant, window: Duration) -> bool {
        self.pending > 0 && now.saturating_duration_since(self.last_activity) > window
    }

    /// Drop the counter to zero and discard the queue. Returns the ids of
    /// the discarded frames.
    pub fn reset(&mut self) -> Vec<String> {
        self.pending = 0;
        self.queue.drain(..).map(|q| q.message_id).collect()
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }
}
