//! Periodic connection health checks.
//!
//! Every heartbeat tick runs three independent checks against the shared
//! protocol clocks:
//!
//! 1. flow-control stall: a request outstanding with no send or response
//!    for the stall window resets flow control and fails every pending
//!    request with [`Error::FlowStalled`];
//! 2. keepalive: a cheap read-only query once per keepalive interval;
//! 3. idle timeout: no bytes received for the idle window closes the
//!    connection.
//!
//! Stall detection runs before the keepalive is queued, since queuing a
//! request refreshes the flow-control activity clock.

use std::sync::Arc;

use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::connection::Shared;
use crate::error::Error;
use crate::message::{GET_PARAM_LIST, Payload, get_param_list};

/// Condition for the keepalive query; the system object always exists.
const KEEPALIVE_CONDITION: &str = "OBJTYP=SYSTEM";
const KEEPALIVE_KEY: &str = "MODE";

pub(crate) fn keepalive_payload() -> Payload {
    get_param_list(KEEPALIVE_CONDITION, &[KEEPALIVE_KEY.to_owned()])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tick {
    Continue,
    Closed,
}

pub(crate) async fn run(shared: Arc<Shared>) {
    let period = shared.config.heartbeat_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = shared.cancel.cancelled() => break,
            _ = ticker.tick() => {
                if shared.tick(Instant::now()) == Tick::Closed {
                    break;
                }
            }
        }
    }
    tracing::debug!(peer = %shared.peer, "monitor exiting");
}

impl Shared {
    pub(crate) fn tick(&self, now: Instant) -> Tick {
        let (keepalive_due, idle_for) = {
            let mut state = self.state.lock();
            if state.is_closed() {
                return Tick::Closed;
            }

            if state.flow.is_stalled(now, self.config.flow_stall_timeout) {
                let discarded = state.flow.reset();
                let failed = state.pending.fail_all(|| Error::FlowStalled);
                tracing::warn!(
                    peer = %self.peer,
                    discarded = discarded.len(),
                    failed,
                    "flow control stalled, resetting"
                );
            }

            let keepalive_due =
                now.saturating_duration_since(state.last_keepalive_sent) > self.config.keepalive_interval;
            (keepalive_due, now.saturating_duration_since(state.last_data_received))
        };

        if idle_for > self.config.idle_timeout {
            tracing::warn!(peer = %self.peer, idle_secs = idle_for.as_secs(), "idle timeout, closing");
            self.shutdown("idle timeout");
            return Tick::Closed;
        }

        if keepalive_due {
            self.send_keepalive(now);
        }
        Tick::Continue
    }

    /// Queue the keepalive query. The keepalive clock only moves when the
    /// query was accepted, so a failed attempt is retried next tick.
    pub(crate) fn send_keepalive(&self, now: Instant) -> bool {
        // Best effort; a failure here surfaces through the reader.
        match self.submit(GET_PARAM_LIST, keepalive_payload(), false) {
            Ok(_) => {
                self.state.lock().last_keepalive_sent = now;
                true
            }
            Err(e) => {
                tracing::debug!(peer = %self.peer, error = %e, "keepalive not sent");
                false
            }
        }
    }
}
