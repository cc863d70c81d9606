//! One TCP session with the appliance.
//!
//! A [`Connection`] owns three background tasks:
//!
//! - **reader**: feeds socket bytes through [`LineBuffer`], resolves
//!   responses against the pending table and forwards notifications.
//! - **writer**: drains the outbound frame channel onto the socket.
//! - **monitor**: keepalive, flow-control stall recovery and idle timeout
//!   (see [`crate::monitor`]).
//!
//! All protocol state sits behind one `parking_lot::Mutex` that is never
//! held across an await. Frames released by flow control are pushed into
//! the unbounded outbound channel while the lock is still held, so wire
//! order always matches admission order.
//!
//! Teardown is synchronous: [`Connection::shutdown`] cancels every task
//! and fails every pending request before it returns.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::ProtocolConfig;
use crate::error::Error;
use crate::flow::FlowControl;
use crate::framing::{LineBuffer, encode_frame};
use crate::message::{Message, Payload};
use crate::monitor;
use crate::pending::{PendingRequests, Reply, Resolution};

const READ_CHUNK: usize = 8 * 1024;

/// Receiving end for unsolicited messages (anything without `response`).
///
/// Dropping it is fatal to the connection.
pub type Notifications = mpsc::UnboundedReceiver<Message>;

// ── Shared state ─────────────────────────────────────────────────────

pub(crate) struct ProtocolState {
    next_id: u64,
    pub(crate) flow: FlowControl,
    pub(crate) pending: PendingRequests,
    pub(crate) last_data_received: Instant,
    pub(crate) last_keepalive_sent: Instant,
    close_reason: Option<String>,
}

impl ProtocolState {
    fn new(now: Instant) -> Self {
        Self {
            next_id: 0,
            flow: FlowControl::new(now),
            pending: PendingRequests::new(),
            last_data_received: now,
            last_keepalive_sent: now,
            close_reason: None,
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.close_reason.is_some()
    }
}

pub(crate) struct Shared {
    pub(crate) config: ProtocolConfig,
    pub(crate) peer: String,
    pub(crate) state: Mutex<ProtocolState>,
    pub(crate) cancel: CancellationToken,
    outbound: mpsc::UnboundedSender<Bytes>,
    notifications: mpsc::UnboundedSender<Message>,
}

impl Shared {
    /// Assign an id, register its pending slot and admit the frame to
    /// flow control. The whole sequence runs under one lock.
    pub(crate) fn submit(
        &self,
        command: &str,
        payload: Payload,
        wait: bool,
    ) -> Result<(String, Option<oneshot::Receiver<Reply>>), Error> {
        let mut state = self.state.lock();
        if state.is_closed() {
            return Err(Error::Closed);
        }

        state.next_id += 1;
        let message_id = state.next_id.to_string();
        let frame = encode_frame(&Message::request(message_id.clone(), command, payload))?;

        let rx = if wait {
            Some(state.pending.register(message_id.clone()))
        } else {
            state.pending.register_placeholder(message_id.clone());
            None
        };

        tracing::debug!(peer = %self.peer, message_id = %message_id, command, "sending request");

        if let Some(frame) = state.flow.submit(message_id.clone(), frame, Instant::now()) {
            if self.outbound.send(frame).is_err() {
                drop(state);
                self.shutdown("writer stopped");
                return Err(Error::Closed);
            }
        }
        Ok((message_id, rx))
    }

    /// Route one decoded frame. An error return is transport-fatal.
    fn dispatch(&self, text: &str) -> Result<(), Error> {
        let message: Message = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) if e.is_data() => {
                tracing::warn!(peer = %self.peer, error = %e, "dropping message without required fields");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(peer = %self.peer, error = %e, "dropping invalid JSON message");
                return Ok(());
            }
        };

        if !message.is_response() {
            tracing::debug!(
                peer = %self.peer,
                message_id = %message.message_id,
                command = %message.command,
                "notification received"
            );
            return self.notifications.send(message).map_err(|_| Error::Closed);
        }

        let mut state = self.state.lock();
        let message_id = message.message_id.clone();
        let resolution = state.pending.resolve(message);
        if resolution != Resolution::Unmatched {
            tracing::debug!(peer = %self.peer, message_id = %message_id, ?resolution, "response received");
        }
        if let Some(next) = state.flow.response_received(Instant::now()) {
            self.outbound.send(next).map_err(|_| Error::Closed)?;
        }
        Ok(())
    }

    /// Close the session: cancel the tasks, fail every pending request and
    /// discard queued frames. Later calls are no-ops.
    pub(crate) fn shutdown(&self, reason: &str) {
        let failed = {
            let mut state = self.state.lock();
            if state.is_closed() {
                return;
            }
            state.close_reason = Some(reason.to_owned());
            state.flow.reset();
            state.pending.fail_all(|| Error::Cancelled)
        };
        self.cancel.cancel();
        tracing::info!(peer = %self.peer, reason, failed, "connection closed");
    }
}

// ── Connection ───────────────────────────────────────────────────────

/// Handle to an outstanding request.
#[derive(Debug)]
pub struct ResponseHandle {
    message_id: String,
    rx: oneshot::Receiver<Reply>,
}

impl ResponseHandle {
    /// Message id assigned to the request.
    pub fn id(&self) -> &str {
        &self.message_id
    }

    /// Wait for the correlated response.
    ///
    /// Resolves with [`Error::Cancelled`] if the connection is torn down
    /// first, or [`Error::FlowStalled`] if flow control was reset.
    pub async fn response(self) -> Result<Message, Error> {
        self.rx.await.map_err(|_| Error::Cancelled)?
    }
}

pub struct Connection {
    shared: Arc<Shared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Connection {
    /// Open a TCP session to `addr` (`host:port`).
    pub async fn connect(
        addr: &str,
        config: ProtocolConfig,
        connect_timeout: Duration,
    ) -> Result<(Self, Notifications), Error> {
        tracing::info!(addr, "connecting to appliance");

        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::ConnectTimeout {
                addr: addr.to_owned(),
                timeout_secs: connect_timeout.as_secs(),
            })?
            .map_err(|source| Error::Connect {
                addr: addr.to_owned(),
                source,
            })?;
        stream.set_nodelay(true)?;

        tracing::info!(addr, "connected");
        Ok(Self::from_stream(stream, addr.to_owned(), config))
    }

    /// Run the protocol over an already-established byte stream.
    ///
    /// Must be called inside a tokio runtime.
    pub fn from_stream<S>(stream: S, peer: String, config: ProtocolConfig) -> (Self, Notifications)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            config,
            peer,
            state: Mutex::new(ProtocolState::new(Instant::now())),
            cancel: CancellationToken::new(),
            outbound: outbound_tx,
            notifications: notify_tx,
        });

        let tasks = vec![
            tokio::spawn(read_loop(Arc::clone(&shared), reader)),
            tokio::spawn(write_loop(Arc::clone(&shared), writer, outbound_rx)),
            tokio::spawn(monitor::run(Arc::clone(&shared))),
        ];

        (
            Self {
                shared,
                tasks: Mutex::new(tasks),
            },
            notify_rx,
        )
    }

    /// Send a request and return a handle for its response.
    ///
    /// Fails immediately with [`Error::Closed`] on a closed connection.
    pub fn request(&self, command: &str, payload: Payload) -> Result<ResponseHandle, Error> {
        match self.shared.submit(command, payload, true)? {
            (message_id, Some(rx)) => Ok(ResponseHandle { message_id, rx }),
            (_, None) => Err(Error::Closed),
        }
    }

    /// Send a request whose response will be discarded. Returns its id.
    pub fn send(&self, command: &str, payload: Payload) -> Result<String, Error> {
        self.shared.submit(command, payload, false).map(|(id, _)| id)
    }

    /// Synchronously tear the session down. Idempotent.
    pub fn shutdown(&self, reason: &str) {
        self.shared.shutdown(reason);
    }

    /// Tear down and wait for the background tasks to finish.
    pub async fn close(&self) {
        self.shutdown("closed by client");
        let handles: Vec<_> = std::mem::take(&mut *self.tasks.lock());
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Resolves once the session is closed for any reason.
    pub async fn closed(&self) {
        self.shared.cancel.cancelled().await;
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().is_closed()
    }

    pub fn close_reason(&self) -> Option<String> {
        self.shared.state.lock().close_reason.clone()
    }

    pub fn peer(&self) -> &str {
        &self.shared.peer
    }

    /// Number of registered request slots, placeholders included.
    pub fn pending_requests(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.shared.config
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.shutdown("connection dropped");
        for handle in self.tasks.get_mut().drain(..) {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.shared.peer)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// ── Background tasks ─────────────────────────────────────────────────

async fn read_loop<R>(shared: Arc<Shared>, mut reader: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = LineBuffer::new();
    let mut chunk = vec![0_u8; READ_CHUNK];

    loop {
        let read = tokio::select! {
            biased;
            () = shared.cancel.cancelled() => return,
            read = reader.read(&mut chunk) => read,
        };

        let n = match read {
            Ok(0) => {
                shared.shutdown("connection closed by peer");
                return;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(peer = %shared.peer, error = %e, "socket read failed");
                shared.shutdown("read error");
                return;
            }
        };

        shared.state.lock().last_data_received = Instant::now();

        let frames = match lines.push(&chunk[..n]) {
            Ok(frames) => frames,
            Err(e) => {
                tracing::error!(peer = %shared.peer, error = %e, "unrecoverable framing error");
                shared.shutdown("framing error");
                return;
            }
        };

        for frame in frames {
            if let Err(e) = shared.dispatch(&frame) {
                tracing::error!(peer = %shared.peer, error = %e, "message dispatch failed");
                shared.shutdown("dispatch error");
                return;
            }
        }
    }
}

async fn write_loop<W>(shared: Arc<Shared>, mut writer: W, mut outbound: mpsc::UnboundedReceiver<Bytes>)
where
    W: AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            biased;
            () = shared.cancel.cancelled() => break,
            frame = outbound.recv() => frame,
        };
        let Some(frame) = frame else { break };

        if let Err(e) = writer.write_all(&frame).await {
            tracing::warn!(peer = %shared.peer, error = %e, "socket write failed");
            shared.shutdown("write error");
            break;
        }
    }
    let _ = writer.shutdown().await;
    tracing::debug!(peer = %shared.peer, "writer exiting");
}
