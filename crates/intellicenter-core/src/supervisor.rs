// ── Reconnection supervisor ──
//
// Keeps a controller connected indefinitely. Failed starts are retried
// with floored exponential backoff; a lost connection is retried at once,
// and consumers only hear "disconnected" if the outage outlasts the
// debounce window.
//
//   Idle → Connecting → Connected → Disconnected → Connecting → …
//                  ↘ (fail) retrying(delay) ↗
//   any → Stopped

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ReconnectConfig;
use crate::controller::{ConnectionState, Controller};
use crate::error::CoreError;

const EVENT_CHANNEL_SIZE: usize = 64;

// ── Connector ────────────────────────────────────────────────────

/// What the supervisor needs from the thing it keeps alive.
pub trait Connector: Send + Sync + 'static {
    /// Establish a session. Must leave nothing half-open on error.
    fn start(&self) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn stop(&self) -> impl Future<Output = ()> + Send;

    /// Goes to something other than `Connected` when the session is lost.
    fn connection_state(&self) -> watch::Receiver<ConnectionState>;
}

impl Connector for Controller {
    fn start(&self) -> impl Future<Output = Result<(), CoreError>> + Send {
        Controller::start(self)
    }

    fn stop(&self) -> impl Future<Output = ()> + Send {
        Controller::stop(self)
    }

    fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        Controller::connection_state(self)
    }
}

// ── Events and state ─────────────────────────────────────────────

/// Lifecycle notifications for consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// First successful start.
    Started,
    /// Successful start after an earlier one was lost.
    Reconnected,
    /// Connection lost for longer than the debounce window.
    Disconnected,
    /// A start failed; the next attempt follows after `delay`.
    Retrying { delay: Duration },
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => f.write_str("started"),
            Self::Reconnected => f.write_str("reconnected"),
            Self::Disconnected => f.write_str("disconnected"),
            Self::Retrying { delay } => write!(f, "retrying in {}s", delay.as_secs()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SupervisorState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Stopped,
}

/// Next retry delay: `previous × multiplier`, floored to whole seconds and
/// capped at `max`.
pub fn next_delay(previous: Duration, multiplier: f64, max: Duration) -> Duration {
    let secs = (previous.as_secs_f64() * multiplier).floor();
    Duration::try_from_secs_f64(secs).unwrap_or(max).min(max)
}

// ── Supervisor ───────────────────────────────────────────────────

pub struct Supervisor<C: Connector> {
    inner: Arc<SupervisorInner<C>>,
}

struct SupervisorInner<C> {
    connector: Arc<C>,
    config: ReconnectConfig,
    events: broadcast::Sender<LifecycleEvent>,
    state: watch::Sender<SupervisorState>,
    cancel: CancellationToken,
    stopped: AtomicBool,
    /// Outstanding disconnect debounce: its id and cancel handle.
    debounce: parking_lot::Mutex<Option<(u64, CancellationToken)>>,
    debounce_seq: AtomicU64,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Connector> Supervisor<C> {
    pub fn new(connector: C, config: ReconnectConfig) -> Self {
        Self::from_arc(Arc::new(connector), config)
    }

    pub fn from_arc(connector: Arc<C>, config: ReconnectConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (state, _) = watch::channel(SupervisorState::Idle);
        Self {
            inner: Arc::new(SupervisorInner {
                connector,
                config,
                events,
                state,
                cancel: CancellationToken::new(),
                stopped: AtomicBool::new(false),
                debounce: parking_lot::Mutex::new(None),
                debounce_seq: AtomicU64::new(0),
                task: Mutex::new(None),
            }),
        }
    }

    pub fn connector(&self) -> &Arc<C> {
        &self.inner.connector
    }

    pub fn events(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.inner.events.subscribe()
    }

    pub fn state(&self) -> watch::Receiver<SupervisorState> {
        self.inner.state.subscribe()
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Begin connecting in the background. Events report progress.
    /// A no-op once started or stopped.
    pub async fn start(&self) {
        let mut task = self.inner.task.lock().await;
        if task.is_some() || self.is_stopped() {
            debug!("supervisor already started or stopped");
            return;
        }
        *task = Some(tokio::spawn(run(Arc::clone(&self.inner))));
    }

    /// Stop retrying, cancel any pending wait, stop the connector.
    /// Idempotent.
    pub async fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.cancel.cancel();
        self.inner.cancel_debounce();

        let task = self.inner.task.lock().await.take();
        if let Some(task) = task {
            let _ = task.await;
        }
        self.inner.connector.stop().await;
        self.inner.state.send_replace(SupervisorState::Stopped);
        info!("supervisor stopped");
    }
}

impl<C: Connector> SupervisorInner<C> {
    fn emit(&self, event: LifecycleEvent) {
        debug!(%event, "lifecycle event");
        let _ = self.events.send(event);
    }

    /// Start the debounce window for a lost connection.
    fn begin_debounce(self: &Arc<Self>) {
        let id = self.debounce_seq.fetch_add(1, Ordering::SeqCst);
        let token = self.cancel.child_token();
        *self.debounce.lock() = Some((id, token.clone()));

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(inner.config.disconnect_debounce) => {
                    let ours = {
                        let mut pending = inner.debounce.lock();
                        match pending.as_ref() {
                            Some((current, _)) if *current == id => pending.take().is_some(),
                            _ => false,
                        }
                    };
                    if ours && !inner.stopped.load(Ordering::SeqCst) {
                        inner.emit(LifecycleEvent::Disconnected);
                    }
                }
            }
        });
    }

    /// Returns `true` if a debounce was still pending.
    fn cancel_debounce(&self) -> bool {
        match self.debounce.lock().take() {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

async fn run<C: Connector>(inner: Arc<SupervisorInner<C>>) {
    let mut first_time = true;
    let mut delay: Option<Duration> = None;

    loop {
        if inner.stopped.load(Ordering::SeqCst) {
            break;
        }
        inner.state.send_replace(SupervisorState::Connecting);

        let result = tokio::select! {
            biased;
            () = inner.cancel.cancelled() => break,
            result = inner.connector.start() => result,
        };

        match result {
            Ok(()) => {
                delay = None;
                let suppressed = inner.cancel_debounce();
                inner.state.send_replace(SupervisorState::Connected);
                if first_time {
                    first_time = false;
                    info!("connected");
                    inner.emit(LifecycleEvent::Started);
                } else {
                    info!(debounced = suppressed, "reconnected");
                    inner.emit(LifecycleEvent::Reconnected);
                }

                let mut state = inner.connector.connection_state();
                tokio::select! {
                    biased;
                    () = inner.cancel.cancelled() => break,
                    () = wait_disconnected(&mut state) => {}
                }

                warn!("connection lost, reconnecting");
                inner.state.send_replace(SupervisorState::Disconnected);
                inner.begin_debounce();
            }
            Err(e) => {
                let next = match delay {
                    None => inner.config.initial_delay,
                    Some(previous) => next_delay(previous, inner.config.multiplier, inner.config.max_delay),
                };
                delay = Some(next);
                warn!(error = %e, delay_secs = next.as_secs(), "start failed, retrying");
                inner.emit(LifecycleEvent::Retrying { delay: next });

                tokio::select! {
                    biased;
                    () = inner.cancel.cancelled() => break,
                    () = tokio::time::sleep(next) => {}
                }
            }
        }
    }
    debug!("supervisor loop exiting");
}

async fn wait_disconnected(state: &mut watch::Receiver<ConnectionState>) {
    // A closed channel counts as lost too.
    let _ = state.wait_for(|s| *s != ConnectionState::Connected).await;
}
