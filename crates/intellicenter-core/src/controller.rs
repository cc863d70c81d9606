// ── Controller abstraction ──
//
// Lifecycle management for one IntelliCenter appliance: opens the
// session, loads the object model through a scripted sequence of bulk
// queries, routes `NotifyList` pushes into the ModelStore, and exposes
// the command API. Reconnection policy lives in the Supervisor; the
// controller only knows how to start and stop once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwapOption;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use intellicenter_api::message::{
    GET_PARAM_LIST, NOTIFY_LIST, REQUEST_PARAM_LIST, SET_PARAM_LIST, get_param_list, request_param_list,
    set_param_list,
};
use intellicenter_api::{Connection, Message, Notifications, ObjectEntry, ParamQuery, Payload};

use crate::config::ControllerConfig;
use crate::convert::{prune_entries, to_attributes};
use crate::error::CoreError;
use crate::model::attributes::{MODE_ATTR, PROPNAME_ATTR, SNAME_ATTR, VER_ATTR};
use crate::model::{AttributeTable, PoolModel, SystemInfo};
use crate::store::{ModelStore, ModelUpdate};
use crate::stream::ModelStream;

/// Condition selecting the system object.
const SYSTEM_CONDITION: &str = "OBJTYP=SYSTEM";

/// Attributes read for [`SystemInfo`] before the model loads.
const SYSTEM_INFO_KEYS: [&str; 4] = [PROPNAME_ATTR, VER_ATTR, MODE_ATTR, SNAME_ATTR];

/// Subscription requests are flushed once a batch covers this many
/// attributes; larger requests upset the appliance.
const SUBSCRIPTION_BATCH_ATTRIBUTES: usize = 50;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Each [`start()`](Self::start)
/// builds a fresh [`Connection`] and a fresh model; nothing protocol-level
/// survives from one session to the next.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    store: Arc<ModelStore>,
    connection_state: watch::Sender<ConnectionState>,
    connection: ArcSwapOption<Connection>,
    /// Bumped on every teardown so a stale session task cannot clobber
    /// the state of a newer one.
    generation: AtomicU64,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Controller {
    /// Create a controller tracking every known object type. Does NOT
    /// connect; call [`start()`](Self::start).
    pub fn new(config: ControllerConfig) -> Self {
        Self::with_table(config, AttributeTable::default())
    }

    /// Create a controller tracking only the types in `table`.
    pub fn with_table(config: ControllerConfig, table: AttributeTable) -> Self {
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(ControllerInner {
                config,
                store: Arc::new(ModelStore::new(table)),
                connection_state,
                connection: ArcSwapOption::empty(),
                generation: AtomicU64::new(0),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<ModelStore> {
        &self.inner.store
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Connect and load the model.
    ///
    /// Any previous session is torn down first. On failure the new
    /// session is torn down too and the state becomes `Failed`.
    ///
    /// The session can drop between the last bootstrap reply and the
    /// return of this call. In that case `start` still succeeds but the
    /// state is left `Disconnected`, never `Connected`.
    pub async fn start(&self) -> Result<(), CoreError> {
        self.teardown().await;
        let generation = self.inner.generation.load(Ordering::SeqCst);
        self.inner.connection_state.send_replace(ConnectionState::Connecting);

        match self.establish(generation).await {
            Ok(()) => {
                let model = self.inner.store.snapshot();
                if self.publish_connected(generation) {
                    info!(
                        address = %self.inner.config.address(),
                        objects = model.len(),
                        "controller ready"
                    );
                } else {
                    warn!(
                        address = %self.inner.config.address(),
                        objects = model.len(),
                        "appliance connection lost right after model load"
                    );
                }
                Ok(())
            }
            Err(e) => {
                warn!(address = %self.inner.config.address(), error = %e, "controller start failed");
                self.teardown().await;
                self.inner.connection_state.send_replace(ConnectionState::Failed);
                Err(e)
            }
        }
    }

    /// Close the session. Every pending request resolves with a
    /// cancellation before this returns.
    pub async fn stop(&self) {
        self.teardown().await;
        self.inner.connection_state.send_replace(ConnectionState::Disconnected);
        debug!("controller stopped");
    }

    /// Publish `Connected` if the session of `generation` is still open,
    /// `Disconnected` otherwise. Runs under the state channel's lock, so
    /// it cannot interleave with the session task's own transition.
    fn publish_connected(&self, generation: u64) -> bool {
        let inner = &self.inner;
        let mut alive = false;
        inner.connection_state.send_modify(|state| {
            alive = inner.generation.load(Ordering::SeqCst) == generation
                && inner
                    .connection
                    .load_full()
                    .is_some_and(|connection| !connection.is_closed());
            *state = if alive {
                ConnectionState::Connected
            } else {
                ConnectionState::Disconnected
            };
        });
        alive
    }

    async fn establish(&self, generation: u64) -> Result<(), CoreError> {
        let config = &self.inner.config;
        let (connection, notifications) =
            Connection::connect(&config.address(), config.protocol.clone(), config.connect_timeout).await?;
        let connection = Arc::new(connection);

        self.inner.store.reset();
        self.inner.connection.store(Some(Arc::clone(&connection)));

        let handle = tokio::spawn(session_task(
            Arc::downgrade(&self.inner),
            Arc::clone(&self.inner.store),
            Arc::clone(&connection),
            notifications,
            generation,
        ));
        self.inner.task_handles.lock().await.push(handle);

        bootstrap(&connection, &self.inner.store).await
    }

    async fn teardown(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(connection) = self.inner.connection.swap(None) {
            connection.close().await;
        }
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
    }

    // ── Commands ─────────────────────────────────────────────────

    fn connection(&self) -> Result<Arc<Connection>, CoreError> {
        self.inner
            .connection
            .load_full()
            .ok_or(CoreError::ControllerDisconnected)
    }

    /// Send a command and wait for its response.
    ///
    /// Fails with `ControllerDisconnected` without touching the network
    /// when no session is open.
    pub async fn send_cmd(&self, command: &str, payload: Payload) -> Result<Message, CoreError> {
        let handle = self.connection()?.request(command, payload)?;
        Ok(handle.response().await?)
    }

    /// Send a command and discard its response. Returns the message id.
    pub fn send_cmd_no_wait(&self, command: &str, payload: Payload) -> Result<String, CoreError> {
        Ok(self.connection()?.send(command, payload)?)
    }

    /// Query `keys` across every object matching `condition` (empty =
    /// all). Echoed undefined attributes are pruned.
    pub async fn get_query(&self, condition: &str, keys: &[String]) -> Result<Vec<ObjectEntry>, CoreError> {
        let reply = self.send_cmd(GET_PARAM_LIST, get_param_list(condition, keys)).await?;
        object_list(&reply)
    }

    /// Query `keys` across every object on the appliance.
    pub async fn get_all_objects(&self, keys: &[String]) -> Result<Vec<ObjectEntry>, CoreError> {
        self.get_query("", keys).await
    }

    /// Ask the appliance to change attributes of `objnam` without waiting
    /// for the reply. The local model changes only when the appliance
    /// pushes the resulting notification.
    pub fn request_changes(&self, objnam: &str, changes: &[(&str, &str)]) -> Result<String, CoreError> {
        validate_changes(objnam, changes)?;
        self.send_cmd_no_wait(SET_PARAM_LIST, set_param_list(objnam, changes.iter().copied()))
    }

    /// Like [`request_changes`](Self::request_changes) but waits for the
    /// appliance to accept or reject the change.
    pub async fn request_changes_and_wait(&self, objnam: &str, changes: &[(&str, &str)]) -> Result<(), CoreError> {
        validate_changes(objnam, changes)?;
        self.send_cmd(SET_PARAM_LIST, set_param_list(objnam, changes.iter().copied()))
            .await
            .map(|_| ())
    }

    // ── Observation ──────────────────────────────────────────────

    pub fn model(&self) -> Arc<PoolModel> {
        self.inner.store.snapshot()
    }

    pub fn system_info(&self) -> Option<SystemInfo> {
        self.inner.store.system_info()
    }

    /// "Objects changed" events: one per notification that changed
    /// something.
    pub fn updates(&self) -> broadcast::Receiver<Arc<ModelUpdate>> {
        self.inner.store.updates()
    }

    pub fn subscribe(&self) -> ModelStream {
        self.inner.store.subscribe()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.connection_state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.swap(None) {
            connection.shutdown("controller dropped");
        }
    }
}

// ── Session ──────────────────────────────────────────────────────

/// Route notifications into the store until the connection closes.
async fn session_task(
    inner: Weak<ControllerInner>,
    store: Arc<ModelStore>,
    connection: Arc<Connection>,
    mut notifications: Notifications,
    generation: u64,
) {
    loop {
        tokio::select! {
            () = connection.closed() => break,
            message = notifications.recv() => match message {
                Some(message) => handle_notification(&store, &message),
                None => break,
            },
        }
    }

    let Some(inner) = inner.upgrade() else { return };
    if inner.generation.load(Ordering::SeqCst) == generation {
        inner.connection_state.send_modify(|state| {
            inner.connection.store(None);
            *state = ConnectionState::Disconnected;
        });
        warn!(
            reason = connection.close_reason().as_deref().unwrap_or("unknown"),
            "appliance connection lost"
        );
    }
}

fn handle_notification(store: &ModelStore, message: &Message) {
    if message.command != NOTIFY_LIST {
        debug!(command = %message.command, "ignoring unsolicited message");
        return;
    }
    match message.object_list() {
        Ok(entries) => {
            let changes = store.apply_notification(&prune_entries(entries));
            debug!(objects = changes.len(), "model updated");
        }
        Err(e) => warn!(error = %e, "dropping malformed NotifyList"),
    }
}

// ── Bootstrap ────────────────────────────────────────────────────

/// Load system info, then every tracked object, then subscribe to push
/// updates for the tracked attributes. System info is published last.
async fn bootstrap(connection: &Connection, store: &ModelStore) -> Result<(), CoreError> {
    let keys: Vec<String> = SYSTEM_INFO_KEYS.iter().map(|k| (*k).to_owned()).collect();
    let reply = connection
        .request(GET_PARAM_LIST, get_param_list(SYSTEM_CONDITION, &keys))?
        .response()
        .await?;
    let system = object_list(&reply)?
        .first()
        .map(|entry| SystemInfo::from_attributes(&entry.objnam, &to_attributes(&entry.params)))
        .ok_or_else(|| CoreError::Protocol {
            message: "system query returned no object".into(),
        })?;
    debug!(name = %system.prop_name, version = %system.sw_version, "system info loaded");

    let keys = store.snapshot().attributes_to_track();
    let reply = connection
        .request(GET_PARAM_LIST, get_param_list("", &keys))?
        .response()
        .await?;
    let added = store.merge_objects(&object_list(&reply)?);
    debug!(objects = added, "object model loaded");

    for batch in subscription_batches(store.snapshot().subscriptions(), SUBSCRIPTION_BATCH_ATTRIBUTES) {
        let reply = connection
            .request(REQUEST_PARAM_LIST, request_param_list(&batch))?
            .response()
            .await?;
        store.merge_objects(&object_list(&reply)?);
    }

    store.set_system_info(system);
    Ok(())
}

/// Group queries so each batch covers at least `min_attributes`
/// attributes, except possibly the last.
fn subscription_batches(queries: Vec<ParamQuery>, min_attributes: usize) -> Vec<Vec<ParamQuery>> {
    let mut batches = Vec::new();
    let mut batch = Vec::new();
    let mut attributes = 0;

    for query in queries {
        attributes += query.keys.len();
        batch.push(query);
        if attributes >= min_attributes {
            batches.push(std::mem::take(&mut batch));
            attributes = 0;
        }
    }
    if !batch.is_empty() {
        batches.push(batch);
    }
    batches
}

fn object_list(reply: &Message) -> Result<Vec<ObjectEntry>, CoreError> {
    reply
        .object_list()
        .map(prune_entries)
        .map_err(|e| CoreError::Protocol {
            message: format!("malformed objectList in {} reply: {e}", reply.command),
        })
}

fn validate_changes(objnam: &str, changes: &[(&str, &str)]) -> Result<(), CoreError> {
    if objnam.is_empty() {
        return Err(CoreError::ValidationFailed {
            message: "object name must not be empty".into(),
        });
    }
    if changes.is_empty() {
        return Err(CoreError::ValidationFailed {
            message: format!("no attributes to change on {objnam}"),
        });
    }
    Ok(())
}
