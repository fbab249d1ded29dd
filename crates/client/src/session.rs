//! The realtime session: one connection, shared by everything.
//!
//! `Session` is an explicitly constructed, cheaply clonable handle (all
//! clones share one connection) meant to be created once per app lifetime
//! and passed down to consumers. `connect()` collapses concurrent callers
//! onto a single in-flight attempt; `join_room` waits for the server's
//! acknowledgment with a timeout; everything else is fire-and-forget.
//!
//! The in-flight marker and connection state live behind a sync mutex
//! that is never held across an await.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use futures_channel::mpsc::UnboundedReceiver;
use futures_util::future::{BoxFuture, Shared};
use futures_util::{FutureExt, StreamExt};
use tokio::sync::oneshot;
use uuid::Uuid;

use telecare_shared::{ClientCommand, ServerEvent, WsEnvelope};

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::error::{ConnectError, JoinError, SendError};
use crate::events::EventDispatcher;
use crate::token::TokenStore;
use crate::ws::transport::{AuthPayload, TransportFactory, TransportHandle};
use crate::ws::{ConnectionState, WsTransport};

/// Result of a successful room join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinInfo {
    pub unread_count: u32,
}

/// Payload routed from the reader task to a waiting `join_room` call.
#[derive(Debug)]
struct JoinAck {
    success: bool,
    unread_count: Option<u32>,
    error: Option<String>,
}

type ConnectFuture = Shared<BoxFuture<'static, Result<(), ConnectError>>>;

struct ConnectionSlot {
    state: ConnectionState,
    /// The collapsed in-flight connect attempt. At most one exists.
    pending: Option<ConnectFuture>,
    outbound: Option<futures_channel::mpsc::UnboundedSender<WsEnvelope<ClientCommand>>>,
    task: Option<tokio::task::JoinHandle<()>>,
    /// Bumped by `disconnect()`; stale attempts and reader tasks check it
    /// before touching the slot.
    generation: u64,
}

struct SessionInner {
    config: ClientConfig,
    tokens: Arc<dyn TokenStore>,
    factory: Arc<dyn TransportFactory>,
    dispatcher: EventDispatcher,
    slot: Mutex<ConnectionSlot>,
    pending_acks: Mutex<HashMap<String, oneshot::Sender<JoinAck>>>,
}

/// Handle to the realtime session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Create a session with the production WebSocket transport.
    pub fn new(config: ClientConfig, tokens: Arc<dyn TokenStore>) -> Self {
        let factory = Arc::new(WsTransport::new(config.connect_timeout));
        Self::with_factory(config, tokens, factory)
    }

    /// Create a session with a custom transport factory.
    pub fn with_factory(
        config: ClientConfig,
        tokens: Arc<dyn TokenStore>,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                config,
                tokens,
                factory,
                dispatcher: EventDispatcher::new(),
                slot: Mutex::new(ConnectionSlot {
                    state: ConnectionState::Disconnected,
                    pending: None,
                    outbound: None,
                    task: None,
                    generation: 0,
                }),
                pending_acks: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.inner.dispatcher
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// A REST client sharing this session's config and token store.
    pub fn api_client(&self) -> ApiClient {
        ApiClient::new(self.inner.config.clone()).with_token_store(Arc::clone(&self.inner.tokens))
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.slot().state.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Connect the session.
    ///
    /// Already connected is a no-op; a concurrent caller awaits the same
    /// in-flight attempt (exactly one transport is ever constructed per
    /// attempt). Otherwise reads the token, derives the realtime endpoint
    /// and opens the transport. After the transport's reconnection budget
    /// is exhausted the session stays down until `connect()` is called
    /// again.
    pub async fn connect(&self) -> Result<(), ConnectError> {
        let (fut, created) = {
            let mut slot = self.inner.slot();
            if slot.state.is_connected() {
                return Ok(());
            }
            // Auto-reconnection already owns the recovery attempt; a
            // second transport must never be constructed next to it.
            if matches!(slot.state, ConnectionState::Reconnecting { .. }) {
                return Ok(());
            }
            match slot.pending.clone() {
                Some(pending) => (pending, false),
                None => {
                    let weak = Arc::downgrade(&self.inner);
                    let generation = slot.generation;
                    let fut: ConnectFuture = establish(weak, generation).boxed().shared();
                    slot.pending = Some(fut.clone());
                    slot.state = ConnectionState::Connecting;
                    (fut, true)
                }
            }
        };
        if created {
            self.inner.dispatcher.dispatch_state(&ConnectionState::Connecting);
        }
        fut.await
    }

    /// Tear the connection down. Idempotent.
    pub fn disconnect(&self) {
        let task = {
            let mut slot = self.inner.slot();
            slot.generation += 1;
            slot.pending = None;
            slot.outbound = None;
            slot.state = ConnectionState::Disconnected;
            slot.task.take()
        };
        if let Some(task) = task {
            task.abort();
        }
        self.inner.acks().clear();
        self.inner.dispatcher.dispatch_state(&ConnectionState::Disconnected);
        tracing::info!("realtime session disconnected");
    }

    /// Join a chat room, connecting first if necessary.
    ///
    /// The join request carries a correlation id; the server's
    /// acknowledgment is awaited with a timeout. A connect failure is
    /// returned as-is and no join request is emitted.
    pub async fn join_room(&self, room_id: &str) -> Result<JoinInfo, JoinError> {
        self.connect().await?;

        let correlation_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.inner.acks().insert(correlation_id.clone(), tx);

        if let Err(e) = self.try_send(
            ClientCommand::JoinRoom { room_id: room_id.to_string() },
            Some(correlation_id.clone()),
        ) {
            self.inner.acks().remove(&correlation_id);
            tracing::warn!("join_room emit failed: {e}");
            return Err(JoinError::ConnectionLost);
        }

        let timeout = self.inner.config.join_timeout;
        match tokio::time::timeout(timeout, rx).await {
            Err(_) => {
                self.inner.acks().remove(&correlation_id);
                Err(JoinError::AckTimeout(timeout))
            }
            // Sender dropped: the connection went down mid-wait.
            Ok(Err(_)) => Err(JoinError::ConnectionLost),
            Ok(Ok(ack)) => {
                if ack.success {
                    Ok(JoinInfo { unread_count: ack.unread_count.unwrap_or(0) })
                } else {
                    Err(JoinError::Rejected(
                        ack.error.unwrap_or_else(|| "join rejected".to_string()),
                    ))
                }
            }
        }
    }

    /// Leave a room. Fire-and-forget: no acknowledgment, no error.
    pub fn leave_room(&self, room_id: &str) {
        self.emit(ClientCommand::LeaveRoom { room_id: room_id.to_string() });
    }

    /// Signal the typing indicator for a room.
    pub fn typing(&self, room_id: &str, is_typing: bool) {
        self.emit(ClientCommand::Typing { room_id: room_id.to_string(), is_typing });
    }

    /// Mark a message as seen.
    pub fn mark_as_seen(&self, message_id: &str, room_id: &str) {
        self.emit(ClientCommand::MarkAsSeen {
            message_id: message_id.to_string(),
            room_id: room_id.to_string(),
        });
    }

    /// Subscribe to the doctor-location feed.
    pub fn subscribe_locations(&self) {
        self.emit(ClientCommand::SubscribeLocations);
    }

    pub fn unsubscribe_locations(&self) {
        self.emit(ClientCommand::UnsubscribeLocations);
    }

    fn emit(&self, command: ClientCommand) {
        if let Err(e) = self.try_send(command, None) {
            tracing::warn!("emit failed: {e}");
        }
    }

    fn try_send(
        &self,
        command: ClientCommand,
        correlation_id: Option<String>,
    ) -> Result<(), SendError> {
        let slot = self.inner.slot();
        let Some(outbound) = slot.outbound.as_ref() else {
            return Err(SendError::NotConnected);
        };
        let envelope = WsEnvelope {
            id: Uuid::new_v4().to_string(),
            payload: command,
            ts: chrono::Utc::now(),
            correlation_id,
        };
        outbound.unbounded_send(envelope).map_err(|_| SendError::Closed)
    }
}

impl SessionInner {
    fn slot(&self) -> MutexGuard<'_, ConnectionSlot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn acks(&self) -> MutexGuard<'_, HashMap<String, oneshot::Sender<JoinAck>>> {
        self.pending_acks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let slot = self.slot.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(task) = slot.task.take() {
            task.abort();
        }
    }
}

/// Read the token and open a transport to the derived realtime endpoint.
async fn open_transport(inner: &SessionInner) -> Result<TransportHandle, ConnectError> {
    let token = inner.tokens.load().ok_or(ConnectError::Auth)?;
    let url = inner.config.realtime_url();
    let handle = inner.factory.connect(&url, &AuthPayload { token }).await?;
    Ok(handle)
}

/// The single in-flight connect attempt behind the shared future.
async fn establish(weak: Weak<SessionInner>, generation: u64) -> Result<(), ConnectError> {
    let Some(inner) = weak.upgrade() else {
        return Err(ConnectError::Cancelled);
    };

    let result = open_transport(&inner).await;
    match result {
        Ok(handle) => {
            {
                let mut slot = inner.slot();
                if slot.generation != generation {
                    // disconnect() raced the attempt; drop the fresh handle.
                    return Err(ConnectError::Cancelled);
                }
                slot.pending = None;
                slot.outbound = Some(handle.outbound);
                slot.state = ConnectionState::Connected;
                slot.task = Some(tokio::spawn(run_connection(
                    Arc::downgrade(&inner),
                    generation,
                    handle.inbound,
                )));
            }
            inner.dispatcher.dispatch_state(&ConnectionState::Connected);
            tracing::info!("realtime session connected");
            Ok(())
        }
        Err(e) => {
            let stale = {
                let mut slot = inner.slot();
                if slot.generation != generation {
                    true
                } else {
                    slot.pending = None;
                    slot.state = ConnectionState::Disconnected;
                    false
                }
            };
            if !stale {
                inner.dispatcher.dispatch_state(&ConnectionState::Disconnected);
                tracing::warn!("connect failed: {e}");
            }
            Err(e)
        }
    }
}

/// Reader task: pump inbound events, then run the reconnection budget
/// when the stream ends. Holds only a weak reference so dropping the
/// last `Session` clone tears everything down.
async fn run_connection(
    weak: Weak<SessionInner>,
    generation: u64,
    mut inbound: UnboundedReceiver<WsEnvelope<ServerEvent>>,
) {
    loop {
        while let Some(envelope) = inbound.next().await {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            handle_envelope(&inner, envelope);
        }

        {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            tracing::info!("realtime connection closed");
            // Waiting joins will never be acknowledged on this connection.
            inner.acks().clear();
            {
                let mut slot = inner.slot();
                if slot.generation != generation {
                    return;
                }
                slot.outbound = None;
                slot.state = ConnectionState::Disconnected;
            }
            inner.dispatcher.dispatch_state(&ConnectionState::Disconnected);
        }

        // Reconnect with bounded backoff; the budget resets once a
        // connection is re-established.
        let mut attempt = 0u32;
        loop {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let reconnect = inner.config.reconnect.clone();

            if reconnect.max_attempts > 0 && attempt >= reconnect.max_attempts {
                let reason =
                    format!("max reconnect attempts ({}) exceeded", reconnect.max_attempts);
                {
                    let mut slot = inner.slot();
                    if slot.generation != generation {
                        return;
                    }
                    slot.state = ConnectionState::Failed { reason: reason.clone() };
                    slot.task = None;
                }
                inner.dispatcher.dispatch_state(&ConnectionState::Failed { reason });
                return;
            }

            let delay = reconnect.delay_for_attempt(attempt);
            {
                let mut slot = inner.slot();
                if slot.generation != generation {
                    return;
                }
                slot.state = ConnectionState::Reconnecting { attempt: attempt + 1 };
            }
            inner
                .dispatcher
                .dispatch_state(&ConnectionState::Reconnecting { attempt: attempt + 1 });
            tracing::info!("reconnecting in {delay}ms (attempt {})", attempt + 1);
            drop(inner);
            tokio::time::sleep(Duration::from_millis(u64::from(delay))).await;

            let Some(inner) = weak.upgrade() else {
                return;
            };
            match open_transport(&inner).await {
                Ok(handle) => {
                    {
                        let mut slot = inner.slot();
                        if slot.generation != generation {
                            return;
                        }
                        slot.outbound = Some(handle.outbound);
                        slot.state = ConnectionState::Connected;
                    }
                    inner.dispatcher.dispatch_state(&ConnectionState::Connected);
                    tracing::info!("realtime session reconnected");
                    inbound = handle.inbound;
                    break;
                }
                Err(ConnectError::Auth) => {
                    // Token gone mid-session; nothing to retry against.
                    let reason = "auth token missing".to_string();
                    {
                        let mut slot = inner.slot();
                        if slot.generation != generation {
                            return;
                        }
                        slot.state = ConnectionState::Failed { reason: reason.clone() };
                        slot.task = None;
                    }
                    inner.dispatcher.dispatch_state(&ConnectionState::Failed { reason });
                    return;
                }
                Err(e) => {
                    tracing::warn!("reconnect attempt {} failed: {e}", attempt + 1);
                    attempt += 1;
                }
            }
        }
    }
}

/// Route a server event: correlated join acks go to their waiting call,
/// everything else fans out through the dispatcher.
fn handle_envelope(inner: &SessionInner, envelope: WsEnvelope<ServerEvent>) {
    if let ServerEvent::JoinAck { success, unread_count, error } = &envelope.payload {
        if let Some(correlation_id) = &envelope.correlation_id {
            let sender = inner.acks().remove(correlation_id);
            match sender {
                Some(sender) => {
                    let _ = sender.send(JoinAck {
                        success: *success,
                        unread_count: *unread_count,
                        error: error.clone(),
                    });
                }
                None => {
                    tracing::warn!("join ack with unknown correlation id {correlation_id}");
                }
            }
            return;
        }
    }
    inner.dispatcher.dispatch(&envelope.payload);
}
