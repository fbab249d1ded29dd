//! Session behavior against a mock transport.
//!
//! The mock factory counts constructions and hands the test the server
//! side of each connection as a channel pair.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::StreamExt;

use telecare_client::ws::{
    AuthPayload, ConnectionState, ReconnectConfig, TransportError, TransportFactory,
    TransportHandle,
};
use telecare_client::{
    ClientConfig, ConnectError, JoinError, JoinInfo, LocationStore, MemoryTokenStore,
    MessageStore, RoomStore, Session, TokenStore,
};
use telecare_shared::{
    ChatRoom, ClientCommand, DoctorLocation, Message, ServerEvent, UserRole, UserSummary,
    WsEnvelope,
};

/// Server side of one mock connection.
struct ServerEnd {
    to_client: UnboundedSender<WsEnvelope<ServerEvent>>,
    from_client: UnboundedReceiver<WsEnvelope<ClientCommand>>,
}

#[derive(Default)]
struct MockFactory {
    connects: AtomicUsize,
    fail: AtomicBool,
    ends: Mutex<Vec<ServerEnd>>,
}

impl MockFactory {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    fn has_end(&self) -> bool {
        !self.ends.lock().unwrap().is_empty()
    }

    /// Take the oldest not-yet-claimed connection.
    fn take_end(&self) -> ServerEnd {
        self.ends.lock().unwrap().remove(0)
    }
}

#[async_trait]
impl TransportFactory for MockFactory {
    async fn connect(
        &self,
        _url: &str,
        auth: &AuthPayload,
    ) -> Result<TransportHandle, TransportError> {
        // Give concurrent callers a chance to pile onto the same attempt.
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.connects.fetch_add(1, Ordering::SeqCst);
        assert!(!auth.token.is_empty(), "transport opened without a token");
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Connection("mock refused".into()));
        }
        let (out_tx, out_rx) = unbounded();
        let (in_tx, in_rx) = unbounded();
        self.ends
            .lock()
            .unwrap()
            .push(ServerEnd { to_client: in_tx, from_client: out_rx });
        Ok(TransportHandle { outbound: out_tx, inbound: in_rx })
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn test_config() -> ClientConfig {
    let mut config = ClientConfig::new("https://api.telecare.example/api/v1");
    config.join_timeout = Duration::from_millis(200);
    config.reconnect =
        ReconnectConfig { max_attempts: 5, initial_delay_ms: 10, max_delay_ms: 50, backoff_multiplier: 1.5 };
    config
}

fn session_with(factory: &Arc<MockFactory>, tokens: Arc<dyn TokenStore>) -> Session {
    Session::with_factory(test_config(), tokens, Arc::clone(factory) as Arc<dyn TransportFactory>)
}

fn authed_session(factory: &Arc<MockFactory>) -> Session {
    session_with(factory, Arc::new(MemoryTokenStore::with_token("tok-1")))
}

fn reply(payload: ServerEvent, correlation_id: Option<String>) -> WsEnvelope<ServerEvent> {
    WsEnvelope { id: "srv-1".to_string(), payload, ts: Utc::now(), correlation_id }
}

async fn wait_for(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn concurrent_connects_build_one_transport() {
    init_tracing();
    let factory = MockFactory::new();
    let session = authed_session(&factory);

    let (a, b) = tokio::join!(session.connect(), session.connect());
    assert_eq!(a, Ok(()));
    assert_eq!(b, Ok(()));
    assert_eq!(factory.connect_count(), 1);
    assert!(session.is_connected());

    // Once connected, further calls are no-ops.
    session.connect().await.unwrap();
    assert_eq!(factory.connect_count(), 1);
}

#[tokio::test]
async fn connect_without_token_is_an_auth_error() {
    let factory = MockFactory::new();
    let session = session_with(&factory, Arc::new(MemoryTokenStore::new()));

    assert_eq!(session.connect().await, Err(ConnectError::Auth));
    assert_eq!(factory.connect_count(), 0);
    assert_eq!(session.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn disconnect_then_connect_builds_a_fresh_transport() {
    let factory = MockFactory::new();
    let session = authed_session(&factory);

    session.connect().await.unwrap();
    let first = factory.take_end();

    session.disconnect();
    assert!(!session.is_connected());

    session.connect().await.unwrap();
    assert_eq!(factory.connect_count(), 2);
    assert!(session.is_connected());

    // The first transport is dead: its receiver side is gone.
    wait_for(|| {
        first
            .to_client
            .unbounded_send(reply(ServerEvent::UserOffline { user_id: "u1".into() }, None))
            .is_err()
    })
    .await;
}

#[tokio::test]
async fn join_connects_first_then_emits_exactly_one_join() {
    let factory = MockFactory::new();
    let session = authed_session(&factory);

    let join_session = session.clone();
    let join = tokio::spawn(async move { join_session.join_room("room1").await });

    wait_for(|| factory.has_end()).await;
    let mut end = factory.take_end();

    let request = end.from_client.next().await.expect("join request emitted");
    assert_eq!(request.payload, ClientCommand::JoinRoom { room_id: "room1".into() });
    let correlation_id = request.correlation_id.clone();
    assert!(correlation_id.is_some(), "join request must carry a correlation id");

    end.to_client
        .unbounded_send(reply(
            ServerEvent::JoinAck { success: true, unread_count: Some(4), error: None },
            correlation_id,
        ))
        .unwrap();

    let info = join.await.unwrap().unwrap();
    assert_eq!(info, JoinInfo { unread_count: 4 });
    assert_eq!(factory.connect_count(), 1);
}

#[tokio::test]
async fn join_without_token_fails_without_emitting() {
    let factory = MockFactory::new();
    let session = session_with(&factory, Arc::new(MemoryTokenStore::new()));

    let result = session.join_room("room1").await;
    assert_eq!(result, Err(JoinError::Connect(ConnectError::Auth)));
    assert_eq!(factory.connect_count(), 0);
}

#[tokio::test]
async fn join_rejection_carries_the_server_message() {
    let factory = MockFactory::new();
    let session = authed_session(&factory);

    let join_session = session.clone();
    let join = tokio::spawn(async move { join_session.join_room("room1").await });

    wait_for(|| factory.has_end()).await;
    let mut end = factory.take_end();
    let request = end.from_client.next().await.unwrap();

    end.to_client
        .unbounded_send(reply(
            ServerEvent::JoinAck {
                success: false,
                unread_count: None,
                error: Some("not a participant".into()),
            },
            request.correlation_id,
        ))
        .unwrap();

    assert_eq!(join.await.unwrap(), Err(JoinError::Rejected("not a participant".into())));
}

#[tokio::test]
async fn missing_ack_times_out() {
    let factory = MockFactory::new();
    let session = authed_session(&factory);

    let join_session = session.clone();
    let join = tokio::spawn(async move { join_session.join_room("room1").await });

    wait_for(|| factory.has_end()).await;
    let mut end = factory.take_end();
    // Read the request but never acknowledge it.
    let _request = end.from_client.next().await.unwrap();

    assert_eq!(join.await.unwrap(), Err(JoinError::AckTimeout(Duration::from_millis(200))));
}

#[tokio::test]
async fn connection_loss_fails_a_waiting_join() {
    let factory = MockFactory::new();
    let session = authed_session(&factory);

    let join_session = session.clone();
    let join = tokio::spawn(async move { join_session.join_room("room1").await });

    wait_for(|| factory.has_end()).await;
    let mut end = factory.take_end();
    let _request = end.from_client.next().await.unwrap();

    // Server goes away before acknowledging.
    drop(end.to_client);

    assert_eq!(join.await.unwrap(), Err(JoinError::ConnectionLost));
}

#[tokio::test]
async fn fire_and_forget_commands_reach_the_server() {
    let factory = MockFactory::new();
    let session = authed_session(&factory);

    // Emitting while disconnected is logged and dropped, never an error.
    session.typing("room1", true);

    session.connect().await.unwrap();
    let mut end = factory.take_end();

    session.typing("room1", true);
    session.mark_as_seen("m1", "room1");
    session.leave_room("room1");
    session.subscribe_locations();
    session.unsubscribe_locations();

    let expected = [
        ClientCommand::Typing { room_id: "room1".into(), is_typing: true },
        ClientCommand::MarkAsSeen { message_id: "m1".into(), room_id: "room1".into() },
        ClientCommand::LeaveRoom { room_id: "room1".into() },
        ClientCommand::SubscribeLocations,
        ClientCommand::UnsubscribeLocations,
    ];
    for expected in expected {
        let envelope = end.from_client.next().await.unwrap();
        assert_eq!(envelope.payload, expected);
        assert!(envelope.correlation_id.is_none());
    }
}

#[tokio::test]
async fn dropped_connection_reconnects_within_budget() {
    init_tracing();
    let factory = MockFactory::new();
    let session = authed_session(&factory);

    session.connect().await.unwrap();
    let end = factory.take_end();

    drop(end);

    wait_for(|| factory.connect_count() == 2).await;
    wait_for(|| session.is_connected()).await;
}

#[tokio::test]
async fn exhausted_reconnect_budget_ends_in_failed() {
    let factory = MockFactory::new();
    let session = authed_session(&factory);

    session.connect().await.unwrap();
    factory.fail.store(true, Ordering::SeqCst);
    let end = factory.take_end();
    drop(end);

    wait_for(|| matches!(session.state(), ConnectionState::Failed { .. })).await;
    // Initial connect plus the full reconnection budget.
    assert_eq!(factory.connect_count(), 6);

    // An explicit connect() starts over.
    factory.fail.store(false, Ordering::SeqCst);
    session.connect().await.unwrap();
    assert!(session.is_connected());
}

#[tokio::test]
async fn pushed_events_reach_attached_stores() {
    let factory = MockFactory::new();
    let session = authed_session(&factory);

    let rooms = RoomStore::new(UserRole::Patient);
    let messages = MessageStore::new();
    let locations = LocationStore::new();
    let _room_subs = rooms.attach(session.dispatcher());
    let _message_subs = messages.attach(session.dispatcher());
    let _location_sub = locations.attach(session.dispatcher());

    let created = Utc.with_ymd_and_hms(2026, 1, 2, 9, 0, 0).unwrap();
    rooms.set_rooms(vec![
        ChatRoom {
            id: "a".into(),
            booking_id: "bk-a".into(),
            doctor_id: "d1".into(),
            patient_id: "p1".into(),
            doctor: None,
            patient: None,
            last_message: None,
            last_message_at: None,
            unread_count_doctor: 0,
            unread_count_patient: 2,
            created_at: created,
            updated_at: created,
        },
        ChatRoom {
            id: "b".into(),
            booking_id: "bk-b".into(),
            doctor_id: "d1".into(),
            patient_id: "p1".into(),
            doctor: None,
            patient: None,
            last_message: None,
            last_message_at: None,
            unread_count_doctor: 0,
            unread_count_patient: 0,
            created_at: created,
            updated_at: created,
        },
    ]);

    session.connect().await.unwrap();
    let end = factory.take_end();

    let message = Message {
        id: "m1".into(),
        room_id: "b".into(),
        sender: UserSummary { id: "d1".into(), name: "Dr. Ada".into(), avatar: None, role: None },
        content: "results are in".into(),
        seen: false,
        seen_at: None,
        created_at: created,
    };
    end.to_client
        .unbounded_send(reply(ServerEvent::NewMessage(message), None))
        .unwrap();
    end.to_client
        .unbounded_send(reply(
            ServerEvent::UnreadCountUpdate { room_id: "b".into(), count: 5 },
            None,
        ))
        .unwrap();
    end.to_client
        .unbounded_send(reply(
            ServerEvent::LocationUpdate(vec![DoctorLocation {
                doctor_id: "d1".into(),
                latitude: 52.52,
                longitude: 13.41,
                updated_at: created,
                doctor: None,
                distance_km: None,
            }]),
            None,
        ))
        .unwrap();

    wait_for(|| rooms.total_unread() == 7).await;
    {
        let list = rooms.read();
        let order: Vec<&str> = list.rooms.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(order, ["b", "a"]);
        assert_eq!(list.rooms[0].last_message.as_deref(), Some("results are in"));
    }
    assert_eq!(messages.with_room("b", |h| h.messages.len()), Some(1));
    wait_for(|| locations.snapshot().len() == 1).await;
}

#[tokio::test]
async fn state_changes_are_observable() {
    let factory = MockFactory::new();
    let session = authed_session(&factory);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let _sub = session.dispatcher().on_state_change(move |state| {
        seen_clone.lock().unwrap().push(state.clone());
    });

    session.connect().await.unwrap();
    session.disconnect();

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnected,
        ]
    );
}
