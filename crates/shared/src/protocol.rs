//! Realtime protocol: the wire envelope and command/event enums.
//!
//! Everything on the socket is a JSON [`WsEnvelope`] whose payload is an
//! internally tagged command (client to server) or event (server to
//! client). Event names are snake_case, payload fields camelCase, matching
//! the backend feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{DoctorLocation, Message};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsEnvelope<T> {
    pub id: String,
    #[serde(flatten)]
    pub payload: T,
    pub ts: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// Commands the client emits over the socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientCommand {
    JoinRoom { room_id: String },
    LeaveRoom { room_id: String },
    Typing { room_id: String, is_typing: bool },
    MarkAsSeen { message_id: String, room_id: String },
    SubscribeLocations,
    UnsubscribeLocations,
}

/// Events the server pushes over the socket.
///
/// `JoinAck` is the only event correlated to a request; it echoes the
/// `correlation_id` of the `join_room` envelope it answers. Everything
/// else is unsolicited.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    JoinAck {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unread_count: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    NewMessage(Message),
    MessageSeen {
        message_id: String,
        room_id: String,
        seen_by: String,
        seen_at: DateTime<Utc>,
    },
    UserTyping {
        user_id: String,
        is_typing: bool,
    },
    UserOnline {
        user_id: String,
        timestamp: DateTime<Utc>,
    },
    UserOffline {
        user_id: String,
    },
    UnreadCountUpdate {
        room_id: String,
        count: u32,
    },
    LocationUpdate(Vec<DoctorLocation>),
}
