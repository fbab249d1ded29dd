//! Room-list store: ordered rooms and per-room unread counters.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use telecare_shared::{ApiError, ChatRoom, Message, UserRole};

use crate::api::ApiClient;
use crate::events::{EventDispatcher, Subscription};

/// The room list, most-recently-active first, plus the unread-count map
/// for the local user's role.
#[derive(Debug)]
pub struct RoomList {
    pub rooms: Vec<ChatRoom>,
    pub unread: HashMap<String, u32>,
    pub loading: bool,
    pub error: Option<String>,
    role: UserRole,
}

impl RoomList {
    pub fn new(role: UserRole) -> Self {
        Self { rooms: Vec::new(), unread: HashMap::new(), loading: false, error: None, role }
    }

    pub fn role(&self) -> UserRole {
        self.role
    }

    /// Replace the list from a full fetch and seed the unread map from
    /// each room's role-specific counter.
    pub fn set_rooms(&mut self, rooms: Vec<ChatRoom>) {
        self.unread = rooms.iter().map(|r| (r.id.clone(), r.unread_for(self.role))).collect();
        self.rooms = rooms;
        self.error = None;
    }

    /// Patch a room for an incoming message: update the last-message
    /// fields and move it to the front. The relative order of all other
    /// rooms is unchanged. A message for an unknown room is ignored —
    /// rooms are never created implicitly.
    pub fn apply_new_message(&mut self, message: &Message) -> bool {
        let Some(pos) = self.rooms.iter().position(|r| r.id == message.room_id) else {
            return false;
        };
        let mut room = self.rooms.remove(pos);
        room.last_message = Some(message.content.clone());
        room.last_message_at = Some(message.created_at);
        self.rooms.insert(0, room);
        true
    }

    /// Overwrite the unread counter for a room. Last write wins; arrival
    /// order is trusted as causal.
    pub fn apply_unread_update(&mut self, room_id: &str, count: u32) {
        self.unread.insert(room_id.to_string(), count);
    }

    /// Prepend a freshly created room.
    pub fn prepend_room(&mut self, room: ChatRoom) {
        self.unread.insert(room.id.clone(), room.unread_for(self.role));
        self.rooms.insert(0, room);
    }

    /// Sum of all unread counters.
    pub fn total_unread(&self) -> u32 {
        self.unread.values().sum()
    }
}

/// Shared handle to a [`RoomList`].
#[derive(Clone)]
pub struct RoomStore {
    inner: Arc<RwLock<RoomList>>,
}

impl RoomStore {
    pub fn new(role: UserRole) -> Self {
        Self { inner: Arc::new(RwLock::new(RoomList::new(role))) }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, RoomList> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, RoomList> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Fetch the full room list. The store leaves `loading` regardless of
    /// the outcome; a failure is surfaced both in `error` and to the
    /// caller.
    pub async fn load(&self, api: &ApiClient) -> Result<(), ApiError> {
        {
            let mut list = self.write();
            list.loading = true;
            list.error = None;
        }
        let result = api.chat_rooms().await;
        let mut list = self.write();
        list.loading = false;
        match result {
            Ok(rooms) => {
                list.set_rooms(rooms);
                Ok(())
            }
            Err(e) => {
                list.error = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// Create the room for a booking and prepend it once the server
    /// confirms. No optimistic copy exists before the response.
    pub async fn create_room(
        &self,
        api: &ApiClient,
        booking_id: &str,
    ) -> Result<ChatRoom, ApiError> {
        let room = api.create_room(booking_id).await?;
        self.write().prepend_room(room.clone());
        Ok(room)
    }

    /// Replace the list directly (a refresh fetched by the caller).
    pub fn set_rooms(&self, rooms: Vec<ChatRoom>) {
        self.write().set_rooms(rooms);
    }

    pub fn total_unread(&self) -> u32 {
        self.read().total_unread()
    }

    /// Wire this store to a dispatcher. Dropping the returned
    /// subscriptions detaches it.
    pub fn attach(&self, dispatcher: &EventDispatcher) -> Vec<Subscription> {
        let store = self.clone();
        let on_message = dispatcher.on_new_message(move |message| {
            store.write().apply_new_message(message);
        });
        let store = self.clone();
        let on_unread = dispatcher.on_unread_count(move |room_id, count| {
            store.write().apply_unread_update(room_id, count);
        });
        vec![on_message, on_unread]
    }
}
