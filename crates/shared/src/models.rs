//! Shared data models for the telecare backend API and realtime feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Identity ---

/// Role of the locally authenticated user.
///
/// Rooms carry one unread counter per role; the role decides which counter
/// belongs to this client.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum UserRole {
    Doctor,
    Patient,
}

/// Denormalized user info attached to messages, rooms and locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
}

// --- Chat ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub id: String,
    pub booking_id: String,
    pub doctor_id: String,
    pub patient_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<UserSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<UserSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_count_doctor: u32,
    #[serde(default)]
    pub unread_count_patient: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatRoom {
    /// The unread counter that belongs to the given role.
    pub fn unread_for(&self, role: UserRole) -> u32 {
        match role {
            UserRole::Doctor => self.unread_count_doctor,
            UserRole::Patient => self.unread_count_patient,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub room_id: String,
    pub sender: UserSummary,
    pub content: String,
    #[serde(default)]
    pub seen: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// --- Location ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DoctorLocation {
    pub doctor_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<UserSummary>,
    /// Filled in client-side from the device position; the server never
    /// sends it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

// --- REST request/response shapes ---

/// The backend wraps every successful response body in `{"data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiData<T> {
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub room_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomsData {
    pub rooms: Vec<ChatRoom>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessagesData {
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageData {
    pub message: Message,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoomData {
    pub chat_room: ChatRoom,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unread_counter_follows_role() {
        let room = ChatRoom {
            id: "r1".into(),
            booking_id: "b1".into(),
            doctor_id: "d1".into(),
            patient_id: "p1".into(),
            doctor: None,
            patient: None,
            last_message: None,
            last_message_at: None,
            unread_count_doctor: 3,
            unread_count_patient: 7,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(room.unread_for(UserRole::Doctor), 3);
        assert_eq!(room.unread_for(UserRole::Patient), 7);
    }

    #[test]
    fn room_fields_use_camel_case_on_the_wire() {
        let json = r#"{
            "id": "r1",
            "bookingId": "b1",
            "doctorId": "d1",
            "patientId": "p1",
            "lastMessage": "hi",
            "lastMessageAt": "2026-01-10T12:00:00Z",
            "unreadCountDoctor": 1,
            "unreadCountPatient": 0,
            "createdAt": "2026-01-10T11:00:00Z",
            "updatedAt": "2026-01-10T12:00:00Z"
        }"#;
        let room: ChatRoom = serde_json::from_str(json).unwrap();
        assert_eq!(room.booking_id, "b1");
        assert_eq!(room.last_message.as_deref(), Some("hi"));
        assert_eq!(room.unread_count_doctor, 1);
    }
}
