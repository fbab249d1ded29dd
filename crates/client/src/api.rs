//! HTTP API client with bearer-token auth.

use std::sync::Arc;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use telecare_shared::{
    ApiData, ApiError, ChatRoom, ChatRoomData, Message, MessageData, MessagesData, RoomsData,
    SendMessageRequest,
};

use crate::config::ClientConfig;
use crate::token::TokenStore;

/// HTTP client for the telecare REST API.
///
/// Every wrapper returns `Result`; callers decide whether a failure
/// becomes a surfaced error string or a retry. Nothing here swallows an
/// error into a default value.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: ClientConfig,
    tokens: Option<Arc<dyn TokenStore>>,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { client: Client::new(), config, tokens: None }
    }

    /// Attach the token store used for `Authorization` headers.
    pub fn with_token_store(mut self, tokens: Arc<dyn TokenStore>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    fn authorize(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.tokens.as_ref().and_then(|t| t.load()) {
            Some(token) => rb.header("Authorization", format!("Bearer {token}")),
            None => rb,
        }
    }

    /// Make an authorized GET request.
    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        let url = self.config.api_url(path);
        let rb = self.authorize(self.client.get(&url));

        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(ApiError::Http { status, body: text });
        }

        serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))
    }

    /// Make an authorized POST request with JSON body.
    pub async fn post_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let url = self.config.api_url(path);
        let rb = self.authorize(self.client.post(&url)).json(body);

        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(ApiError::Http { status, body: text });
        }

        if text.is_empty() {
            serde_json::from_str("null").map_err(|e| ApiError::Deserialize(e.to_string()))
        } else {
            serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))
        }
    }

    // --- Chat API methods ---

    /// Fetch the full chat-room list for the current user.
    pub async fn chat_rooms(&self) -> Result<Vec<ChatRoom>, ApiError> {
        let resp: ApiData<RoomsData> = self.get_json("/chat/rooms").await?;
        Ok(resp.data.rooms)
    }

    /// Fetch the message history of a room.
    pub async fn room_messages(&self, room_id: &str) -> Result<Vec<Message>, ApiError> {
        let resp: ApiData<MessagesData> = self.get_json(&format!("/chat/{room_id}/messages")).await?;
        Ok(resp.data.messages)
    }

    /// Send a message. The returned message is the server-confirmed
    /// record; there is no local optimistic copy before it.
    pub async fn send_message(&self, room_id: &str, content: &str) -> Result<Message, ApiError> {
        let body = SendMessageRequest { room_id: room_id.to_string(), content: content.to_string() };
        let resp: ApiData<MessageData> = self.post_json("/chat/send-message", &body).await?;
        Ok(resp.data.message)
    }

    /// Create the chat room for a booking.
    pub async fn create_room(&self, booking_id: &str) -> Result<ChatRoom, ApiError> {
        let resp: ApiData<ChatRoomData> =
            self.post_json(&format!("/chat/create/{booking_id}"), &serde_json::json!({})).await?;
        Ok(resp.data.chat_room)
    }
}
