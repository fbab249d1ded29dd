//! Bearer-token storage.
//!
//! The REST client and the realtime handshake both read the token through
//! the [`TokenStore`] trait so the host application can plug in whatever
//! secure storage it has. Two implementations ship here: an in-memory
//! store and a JSON file in the platform config directory:
//! - Linux: `~/.config/telecare/`
//! - macOS: `~/Library/Application Support/telecare/`
//! - Windows: `%APPDATA%\telecare\`

use std::path::PathBuf;
use std::sync::RwLock;

/// Access to the persisted auth token.
pub trait TokenStore: Send + Sync {
    /// The current token, if any.
    fn load(&self) -> Option<String>;

    /// Persist a new token. Returns `true` if the operation succeeded.
    fn store(&self, token: &str) -> bool;

    /// Remove the token (logout).
    fn clear(&self);
}

/// Token held in process memory only.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self { token: RwLock::new(Some(token.into())) }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn store(&self, token: &str) -> bool {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        true
    }

    fn clear(&self) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

/// Token persisted as a JSON file under the platform config directory.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    app_name: String,
    key: String,
}

impl FileTokenStore {
    pub fn new() -> Self {
        Self { app_name: "telecare".to_string(), key: "auth_token".to_string() }
    }

    pub fn with_app_name(app_name: impl Into<String>) -> Self {
        Self { app_name: app_name.into(), key: "auth_token".to_string() }
    }

    fn file_path(&self) -> Option<PathBuf> {
        let config_dir = dirs::config_dir()?;
        let app_dir = config_dir.join(&self.app_name);
        if !app_dir.exists() {
            std::fs::create_dir_all(&app_dir).ok()?;
        }
        // Sanitize key to be a valid filename
        let safe_key = self.key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        Some(app_dir.join(format!("{safe_key}.json")))
    }
}

impl Default for FileTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<String> {
        let path = self.file_path()?;
        let json = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&json).ok()
    }

    fn store(&self, token: &str) -> bool {
        let Some(path) = self.file_path() else {
            return false;
        };
        match serde_json::to_string(token) {
            Ok(json) => std::fs::write(path, json).is_ok(),
            Err(_) => false,
        }
    }

    fn clear(&self) {
        if let Some(path) = self.file_path() {
            let _ = std::fs::remove_file(path);
        }
    }
}
