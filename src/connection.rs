use async_trait::async_trait;
use std::sync::Mutex;
use tracing::info;

use crate::config::api_key_from_env;

/// Whether the content service can be reached with valid credentials.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn is_connected(&self) -> bool;

    /// Ask for a connection to be established. May be declined; returns the
    /// resulting status.
    async fn request_connection(&self) -> bool;
}

/// Connected iff an API key is known, either configured up front or found in
/// the environment when a connection is requested.
#[derive(Debug, Default)]
pub struct ApiKeyConnection {
    key: Mutex<Option<String>>,
}

impl ApiKeyConnection {
    pub fn new(key: Option<String>) -> Self {
        Self {
            key: Mutex::new(key.filter(|k| !k.trim().is_empty())),
        }
    }

    fn has_key(&self) -> bool {
        self.key.lock().map(|k| k.is_some()).unwrap_or(false)
    }
}

#[async_trait]
impl ConnectionProvider for ApiKeyConnection {
    async fn is_connected(&self) -> bool {
        self.has_key()
    }

    async fn request_connection(&self) -> bool {
        if self.has_key() {
            return true;
        }
        let found = api_key_from_env();
        let connected = found.is_some();
        if let Ok(mut slot) = self.key.lock() {
            *slot = found;
        }
        info!(connected, "connection requested");
        connected
    }
}
