//! Push-notification dispatch client.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::Username;

use crate::error::MarketError;

/// One notification handed to the external push gateway.
///
/// Payload templating happens on the gateway side; the saga only supplies
/// the event kind, the parties, and string parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    pub kind: String,
    pub source: Username,
    pub target: Username,
    pub timestamp: DateTime<Utc>,
    pub params: HashMap<String, String>,
}

impl NotificationEvent {
    /// Creates an event with no parameters.
    pub fn new(
        kind: impl Into<String>,
        source: Username,
        target: Username,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: kind.into(),
            source,
            target,
            timestamp,
            params: HashMap::new(),
        }
    }

    /// Adds a string parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Trait for the external push-notification service.
///
/// Most callers treat dispatch as fire-and-forget and only log failures;
/// the receipt-gated purchase flow treats a failure as fatal for the HTTP
/// response even though the committed transaction stands.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Dispatches one notification.
    async fn send(&self, event: NotificationEvent) -> Result<(), MarketError>;
}

#[derive(Debug, Default)]
struct InMemoryNotificationState {
    sent: Vec<NotificationEvent>,
    fail_on_send: bool,
}

/// In-memory notification service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationService {
    state: Arc<RwLock<InMemoryNotificationState>>,
}

impl InMemoryNotificationService {
    /// Creates a new in-memory notification service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to fail on send.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.state.write().unwrap().fail_on_send = fail;
    }

    /// Returns the number of dispatched notifications.
    pub fn sent_count(&self) -> usize {
        self.state.read().unwrap().sent.len()
    }

    /// Returns a copy of all dispatched notifications.
    pub fn sent(&self) -> Vec<NotificationEvent> {
        self.state.read().unwrap().sent.clone()
    }
}

#[async_trait]
impl NotificationService for InMemoryNotificationService {
    async fn send(&self, event: NotificationEvent) -> Result<(), MarketError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_send {
            return Err(MarketError::Notification(
                "push gateway unavailable".to_string(),
            ));
        }

        state.sent.push(event);
        Ok(())
    }
}
