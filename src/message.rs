//! Messages exchanged by test actions and the listener/store infrastructure
//! notified about them.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// Direction tag for message exchange notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

impl std::fmt::Display for MessageDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageDirection::Inbound => write!(f, "inbound"),
            MessageDirection::Outbound => write!(f, "outbound"),
        }
    }
}

/// A message payload with headers, exchanged by a test action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    /// Optional name under which the message is recorded in the store
    pub name: Option<String>,
    pub payload: String,
    pub headers: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new message with the given payload
    pub fn new<S: Into<String>>(payload: S) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: None,
            payload: payload.into(),
            headers: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Name the message for later retrieval from the message store
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a header entry
    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Listener informed about inbound and outbound message exchange
pub trait MessageListener: Send + Sync {
    fn on_inbound_message(&self, message: &Message);
    fn on_outbound_message(&self, message: &Message);
}

/// Fan-out collection of registered message listeners
#[derive(Default)]
pub struct MessageListeners {
    listeners: Vec<Arc<dyn MessageListener>>,
}

impl MessageListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: Arc<dyn MessageListener>) {
        self.listeners.push(listener);
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn on_inbound_message(&self, message: &Message) {
        for listener in &self.listeners {
            listener.on_inbound_message(message);
        }
    }

    pub fn on_outbound_message(&self, message: &Message) {
        for listener in &self.listeners {
            listener.on_outbound_message(message);
        }
    }
}

impl std::fmt::Debug for MessageListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageListeners")
            .field("count", &self.listeners.len())
            .finish()
    }
}

/// Per-context store recording named messages for later inspection
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: RwLock<HashMap<String, Message>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message under the given name, overwriting any previous entry
    pub fn store_message<S: Into<String>>(&self, name: S, message: Message) {
        if let Ok(mut messages) = self.messages.write() {
            messages.insert(name.into(), message);
        }
    }

    /// Retrieve a recorded message by name
    pub fn get_message(&self, name: &str) -> Option<Message> {
        self.messages.read().ok()?.get(name).cloned()
    }

    /// Number of recorded messages
    pub fn len(&self) -> usize {
        self.messages.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Identity of a test case, sufficient for listener notifications even when
/// the real test case could not be built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCaseInfo {
    pub name: String,
    pub package_name: String,
}

impl TestCaseInfo {
    pub fn new<S: Into<String>>(name: S, package_name: S) -> Self {
        Self {
            name: name.into(),
            package_name: package_name.into(),
        }
    }
}

/// Listener informed about test lifecycle events
pub trait TestListener: Send + Sync {
    fn on_test_start(&self, test: &TestCaseInfo);
    fn on_test_failure(&self, test: &TestCaseInfo, error: &EngineError);
    fn on_test_finish(&self, test: &TestCaseInfo);
}

/// Fan-out collection of registered test listeners
#[derive(Default)]
pub struct TestListeners {
    listeners: Vec<Arc<dyn TestListener>>,
}

impl TestListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: Arc<dyn TestListener>) {
        self.listeners.push(listener);
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn on_test_start(&self, test: &TestCaseInfo) {
        for listener in &self.listeners {
            listener.on_test_start(test);
        }
    }

    pub fn on_test_failure(&self, test: &TestCaseInfo, error: &EngineError) {
        for listener in &self.listeners {
            listener.on_test_failure(test, error);
        }
    }

    pub fn on_test_finish(&self, test: &TestCaseInfo) {
        for listener in &self.listeners {
            listener.on_test_finish(test);
        }
    }
}

impl std::fmt::Debug for TestListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestListeners")
            .field("count", &self.listeners.len())
            .finish()
    }
}

/// Outcome reported by a finished test case
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestResult {
    Success { name: String },
    Failure { name: String, message: String },
    Skipped { name: String },
}

impl TestResult {
    pub fn success<S: Into<String>>(name: S) -> Self {
        TestResult::Success { name: name.into() }
    }

    pub fn failure<S: Into<String>>(name: S, message: S) -> Self {
        TestResult::Failure {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn skipped<S: Into<String>>(name: S) -> Self {
        TestResult::Skipped { name: name.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TestResult::Success { .. })
    }
}
