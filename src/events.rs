//! String-keyed publish/subscribe bus.
//!
//! Decouples the client read loops from diagnostics aggregation: a read
//! loop publishes [`DiagnosticsNotice`]s without knowing who consumes
//! them. The bus is an owned value shared via `Arc` — construct one per
//! manager (or per test), never a process-wide global.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::RwLock;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, warn};

use crate::types::Diagnostic;

/// Topic carrying per-document diagnostics parsed from
/// `textDocument/publishDiagnostics`.
pub const DIAGNOSTICS_TOPIC: &str = "lsp.diagnostics";

/// Payload published on [`DIAGNOSTICS_TOPIC`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsNotice {
    pub uri: String,
    pub diagnostics: Vec<Diagnostic>,
}

type Handler = Box<dyn Fn(&Value) + Send + Sync>;

/// Thread-safe topic → handler registry with typed subscription.
///
/// Handlers run synchronously on the publisher's task. A panicking or
/// mis-typed handler is logged and skipped; it can neither block delivery
/// to the remaining handlers nor unwind into the publishing read loop.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<String, Vec<Handler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed handler for `topic`.
    ///
    /// The payload is deserialized per handler; a payload that does not
    /// match `T` is logged and the handler skipped for that event.
    pub fn subscribe<T, F>(&self, topic: &str, handler: F)
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        let topic_name = topic.to_string();
        let wrapped: Handler = Box::new(move |value: &Value| {
            match serde_json::from_value::<T>(value.clone()) {
                Ok(payload) => handler(payload),
                Err(e) => {
                    warn!(topic = %topic_name, "event payload did not match subscriber type: {e}");
                }
            }
        });

        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers.entry(topic.to_string()).or_default().push(wrapped);
    }

    /// Publish `payload` to every handler subscribed to `topic`.
    pub fn publish<T: Serialize>(&self, topic: &str, payload: &T) {
        let value = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                error!(topic, "failed to serialize event payload: {e}");
                return;
            }
        };

        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(handlers) = subscribers.get(topic) else {
            return;
        };

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&value))).is_err() {
                error!(topic, "event subscriber panicked; continuing delivery");
            }
        }
    }
}
