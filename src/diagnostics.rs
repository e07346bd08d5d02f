//! Per-document diagnostics store.
//!
//! Each `publishDiagnostics` notification fully replaces the entry for
//! its URI — lists are never merged across notifications, and an empty
//! list is stored as-is (the latest notification is the truth). Reads
//! return clones so callers cannot alias the store.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::Diagnostic;

#[derive(Debug, Default)]
pub struct DiagnosticsStore {
    inner: Mutex<HashMap<String, Vec<Diagnostic>>>,
}

impl DiagnosticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the diagnostics for `uri` with `items`.
    pub fn update(&self, uri: impl Into<String>, items: Vec<Diagnostic>) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.insert(uri.into(), items);
    }

    /// Latest diagnostics for `uri`; empty if none were ever published.
    pub fn get(&self, uri: &str) -> Vec<Diagnostic> {
        let inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.get(uri).cloned().unwrap_or_default()
    }

    /// Snapshot of every document's latest diagnostics.
    pub fn snapshot(&self) -> HashMap<String, Vec<Diagnostic>> {
        let inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.clone()
    }

    pub fn clear(&self) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.clear();
    }
}
