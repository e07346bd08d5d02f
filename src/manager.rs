//! Client manager — the public facade of the subsystem.
//!
//! Resolves a file to the right protocol client(s), lazily creating and
//! caching one per (server id, workspace root), aggregates streamed
//! diagnostics, and fans document queries out across applicable clients.
//!
//! An explicit owned hub value: registry + client cache + broken-set +
//! diagnostics store live here, constructed per host process or per
//! test. Collaborators never address a [`ProtocolClient`] directly.
//!
//! Failure policy: a (server, root) pair that fails to spawn or complete
//! its handshake is recorded broken and never retried automatically —
//! repeated spawns of a missing toolchain cost more than the lost
//! availability. Only [`ClientManager::shutdown`] clears the record.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::ProtocolClient;
use crate::diagnostics::DiagnosticsStore;
use crate::events::{DIAGNOSTICS_TOPIC, DiagnosticsNotice, EventBus};
use crate::registry::{ServerDescriptor, ServerRegistry};
use crate::types::{Diagnostic, Location, SymbolInfo};

/// Identifies one live client: (server id, resolved workspace root).
pub type ClientKey = (String, PathBuf);

/// Fixed settle interval for `touch_file(_, true)`. Diagnostics arrive
/// asynchronously; waiting is best effort, not a delivery guarantee.
const DIAGNOSTICS_SETTLE: Duration = Duration::from_millis(500);

/// Coarse per-client state reported by [`ClientManager::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Connected,
    Error,
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientStatus {
    pub server_id: String,
    pub root: PathBuf,
    pub state: ClientState,
}

pub struct ClientManager {
    registry: ServerRegistry,
    bus: Arc<EventBus>,
    diagnostics: Arc<DiagnosticsStore>,
    clients: Mutex<HashMap<ClientKey, Arc<ProtocolClient>>>,
    broken: Mutex<HashSet<ClientKey>>,
}

impl ClientManager {
    /// Build a manager over the given catalog. The diagnostics store is
    /// subscribed to the event bus here; it is the only mutation path
    /// into the store.
    pub fn new(registry: ServerRegistry) -> Self {
        let bus = Arc::new(EventBus::new());
        let diagnostics = Arc::new(DiagnosticsStore::new());

        let store = diagnostics.clone();
        bus.subscribe(DIAGNOSTICS_TOPIC, move |notice: DiagnosticsNotice| {
            store.update(notice.uri, notice.diagnostics);
        });

        Self {
            registry,
            bus,
            diagnostics,
            clients: Mutex::new(HashMap::new()),
            broken: Mutex::new(HashSet::new()),
        }
    }

    /// Manager over the builtin server catalog.
    pub fn with_builtin_servers() -> Self {
        Self::new(ServerRegistry::with_builtin_servers())
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    /// The bus clients publish on. Exposed so embedders can observe
    /// subsystem events with their own subscribers.
    pub fn event_bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    /// Resolve `file` to its client, creating one on first use.
    ///
    /// Returns `None` — not an error — when no server is registered for
    /// the extension, when the (server, root) pair is recorded broken, or
    /// when spawn/handshake fails (which records the pair broken).
    pub async fn get_client(&self, file: &Path) -> Option<Arc<ProtocolClient>> {
        let ext = file.extension()?.to_str()?;
        let descriptor = self.registry.descriptor_for_extension(ext)?;
        self.client_for_descriptor(descriptor, file).await
    }

    /// Every applicable client for `file`, in descriptor registration
    /// order. Today most extensions map to one server, but the contract
    /// supports several (e.g. a linter alongside an analyzer).
    pub async fn get_clients(&self, file: &Path) -> Vec<Arc<ProtocolClient>> {
        let Some(ext) = file.extension().and_then(|e| e.to_str()) else {
            return Vec::new();
        };
        let mut clients = Vec::new();
        for descriptor in self.registry.descriptors_for_extension(ext) {
            if let Some(client) = self.client_for_descriptor(descriptor, file).await {
                clients.push(client);
            }
        }
        clients
    }

    async fn client_for_descriptor(
        &self,
        descriptor: &ServerDescriptor,
        file: &Path,
    ) -> Option<Arc<ProtocolClient>> {
        let root = discover_root(descriptor, file);
        let key: ClientKey = (descriptor.id.clone(), root.clone());

        // The cache lock is held across spawn so concurrent callers for
        // the same key cannot double-start a server.
        let mut clients = self.clients.lock().await;

        if self.broken.lock().await.contains(&key) {
            debug!(server = %key.0, root = %key.1.display(), "skipping broken server");
            return None;
        }

        if let Some(existing) = clients.get(&key) {
            if !existing.is_disposed() {
                return Some(existing.clone());
            }
            // A disposed client is dead state; drop it and start fresh.
            clients.remove(&key);
        }

        match ProtocolClient::create(descriptor, &root, self.bus.clone()).await {
            Ok(client) => {
                clients.insert(key, client.clone());
                Some(client)
            }
            Err(e) => {
                match &descriptor.install_hint {
                    Some(hint) => warn!(
                        server = %descriptor.id,
                        root = %root.display(),
                        "failed to start language server: {e}; install with: {hint}"
                    ),
                    None => warn!(
                        server = %descriptor.id,
                        root = %root.display(),
                        "failed to start language server: {e}"
                    ),
                }
                self.broken.lock().await.insert(key);
                None
            }
        }
    }

    /// Open `path` on its client(s); with `wait_for_diagnostics`, pause a
    /// fixed bounded interval so asynchronously pushed diagnostics have a
    /// chance to arrive before the caller reads them.
    pub async fn touch_file(&self, path: &Path, wait_for_diagnostics: bool) {
        let clients = self.get_clients(path).await;
        let mut opened = false;
        for client in &clients {
            match client.open_document(path).await {
                Ok(()) => opened = true,
                Err(e) => warn!(
                    server = %client.server_id(),
                    path = %path.display(),
                    "failed to open document: {e}"
                ),
            }
        }
        if opened && wait_for_diagnostics {
            tokio::time::sleep(DIAGNOSTICS_SETTLE).await;
        }
    }

    pub async fn definition(&self, path: &Path, line: u32, character: u32) -> Vec<Location> {
        let mut results = Vec::new();
        for client in self.get_clients(path).await {
            results.extend(client.definition(path, line, character).await);
        }
        results
    }

    pub async fn references(&self, path: &Path, line: u32, character: u32) -> Vec<Location> {
        let mut results = Vec::new();
        for client in self.get_clients(path).await {
            results.extend(client.references(path, line, character).await);
        }
        results
    }

    /// Hover text cannot be merged: clients are tried in order and the
    /// first non-empty answer wins.
    pub async fn hover(&self, path: &Path, line: u32, character: u32) -> Option<String> {
        for client in self.get_clients(path).await {
            if let Some(text) = client.hover(path, line, character).await {
                return Some(text);
            }
        }
        None
    }

    pub async fn document_symbols(&self, path: &Path) -> Vec<SymbolInfo> {
        let mut results = Vec::new();
        for client in self.get_clients(path).await {
            results.extend(client.document_symbols(path).await);
        }
        results
    }

    /// Workspace-symbol search is not file-scoped: fan out over every
    /// live cached client and concatenate.
    pub async fn workspace_symbols(&self, query: &str) -> Vec<SymbolInfo> {
        let clients: Vec<Arc<ProtocolClient>> = {
            let clients = self.clients.lock().await;
            clients.values().filter(|c| !c.is_disposed()).cloned().collect()
        };
        let mut results = Vec::new();
        for client in clients {
            results.extend(client.workspace_symbols(query).await);
        }
        results
    }

    /// Latest diagnostics for a document URI. Defensive copy.
    pub fn diagnostics_for(&self, uri: &str) -> Vec<Diagnostic> {
        self.diagnostics.get(uri)
    }

    /// Latest diagnostics for every document. Defensive copy.
    pub fn diagnostics(&self) -> HashMap<String, Vec<Diagnostic>> {
        self.diagnostics.snapshot()
    }

    /// Coarse state of each live client. Disposed clients are absent.
    pub async fn status(&self) -> Vec<ClientStatus> {
        let clients = self.clients.lock().await;
        clients
            .values()
            .filter(|client| !client.is_disposed())
            .map(|client| ClientStatus {
                server_id: client.server_id().to_string(),
                root: client.root().to_path_buf(),
                state: if client.is_initialized() {
                    ClientState::Connected
                } else {
                    ClientState::Error
                },
            })
            .collect()
    }

    /// Dispose every client and reset all bookkeeping, including the
    /// broken-set — the one path that makes failed servers eligible for
    /// another spawn attempt. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        let drained: Vec<(ClientKey, Arc<ProtocolClient>)> = {
            let mut clients = self.clients.lock().await;
            clients.drain().collect()
        };
        if !drained.is_empty() {
            info!(count = drained.len(), "shutting down language servers");
        }
        for ((server_id, root), client) in drained {
            debug!(server = %server_id, root = %root.display(), "disposing");
            client.dispose().await;
        }

        self.broken.lock().await.clear();
        self.diagnostics.clear();
    }
}

/// Walk parent directories looking for any of the descriptor's root
/// markers; fall back to the file's own directory when nothing matches.
fn discover_root(descriptor: &ServerDescriptor, file: &Path) -> PathBuf {
    let start = file.parent().unwrap_or_else(|| Path::new("."));
    for dir in start.ancestors() {
        for marker in &descriptor.root_markers {
            if dir.join(marker).exists() {
                return dir.to_path_buf();
            }
        }
    }
    start.to_path_buf()
}
