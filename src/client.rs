//! Protocol client — owns one spawned language server process.
//!
//! Speaks JSON-RPC 2.0 framed with `Content-Length` headers over the
//! child's stdio. A dedicated reader task parses incoming frames until
//! cancellation and resolves pending requests by id; any number of
//! requests may be in flight at once, and responses may arrive in any
//! order.
//!
//! Failure policy: document queries degrade to empty results. A request
//! that times out resolves to "no result" — never an error — and its
//! pending-table entry is removed. A response carrying `error` is logged
//! and likewise resolves to "no result".

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{Level, debug, info, trace, warn};

use crate::error::LspError;
use crate::events::{DIAGNOSTICS_TOPIC, DiagnosticsNotice, EventBus};
use crate::framing::{FrameReader, FrameWriter, ReadOutcome};
use crate::protocol::{
    self, Incoming, JsonRpcNotification, JsonRpcRequest, RawMessage, method_not_found_response,
    success_response,
};
use crate::registry::ServerDescriptor;
use crate::types::{Location, SymbolInfo, language_id_for_extension};
use crate::{log_rpc_message, log_timing};

/// Bound on the initialize handshake.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default deadline for document queries.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Budget for the graceful shutdown/exit sequence during dispose.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// How long dispose waits for the reader task before aborting it.
const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Option<Value>>>>>;
type SharedWriter = Arc<Mutex<FrameWriter<BoxedWriter>>>;

pub struct ProtocolClient {
    server_id: String,
    root: PathBuf,
    writer: SharedWriter,
    pending: PendingMap,
    next_id: AtomicU64,
    initialized: AtomicBool,
    disposed: AtomicBool,
    child: Mutex<Option<Child>>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    stderr_task: Mutex<Option<JoinHandle<()>>>,
}

impl ProtocolClient {
    /// Spawn the descriptor's process with working directory `root` and
    /// run the initialize handshake.
    ///
    /// Any failure — the process cannot start, exits early, or the
    /// handshake yields no result — is an `Err`; the caller is
    /// responsible for marking the (server, root) pair broken.
    pub async fn create(
        descriptor: &ServerDescriptor,
        root: &Path,
        bus: Arc<EventBus>,
    ) -> Result<Arc<Self>, LspError> {
        info!(
            server = %descriptor.id,
            command = %descriptor.command,
            root = %root.display(),
            "starting language server"
        );

        let mut child = Command::new(&descriptor.command)
            .args(&descriptor.args)
            .current_dir(root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LspError::Spawn {
                command: descriptor.command.clone(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| LspError::Process("child has no stdin handle".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LspError::Process("child has no stdout handle".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| LspError::Process("child has no stderr handle".to_string()))?;

        let stderr_server = descriptor.id.clone();
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim().to_string();
                if !line.is_empty() {
                    debug!(server = %stderr_server, "stderr: {line}");
                }
            }
            trace!(server = %stderr_server, "stderr stream ended");
        });

        Self::connect(
            descriptor.id.clone(),
            root.to_path_buf(),
            descriptor.initialization_options.clone(),
            bus,
            Box::new(stdout),
            Box::new(stdin),
            Some(child),
            Some(stderr_task),
            DEFAULT_INIT_TIMEOUT,
        )
        .await
    }

    /// Wire a client over arbitrary streams and run the handshake.
    ///
    /// `create` goes through here with the child's pipes; tests drive the
    /// same machinery over in-memory duplex streams.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn connect(
        server_id: String,
        root: PathBuf,
        init_options: Option<Value>,
        bus: Arc<EventBus>,
        reader: BoxedReader,
        writer: BoxedWriter,
        child: Option<Child>,
        stderr_task: Option<JoinHandle<()>>,
        init_timeout: Duration,
    ) -> Result<Arc<Self>, LspError> {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let writer: SharedWriter = Arc::new(Mutex::new(FrameWriter::new(writer)));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let reader_task = tokio::spawn(read_loop(
            FrameReader::new(reader),
            pending.clone(),
            writer.clone(),
            bus,
            shutdown_rx,
            server_id.clone(),
        ));

        let client = Arc::new(Self {
            server_id,
            root,
            writer,
            pending,
            next_id: AtomicU64::new(1),
            initialized: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            child: Mutex::new(child),
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            reader_task: Mutex::new(Some(reader_task)),
            stderr_task: Mutex::new(stderr_task),
        });

        if let Err(e) = client.initialize(init_options, init_timeout).await {
            client.dispose().await;
            return Err(e);
        }

        Ok(client)
    }

    async fn initialize(
        &self,
        init_options: Option<Value>,
        init_timeout: Duration,
    ) -> Result<(), LspError> {
        let root_uri = protocol::path_to_uri(&self.root)
            .ok_or_else(|| LspError::InvalidPath(self.root.display().to_string()))?;

        let params = protocol::initialize_params(&root_uri, init_options.as_ref());
        let result = self
            .send_request("initialize", Some(params), init_timeout)
            .await;
        if result.is_none() {
            return Err(LspError::Handshake(format!(
                "'{}' returned no initialize result",
                self.server_id
            )));
        }

        self.send_notification("initialized", Some(serde_json::json!({})))
            .await?;
        self.initialized.store(true, Ordering::SeqCst);
        info!(server = %self.server_id, root = %self.root.display(), "language server ready");
        Ok(())
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst) && !self.is_disposed()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Send a request and wait up to `timeout` for the matching response.
    ///
    /// Resolves to `None` — never an error — on timeout, on a response
    /// carrying `error`, or when the client is unusable. Concurrent
    /// callers are matched purely by id; completion order is unrelated to
    /// send order.
    pub async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Option<Value> {
        if self.is_disposed() {
            debug!(server = %self.server_id, method, "request on disposed client");
            return None;
        }

        let start = Instant::now();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let request = JsonRpcRequest::new(id, method, params);
        log_rpc_message!(Level::DEBUG, "outgoing", method, &request);

        if let Err(e) = self.writer.lock().await.write_message(&request).await {
            self.pending.lock().await.remove(&id);
            warn!(server = %self.server_id, method, "failed to write request: {e}");
            return None;
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => {
                log_timing!(Level::DEBUG, method, start.elapsed());
                result
            }
            Ok(Err(_)) => {
                // Sender dropped: the pending table was cleared by dispose.
                debug!(server = %self.server_id, method, "response channel closed");
                None
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                debug!(server = %self.server_id, method, elapsed = ?start.elapsed(), "request timed out");
                None
            }
        }
    }

    /// Fire-and-forget notification: no id, no response expected.
    pub async fn send_notification(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<(), LspError> {
        if self.is_disposed() {
            return Err(LspError::Disposed);
        }
        let notification = JsonRpcNotification::new(method, params);
        log_rpc_message!(Level::DEBUG, "outgoing", method, &notification);
        self.writer.lock().await.write_message(&notification).await
    }

    /// Open a document on the server, sending its full text and a
    /// language id inferred from the file extension.
    pub async fn open_document(&self, path: &Path) -> Result<(), LspError> {
        let uri = protocol::path_to_uri(path)
            .ok_or_else(|| LspError::InvalidPath(path.display().to_string()))?;
        let text = tokio::fs::read_to_string(path).await?;
        let language_id = path
            .extension()
            .and_then(|e| e.to_str())
            .map(language_id_for_extension)
            .unwrap_or_else(|| "plaintext".to_string());

        let params = protocol::did_open_params(&uri, &language_id, 1, &text);
        self.send_notification("textDocument/didOpen", Some(params))
            .await
    }

    pub async fn definition(&self, path: &Path, line: u32, character: u32) -> Vec<Location> {
        let Some(uri) = protocol::path_to_uri(path) else {
            return Vec::new();
        };
        let params = protocol::text_position_params(&uri, line, character);
        match self
            .send_request(
                "textDocument/definition",
                Some(params),
                DEFAULT_REQUEST_TIMEOUT,
            )
            .await
        {
            Some(result) => protocol::locations_from_value(&result),
            None => Vec::new(),
        }
    }

    pub async fn references(&self, path: &Path, line: u32, character: u32) -> Vec<Location> {
        let Some(uri) = protocol::path_to_uri(path) else {
            return Vec::new();
        };
        let params = protocol::reference_params(&uri, line, character);
        match self
            .send_request(
                "textDocument/references",
                Some(params),
                DEFAULT_REQUEST_TIMEOUT,
            )
            .await
        {
            Some(result) => protocol::locations_from_value(&result),
            None => Vec::new(),
        }
    }

    pub async fn hover(&self, path: &Path, line: u32, character: u32) -> Option<String> {
        let uri = protocol::path_to_uri(path)?;
        let params = protocol::text_position_params(&uri, line, character);
        let result = self
            .send_request("textDocument/hover", Some(params), DEFAULT_REQUEST_TIMEOUT)
            .await?;
        protocol::hover_text_from_value(&result)
    }

    pub async fn document_symbols(&self, path: &Path) -> Vec<SymbolInfo> {
        let Some(uri) = protocol::path_to_uri(path) else {
            return Vec::new();
        };
        let params = protocol::document_symbol_params(&uri);
        match self
            .send_request(
                "textDocument/documentSymbol",
                Some(params),
                DEFAULT_REQUEST_TIMEOUT,
            )
            .await
        {
            Some(result) => protocol::symbols_from_value(&result, Some(&uri)),
            None => Vec::new(),
        }
    }

    pub async fn workspace_symbols(&self, query: &str) -> Vec<SymbolInfo> {
        let params = protocol::workspace_symbol_params(query);
        match self
            .send_request("workspace/symbol", Some(params), DEFAULT_REQUEST_TIMEOUT)
            .await
        {
            Some(result) => protocol::symbols_from_value(&result, None),
            None => Vec::new(),
        }
    }

    /// Tear the client down: stop the reader, attempt a bounded graceful
    /// `shutdown`/`exit` sequence, terminate the process, and release the
    /// pending table. Idempotent; never returns an error.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            debug!(server = %self.server_id, "dispose called on disposed client");
            return;
        }
        info!(server = %self.server_id, root = %self.root.display(), "disposing client");

        // Stop the reader first so it never observes closed streams.
        if let Some(tx) = self.shutdown_tx.lock().await.take() {
            let _ = tx.send(());
        }

        // Best-effort graceful shutdown. No response will be correlated at
        // this point, so just push the frames within the grace budget.
        let writer = self.writer.clone();
        let shutdown_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, async move {
            let mut writer = writer.lock().await;
            let _ = writer
                .write_message(&JsonRpcRequest::new(shutdown_id, "shutdown", None))
                .await;
            let _ = writer
                .write_message(&JsonRpcNotification::new("exit", None))
                .await;
        })
        .await;

        if let Some(mut task) = self.reader_task.lock().await.take() {
            match tokio::time::timeout(READER_JOIN_TIMEOUT, &mut task).await {
                Ok(Ok(())) => debug!(server = %self.server_id, "reader task terminated cleanly"),
                Ok(Err(e)) => warn!(server = %self.server_id, "reader task failed: {e}"),
                Err(_) => {
                    warn!(server = %self.server_id, "reader task did not stop in time, aborting");
                    task.abort();
                }
            }
        }

        if let Some(task) = self.stderr_task.lock().await.take() {
            task.abort();
        }

        if let Some(mut child) = self.child.lock().await.take() {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(server = %self.server_id, %status, "process already exited")
                }
                Ok(None) => {
                    if let Err(e) = child.kill().await {
                        warn!(server = %self.server_id, "failed to kill process: {e}");
                    }
                }
                Err(e) => warn!(server = %self.server_id, "failed to query process status: {e}"),
            }
        }

        // Dropping the senders wakes any remaining waiters with "no result".
        let cleared = {
            let mut pending = self.pending.lock().await;
            let count = pending.len();
            pending.clear();
            count
        };
        if cleared > 0 {
            debug!(server = %self.server_id, count = cleared, "released pending requests");
        }
    }
}

/// One reader task per process: parse framed messages until cancellation.
async fn read_loop(
    mut reader: FrameReader<BoxedReader>,
    pending: PendingMap,
    writer: SharedWriter,
    bus: Arc<EventBus>,
    mut shutdown_rx: oneshot::Receiver<()>,
    server_id: String,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                debug!(server = %server_id, "reader received shutdown signal");
                break;
            }
            outcome = reader.read_message() => match outcome {
                ReadOutcome::Frame(value) => {
                    dispatch(value, &pending, &writer, &bus, &server_id).await;
                }
                ReadOutcome::Malformed(reason) => {
                    // One corrupt frame must not kill the loop.
                    warn!(server = %server_id, "dropping malformed frame: {reason}");
                }
                ReadOutcome::Eof => {
                    info!(server = %server_id, "server closed its stdout");
                    break;
                }
                ReadOutcome::Failed(reason) => {
                    warn!(server = %server_id, "transport failure: {reason}");
                    break;
                }
            }
        }
    }
    // Outstanding requests are left to resolve via their own timeouts.
    debug!(server = %server_id, "reader task terminated");
}

async fn dispatch(
    value: Value,
    pending: &PendingMap,
    writer: &SharedWriter,
    bus: &Arc<EventBus>,
    server_id: &str,
) {
    let Some(incoming) = RawMessage::from_value(value).and_then(RawMessage::classify) else {
        trace!(server = %server_id, "ignoring frame with no JSON-RPC shape");
        return;
    };

    match incoming {
        Incoming::Response { id, result, error } => {
            log_rpc_message!(Level::DEBUG, "incoming", &id.to_string(), &result);
            let sender = pending.lock().await.remove(&id);
            match sender {
                Some(tx) => {
                    let payload = match error {
                        Some(err) => {
                            warn!(
                                server = %server_id,
                                id,
                                code = err.code,
                                "server error: {}", err.message
                            );
                            None
                        }
                        None => result,
                    };
                    if tx.send(payload).is_err() {
                        debug!(server = %server_id, id, "caller gave up before response arrived");
                    }
                }
                None => {
                    warn!(server = %server_id, id, "response for unknown request id");
                }
            }
        }
        Incoming::ServerRequest { id, method } => {
            // Answer so the server never blocks waiting on us.
            let response = match method.as_str() {
                "window/workDoneProgress/create" => success_response(id, Value::Null),
                _ => {
                    debug!(server = %server_id, method = %method, "declining server request");
                    method_not_found_response(id, &method)
                }
            };
            if let Err(e) = writer.lock().await.write_message(&response).await {
                warn!(server = %server_id, "failed to answer server request: {e}");
            }
        }
        Incoming::Notification { method, params } => match method.as_str() {
            "textDocument/publishDiagnostics" => {
                let Some(params) = params else { return };
                match protocol::diagnostics_from_params(params) {
                    Some((uri, diagnostics)) => {
                        debug!(
                            server = %server_id,
                            uri = %uri,
                            count = diagnostics.len(),
                            "diagnostics published"
                        );
                        bus.publish(DIAGNOSTICS_TOPIC, &DiagnosticsNotice { uri, diagnostics });
                    }
                    None => {
                        debug!(server = %server_id, "unparseable publishDiagnostics payload");
                    }
                }
            }
            _ => {
                trace!(server = %server_id, method = %method, "ignoring notification");
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::HandshakeServer;
    use serde_json::json;

    #[cfg(feature = "test-logging")]
    #[ctor::ctor]
    fn init_test_logging() {
        crate::test_utils::logging::init();
    }

    #[tokio::test]
    async fn handshake_produces_initialized_client() {
        let server = HandshakeServer::start("echo").await;
        let client = server.client();
        assert!(client.is_initialized());
        assert_eq!(client.server_id(), "echo");
    }

    #[tokio::test]
    async fn request_ids_are_strictly_increasing() {
        let mut server = HandshakeServer::start("echo").await;
        let client = server.client();

        let mut seen_ids = Vec::new();
        for method in ["a", "b", "c"] {
            let (result, ()) = tokio::join!(
                client.send_request(method, None, Duration::from_secs(5)),
                async {
                    let frame = server.read_frame().await;
                    let id = frame["id"].clone();
                    server
                        .write_frame(&json!({"jsonrpc": "2.0", "id": id.clone(), "result": {"id": id}}))
                        .await;
                }
            );
            seen_ids.push(result.unwrap()["id"].as_u64().unwrap());
        }

        assert!(seen_ids.windows(2).all(|w| w[1] > w[0]), "ids {seen_ids:?}");
    }

    #[tokio::test]
    async fn out_of_order_responses_resolve_correct_callers() {
        let mut server = HandshakeServer::start("echo").await;
        let client = server.client();

        let (res_a, res_b, ()) = tokio::join!(
            client.send_request("query/a", Some(json!({"tag": "a"})), Duration::from_secs(5)),
            client.send_request("query/b", Some(json!({"tag": "b"})), Duration::from_secs(5)),
            async {
                // Collect both requests, then answer in reverse order.
                let first = server.read_frame().await;
                let second = server.read_frame().await;
                for frame in [&second, &first] {
                    let id = frame["id"].clone();
                    let tag = frame["params"]["tag"].clone();
                    server
                        .write_frame(&json!({
                            "jsonrpc": "2.0",
                            "id": id,
                            "result": {"tag": tag}
                        }))
                        .await;
                }
            }
        );

        assert_eq!(res_a.unwrap()["tag"], "a");
        assert_eq!(res_b.unwrap()["tag"], "b");
    }

    #[tokio::test]
    async fn timeout_resolves_to_none_not_before_deadline() {
        let server = HandshakeServer::start("silent").await;
        let client = server.client();

        let deadline = Duration::from_millis(50);
        let start = Instant::now();
        let result = client.send_request("ping", Some(json!({"x": 1})), deadline).await;
        let elapsed = start.elapsed();

        assert!(result.is_none());
        assert!(elapsed >= deadline, "resolved early after {elapsed:?}");
        // The pending entry must be cleaned up on timeout.
        assert!(client.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn protocol_error_resolves_to_none() {
        let mut server = HandshakeServer::start("echo").await;
        let client = server.client();

        let (result, ()) = tokio::join!(
            client.send_request("will-fail", None, Duration::from_secs(5)),
            async {
                let frame = server.read_frame().await;
                server
                    .write_frame(&json!({
                        "jsonrpc": "2.0",
                        "id": frame["id"],
                        "error": {"code": -32603, "message": "internal error"}
                    }))
                    .await;
            }
        );

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn unknown_response_id_is_ignored() {
        let mut server = HandshakeServer::start("echo").await;
        let client = server.client();

        server
            .write_frame(&json!({"jsonrpc": "2.0", "id": 9999, "result": {}}))
            .await;

        // The client still answers subsequent traffic normally.
        let (result, ()) = tokio::join!(
            client.send_request("after", None, Duration::from_secs(5)),
            async {
                let frame = server.read_frame().await;
                server
                    .write_frame(&json!({"jsonrpc": "2.0", "id": frame["id"], "result": {"ok": true}}))
                    .await;
            }
        );
        assert_eq!(result.unwrap()["ok"], true);
    }

    #[tokio::test]
    async fn server_requests_are_answered() {
        let mut server = HandshakeServer::start("echo").await;
        let _client = server.client();

        server
            .write_frame(&json!({
                "jsonrpc": "2.0", "id": 55, "method": "client/registerCapability", "params": {}
            }))
            .await;
        let reply = server.read_frame().await;
        assert_eq!(reply["id"], 55);
        assert_eq!(reply["error"]["code"], -32601);

        server
            .write_frame(&json!({
                "jsonrpc": "2.0", "id": 56, "method": "window/workDoneProgress/create",
                "params": {"token": "t"}
            }))
            .await;
        let reply = server.read_frame().await;
        assert_eq!(reply["id"], 56);
        assert_eq!(reply["result"], Value::Null);
    }

    #[tokio::test]
    async fn publish_diagnostics_reaches_the_bus() {
        let mut server = HandshakeServer::start("echo").await;
        let received = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = received.clone();
        server
            .bus()
            .subscribe(DIAGNOSTICS_TOPIC, move |notice: DiagnosticsNotice| {
                sink.lock().unwrap().push(notice);
            });

        server
            .write_frame(&json!({
                "jsonrpc": "2.0",
                "method": "textDocument/publishDiagnostics",
                "params": {
                    "uri": "file:///a.rs",
                    "diagnostics": [{
                        "message": "boom",
                        "severity": 1,
                        "range": {
                            "start": {"line": 0, "character": 0},
                            "end": {"line": 0, "character": 4}
                        }
                    }]
                }
            }))
            .await;

        // Delivery happens on the reader task; poll briefly.
        for _ in 0..100 {
            if !received.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let notices = received.lock().unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].uri, "file:///a.rs");
        assert_eq!(notices[0].diagnostics[0].message, "boom");
    }

    #[tokio::test]
    async fn malformed_frame_does_not_kill_the_reader() {
        let mut server = HandshakeServer::start("echo").await;
        let client = server.client();

        server.write_raw(b"Content-Length: 9\r\n\r\nnot json!").await;

        let (result, ()) = tokio::join!(
            client.send_request("still-alive", None, Duration::from_secs(5)),
            async {
                let frame = server.read_frame().await;
                server
                    .write_frame(&json!({"jsonrpc": "2.0", "id": frame["id"], "result": {"ok": 1}}))
                    .await;
            }
        );
        assert_eq!(result.unwrap()["ok"], 1);
    }

    #[tokio::test]
    async fn dispose_is_idempotent_and_blocks_requests() {
        let server = HandshakeServer::start("echo").await;
        let client = server.client();

        client.dispose().await;
        assert!(client.is_disposed());
        assert!(!client.is_initialized());

        // Second dispose is a no-op.
        client.dispose().await;

        let result = client
            .send_request("after-dispose", None, Duration::from_millis(100))
            .await;
        assert!(result.is_none());
        assert!(client.send_notification("noop", None).await.is_err());
    }

    #[tokio::test]
    async fn handshake_failure_yields_error_not_client() {
        // Server answers initialize with an error: no result, handshake fails.
        let result = HandshakeServer::start_with_failing_init("broken").await;
        assert!(matches!(result, Err(LspError::Handshake(_))));
    }
}
