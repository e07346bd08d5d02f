//! In-memory server harness for exercising the protocol client.
//!
//! Drives [`ProtocolClient::connect`] over `tokio::io::duplex` pipes: the
//! harness plays the server side of the handshake, then hands the test
//! full frame-level control over what the "server" reads and writes.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};

use crate::client::ProtocolClient;
use crate::error::LspError;
use crate::events::EventBus;
use crate::framing::{FrameReader, FrameWriter, ReadOutcome};

const PIPE_CAPACITY: usize = 256 * 1024;
const FRAME_DEADLINE: Duration = Duration::from_secs(5);

pub(crate) struct HandshakeServer {
    client: Arc<ProtocolClient>,
    bus: Arc<EventBus>,
    reader: FrameReader<ReadHalf<DuplexStream>>,
    writer: FrameWriter<WriteHalf<DuplexStream>>,
}

impl HandshakeServer {
    /// Wire a client over in-memory pipes and complete the initialize
    /// handshake on its behalf.
    pub async fn start(server_id: &str) -> Self {
        let (client_result, bus, reader, writer) =
            wire_client(server_id, InitBehavior::Succeed).await;
        Self {
            client: client_result.expect("handshake should succeed"),
            bus,
            reader,
            writer,
        }
    }

    /// Run the wiring but answer `initialize` with an error, returning
    /// whatever `connect` produced.
    pub async fn start_with_failing_init(server_id: &str) -> Result<Arc<ProtocolClient>, LspError> {
        let (client_result, _bus, _reader, _writer) =
            wire_client(server_id, InitBehavior::Fail).await;
        client_result
    }

    pub fn client(&self) -> Arc<ProtocolClient> {
        self.client.clone()
    }

    pub fn bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    /// Read the next frame the client sent, panicking on timeout so a
    /// wedged test fails fast.
    pub async fn read_frame(&mut self) -> Value {
        match tokio::time::timeout(FRAME_DEADLINE, self.reader.read_message()).await {
            Ok(ReadOutcome::Frame(value)) => value,
            Ok(other) => panic!("expected frame from client, got {other:?}"),
            Err(_) => panic!("timed out waiting for a frame from the client"),
        }
    }

    pub async fn write_frame(&mut self, frame: &Value) {
        self.writer
            .write_message(frame)
            .await
            .expect("write to client");
    }

    /// Push raw bytes at the client, bypassing framing.
    pub async fn write_raw(&mut self, bytes: &[u8]) {
        let inner = self.writer.inner_mut();
        inner.write_all(bytes).await.expect("raw write to client");
        inner.flush().await.expect("flush raw write");
    }
}

enum InitBehavior {
    Succeed,
    Fail,
}

async fn wire_client(
    server_id: &str,
    behavior: InitBehavior,
) -> (
    Result<Arc<ProtocolClient>, LspError>,
    Arc<EventBus>,
    FrameReader<ReadHalf<DuplexStream>>,
    FrameWriter<WriteHalf<DuplexStream>>,
) {
    let (client_side, server_side) = tokio::io::duplex(PIPE_CAPACITY);
    let (client_read, client_write) = tokio::io::split(client_side);
    let (server_read, server_write) = tokio::io::split(server_side);

    let mut reader = FrameReader::new(server_read);
    let mut writer = FrameWriter::new(server_write);
    let bus = Arc::new(EventBus::new());

    let connect = ProtocolClient::connect(
        server_id.to_string(),
        std::env::temp_dir(),
        None,
        bus.clone(),
        Box::new(client_read),
        Box::new(client_write),
        None,
        None,
        Duration::from_secs(5),
    );

    let serve = async {
        loop {
            match reader.read_message().await {
                ReadOutcome::Frame(frame) => match frame["method"].as_str() {
                    Some("initialize") => {
                        let reply = match behavior {
                            InitBehavior::Succeed => json!({
                                "jsonrpc": "2.0",
                                "id": frame["id"],
                                "result": { "capabilities": {} }
                            }),
                            InitBehavior::Fail => json!({
                                "jsonrpc": "2.0",
                                "id": frame["id"],
                                "error": { "code": -32600, "message": "refused" }
                            }),
                        };
                        writer.write_message(&reply).await.expect("write init reply");
                        if matches!(behavior, InitBehavior::Fail) {
                            // connect will dispose; nothing more to serve.
                            break;
                        }
                    }
                    Some("initialized") => break,
                    other => panic!("unexpected frame during handshake: {other:?}"),
                },
                other => panic!("handshake stream broke: {other:?}"),
            }
        }
    };

    let (client_result, ()) = tokio::join!(connect, serve);
    (client_result, bus, reader, writer)
}
