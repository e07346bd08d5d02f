use thiserror::Error;

/// Internal error taxonomy for the LSP subsystem.
///
/// These never cross the public query boundary: document queries and
/// diagnostics reads degrade to `None`/empty results instead. `LspError`
/// is what the plumbing logs and what `ProtocolClient::create` returns so
/// the manager can record a broken (server, root) pair.
#[derive(Error, Debug)]
pub enum LspError {
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("language server process error: {0}")]
    Process(String),

    #[error("initialize handshake failed: {0}")]
    Handshake(String),

    #[error("invalid message framing: {0}")]
    Framing(String),

    #[error("cannot convert path to file URI: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("client is disposed")]
    Disposed,
}
