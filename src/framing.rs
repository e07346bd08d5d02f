//! Content-Length message framing.
//!
//! LSP transports JSON-RPC over stdio as `Content-Length: <n>\r\n\r\n<json>`
//! where `<n>` is the UTF-8 byte count of the body. [`FrameReader`] and
//! [`FrameWriter`] are generic over the underlying streams so the same code
//! runs against a child process and against in-memory pipes in tests.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::trace;

use crate::error::LspError;

/// Maximum frame size to prevent unbounded allocation from a misbehaving
/// server.
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Result of reading one frame from the stream.
///
/// `Malformed` means the frame envelope was intact and fully consumed but
/// the body was not valid JSON — the stream is still in sync, so the read
/// loop logs and continues. `Failed` means the stream itself is unusable
/// (header desync, mid-frame EOF, I/O error) and reading must stop.
#[derive(Debug)]
pub enum ReadOutcome {
    Frame(serde_json::Value),
    Malformed(String),
    Eof,
    Failed(String),
}

/// Reads framed JSON-RPC messages from an async stream.
pub struct FrameReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Read the next frame.
    ///
    /// `Eof` is only reported at a frame boundary; end of stream inside a
    /// header block or body is `Failed`.
    pub async fn read_message(&mut self) -> ReadOutcome {
        let content_length = match self.read_headers().await {
            Ok(Some(len)) => len,
            Ok(None) => return ReadOutcome::Eof,
            Err(e) => return ReadOutcome::Failed(e.to_string()),
        };

        if content_length > MAX_FRAME_BYTES {
            return ReadOutcome::Failed(format!(
                "Content-Length {content_length} exceeds maximum {MAX_FRAME_BYTES}"
            ));
        }

        let mut body = vec![0u8; content_length];
        if let Err(e) = self.reader.read_exact(&mut body).await {
            return ReadOutcome::Failed(format!("reading frame body: {e}"));
        }

        match serde_json::from_slice(&body) {
            Ok(value) => {
                trace!(bytes = content_length, "read complete frame");
                ReadOutcome::Frame(value)
            }
            Err(e) => ReadOutcome::Malformed(format!("invalid JSON in frame body: {e}")),
        }
    }

    /// Parse headers up to the blank separator line.
    ///
    /// Returns `Ok(None)` on clean EOF before any header byte. Header names
    /// are matched case-insensitively; headers other than `Content-Length`
    /// are ignored.
    async fn read_headers(&mut self) -> Result<Option<usize>, LspError> {
        let mut content_length: Option<usize> = None;
        let mut line = String::new();
        let mut saw_header_bytes = false;

        loop {
            line.clear();
            let bytes_read = self.reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                if !saw_header_bytes {
                    return Ok(None);
                }
                return Err(LspError::Framing(
                    "unexpected EOF while reading headers".to_string(),
                ));
            }
            saw_header_bytes = true;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }

            if let Some(colon) = trimmed.find(':') {
                let key = &trimmed[..colon];
                if key.eq_ignore_ascii_case("Content-Length") {
                    let len = trimmed[colon + 1..].trim().parse::<usize>().map_err(|_| {
                        LspError::Framing(format!("invalid Content-Length value in '{trimmed}'"))
                    })?;
                    content_length = Some(len);
                }
            }
        }

        match content_length {
            Some(len) => Ok(Some(len)),
            None => Err(LspError::Framing("missing Content-Length header".to_string())),
        }
    }
}

/// Writes framed JSON-RPC messages to an async stream.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Mutable access to the underlying stream, for callers that need to
    /// bypass framing (e.g. fault-injection in tests).
    pub fn inner_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Serialize and write one message, flushing afterwards.
    pub async fn write_message<T: serde::Serialize>(&mut self, message: &T) -> Result<(), LspError> {
        let body = serde_json::to_string(message)?;
        let framed = format!("Content-Length: {}\r\n\r\n{}", body.len(), body);

        trace!(bytes = body.len(), "writing frame");

        self.writer.write_all(framed.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read_all(data: &[u8]) -> ReadOutcome {
        FrameReader::new(data).read_message().await
    }

    #[tokio::test]
    async fn roundtrip() {
        let msg = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "textDocument/publishDiagnostics",
            "params": { "uri": "file:///a.rs" }
        });

        let mut buf = Vec::new();
        FrameWriter::new(&mut buf).write_message(&msg).await.unwrap();

        match FrameReader::new(buf.as_slice()).read_message().await {
            ReadOutcome::Frame(value) => assert_eq!(value, msg),
            other => panic!("expected Frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn multiple_frames_in_one_stream() {
        let mut buf = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut buf);
            writer
                .write_message(&serde_json::json!({"id": 1}))
                .await
                .unwrap();
            writer
                .write_message(&serde_json::json!({"id": 2}))
                .await
                .unwrap();
        }

        let mut reader = FrameReader::new(buf.as_slice());
        match reader.read_message().await {
            ReadOutcome::Frame(v) => assert_eq!(v["id"], 1),
            other => panic!("expected Frame, got {other:?}"),
        }
        match reader.read_message().await {
            ReadOutcome::Frame(v) => assert_eq!(v["id"], 2),
            other => panic!("expected Frame, got {other:?}"),
        }
        assert!(matches!(reader.read_message().await, ReadOutcome::Eof));
    }

    #[tokio::test]
    async fn eof_at_frame_boundary() {
        assert!(matches!(read_all(b"").await, ReadOutcome::Eof));
    }

    #[tokio::test]
    async fn eof_mid_headers_fails() {
        assert!(matches!(
            read_all(b"Content-Length: 10\r\n").await,
            ReadOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn eof_mid_body_fails() {
        assert!(matches!(
            read_all(b"Content-Length: 100\r\n\r\nhello").await,
            ReadOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn missing_content_length_fails() {
        assert!(matches!(
            read_all(b"Content-Type: application/json\r\n\r\n{}").await,
            ReadOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn invalid_content_length_fails() {
        assert!(matches!(
            read_all(b"Content-Length: banana\r\n\r\n").await,
            ReadOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn oversized_frame_fails() {
        let header = format!("Content-Length: {}\r\n\r\n", MAX_FRAME_BYTES + 1);
        assert!(matches!(
            read_all(header.as_bytes()).await,
            ReadOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn malformed_body_is_recoverable() {
        // A corrupt body must not desync the stream: the next frame still parses.
        let bad = b"not json!!";
        let good = r#"{"id":7}"#;
        let mut buf = Vec::new();
        buf.extend_from_slice(format!("Content-Length: {}\r\n\r\n", bad.len()).as_bytes());
        buf.extend_from_slice(bad);
        buf.extend_from_slice(format!("Content-Length: {}\r\n\r\n{}", good.len(), good).as_bytes());

        let mut reader = FrameReader::new(buf.as_slice());
        assert!(matches!(
            reader.read_message().await,
            ReadOutcome::Malformed(_)
        ));
        match reader.read_message().await {
            ReadOutcome::Frame(v) => assert_eq!(v["id"], 7),
            other => panic!("expected Frame after malformed body, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn case_insensitive_content_length() {
        let body = r#"{"id":1}"#;
        let frame = format!("content-length: {}\r\n\r\n{body}", body.len());
        match read_all(frame.as_bytes()).await {
            ReadOutcome::Frame(v) => assert_eq!(v["id"], 1),
            other => panic!("expected Frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn extra_headers_ignored() {
        let body = r#"{"id":1}"#;
        let frame = format!(
            "Content-Type: application/vscode-jsonrpc; charset=utf-8\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        match read_all(frame.as_bytes()).await {
            ReadOutcome::Frame(v) => assert_eq!(v["id"], 1),
            other => panic!("expected Frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn content_length_counts_bytes_not_chars() {
        let msg = serde_json::json!({"k": "é"});
        let mut buf = Vec::new();
        FrameWriter::new(&mut buf).write_message(&msg).await.unwrap();

        let body = serde_json::to_string(&msg).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with(&format!("Content-Length: {}\r\n\r\n", body.len())));

        match FrameReader::new(buf.as_slice()).read_message().await {
            ReadOutcome::Frame(v) => assert_eq!(v["k"], "é"),
            other => panic!("expected Frame, got {other:?}"),
        }
    }
}
