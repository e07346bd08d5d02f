//! Framed JSON-RPC echo server used by the integration tests.
//!
//! Behaves like a minimal language server: answers `initialize` with an
//! empty capability set, `shutdown` with null, quits on `exit`, and
//! echoes every other request's params back as its result.
//!
//! Flags:
//! - `--publish-diagnostics`: on `textDocument/didOpen`, publish two
//!   diagnostics for the opened document, then overwrite them with one.
//! - `--hover <text>`: answer `textDocument/hover` with the given text
//!   (without it, hover yields a null result).

use lsp_hub::framing::{FrameReader, FrameWriter, ReadOutcome};
use serde_json::{Value, json};

fn tiny_range() -> Value {
    json!({
        "start": {"line": 0, "character": 0},
        "end": {"line": 0, "character": 1}
    })
}

fn handle_frame(frame: Value, publish_diagnostics: bool, hover_text: Option<&str>) -> Option<Vec<Value>> {
    let id = frame.get("id").cloned();
    let method = frame.get("method").and_then(Value::as_str).unwrap_or("");
    let params = frame.get("params").cloned().unwrap_or(Value::Null);

    let outgoing = match (id, method) {
        (Some(id), "initialize") => vec![json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": { "capabilities": {} }
        })],
        (Some(id), "shutdown") => {
            vec![json!({"jsonrpc": "2.0", "id": id, "result": null})]
        }
        (None, "exit") => return None,
        (None, "textDocument/didOpen") if publish_diagnostics => {
            let uri = params["textDocument"]["uri"].clone();
            vec![
                json!({
                    "jsonrpc": "2.0",
                    "method": "textDocument/publishDiagnostics",
                    "params": {
                        "uri": uri.clone(),
                        "diagnostics": [
                            {"message": "first issue", "severity": 1, "range": tiny_range()},
                            {"message": "second issue", "severity": 2, "range": tiny_range()}
                        ]
                    }
                }),
                json!({
                    "jsonrpc": "2.0",
                    "method": "textDocument/publishDiagnostics",
                    "params": {
                        "uri": uri,
                        "diagnostics": [
                            {"message": "final diagnostic", "severity": 2, "range": tiny_range()}
                        ]
                    }
                }),
            ]
        }
        (Some(id), "textDocument/hover") => {
            let result = match hover_text {
                Some(text) => json!({"contents": text}),
                None => Value::Null,
            };
            vec![json!({"jsonrpc": "2.0", "id": id, "result": result})]
        }
        (Some(id), "workspace/symbol") => {
            let query = params["query"].clone();
            vec![json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": [{
                    "name": query,
                    "kind": 12,
                    "location": {"uri": "file:///fake/symbols.rs", "range": tiny_range()}
                }]
            })]
        }
        // The echo contract: any other request returns its params.
        (Some(id), _) => vec![json!({"jsonrpc": "2.0", "id": id, "result": params})],
        (None, _) => Vec::new(),
    };

    Some(outgoing)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let _ = lsp_hub::init_logging(lsp_hub::LogConfig::from_env());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let publish_diagnostics = args.iter().any(|a| a == "--publish-diagnostics");
    let hover_text = args
        .windows(2)
        .find(|pair| pair[0] == "--hover")
        .map(|pair| pair[1].clone());

    let mut reader = FrameReader::new(tokio::io::stdin());
    let mut writer = FrameWriter::new(tokio::io::stdout());

    loop {
        let frame = match reader.read_message().await {
            ReadOutcome::Frame(frame) => frame,
            ReadOutcome::Malformed(_) => continue,
            ReadOutcome::Eof | ReadOutcome::Failed(_) => break,
        };

        let Some(outgoing) = handle_frame(frame, publish_diagnostics, hover_text.as_deref())
        else {
            break;
        };

        for message in &outgoing {
            if writer.write_message(message).await.is_err() {
                return;
            }
        }
    }
}
