//! JSON-RPC 2.0 message types, LSP parameter builders, and result decoders.
//!
//! Servers answer the same request with different shapes depending on
//! vintage and capability negotiation (a bare object, an array, or
//! location-links). The decoders at the bottom of this module try each
//! known shape in a fixed priority order and yield an empty result when
//! nothing matches, so callers never probe properties ad hoc.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::types::{Diagnostic, Location, Range, Severity, SymbolInfo};

/// JSON-RPC 2.0 version identifier.
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC error codes used by this crate.
pub mod error_codes {
    /// The method does not exist / is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
}

// ============================================================================
// Message types
// ============================================================================

/// Outgoing request. Ids are unique and strictly increasing per client.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.into(),
            params,
        }
    }
}

/// Outgoing notification: no id, no response expected.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.into(),
            params,
        }
    }
}

/// Error object carried in a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Permissive view of any incoming frame; [`RawMessage::classify`] sorts
/// frames into responses, server-initiated requests, and notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcErrorObject>,
}

/// An incoming frame after classification.
#[derive(Debug)]
pub enum Incoming {
    /// Response to one of our requests, matched by numeric id.
    Response {
        id: u64,
        result: Option<Value>,
        error: Option<JsonRpcErrorObject>,
    },
    /// Request initiated by the server; must be answered or the server
    /// may block.
    ServerRequest { id: Value, method: String },
    /// Notification from the server.
    Notification {
        method: String,
        params: Option<Value>,
    },
}

impl RawMessage {
    pub fn from_value(value: Value) -> Option<Self> {
        serde_json::from_value(value).ok()
    }

    /// Sort the frame by the id/method/result combination it carries.
    ///
    /// Frames that fit no JSON-RPC shape (or responses with non-numeric
    /// ids, which we never issue) classify to `None` and are dropped by
    /// the read loop.
    pub fn classify(self) -> Option<Incoming> {
        let has_payload = self.result.is_some() || self.error.is_some();
        match (self.id, self.method) {
            (Some(id), None) if has_payload => Some(Incoming::Response {
                id: id.as_u64()?,
                result: self.result,
                error: self.error,
            }),
            (Some(id), Some(method)) => Some(Incoming::ServerRequest { id, method }),
            (None, Some(method)) => Some(Incoming::Notification {
                method,
                params: self.params,
            }),
            _ => None,
        }
    }
}

// ============================================================================
// Response builders (for answering server-initiated requests)
// ============================================================================

/// A successful response frame with the given result.
pub fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "result": result,
    })
}

/// A "method not found" error response.
pub fn method_not_found_response(id: Value, method: &str) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": {
            "code": error_codes::METHOD_NOT_FOUND,
            "message": format!("Method not found: {method}"),
        },
    })
}

// ============================================================================
// Parameter builders
// ============================================================================

/// Parameters for the `initialize` request.
///
/// The capability set is fixed: open/change document sync, hover with
/// plaintext and markdown, definition with link support, references,
/// document symbols, versioned publish-diagnostics, and workspace
/// folders/configuration.
pub fn initialize_params(root_uri: &str, initialization_options: Option<&Value>) -> Value {
    let mut params = json!({
        "processId": std::process::id(),
        "rootUri": root_uri,
        "capabilities": {
            "textDocument": {
                "synchronization": {
                    "dynamicRegistration": false,
                    "didSave": false
                },
                "hover": {
                    "contentFormat": ["plaintext", "markdown"]
                },
                "definition": { "linkSupport": true },
                "references": { "context": true },
                "documentSymbol": {
                    "hierarchicalDocumentSymbolSupport": true
                },
                "publishDiagnostics": {
                    "versionSupport": true
                }
            },
            "workspace": {
                "workspaceFolders": true,
                "configuration": true
            }
        },
        "workspaceFolders": [{
            "uri": root_uri,
            "name": "workspace"
        }]
    });
    if let Some(options) = initialization_options {
        params["initializationOptions"] = options.clone();
    }
    params
}

pub fn did_open_params(uri: &str, language_id: &str, version: i32, text: &str) -> Value {
    json!({
        "textDocument": {
            "uri": uri,
            "languageId": language_id,
            "version": version,
            "text": text
        }
    })
}

pub fn text_position_params(uri: &str, line: u32, character: u32) -> Value {
    json!({
        "textDocument": { "uri": uri },
        "position": { "line": line, "character": character }
    })
}

pub fn reference_params(uri: &str, line: u32, character: u32) -> Value {
    let mut params = text_position_params(uri, line, character);
    params["context"] = json!({ "includeDeclaration": true });
    params
}

pub fn document_symbol_params(uri: &str) -> Value {
    json!({ "textDocument": { "uri": uri } })
}

pub fn workspace_symbol_params(query: &str) -> Value {
    json!({ "query": query })
}

// ============================================================================
// URI conversion
// ============================================================================

/// Convert a filesystem path to a `file://` URI.
///
/// Relative paths are resolved against the current directory first; paths
/// that still cannot form a URI yield `None`.
pub fn path_to_uri(path: &Path) -> Option<String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    url::Url::from_file_path(&absolute)
        .ok()
        .map(|u| u.to_string())
}

/// Convert a `file://` URI back to a filesystem path.
pub fn uri_to_path(uri: &str) -> Option<PathBuf> {
    url::Url::parse(uri).ok()?.to_file_path().ok()
}

// ============================================================================
// Diagnostics parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct PublishDiagnosticsParams {
    uri: String,
    diagnostics: Vec<WireDiagnostic>,
}

#[derive(Debug, Deserialize)]
struct WireDiagnostic {
    message: String,
    #[serde(default)]
    severity: Option<u64>,
    #[serde(default)]
    range: Option<Range>,
}

/// Parse `textDocument/publishDiagnostics` params into the document URI
/// and its diagnostic list. Missing severities default to `Warning`
/// (servers omit the field, the LSP default is implementation-defined).
pub fn diagnostics_from_params(params: Value) -> Option<(String, Vec<Diagnostic>)> {
    let parsed: PublishDiagnosticsParams = serde_json::from_value(params).ok()?;
    let diagnostics = parsed
        .diagnostics
        .into_iter()
        .map(|d| Diagnostic {
            message: d.message,
            severity: d
                .severity
                .and_then(Severity::from_lsp)
                .unwrap_or(Severity::Warning),
            range: d.range,
        })
        .collect();
    Some((parsed.uri, diagnostics))
}

// ============================================================================
// Result-shape decoders
// ============================================================================

fn location_from_object(value: &Value) -> Option<Location> {
    let uri = value.get("uri")?.as_str()?.to_string();
    let range: Range = serde_json::from_value(value.get("range")?.clone()).ok()?;
    Some(Location { uri, range })
}

fn location_from_link(value: &Value) -> Option<Location> {
    let uri = value.get("targetUri")?.as_str()?.to_string();
    let range_value = value
        .get("targetSelectionRange")
        .or_else(|| value.get("targetRange"))?;
    let range: Range = serde_json::from_value(range_value.clone()).ok()?;
    Some(Location { uri, range })
}

/// Normalize a definition/references result into a location list.
///
/// Shapes, in priority order: a bare Location, an array of Locations or
/// LocationLinks, a bare LocationLink. Anything else (including `null`)
/// is an empty result.
pub fn locations_from_value(value: &Value) -> Vec<Location> {
    if let Some(location) = location_from_object(value) {
        return vec![location];
    }
    if let Some(items) = value.as_array() {
        return items
            .iter()
            .filter_map(|item| location_from_object(item).or_else(|| location_from_link(item)))
            .collect();
    }
    if let Some(location) = location_from_link(value) {
        return vec![location];
    }
    Vec::new()
}

fn symbol_from_information(value: &Value) -> Option<SymbolInfo> {
    let name = value.get("name")?.as_str()?.to_string();
    let kind = value.get("kind")?.as_u64()? as u32;
    let location = value.get("location").and_then(location_from_object);
    Some(SymbolInfo {
        name,
        kind,
        location,
    })
}

fn flatten_document_symbol(
    value: &Value,
    document_uri: Option<&str>,
    out: &mut Vec<SymbolInfo>,
) {
    let Some(name) = value.get("name").and_then(Value::as_str) else {
        return;
    };
    let Some(kind) = value.get("kind").and_then(Value::as_u64) else {
        return;
    };

    let location = document_uri.and_then(|uri| {
        let range_value = value.get("selectionRange").or_else(|| value.get("range"))?;
        let range: Range = serde_json::from_value(range_value.clone()).ok()?;
        Some(Location {
            uri: uri.to_string(),
            range,
        })
    });

    out.push(SymbolInfo {
        name: name.to_string(),
        kind: kind as u32,
        location,
    });

    if let Some(children) = value.get("children").and_then(Value::as_array) {
        for child in children {
            flatten_document_symbol(child, document_uri, out);
        }
    }
}

/// Normalize a document-symbol or workspace-symbol result.
///
/// Shapes, in priority order: a flat SymbolInformation array (elements
/// carry their own location), a nested DocumentSymbol array (flattened
/// depth-first, locations synthesized from `document_uri` when given).
pub fn symbols_from_value(value: &Value, document_uri: Option<&str>) -> Vec<SymbolInfo> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    let flat: Vec<_> = items.iter().filter_map(symbol_from_information).collect();
    if !flat.is_empty() {
        return flat;
    }

    let mut nested = Vec::new();
    for item in items {
        flatten_document_symbol(item, document_uri, &mut nested);
    }
    nested
}

fn marked_text(value: &Value) -> Option<String> {
    if let Some(text) = value.as_str() {
        return Some(text.to_string());
    }
    value
        .get("value")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Normalize a hover result into plain text.
///
/// Shapes, in priority order: string contents, a MarkupContent or
/// MarkedString object, an array of either (joined with blank lines).
/// Empty text is `None` so the manager's first-non-empty rule works.
pub fn hover_text_from_value(value: &Value) -> Option<String> {
    let contents = value.get("contents")?;

    let text = if let Some(text) = marked_text(contents) {
        text
    } else if let Some(items) = contents.as_array() {
        items
            .iter()
            .filter_map(marked_text)
            .collect::<Vec<_>>()
            .join("\n\n")
    } else {
        return None;
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
