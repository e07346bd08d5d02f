//! Core data model shared across the subsystem.
//!
//! These are crate-local views of the wire types: document queries
//! normalize whatever shape a server returns into [`Location`] and
//! [`SymbolInfo`] lists, and `textDocument/publishDiagnostics` payloads
//! are parsed into [`Diagnostic`]s before they reach the store.

use serde::{Deserialize, Serialize};

/// Zero-based position within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Half-open range between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

/// A document URI plus the range a result points at.
///
/// Used for definition and reference results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub uri: String,
    pub range: Range,
}

/// A symbol as reported by document-symbol or workspace-symbol queries.
///
/// `kind` carries the raw LSP symbol-kind code; `location` is absent when
/// the server reported a nested symbol without its own URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: String,
    pub kind: u32,
    pub location: Option<Location>,
}

/// Diagnostic severity, mirroring the four LSP levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl Severity {
    /// Convert from the LSP numeric encoding (1=Error .. 4=Hint).
    ///
    /// Returns `None` outside the defined range; the parse site decides
    /// the fallback.
    pub fn from_lsp(value: u64) -> Option<Self> {
        match value {
            1 => Some(Self::Error),
            2 => Some(Self::Warning),
            3 => Some(Self::Info),
            4 => Some(Self::Hint),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Hint => "hint",
        }
    }

    pub fn is_error(self) -> bool {
        self == Self::Error
    }
}

/// A single analyzer finding tied to a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub message: String,
    pub severity: Severity,
    pub range: Option<Range>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, severity: Severity, range: Option<Range>) -> Self {
        Self {
            message: message.into(),
            severity,
            range,
        }
    }
}

/// Map a file extension to the LSP `languageId` sent in `didOpen`.
///
/// Unknown extensions fall back to the extension itself, which most
/// servers tolerate.
pub fn language_id_for_extension(ext: &str) -> String {
    match ext {
        "rs" => "rust",
        "go" => "go",
        "py" | "pyi" => "python",
        "ts" | "mts" | "cts" => "typescript",
        "tsx" => "typescriptreact",
        "js" | "mjs" | "cjs" => "javascript",
        "jsx" => "javascriptreact",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" | "hh" | "hxx" => "cpp",
        "java" => "java",
        "rb" => "ruby",
        "json" => "json",
        other => return other.to_string(),
    }
    .to_string()
}
