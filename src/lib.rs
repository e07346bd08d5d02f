//! Language server orchestration over stdio JSON-RPC.
//!
//! This crate is a transport/orchestration layer for externally supplied
//! language analyzers: it spawns one process per (server, workspace
//! root), speaks JSON-RPC 2.0 framed with `Content-Length` headers over
//! the child's stdin/stdout, correlates concurrent requests by id,
//! discovers per-file workspace roots via marker files, and retains the
//! latest published diagnostics per document. It performs no language
//! analysis itself.
//!
//! The entry point is [`ClientManager`]: ask it for a client for a file
//! and issue document queries; diagnostics stream back asynchronously
//! through the [`EventBus`] into the manager's store.
//!
//! ```rust,no_run
//! use lsp_hub::ClientManager;
//! use std::path::Path;
//!
//! # async fn example() {
//! let manager = ClientManager::with_builtin_servers();
//! manager.touch_file(Path::new("src/main.rs"), true).await;
//! let definitions = manager.definition(Path::new("src/main.rs"), 10, 4).await;
//! # let _ = definitions;
//! # }
//! ```
//!
//! Every failure mode degrades to "no information available": a missing
//! toolchain, a crashed server, or a timed-out request yields `None` or
//! an empty result, never an error that unwinds the host.

pub mod client;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod framing;
pub mod logging;
pub mod manager;
pub mod protocol;
pub mod registry;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;
#[cfg(test)]
pub(crate) mod testing;

pub use client::ProtocolClient;
pub use config::RegistryConfig;
pub use diagnostics::DiagnosticsStore;
pub use error::LspError;
pub use events::{DIAGNOSTICS_TOPIC, DiagnosticsNotice, EventBus};
pub use logging::{LogConfig, init_logging};
pub use manager::{ClientKey, ClientManager, ClientState, ClientStatus};
pub use registry::{ServerDescriptor, ServerRegistry};
pub use types::{Diagnostic, Location, Position, Range, Severity, SymbolInfo};
