//! Static catalog of supported language servers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

/// Everything needed to spawn and talk to one language server.
///
/// Descriptors are immutable once registered; re-registering the same id
/// replaces the prior entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerDescriptor {
    /// Stable identifier, e.g. "rust-analyzer".
    pub id: String,
    /// Human-readable name for status output.
    #[serde(default)]
    pub display_name: String,
    /// File extensions (without the dot) this server handles.
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Files or directories whose presence marks a workspace root.
    #[serde(default)]
    pub root_markers: Vec<String>,
    /// Executable to spawn.
    pub command: String,
    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,
    /// How to install the server. Surfaced to users, never executed.
    #[serde(default)]
    pub install_hint: Option<String>,
    /// Per-server `initializationOptions` sent during the handshake.
    #[serde(default)]
    pub initialization_options: Option<Value>,
}

impl ServerDescriptor {
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            extensions: Vec::new(),
            root_markers: Vec::new(),
            command: command.into(),
            args: Vec::new(),
            install_hint: None,
            initialization_options: None,
        }
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_root_markers(mut self, markers: &[&str]) -> Self {
        self.root_markers = markers.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_args(mut self, args: &[&str]) -> Self {
        self.args = args.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_install_hint(mut self, hint: impl Into<String>) -> Self {
        self.install_hint = Some(hint.into());
        self
    }

    pub fn handles_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e == ext)
    }
}

/// Ordered descriptor catalog.
///
/// Extension collisions resolve by registration order: the first
/// registered descriptor claiming an extension wins `descriptor_for_extension`,
/// while `descriptors_for_extension` exposes all claimants in order.
#[derive(Debug, Default)]
pub struct ServerRegistry {
    descriptors: Vec<ServerDescriptor>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The builtin catalog of well-known servers.
    pub fn with_builtin_servers() -> Self {
        let mut registry = Self::new();
        for descriptor in builtin_servers() {
            registry.register(descriptor);
        }
        registry
    }

    /// Register a descriptor, replacing any prior entry with the same id.
    ///
    /// Replacement happens in place so registration order (and with it
    /// extension-collision resolution) stays deterministic.
    pub fn register(&mut self, descriptor: ServerDescriptor) {
        if let Some(existing) = self.descriptors.iter_mut().find(|d| d.id == descriptor.id) {
            info!(id = %descriptor.id, "replacing registered language server");
            *existing = descriptor;
        } else {
            debug!(id = %descriptor.id, command = %descriptor.command, "registered language server");
            self.descriptors.push(descriptor);
        }
    }

    pub fn get(&self, id: &str) -> Option<&ServerDescriptor> {
        self.descriptors.iter().find(|d| d.id == id)
    }

    /// First registered descriptor handling `ext`, if any.
    pub fn descriptor_for_extension(&self, ext: &str) -> Option<&ServerDescriptor> {
        self.descriptors.iter().find(|d| d.handles_extension(ext))
    }

    /// Every descriptor handling `ext`, in registration order.
    pub fn descriptors_for_extension(&self, ext: &str) -> Vec<&ServerDescriptor> {
        self.descriptors
            .iter()
            .filter(|d| d.handles_extension(ext))
            .collect()
    }

    pub fn descriptors(&self) -> &[ServerDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Whether the descriptor's command resolves on the system PATH.
    ///
    /// Unknown ids and unresolvable commands report `false`; probing
    /// never fails and never mutates registry state.
    pub fn probe(&self, id: &str) -> bool {
        let Some(descriptor) = self.get(id) else {
            debug!(id, "probe of unregistered server");
            return false;
        };
        match which::which(&descriptor.command) {
            Ok(path) => {
                debug!(id, command = %descriptor.command, resolved = %path.display(), "server available");
                true
            }
            Err(e) => {
                let mut message = format!("'{}' not found on PATH ({e})", descriptor.command);
                if let Some(hint) = &descriptor.install_hint {
                    message.push_str(&format!("; install with: {hint}"));
                }
                info!(id, "{message}");
                false
            }
        }
    }
}

fn builtin_servers() -> Vec<ServerDescriptor> {
    vec![
        ServerDescriptor::new("rust-analyzer", "rust-analyzer")
            .with_extensions(&["rs"])
            .with_root_markers(&["Cargo.toml", "Cargo.lock"])
            .with_install_hint("rustup component add rust-analyzer"),
        ServerDescriptor::new("gopls", "gopls")
            .with_extensions(&["go"])
            .with_root_markers(&["go.mod", "go.work"])
            .with_install_hint("go install golang.org/x/tools/gopls@latest"),
        ServerDescriptor::new("pyright", "pyright-langserver")
            .with_extensions(&["py", "pyi"])
            .with_args(&["--stdio"])
            .with_root_markers(&["pyproject.toml", "setup.py", "requirements.txt"])
            .with_install_hint("npm install -g pyright"),
        ServerDescriptor::new("typescript-language-server", "typescript-language-server")
            .with_extensions(&["ts", "tsx", "js", "jsx"])
            .with_args(&["--stdio"])
            .with_root_markers(&["tsconfig.json", "package.json"])
            .with_install_hint("npm install -g typescript-language-server typescript"),
        ServerDescriptor::new("clangd", "clangd")
            .with_extensions(&["c", "h", "cc", "cpp", "cxx", "hpp", "hh"])
            .with_args(&["--background-index"])
            .with_root_markers(&["compile_commands.json", ".clangd", "CMakeLists.txt"])
            .with_install_hint("apt install clangd (or brew install llvm)"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str, command: &str, exts: &[&str]) -> ServerDescriptor {
        ServerDescriptor::new(id, command).with_extensions(exts)
    }

    #[test]
    fn register_twice_keeps_one_active_entry() {
        let mut registry = ServerRegistry::new();
        registry.register(descriptor("rust", "rust-analyzer", &["rs"]));
        registry.register(descriptor("rust", "ra-nightly", &["rs"]));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("rust").unwrap().command, "ra-nightly");
    }

    #[test]
    fn replacement_preserves_registration_order() {
        let mut registry = ServerRegistry::new();
        registry.register(descriptor("a", "a-ls", &["x"]));
        registry.register(descriptor("b", "b-ls", &["x"]));
        // Re-registering "a" must not demote it behind "b".
        registry.register(descriptor("a", "a-ls-v2", &["x"]));

        assert_eq!(registry.descriptor_for_extension("x").unwrap().id, "a");
        assert_eq!(
            registry.descriptor_for_extension("x").unwrap().command,
            "a-ls-v2"
        );
    }

    #[test]
    fn extension_collision_first_registered_wins() {
        let mut registry = ServerRegistry::new();
        registry.register(descriptor("linter", "lint-ls", &["py"]));
        registry.register(descriptor("pyright", "pyright-langserver", &["py"]));

        assert_eq!(registry.descriptor_for_extension("py").unwrap().id, "linter");
        let all: Vec<_> = registry
            .descriptors_for_extension("py")
            .iter()
            .map(|d| d.id.clone())
            .collect();
        assert_eq!(all, ["linter", "pyright"]);
    }

    #[test]
    fn unknown_extension_resolves_to_none() {
        let registry = ServerRegistry::with_builtin_servers();
        assert!(registry.descriptor_for_extension("xyz").is_none());
        assert!(registry.descriptors_for_extension("xyz").is_empty());
    }

    #[test]
    fn builtin_catalog_routes_common_extensions() {
        let registry = ServerRegistry::with_builtin_servers();
        assert_eq!(
            registry.descriptor_for_extension("rs").unwrap().id,
            "rust-analyzer"
        );
        assert_eq!(registry.descriptor_for_extension("go").unwrap().id, "gopls");
        assert_eq!(
            registry.descriptor_for_extension("cpp").unwrap().id,
            "clangd"
        );
    }

    #[test]
    fn probe_unknown_id_is_false() {
        let registry = ServerRegistry::new();
        assert!(!registry.probe("nope"));
    }

    #[test]
    fn probe_missing_binary_reports_false_without_error() {
        let mut registry = ServerRegistry::new();
        registry.register(descriptor(
            "ghost",
            "lsp-hub-test-binary-that-does-not-exist",
            &["ghost"],
        ));
        assert!(!registry.probe("ghost"));
        // Probing must not mutate the catalog.
        assert_eq!(registry.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn probe_resolves_present_binary() {
        let mut registry = ServerRegistry::new();
        registry.register(descriptor("shell", "sh", &[]));
        assert!(registry.probe("shell"));
    }

    #[test]
    fn descriptor_deserializes_with_defaults() {
        let descriptor: ServerDescriptor = serde_json::from_value(serde_json::json!({
            "id": "zls",
            "command": "zls"
        }))
        .unwrap();
        assert_eq!(descriptor.id, "zls");
        assert!(descriptor.extensions.is_empty());
        assert!(descriptor.install_hint.is_none());
        assert!(descriptor.initialization_options.is_none());
    }
}
