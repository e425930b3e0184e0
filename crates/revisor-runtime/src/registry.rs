//! Backend registry: display name to backend constructor.
//!
//! ## Usage
//!
//! ```ignore
//! let registry = BackendRegistry::with_defaults();
//!
//! match registry.lookup("GPT-3.5") {
//!     Some(kind) => kind.construct(request, &config).await?,
//!     None => eprintln!("Invalid model selected"),
//! }
//! ```

use std::collections::BTreeMap;

use crate::backends::BackendKind;

/// Display name of the hosted backend.
pub const HOSTED_DISPLAY_NAME: &str = "GPT-3.5";

/// Display name of the self-hosted backend.
pub const SELF_HOSTED_DISPLAY_NAME: &str = "LLAMA2";

/// Mapping of display names to backend constructors.
///
/// A [`BackendKind`] is the constructor: [`BackendKind::construct`] builds
/// and runs the backend. Lookups never construct anything.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, BackendKind>,
}

impl BackendRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in backends.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(HOSTED_DISPLAY_NAME, BackendKind::Hosted);
        registry.register(SELF_HOSTED_DISPLAY_NAME, BackendKind::SelfHosted);
        registry
    }

    /// Register a backend under a display name.
    ///
    /// If the name already exists, it will be replaced.
    pub fn register(&mut self, name: impl Into<String>, kind: BackendKind) {
        self.backends.insert(name.into(), kind);
    }

    /// Resolve a display name. Unknown names yield `None`.
    pub fn lookup(&self, name: &str) -> Option<BackendKind> {
        self.backends.get(name).copied()
    }

    /// List registered names, sorted.
    pub fn available_names(&self) -> Vec<&str> {
        self.backends.keys().map(|s| s.as_str()).collect()
    }

    /// Check if a name is registered.
    pub fn has_backend(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    /// Registered entries, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, BackendKind)> {
        self.backends.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.available_names())
            .finish()
    }
}
