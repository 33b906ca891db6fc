//! # Client Configuration
//!
//! Knobs shared by the resolver and the invocation driver. All of them have sensible defaults,
//! so `ClientConfig::default()` is what most callers want.
use std::time::Duration;

/// Package namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "reflect";

/// Bound applied while establishing a connection. Individual calls are not bounded.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// How the resolver deals with files that import other files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImportPolicy {
    /// Use only the first file returned by the server and link it against an empty pool.
    ///
    /// A method whose messages live in an imported file fails to resolve.
    #[default]
    FirstFileOnly,
    /// Follow the imports of the returned file, requesting every missing dependency by
    /// filename until the whole tree is available.
    Transitive,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Package of the services being called, e.g. `reflect` in `/reflect.TestService/Test`.
    pub namespace: String,
    pub import_policy: ImportPolicy,
    /// Delay between two consecutive sends of a bidirectional call. Zero disables pacing.
    pub bidi_interval: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            import_policy: ImportPolicy::default(),
            bidi_interval: Duration::ZERO,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_import_policy(mut self, import_policy: ImportPolicy) -> Self {
        self.import_policy = import_policy;
        self
    }

    pub fn with_bidi_interval(mut self, bidi_interval: Duration) -> Self {
        self.bidi_interval = bidi_interval;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}
