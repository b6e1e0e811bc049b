//! Client configuration.

use std::time::Duration;

/// Address a locally running server listens on by default.
pub const DEFAULT_ADDRESS: &str = "tcp://127.0.0.1:9470";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on a single wire message.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = strata_proto::framing::MAX_MESSAGE_SIZE;

/// How a [`Client`](crate::Client) reaches and identifies itself to a server.
///
/// Every request carries the `session_id`; search cursors live server-side
/// under that id, so two configs with distinct session ids cannot see each
/// other's cursors.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address, `tcp://host:port` or `ipc://path`.
    pub address: String,
    /// Timeout applied to both the send and the receive half of a request.
    pub timeout: Duration,
    /// Largest message this client will send or accept.
    pub max_message_size: usize,
    /// Session identifier, freshly generated unless overridden.
    pub session_id: String,
}

impl ClientConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timeout: DEFAULT_TIMEOUT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            session_id: generate_session_id(),
        }
    }

    /// Configuration pointing at [`DEFAULT_ADDRESS`].
    pub fn localhost() -> Self {
        Self::new(DEFAULT_ADDRESS)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Reuse an existing session id instead of a generated one.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::localhost()
    }
}

fn generate_session_id() -> String {
    format!("session-{}", uuid::Uuid::new_v4().simple())
}
