//! Server configuration and command-line arguments.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// TCP listen address used when none is given.
pub const DEFAULT_TCP_ADDRESS: &str = "tcp://0.0.0.0:9470";

/// Seconds before a request is logged as slow.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Cap on a single wire message.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = strata_proto::framing::MAX_MESSAGE_SIZE;

/// Idle session lifetime, 30 minutes.
///
/// Search cursors live inside sessions, so this also bounds how long a
/// client may keep paging one search without restarting it.
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 1800;

/// Capability signing secret for development setups only.
pub const DEFAULT_CAPABILITY_SECRET: &str = "strata-dev-secret";

fn default_transport_workers() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(4)
        .max(1)
}

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP listen address, `None` disables TCP.
    pub tcp_address: Option<String>,
    /// IPC listen address, e.g. `ipc:///tmp/strata.sock`.
    pub ipc_address: Option<String>,
    /// Table store directory.
    pub data_path: PathBuf,
    /// JSON model schema file; `None` starts with an empty registry.
    pub models_path: Option<PathBuf>,
    /// Slow-request threshold.
    pub request_timeout: Duration,
    /// Cap on a single wire message in bytes.
    pub max_message_size: usize,
    /// Worker threads driving the REP socket.
    pub transport_workers: usize,
    /// Secret the capability MAC key is derived from.
    pub capability_secret: String,
    /// Idle session lifetime.
    pub session_timeout: Duration,
}

impl ServerConfig {
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            tcp_address: Some(DEFAULT_TCP_ADDRESS.to_string()),
            ipc_address: None,
            data_path: data_path.into(),
            models_path: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            transport_workers: default_transport_workers(),
            capability_secret: DEFAULT_CAPABILITY_SECRET.to_string(),
            session_timeout: Duration::from_secs(DEFAULT_SESSION_TIMEOUT_SECS),
        }
    }

    pub fn with_tcp_address(mut self, address: impl Into<String>) -> Self {
        self.tcp_address = Some(address.into());
        self
    }

    pub fn without_tcp(mut self) -> Self {
        self.tcp_address = None;
        self
    }

    pub fn with_ipc_address(mut self, address: impl Into<String>) -> Self {
        self.ipc_address = Some(address.into());
        self
    }

    pub fn with_models_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.models_path = Some(path.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn with_transport_workers(mut self, workers: usize) -> Self {
        self.transport_workers = workers.max(1);
        self
    }

    pub fn with_capability_secret(mut self, secret: impl Into<String>) -> Self {
        self.capability_secret = secret.into();
        self
    }

    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// At least one listen address is configured.
    pub fn has_transport(&self) -> bool {
        self.tcp_address.is_some() || self.ipc_address.is_some()
    }

    /// The capability secret was left at the development default.
    pub fn has_default_secret(&self) -> bool {
        self.capability_secret == DEFAULT_CAPABILITY_SECRET
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("./data")
    }
}

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "strata-server")]
#[command(version, about = "Strata Object Server", long_about = None)]
pub struct Args {
    /// Table store directory.
    #[arg(short, long, default_value = "./data")]
    pub data_path: PathBuf,

    /// JSON model schema file.
    #[arg(short, long)]
    pub models: Option<PathBuf>,

    /// TCP listen address.
    #[arg(long, default_value = DEFAULT_TCP_ADDRESS)]
    pub tcp: String,

    /// IPC listen address.
    #[arg(long)]
    pub ipc: Option<String>,

    /// Slow-request threshold in seconds.
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Message size cap in megabytes.
    #[arg(long, default_value_t = 4)]
    pub max_message_mb: usize,

    /// Disable TCP; requires --ipc.
    #[arg(long)]
    pub no_tcp: bool,

    /// Capability signing secret.
    #[arg(long, default_value = DEFAULT_CAPABILITY_SECRET)]
    pub secret: String,

    /// Idle session lifetime in seconds.
    #[arg(long, default_value_t = DEFAULT_SESSION_TIMEOUT_SECS)]
    pub session_timeout: u64,

    /// Transport worker threads, 0 picks the core count.
    #[arg(long, default_value_t = 0)]
    pub workers: usize,
}

impl Args {
    pub fn into_config(self) -> ServerConfig {
        ServerConfig {
            tcp_address: (!self.no_tcp).then_some(self.tcp),
            ipc_address: self.ipc,
            data_path: self.data_path,
            models_path: self.models,
            request_timeout: Duration::from_secs(self.timeout),
            max_message_size: self.max_message_mb * 1024 * 1024,
            transport_workers: match self.workers {
                0 => default_transport_workers(),
                n => n,
            },
            capability_secret: self.secret,
            session_timeout: Duration::from_secs(self.session_timeout),
        }
    }
}
