//! NNG request/reply transport.
//!
//! The server answers on a single REP socket, shared by a small pool of
//! worker threads. Each worker drives its own nng context from a
//! current-thread tokio runtime and polls with a short receive timeout so
//! it can notice the stop flag.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use async_nng::AsyncContext;
use nng::options::Options;
use nng::{Message, Protocol, Socket};

use strata_proto::framing;
use strata_proto::{error_codes, Request, Response};

use crate::config::ServerConfig;
use crate::error::Error;
use crate::handler::RequestHandler;

/// Request counters, shared across worker threads.
#[derive(Debug)]
pub struct TransportMetrics {
    requests_total: AtomicU64,
    requests_success: AtomicU64,
    requests_failed: AtomicU64,
    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,
    started_at: Instant,
}

impl TransportMetrics {
    fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            requests_success: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    fn record(&self, ok: bool, bytes_in: usize, bytes_out: usize) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        let bucket = if ok {
            &self.requests_success
        } else {
            &self.requests_failed
        };
        bucket.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(bytes_in as u64, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes_out as u64, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn successful_requests(&self) -> u64 {
        self.requests_success.load(Ordering::Relaxed)
    }

    pub fn failed_requests(&self) -> u64 {
        self.requests_failed.load(Ordering::Relaxed)
    }

    pub fn total_bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub fn total_bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }
}

impl Default for TransportMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes framed requests, dispatches them, and frames the reply.
///
/// Cheap to clone per worker; the handler is shared.
#[derive(Clone)]
struct Pipeline {
    handler: Arc<RequestHandler>,
    max_message_size: usize,
}

impl Pipeline {
    fn new(handler: Arc<RequestHandler>, max_message_size: usize) -> Self {
        Self {
            handler,
            max_message_size,
        }
    }

    /// Turn one raw inbound message into framed reply bytes.
    ///
    /// The bool reports whether the request was served successfully; a
    /// malformed frame still produces an error reply for the REP socket.
    fn respond(&self, raw: &[u8]) -> (Vec<u8>, bool) {
        let (response, served) = match self.dispatch(raw) {
            Ok(response) => {
                let ok = response.status.is_ok();
                (response, ok)
            }
            Err(e) => {
                tracing::error!(error = %e, "rejecting malformed request");
                // No request id is recoverable from a frame we cannot decode
                (
                    Response::error(0, error_codes::INVALID_REQUEST, e.to_string()),
                    false,
                )
            }
        };

        match self.frame_response(&response) {
            Ok(bytes) => (bytes, served),
            Err(e) => {
                tracing::error!(error = %e, "response encoding failed");
                (self.last_resort_error(&e.to_string()), false)
            }
        }
    }

    fn dispatch(&self, raw: &[u8]) -> Result<Response, Error> {
        if raw.len() > self.max_message_size {
            return Err(Error::Protocol(strata_proto::Error::InvalidMessage(
                format!(
                    "inbound message of {} bytes over the {} byte limit",
                    raw.len(),
                    self.max_message_size
                ),
            )));
        }

        let payload = framing::extract_payload(raw)?;

        // rkyv needs the archive aligned; nng buffers give no guarantee
        let mut aligned: rkyv::util::AlignedVec<16> = rkyv::util::AlignedVec::new();
        aligned.extend_from_slice(payload);

        let request = rkyv::from_bytes::<Request, rkyv::rancor::Error>(&aligned).map_err(|e| {
            Error::Protocol(strata_proto::Error::InvalidMessage(format!(
                "undecodable request: {}",
                e
            )))
        })?;

        Ok(self.handler.handle(&request))
    }

    fn frame_response(&self, response: &Response) -> Result<Vec<u8>, Error> {
        let payload = rkyv::to_bytes::<rkyv::rancor::Error>(response).map_err(|e| {
            Error::Protocol(strata_proto::Error::Serialization(format!(
                "unserializable response: {}",
                e
            )))
        })?;
        framing::encode_frame(&payload).map_err(Error::Protocol)
    }

    fn last_resort_error(&self, message: &str) -> Vec<u8> {
        let fallback = Response::error(0, error_codes::INTERNAL, message);
        rkyv::to_bytes::<rkyv::rancor::Error>(&fallback)
            .ok()
            .and_then(|payload| framing::encode_frame(&payload).ok())
            .unwrap_or_default()
    }
}

/// The REP socket plus its worker pool configuration.
pub struct Transport {
    socket: Socket,
    pipeline: Pipeline,
    metrics: Arc<TransportMetrics>,
    request_timeout: Duration,
    worker_count: usize,
}

impl Transport {
    /// Open the REP socket and start listening on the configured addresses.
    pub fn new(config: &ServerConfig, handler: Arc<RequestHandler>) -> Result<Self, Error> {
        let socket = Socket::new(Protocol::Rep0)
            .map_err(|e| Error::Transport(format!("REP socket creation failed: {}", e)))?;

        socket
            .set_opt::<nng::options::RecvMaxSize>(config.max_message_size)
            .map_err(|e| Error::Transport(format!("setting receive limit failed: {}", e)))?;

        for addr in [config.tcp_address.as_deref(), config.ipc_address.as_deref()]
            .into_iter()
            .flatten()
        {
            socket
                .listen(addr)
                .map_err(|e| Error::Transport(format!("listen on {} failed: {}", addr, e)))?;
            tracing::info!(address = %addr, "listening");
        }

        Ok(Self {
            socket,
            pipeline: Pipeline::new(handler, config.max_message_size),
            metrics: Arc::new(TransportMetrics::new()),
            request_timeout: config.request_timeout,
            worker_count: config.transport_workers.max(1),
        })
    }

    pub fn metrics(&self) -> &TransportMetrics {
        &self.metrics
    }

    /// Serve forever.
    pub async fn run(&self) -> Result<(), Error> {
        let _handles = self.start_workers(Arc::new(AtomicBool::new(false)))?;
        tracing::info!(workers = self.worker_count, "transport accepting requests");
        std::future::pending::<()>().await;
        Ok(())
    }

    /// Serve until the shutdown channel fires, then drain the workers.
    pub async fn run_until_shutdown(
        &self,
        mut shutdown: tokio::sync::broadcast::Receiver<()>,
    ) -> Result<(), Error> {
        let stop = Arc::new(AtomicBool::new(false));
        let handles = self.start_workers(stop.clone())?;
        tracing::info!(workers = self.worker_count, "transport accepting requests");

        let _ = shutdown.recv().await;
        tracing::info!(
            total_requests = self.metrics.total_requests(),
            successful = self.metrics.successful_requests(),
            failed = self.metrics.failed_requests(),
            bytes_received = self.metrics.total_bytes_received(),
            bytes_sent = self.metrics.total_bytes_sent(),
            uptime_secs = self.metrics.uptime().as_secs(),
            "stopping transport"
        );

        stop.store(true, Ordering::SeqCst);
        let _ = tokio::task::spawn_blocking(move || {
            for handle in handles {
                let _ = handle.join();
            }
        })
        .await;

        Ok(())
    }

    fn start_workers(&self, stop: Arc<AtomicBool>) -> Result<Vec<thread::JoinHandle<()>>, Error> {
        (0..self.worker_count)
            .map(|worker_id| {
                let socket = self.socket.clone();
                let pipeline = self.pipeline.clone();
                let metrics = self.metrics.clone();
                let slow_after = self.request_timeout;
                let stop = stop.clone();

                thread::Builder::new()
                    .name(format!("strata-transport-{}", worker_id))
                    .spawn(move || {
                        let runtime = tokio::runtime::Builder::new_current_thread()
                            .enable_all()
                            .build()
                            .expect("failed to build transport worker runtime");
                        runtime.block_on(worker_loop(
                            worker_id, socket, pipeline, metrics, slow_after, stop,
                        ));
                    })
                    .map_err(|e| Error::Transport(format!("worker spawn failed: {}", e)))
            })
            .collect()
    }
}

async fn worker_loop(
    worker_id: usize,
    socket: Socket,
    pipeline: Pipeline,
    metrics: Arc<TransportMetrics>,
    slow_after: Duration,
    stop: Arc<AtomicBool>,
) {
    let mut ctx = match AsyncContext::try_from(&socket) {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::error!(error = %e, worker_id, "async context creation failed");
            return;
        }
    };

    while !stop.load(Ordering::SeqCst) {
        let inbound = match ctx.receive(Some(Duration::from_secs(1))).await {
            Ok(msg) => msg,
            Err(nng::Error::TimedOut) => continue,
            Err(e) => {
                tracing::error!(error = %e, worker_id, "receive error");
                continue;
            }
        };

        let bytes_in = inbound.len();
        let started = Instant::now();
        let (reply, served) = pipeline.respond(inbound.as_slice());
        let elapsed = started.elapsed();
        let bytes_out = reply.len();

        match ctx.send(Message::from(reply.as_slice()), None).await {
            Ok(()) => metrics.record(served, bytes_in, bytes_out),
            Err((_, e)) => {
                tracing::error!(error = %e, worker_id, "reply send failed");
                metrics.record(false, bytes_in, 0);
            }
        }

        if elapsed > slow_after {
            tracing::warn!(
                worker_id,
                duration_ms = elapsed.as_millis() as u64,
                limit_ms = slow_after.as_millis() as u64,
                "slow request"
            );
        }
    }

    tracing::info!(worker_id, "transport worker stopped");
}

/// Build the transport, refusing a configuration with no listen address.
pub fn create_transport(
    config: &ServerConfig,
    handler: Arc<RequestHandler>,
) -> Result<Transport, Error> {
    if !config.has_transport() {
        return Err(Error::Config(
            "no listen address configured (need TCP or IPC)".to_string(),
        ));
    }
    Transport::new(config, handler)
}
