//! Low-level request/reply connection.

use async_nng::AsyncContext;
use nng::options::Options;
use nng::{Message, Protocol, Socket};

use strata_proto::framing;
use strata_proto::{Request, Response};

use crate::config::ClientConfig;
use crate::error::Error;

/// Lifecycle of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Closed,
}

/// One REQ socket dialed at a server.
///
/// Each request runs on its own nng context, so a connection behind a lock
/// still pairs every reply with its own request.
pub struct Connection {
    socket: Socket,
    state: ConnectionState,
    config: ClientConfig,
}

impl Connection {
    /// Dial the configured address.
    pub async fn establish(config: ClientConfig) -> Result<Self, Error> {
        let socket = Socket::new(Protocol::Req0)
            .map_err(|e| Error::Connection(format!("REQ socket creation failed: {}", e)))?;

        socket
            .set_opt::<nng::options::RecvMaxSize>(config.max_message_size)
            .map_err(|e| Error::Connection(format!("setting receive limit failed: {}", e)))?;
        socket
            .set_opt::<nng::options::SendTimeout>(Some(config.timeout))
            .map_err(|e| Error::Connection(format!("setting send timeout failed: {}", e)))?;
        socket
            .set_opt::<nng::options::RecvTimeout>(Some(config.timeout))
            .map_err(|e| Error::Connection(format!("setting receive timeout failed: {}", e)))?;

        socket
            .dial(&config.address)
            .map_err(|e| Error::Connection(format!("dialing {} failed: {}", config.address, e)))?;

        Ok(Self {
            socket,
            state: ConnectionState::Connected,
            config,
        })
    }

    /// Send one request and wait for the matching reply.
    pub async fn send_request(&self, request: &Request) -> Result<Response, Error> {
        if self.state != ConnectionState::Connected {
            return Err(Error::Connection(format!(
                "connection is {:?}",
                self.state
            )));
        }

        let framed = self.frame_request(request)?;

        let mut ctx = AsyncContext::try_from(&self.socket)
            .map_err(|e| Error::Connection(format!("async context creation failed: {}", e)))?;

        ctx.send(Message::from(framed.as_slice()), Some(self.config.timeout))
            .await
            .map_err(|(_, e)| match e {
                nng::Error::TimedOut => Error::Timeout,
                other => Error::Connection(format!("send failed: {}", other)),
            })?;

        let reply = ctx
            .receive(Some(self.config.timeout))
            .await
            .map_err(|e| match e {
                nng::Error::TimedOut => Error::Timeout,
                other => Error::Connection(format!("receive failed: {}", other)),
            })?;

        let response = decode_response(reply.as_slice())?;
        if response.id != request.id {
            return Err(Error::Protocol(strata_proto::Error::InvalidMessage(
                format!(
                    "reply id {} does not match request id {}",
                    response.id, request.id
                ),
            )));
        }

        Ok(response)
    }

    fn frame_request(&self, request: &Request) -> Result<Vec<u8>, Error> {
        let payload = rkyv::to_bytes::<rkyv::rancor::Error>(request).map_err(|e| {
            Error::Protocol(strata_proto::Error::Serialization(format!(
                "unserializable request: {}",
                e
            )))
        })?;

        if payload.len() > self.config.max_message_size {
            return Err(Error::Protocol(strata_proto::Error::InvalidMessage(
                format!(
                    "request of {} bytes over the {} byte limit",
                    payload.len(),
                    self.config.max_message_size
                ),
            )));
        }

        Ok(framing::encode_frame(&payload)?)
    }

    /// Mark the connection closed; the socket drops with it.
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }
}

fn decode_response(raw: &[u8]) -> Result<Response, Error> {
    let payload = framing::extract_payload(raw)?;

    // Realign; nng gives no alignment guarantee on the message body
    let mut aligned: rkyv::util::AlignedVec<16> = rkyv::util::AlignedVec::new();
    aligned.extend_from_slice(payload);

    rkyv::from_bytes::<Response, rkyv::rancor::Error>(&aligned).map_err(|e| {
        Error::Protocol(strata_proto::Error::InvalidMessage(format!(
            "undecodable reply: {}",
            e
        )))
    })
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.config.address)
            .field("state", &self.state)
            .field("session_id", &self.config.session_id)
            .finish()
    }
}
