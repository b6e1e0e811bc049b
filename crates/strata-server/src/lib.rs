//! Strata server library.
//!
//! This crate provides the server half of the Strata object layer: model
//! schema loading, request handling over the persistence engine, and the
//! nng REP transport.

pub mod config;
pub mod error;
pub mod handler;
pub mod schema;
pub mod transport;

pub use config::{Args, ServerConfig};
pub use error::Error;
pub use handler::RequestHandler;
pub use transport::{create_transport, Transport};
