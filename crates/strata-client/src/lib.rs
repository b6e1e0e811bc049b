//! Strata client - async client library for Strata servers.
//!
//! # Quick Start
//!
//! ```ignore
//! use strata_client::{Client, ClientConfig};
//! use strata_proto::{Filter, ObjectData};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::connect(ClientConfig::localhost()).await?;
//!
//!     // Ping to check connectivity
//!     client.ping().await?;
//!
//!     // Save an object
//!     let book = ObjectData::new("Book").with_attribute("title", "Dune");
//!     let saved = client.save(book).await?;
//!
//!     // Fetch it back with mutation capabilities attached
//!     let uid = saved.uid.clone().unwrap();
//!     let fetched = client.get("Book", uid, true, None).await?;
//!     assert!(fetched.is_some());
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod results;

pub use client::Client;
pub use config::ClientConfig;
pub use connection::{Connection, ConnectionState};
pub use error::Error;
pub use results::{FetchPage, SearchPager, SearchResults};

/// Re-export protocol types.
pub use strata_proto as proto;
