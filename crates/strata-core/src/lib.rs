//! Strata core - table store, security, and object persistence.
//!
//! This crate is the server half of the object layer. It owns the sled-backed
//! table store, the permission policy and capability issuer, per-session
//! cursor state, and the persistence engine that marshals model instances
//! to and from stored rows.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod error;
pub mod persist;
pub mod security;
pub mod session;
pub mod store;

pub use error::Error;
pub use persist::Persistence;
pub use security::{
    AccessOp, AllowAll, CapabilityIssuer, DenyAll, PermissionPolicy, PolicyFn, SecurityError,
};
pub use session::{SearchArgs, Session, SessionManager};
pub use store::{ColumnValue, StoredRow, Table, TableStore, Transaction};

/// Re-export protocol types.
pub use strata_proto as proto;

/// Re-export the model layer.
pub use strata_model as model;
