//! Permission policies and capability tokens.

mod capability;
mod error;
mod policy;

pub use capability::CapabilityIssuer;
pub use error::{SecurityError, SecurityResult};
pub use policy::{AccessOp, AllowAll, DenyAll, PermissionPolicy, PolicyFn};
