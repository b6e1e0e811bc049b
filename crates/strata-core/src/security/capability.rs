//! Capability token issuance and verification.
//!
//! Tokens are keyed blake3 MACs over an `(operation, class, uid)` scope.
//! Only the server holds the MAC key, so tokens round-trip through clients
//! unforged.

use super::error::{SecurityError, SecurityResult};
use strata_proto::{CapabilityOp, CapabilityToken};

/// Domain separation context for the MAC key derivation.
const KEY_CONTEXT: &str = "strata 2026-08-28 capability mac key";

/// Issues and verifies capability tokens.
pub struct CapabilityIssuer {
    key: [u8; 32],
}

impl CapabilityIssuer {
    /// Derive the MAC key from a server secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: blake3::derive_key(KEY_CONTEXT, secret),
        }
    }

    fn mac(&self, operation: CapabilityOp, class_name: &str, uid: &str) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(&[match operation {
            CapabilityOp::Update => 1u8,
            CapabilityOp::Delete => 2u8,
        }]);
        hasher.update(class_name.as_bytes());
        hasher.update(&[0]);
        hasher.update(uid.as_bytes());
        *hasher.finalize().as_bytes()
    }

    /// Issue a token scoped to one operation on one object.
    pub fn issue(&self, operation: CapabilityOp, class_name: &str, uid: &str) -> CapabilityToken {
        CapabilityToken {
            operation,
            class_name: class_name.to_string(),
            uid: uid.to_string(),
            mac: self.mac(operation, class_name, uid),
        }
    }

    /// Require a valid token for the given scope.
    ///
    /// Fails when the token is absent, scoped differently, or carries a MAC
    /// this issuer did not produce.
    pub fn require(
        &self,
        token: Option<&CapabilityToken>,
        operation: CapabilityOp,
        class_name: &str,
        uid: &str,
    ) -> SecurityResult<()> {
        let token = token.ok_or_else(|| {
            SecurityError::Authorization(format!(
                "missing {:?} capability for {}:{}",
                operation, class_name, uid
            ))
        })?;

        if token.operation != operation || token.class_name != class_name || token.uid != uid {
            return Err(SecurityError::Authorization(format!(
                "capability not scoped to {:?} on {}:{}",
                operation, class_name, uid
            )));
        }

        let expected = self.mac(operation, class_name, uid);
        // Hash equality is constant time
        if blake3::Hash::from(expected) != blake3::Hash::from(token.mac) {
            return Err(SecurityError::Authorization(format!(
                "invalid capability for {:?} on {}:{}",
                operation, class_name, uid
            )));
        }

        Ok(())
    }
}
