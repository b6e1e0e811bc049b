//! Permission policies.
//!
//! The host application decides who may do what; the persistence layer
//! consults an injected policy object before every operation.

/// Operations a policy can rule on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessOp {
    /// Reading an object.
    Read,
    /// Creating a new object.
    Create,
    /// Updating an existing object.
    Update,
    /// Deleting an existing object.
    Delete,
}

impl std::fmt::Display for AccessOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessOp::Read => write!(f, "read"),
            AccessOp::Create => write!(f, "create"),
            AccessOp::Update => write!(f, "update"),
            AccessOp::Delete => write!(f, "delete"),
        }
    }
}

/// Decides whether an operation on a model class is permitted.
///
/// `uid` is `None` for create checks, where no row exists yet.
pub trait PermissionPolicy: Send + Sync {
    /// Rule on one operation.
    fn has_permission(&self, op: AccessOp, class_name: &str, uid: Option<&str>) -> bool;
}

/// Policy that permits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionPolicy for AllowAll {
    fn has_permission(&self, _op: AccessOp, _class_name: &str, _uid: Option<&str>) -> bool {
        true
    }
}

/// Policy that denies everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl PermissionPolicy for DenyAll {
    fn has_permission(&self, _op: AccessOp, _class_name: &str, _uid: Option<&str>) -> bool {
        false
    }
}

/// Closure-based policy adapter for hosts and tests.
pub struct PolicyFn<F>(pub F);

impl<F> PermissionPolicy for PolicyFn<F>
where
    F: Fn(AccessOp, &str, Option<&str>) -> bool + Send + Sync,
{
    fn has_permission(&self, op: AccessOp, class_name: &str, uid: Option<&str>) -> bool {
        (self.0)(op, class_name, uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_and_deny() {
        assert!(AllowAll.has_permission(AccessOp::Read, "Book", Some("b1")));
        assert!(AllowAll.has_permission(AccessOp::Create, "Book", None));
        assert!(!DenyAll.has_permission(AccessOp::Read, "Book", Some("b1")));
    }

    #[test]
    fn test_policy_fn() {
        let policy = PolicyFn(|op, class: &str, _uid: Option<&str>| {
            class == "Book" && op != AccessOp::Delete
        });

        assert!(policy.has_permission(AccessOp::Read, "Book", Some("b1")));
        assert!(policy.has_permission(AccessOp::Update, "Book", Some("b1")));
        assert!(!policy.has_permission(AccessOp::Delete, "Book", Some("b1")));
        assert!(!policy.has_permission(AccessOp::Read, "Author", Some("a1")));
    }
}
