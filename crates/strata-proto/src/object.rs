//! Serialized object graphs, capability tokens, and search handles.

use crate::value::Value;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// Operations a capability token can authorize.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Archive,
    Serialize,
    Deserialize,
    SerdeSerialize,
    SerdeDeserialize,
)]
pub enum CapabilityOp {
    /// Authorizes updating an existing object.
    Update,
    /// Authorizes deleting an existing object.
    Delete,
}

/// An unforgeable token scoped to one operation on one stored object.
///
/// The server issues tokens at read time by computing a keyed MAC over the
/// scope; mutation requests must carry a token whose MAC the server can
/// recompute. Clients treat the token as opaque.
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
pub struct CapabilityToken {
    /// The operation this token authorizes.
    pub operation: CapabilityOp,
    /// The model class the token is scoped to.
    pub class_name: String,
    /// The row identifier the token is scoped to.
    pub uid: String,
    /// Keyed MAC over the scope, 32 bytes.
    pub mac: [u8; 32],
}

/// A relationship value inside a serialized object graph.
///
/// Mutually recursive with [`ObjectData`]; the rkyv bounds are spelled out
/// because the derive cannot infer them across the cycle.
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
#[rkyv(
    serialize_bounds(
        __S: rkyv::ser::Writer + rkyv::ser::Allocator,
        __S::Error: rkyv::rancor::Source,
    ),
    deserialize_bounds(__D::Error: rkyv::rancor::Source),
    bytecheck(bounds(
        __C: rkyv::validation::ArchiveContext,
        __C::Error: rkyv::rancor::Source,
    ))
)]
pub enum RelationValue {
    /// A single-valued relationship, absent when unset or depth-limited.
    One(#[rkyv(omit_bounds)] Option<Box<ObjectData>>),
    /// A many-valued relationship, empty when unset or depth-limited.
    Many(#[rkyv(omit_bounds)] Vec<ObjectData>),
}

/// A model instance in wire form.
///
/// Relationships nest recursively up to the depth the server resolved them.
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
#[rkyv(
    serialize_bounds(
        __S: rkyv::ser::Writer + rkyv::ser::Allocator,
        __S::Error: rkyv::rancor::Source,
    ),
    deserialize_bounds(__D::Error: rkyv::rancor::Source),
    bytecheck(bounds(
        __C: rkyv::validation::ArchiveContext,
        __C::Error: rkyv::rancor::Source,
    ))
)]
pub struct ObjectData {
    /// The registered model class name.
    pub class_name: String,
    /// Row identifier, `None` for objects not yet saved.
    pub uid: Option<String>,
    /// Attribute values by declared name.
    pub attributes: Vec<(String, Value)>,
    /// Relationship values by declared name.
    #[rkyv(omit_bounds)]
    pub relationships: Vec<(String, RelationValue)>,
    /// Token authorizing updates, present when the policy granted it.
    pub update_capability: Option<CapabilityToken>,
    /// Token authorizing deletion, present when the policy granted it.
    pub delete_capability: Option<CapabilityToken>,
}

impl ObjectData {
    /// Create an unsaved object with no relationships or capabilities.
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            uid: None,
            attributes: Vec::new(),
            relationships: Vec::new(),
            update_capability: None,
            delete_capability: None,
        }
    }

    /// Add an attribute value.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Add a relationship value.
    pub fn with_relationship(mut self, name: impl Into<String>, value: RelationValue) -> Self {
        self.relationships.push((name.into(), value));
        self
    }

    /// Look up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Look up a relationship by name.
    pub fn relationship(&self, name: &str) -> Option<&RelationValue> {
        self.relationships
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// A filter condition on a single column.
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
pub enum Condition {
    /// Column equals the value.
    Eq(Value),
    /// Column equals any of the values.
    AnyOf(Vec<Value>),
}

/// An equality-style search filter.
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
pub struct Filter {
    /// Column name to match against.
    pub column: String,
    /// The match condition.
    pub condition: Condition,
}

impl Filter {
    /// Match rows where `column` equals `value`.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            condition: Condition::Eq(value.into()),
        }
    }

    /// Match rows where `column` equals any of `values`.
    pub fn any_of(column: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            column: column.into(),
            condition: Condition::AnyOf(values),
        }
    }
}

/// A server-side search cursor reference.
///
/// The handle carries no rows. The server stores the search arguments under
/// `cursor_id` in per-session state and recomputes each page on demand;
/// `total_length` is fixed at creation time.
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
pub struct SearchHandle {
    /// The model class searched.
    pub class_name: String,
    /// Opaque cursor identifier into the session's cursor table.
    pub cursor_id: String,
    /// Rows per page.
    pub page_length: u64,
    /// Relationship resolution depth limit, `None` for unbounded.
    pub max_depth: Option<u32>,
    /// Total matching rows at search time.
    pub total_length: u64,
}
