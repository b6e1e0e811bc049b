//! Stored row representation.

use crate::error::Error;
use rkyv::{Archive, Deserialize, Serialize};
use strata_proto::Value;

/// A value stored in one table column.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum ColumnValue {
    /// A scalar attribute value.
    Scalar(Value),
    /// A link to one row in another table, by uid.
    Link(Option<String>),
    /// Links to many rows in another table, by uid, in insertion order.
    LinkSet(Vec<String>),
}

impl ColumnValue {
    /// Get the scalar value, if this column holds one.
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            ColumnValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// Get the link target uid, if this column holds a set link.
    pub fn as_link(&self) -> Option<&str> {
        match self {
            ColumnValue::Link(Some(uid)) => Some(uid),
            _ => None,
        }
    }

    /// Get the link-set members, if this column holds them.
    pub fn as_link_set(&self) -> Option<&[String]> {
        match self {
            ColumnValue::LinkSet(uids) => Some(uids),
            _ => None,
        }
    }
}

/// A stored table row.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct StoredRow {
    /// Row identifier, unique within its table.
    pub uid: String,
    /// Named columns in declaration order.
    pub columns: Vec<(String, ColumnValue)>,
}

impl StoredRow {
    /// Create a row with no columns.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            columns: Vec::new(),
        }
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnValue> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Set a column, replacing any existing value under the name.
    pub fn set_column(&mut self, name: impl Into<String>, value: ColumnValue) {
        let name = name.into();
        if let Some(entry) = self.columns.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            self.columns.push((name, value));
        }
    }

    /// Serialize the row to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a row from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        // Realign; sled stores small values inline with no alignment guarantee
        let mut aligned: rkyv::util::AlignedVec<16> = rkyv::util::AlignedVec::new();
        aligned.extend_from_slice(bytes);

        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}
