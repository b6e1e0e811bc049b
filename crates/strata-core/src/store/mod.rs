//! The managed table store.
//!
//! A thin key-value row store over sled implementing exactly the contract
//! the persistence layer assumes: rows addressed by `(table, uid)`,
//! equality and any-of searches, and atomic multi-row transactions.

mod row;
mod table;
mod transaction;

pub use row::{ColumnValue, StoredRow};
pub use table::{Table, TableStore};
pub use transaction::{TableOp, Transaction};
