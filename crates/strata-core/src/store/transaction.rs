//! Transaction support for atomic multi-row operations.

use super::row::{ColumnValue, StoredRow};
use super::table::TableStore;
use crate::error::Error;
use sled::transaction::ConflictableTransactionError;

/// A pending operation in a transaction.
#[derive(Debug, Clone)]
pub enum TableOp {
    /// Insert a new row.
    Insert {
        /// Table name.
        table: String,
        /// The complete row.
        row: StoredRow,
    },
    /// Merge columns into an existing row, leaving other columns untouched.
    UpdateColumns {
        /// Table name.
        table: String,
        /// Row identifier.
        uid: String,
        /// Columns to write.
        columns: Vec<(String, ColumnValue)>,
    },
    /// Append a uid to a link-set column if not already present.
    AppendLink {
        /// Table holding the target row.
        table: String,
        /// Target row identifier.
        uid: String,
        /// Link-set column name.
        column: String,
        /// The uid to append.
        link_uid: String,
    },
    /// Delete a row.
    Delete {
        /// Table name.
        table: String,
        /// Row identifier.
        uid: String,
    },
}

/// A transaction over the table store.
///
/// Operations are collected and committed atomically inside one sled tree
/// transaction. All operations succeed or none do.
pub struct Transaction<'a> {
    store: &'a TableStore,
    ops: Vec<TableOp>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(store: &'a TableStore) -> Self {
        Self {
            store,
            ops: Vec::new(),
        }
    }

    /// Queue an insert.
    pub fn insert(&mut self, table: impl Into<String>, row: StoredRow) -> &mut Self {
        self.ops.push(TableOp::Insert {
            table: table.into(),
            row,
        });
        self
    }

    /// Queue a column merge into an existing row.
    pub fn update_columns(
        &mut self,
        table: impl Into<String>,
        uid: impl Into<String>,
        columns: Vec<(String, ColumnValue)>,
    ) -> &mut Self {
        self.ops.push(TableOp::UpdateColumns {
            table: table.into(),
            uid: uid.into(),
            columns,
        });
        self
    }

    /// Queue a link-set append. A uid already present is left alone.
    pub fn append_link(
        &mut self,
        table: impl Into<String>,
        uid: impl Into<String>,
        column: impl Into<String>,
        link_uid: impl Into<String>,
    ) -> &mut Self {
        self.ops.push(TableOp::AppendLink {
            table: table.into(),
            uid: uid.into(),
            column: column.into(),
            link_uid: link_uid.into(),
        });
        self
    }

    /// Queue a delete.
    pub fn delete(&mut self, table: impl Into<String>, uid: impl Into<String>) -> &mut Self {
        self.ops.push(TableOp::Delete {
            table: table.into(),
            uid: uid.into(),
        });
        self
    }

    /// Get the number of pending operations.
    pub fn operation_count(&self) -> usize {
        self.ops.len()
    }

    /// Commit the transaction atomically.
    pub fn commit(self) -> Result<(), Error> {
        if self.ops.is_empty() {
            return Ok(());
        }

        let tree = self.store.rows_tree();
        let result: Result<(), sled::transaction::TransactionError<Error>> =
            tree.transaction(|tx| {
                for op in &self.ops {
                    match op {
                        TableOp::Insert { table, row } => {
                            let key = TableStore::row_key(table, &row.uid);
                            let bytes = row
                                .to_bytes()
                                .map_err(ConflictableTransactionError::Abort)?;
                            tx.insert(key, bytes)?;
                        }
                        TableOp::UpdateColumns {
                            table,
                            uid,
                            columns,
                        } => {
                            let key = TableStore::row_key(table, uid);
                            let mut row = match tx.get(&key)? {
                                Some(bytes) => StoredRow::from_bytes(&bytes)
                                    .map_err(ConflictableTransactionError::Abort)?,
                                None => {
                                    return Err(ConflictableTransactionError::Abort(
                                        Error::Transaction(format!(
                                            "row '{}' missing from table '{}'",
                                            uid, table
                                        )),
                                    ));
                                }
                            };
                            for (name, value) in columns {
                                row.set_column(name.clone(), value.clone());
                            }
                            let bytes = row
                                .to_bytes()
                                .map_err(ConflictableTransactionError::Abort)?;
                            tx.insert(key, bytes)?;
                        }
                        TableOp::AppendLink {
                            table,
                            uid,
                            column,
                            link_uid,
                        } => {
                            let key = TableStore::row_key(table, uid);
                            let mut row = match tx.get(&key)? {
                                Some(bytes) => StoredRow::from_bytes(&bytes)
                                    .map_err(ConflictableTransactionError::Abort)?,
                                None => {
                                    return Err(ConflictableTransactionError::Abort(
                                        Error::Transaction(format!(
                                            "row '{}' missing from table '{}'",
                                            uid, table
                                        )),
                                    ));
                                }
                            };
                            let mut links = match row.column(column) {
                                Some(ColumnValue::LinkSet(uids)) => uids.clone(),
                                _ => Vec::new(),
                            };
                            if !links.contains(link_uid) {
                                links.push(link_uid.clone());
                            }
                            row.set_column(column.clone(), ColumnValue::LinkSet(links));
                            let bytes = row
                                .to_bytes()
                                .map_err(ConflictableTransactionError::Abort)?;
                            tx.insert(key, bytes)?;
                        }
                        TableOp::Delete { table, uid } => {
                            let key = TableStore::row_key(table, uid);
                            tx.remove(key)?;
                        }
                    }
                }
                Ok(())
            });

        match result {
            Ok(()) => Ok(()),
            Err(sled::transaction::TransactionError::Abort(e)) => Err(e),
            Err(sled::transaction::TransactionError::Storage(e)) => Err(Error::Storage(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_proto::Value;

    fn scalar(s: &str) -> ColumnValue {
        ColumnValue::Scalar(Value::String(s.into()))
    }

    #[test]
    fn test_commit_multiple_inserts() {
        let store = TableStore::temporary().unwrap();

        let mut tx = store.transaction();
        tx.insert("book", StoredRow::new("b1"));
        tx.insert("author", StoredRow::new("a1"));
        tx.commit().unwrap();

        assert!(store.table("book").get_by_uid("b1").unwrap().is_some());
        assert!(store.table("author").get_by_uid("a1").unwrap().is_some());
    }

    #[test]
    fn test_update_columns_merges() {
        let store = TableStore::temporary().unwrap();

        let mut row = StoredRow::new("b1");
        row.set_column("title", scalar("Dune"));
        row.set_column("readers", ColumnValue::LinkSet(vec!["r1".into()]));
        let mut tx = store.transaction();
        tx.insert("book", row);
        tx.commit().unwrap();

        let mut tx = store.transaction();
        tx.update_columns("book", "b1", vec![("title".into(), scalar("Messiah"))]);
        tx.commit().unwrap();

        let row = store.table("book").get_by_uid("b1").unwrap().unwrap();
        assert_eq!(row.column("title"), Some(&scalar("Messiah")));
        // Untouched columns survive the merge
        assert_eq!(
            row.column("readers"),
            Some(&ColumnValue::LinkSet(vec!["r1".into()]))
        );
    }

    #[test]
    fn test_update_missing_row_aborts() {
        let store = TableStore::temporary().unwrap();

        let mut tx = store.transaction();
        tx.insert("book", StoredRow::new("b1"));
        tx.update_columns("book", "ghost", vec![("title".into(), scalar("X"))]);
        assert!(tx.commit().is_err());

        // The insert in the same transaction is rolled back
        assert!(store.table("book").get_by_uid("b1").unwrap().is_none());
    }

    #[test]
    fn test_append_link_is_additive_and_idempotent() {
        let store = TableStore::temporary().unwrap();

        let mut tx = store.transaction();
        tx.insert("author", StoredRow::new("a1"));
        tx.commit().unwrap();

        let mut tx = store.transaction();
        tx.append_link("author", "a1", "books", "b1");
        tx.commit().unwrap();

        let mut tx = store.transaction();
        tx.append_link("author", "a1", "books", "b2");
        tx.append_link("author", "a1", "books", "b1");
        tx.commit().unwrap();

        let row = store.table("author").get_by_uid("a1").unwrap().unwrap();
        assert_eq!(
            row.column("books"),
            Some(&ColumnValue::LinkSet(vec!["b1".into(), "b2".into()]))
        );
    }

    #[test]
    fn test_delete() {
        let store = TableStore::temporary().unwrap();

        let mut tx = store.transaction();
        tx.insert("book", StoredRow::new("b1"));
        tx.commit().unwrap();

        let mut tx = store.transaction();
        tx.delete("book", "b1");
        tx.commit().unwrap();

        assert!(store.table("book").get_by_uid("b1").unwrap().is_none());
    }

    #[test]
    fn test_empty_transaction() {
        let store = TableStore::temporary().unwrap();
        store.transaction().commit().unwrap();
    }
}
