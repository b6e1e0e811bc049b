//! The managed table store over sled.

use super::row::{ColumnValue, StoredRow};
use super::transaction::Transaction;
use crate::error::Error;
use sled::{Db, Tree};
use std::path::Path;
use strata_proto::{Condition, Filter};

/// Tree name for row data.
const ROWS_TREE: &str = "store:rows";

/// Key-value row storage with per-table prefix scans.
///
/// Rows live in a single sled tree keyed `table \0 uid`, so all rows of one
/// table form a contiguous key range. Iteration order within a table is the
/// store's stable key order.
pub struct TableStore {
    db: Db,
    rows: Tree,
}

impl TableStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let db = sled::open(path)?;
        let rows = db.open_tree(ROWS_TREE)?;
        Ok(Self { db, rows })
    }

    /// Open a temporary store, discarded on drop.
    pub fn temporary() -> Result<Self, Error> {
        let db = sled::Config::new().temporary(true).open()?;
        let rows = db.open_tree(ROWS_TREE)?;
        Ok(Self { db, rows })
    }

    /// The underlying sled tree. Used by transactions.
    pub(crate) fn rows_tree(&self) -> &Tree {
        &self.rows
    }

    /// Encode the storage key for a row.
    pub(crate) fn row_key(table: &str, uid: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(table.len() + 1 + uid.len());
        key.extend_from_slice(table.as_bytes());
        key.push(0);
        key.extend_from_slice(uid.as_bytes());
        key
    }

    /// Encode the key prefix covering one table.
    pub(crate) fn table_prefix(table: &str) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(table.len() + 1);
        prefix.extend_from_slice(table.as_bytes());
        prefix.push(0);
        prefix
    }

    /// Get a handle on one table.
    pub fn table<'a>(&'a self, name: &str) -> Table<'a> {
        Table {
            store: self,
            name: name.to_string(),
        }
    }

    /// Begin a transaction over this store.
    pub fn transaction(&self) -> Transaction<'_> {
        Transaction::new(self)
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }
}

/// A view over one table's rows.
pub struct Table<'a> {
    store: &'a TableStore,
    name: String,
}

impl<'a> Table<'a> {
    /// The table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fetch a row by uid.
    pub fn get_by_uid(&self, uid: &str) -> Result<Option<StoredRow>, Error> {
        let key = TableStore::row_key(&self.name, uid);
        match self.store.rows_tree().get(key)? {
            Some(bytes) => Ok(Some(StoredRow::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Fetch all rows matching the filters, in key order.
    pub fn search(&self, filters: &[Filter]) -> Result<Vec<StoredRow>, Error> {
        let prefix = TableStore::table_prefix(&self.name);
        let mut rows = Vec::new();
        for entry in self.store.rows_tree().scan_prefix(prefix) {
            let (_, bytes) = entry?;
            let row = StoredRow::from_bytes(&bytes)?;
            if row_matches(&row, filters) {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Fetch the first row matching the filters.
    pub fn get(&self, filters: &[Filter]) -> Result<Option<StoredRow>, Error> {
        let prefix = TableStore::table_prefix(&self.name);
        for entry in self.store.rows_tree().scan_prefix(prefix) {
            let (_, bytes) = entry?;
            let row = StoredRow::from_bytes(&bytes)?;
            if row_matches(&row, filters) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    /// Count rows matching the filters without materializing them.
    pub fn count(&self, filters: &[Filter]) -> Result<u64, Error> {
        let prefix = TableStore::table_prefix(&self.name);
        let mut count = 0u64;
        for entry in self.store.rows_tree().scan_prefix(prefix) {
            let (_, bytes) = entry?;
            let row = StoredRow::from_bytes(&bytes)?;
            if row_matches(&row, filters) {
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Check a row against equality filters.
///
/// The reserved column name `uid` matches against the row identifier.
pub(crate) fn row_matches(row: &StoredRow, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| {
        if filter.column == "uid" {
            return match &filter.condition {
                Condition::Eq(v) => v.as_str() == Some(row.uid.as_str()),
                Condition::AnyOf(values) => values
                    .iter()
                    .any(|v| v.as_str() == Some(row.uid.as_str())),
            };
        }
        match row.column(&filter.column) {
            Some(ColumnValue::Scalar(actual)) => match &filter.condition {
                Condition::Eq(v) => actual == v,
                Condition::AnyOf(values) => values.contains(actual),
            },
            Some(ColumnValue::Link(link)) => match &filter.condition {
                Condition::Eq(v) => v.as_str() == link.as_deref(),
                Condition::AnyOf(values) => {
                    values.iter().any(|v| v.as_str() == link.as_deref())
                }
            },
            _ => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_proto::Value;

    fn seed(store: &TableStore) {
        let mut tx = store.transaction();
        for (uid, title, pages) in [("b1", "Dune", 412), ("b2", "Messiah", 256), ("b3", "Dune", 188)]
        {
            let mut row = StoredRow::new(uid);
            row.set_column("title", ColumnValue::Scalar(Value::String(title.into())));
            row.set_column("pages", ColumnValue::Scalar(Value::Int64(pages)));
            tx.insert("book", row);
        }
        tx.commit().unwrap();
    }

    #[test]
    fn test_get_by_uid() {
        let store = TableStore::temporary().unwrap();
        seed(&store);

        let row = store.table("book").get_by_uid("b2").unwrap().unwrap();
        assert_eq!(
            row.column("title").and_then(ColumnValue::as_scalar),
            Some(&Value::String("Messiah".into()))
        );
        assert!(store.table("book").get_by_uid("nope").unwrap().is_none());
        assert!(store.table("author").get_by_uid("b2").unwrap().is_none());
    }

    #[test]
    fn test_search_and_count() {
        let store = TableStore::temporary().unwrap();
        seed(&store);

        let all = store.table("book").search(&[]).unwrap();
        assert_eq!(all.len(), 3);

        let dunes = store
            .table("book")
            .search(&[Filter::eq("title", "Dune")])
            .unwrap();
        assert_eq!(dunes.len(), 2);
        assert_eq!(
            store.table("book").count(&[Filter::eq("title", "Dune")]).unwrap(),
            2
        );

        let narrow = store
            .table("book")
            .search(&[Filter::eq("title", "Dune"), Filter::eq("pages", 188i64)])
            .unwrap();
        assert_eq!(narrow.len(), 1);
        assert_eq!(narrow[0].uid, "b3");
    }

    #[test]
    fn test_uid_filters() {
        let store = TableStore::temporary().unwrap();
        seed(&store);

        let row = store
            .table("book")
            .get(&[Filter::eq("uid", "b2")])
            .unwrap()
            .unwrap();
        assert_eq!(row.uid, "b2");

        let some = store
            .table("book")
            .search(&[Filter::any_of(
                "uid",
                vec!["b1".into(), "b3".into(), "ghost".into()],
            )])
            .unwrap();
        assert_eq!(some.len(), 2);
    }

    #[test]
    fn test_search_is_key_ordered() {
        let store = TableStore::temporary().unwrap();
        seed(&store);

        let uids: Vec<_> = store
            .table("book")
            .search(&[])
            .unwrap()
            .into_iter()
            .map(|r| r.uid)
            .collect();
        assert_eq!(uids, vec!["b1", "b2", "b3"]);
    }
}
