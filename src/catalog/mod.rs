use ahash::AHashMap;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::buffer::{BufferError, BufferPool, BufferResult, PageRef};
use crate::file::{PageStore, TableId};
use crate::record::Tuple;
use crate::transaction::TransactionId;

/// Table-layout logic that turns a tuple change into page changes.
///
/// A mutator obtains the pages it needs through `BufferPool::get_page`
/// (which takes the locks), edits them in place and returns every page it
/// touched. The pool then marks those pages dirty on behalf of `txn`.
/// Page guards must be dropped before returning.
pub trait TableMutator: Send + Sync {
    /// Store `tuple` somewhere in the table and set its record id
    fn insert_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &mut Tuple,
    ) -> BufferResult<Vec<PageRef>>;

    /// Remove the tuple identified by `tuple`'s record id
    fn delete_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &Tuple,
    ) -> BufferResult<Vec<PageRef>>;
}

struct TableEntry {
    name: String,
    store: Arc<dyn PageStore>,
    mutator: Option<Arc<dyn TableMutator>>,
}

/// Registry from table id to its page store and mutator
#[derive(Default)]
pub struct Catalog {
    tables: RwLock<AHashMap<TableId, TableEntry>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table; replaces any table with the same id
    pub fn add_table(
        &self,
        name: &str,
        store: Arc<dyn PageStore>,
        mutator: Option<Arc<dyn TableMutator>>,
    ) -> TableId {
        let table_id = store.table_id();
        self.tables.write().insert(
            table_id,
            TableEntry {
                name: name.to_string(),
                store,
                mutator,
            },
        );
        table_id
    }

    pub fn remove_table(&self, table_id: TableId) -> BufferResult<()> {
        self.tables
            .write()
            .remove(&table_id)
            .map(|_| ())
            .ok_or(BufferError::UnknownTable(table_id))
    }

    pub fn store(&self, table_id: TableId) -> BufferResult<Arc<dyn PageStore>> {
        self.tables
            .read()
            .get(&table_id)
            .map(|entry| Arc::clone(&entry.store))
            .ok_or(BufferError::UnknownTable(table_id))
    }

    pub fn mutator(&self, table_id: TableId) -> BufferResult<Arc<dyn TableMutator>> {
        let tables = self.tables.read();
        let entry = tables
            .get(&table_id)
            .ok_or(BufferError::UnknownTable(table_id))?;
        entry
            .mutator
            .clone()
            .ok_or(BufferError::NoMutator(table_id))
    }

    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.tables
            .read()
            .iter()
            .find(|(_, entry)| entry.name == name)
            .map(|(&id, _)| id)
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .read()
            .values()
            .map(|entry| entry.name.clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::MemoryPageStore;

    #[test]
    fn test_register_and_lookup() {
        let catalog = Catalog::new();
        let store = Arc::new(MemoryPageStore::with_page_size(4, 64));
        let id = catalog.add_table("orders", store, None);

        assert_eq!(id, 4);
        assert_eq!(catalog.table_id("orders"), Some(4));
        assert_eq!(catalog.table_id("missing"), None);
        assert_eq!(catalog.store(4).unwrap().page_size(), 64);
        assert_eq!(catalog.table_names(), vec!["orders".to_string()]);
    }

    #[test]
    fn test_missing_table_and_mutator() {
        let catalog = Catalog::new();
        assert!(matches!(catalog.store(9), Err(BufferError::UnknownTable(9))));

        catalog.add_table("t", Arc::new(MemoryPageStore::new(9)), None);
        assert!(matches!(catalog.mutator(9), Err(BufferError::NoMutator(9))));

        catalog.remove_table(9).unwrap();
        assert!(matches!(catalog.remove_table(9), Err(BufferError::UnknownTable(9))));
    }
}
