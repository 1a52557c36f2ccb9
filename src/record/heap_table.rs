use std::sync::Arc;
use tracing::debug;

use super::error::{RecordError, RecordResult};
use super::heap_page::SlotLayout;
use super::record::{RecordId, Tuple};
use crate::buffer::{BufferPool, BufferResult, PageRef};
use crate::catalog::TableMutator;
use crate::file::{PageId, PageStore, TableId};
use crate::transaction::{Permission, TransactionId};

/// Unordered table of fixed-size tuples stored in slotted pages
pub struct HeapTable {
    table_id: TableId,
    layout: SlotLayout,
    store: Arc<dyn PageStore>,
}

impl HeapTable {
    pub fn new(store: Arc<dyn PageStore>, record_size: usize) -> RecordResult<Self> {
        let layout = SlotLayout::new(record_size, store.page_size())?;
        Ok(Self {
            table_id: store.table_id(),
            layout,
            store,
        })
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    pub fn store(&self) -> &Arc<dyn PageStore> {
        &self.store
    }

    /// Read every tuple under shared locks
    pub fn scan(&self, pool: &BufferPool, txn: TransactionId) -> BufferResult<Vec<Tuple>> {
        let mut tuples = Vec::new();
        for page_no in 0..self.store.page_count()? {
            let page_id = PageId::new(self.table_id, page_no);
            let page = pool.get_page(txn, page_id, Permission::ReadOnly)?;
            let page = page.read();
            for slot_id in self.layout.used_slots(page.data()) {
                if let Some(bytes) = self.layout.read(page.data(), slot_id) {
                    let mut tuple = Tuple::new(bytes.to_vec());
                    tuple.set_record_id(Some(RecordId::new(page_id, slot_id)));
                    tuples.push(tuple);
                }
            }
        }
        Ok(tuples)
    }

    fn check_size(&self, tuple: &Tuple) -> RecordResult<()> {
        if tuple.len() != self.layout.record_size() {
            return Err(RecordError::SizeMismatch {
                expected: self.layout.record_size(),
                actual: tuple.len(),
            });
        }
        Ok(())
    }

    fn has_free_slot(&self, page: &PageRef) -> bool {
        self.layout.find_free_slot(page.read().data()).is_some()
    }

    /// Write the tuple into the first free slot, if any
    fn place(&self, page: &PageRef, tuple: &mut Tuple) -> Option<RecordId> {
        let mut page = page.write();
        let slot_id = self.layout.find_free_slot(page.data())?;
        self.layout.write(page.data_mut(), slot_id, tuple.data());
        let record_id = RecordId::new(page.id(), slot_id);
        tuple.set_record_id(Some(record_id));
        Some(record_id)
    }
}

impl TableMutator for HeapTable {
    fn insert_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &mut Tuple,
    ) -> BufferResult<Vec<PageRef>> {
        self.check_size(tuple)?;

        // Look for room under shared locks; only upgrade the page we write to
        for page_no in 0..self.store.page_count()? {
            let page_id = PageId::new(self.table_id, page_no);
            let held_before = pool.holds_lock(txn, page_id);
            let page = pool.get_page(txn, page_id, Permission::ReadOnly)?;

            if !self.has_free_slot(&page) {
                // Nothing was read that the transaction depends on
                if !held_before {
                    pool.release_page(txn, page_id);
                }
                continue;
            }

            let page = pool.get_page(txn, page_id, Permission::ReadWrite)?;
            if self.place(&page, tuple).is_some() {
                return Ok(vec![page]);
            }
        }

        let page_id = self.store.allocate_page()?;
        debug!(table = self.table_id, page = %page_id, "heap table grew");
        let page = pool.get_page(txn, page_id, Permission::ReadWrite)?;
        match self.place(&page, tuple) {
            Some(_) => Ok(vec![page]),
            // Another transaction filled the fresh page first; try again
            None => self.insert_tuple(pool, txn, tuple),
        }
    }

    fn delete_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &Tuple,
    ) -> BufferResult<Vec<PageRef>> {
        let record = tuple.record_id().ok_or(RecordError::MissingRecordId)?;
        if record.page_id.table_id() != self.table_id {
            return Err(RecordError::ForeignRecord {
                table: self.table_id,
                record,
            }
            .into());
        }

        let page = pool.get_page(txn, record.page_id, Permission::ReadWrite)?;
        if !self.layout.clear(page.write().data_mut(), record.slot_id) {
            return Err(RecordError::SlotEmpty(record).into());
        }
        Ok(vec![page])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferError;
    use crate::catalog::Catalog;
    use crate::config::PoolConfig;
    use crate::file::{MemoryPageStore, PagedFile};
    use crate::wal::{FileLog, MemoryLog};
    use std::time::Duration;

    const TABLE: TableId = 3;
    const RECORD_SIZE: usize = 8;
    const PAGE_SIZE: usize = 64;

    fn setup(capacity: usize) -> (BufferPool, Arc<MemoryPageStore>, Arc<HeapTable>) {
        let store = Arc::new(MemoryPageStore::with_page_size(TABLE, PAGE_SIZE));
        let heap = Arc::new(HeapTable::new(store.clone(), RECORD_SIZE).unwrap());
        let catalog = Arc::new(Catalog::new());
        catalog.add_table("heap", store.clone(), Some(heap.clone()));

        let config = PoolConfig::new(capacity)
            .with_lock_timeout(Duration::from_millis(50), Duration::ZERO)
            .with_seed(1);
        let pool = BufferPool::new(&config, catalog, Arc::new(MemoryLog::new())).unwrap();
        (pool, store, heap)
    }

    fn tuple(byte: u8) -> Tuple {
        Tuple::new(vec![byte; RECORD_SIZE])
    }

    #[test]
    fn test_insert_grows_table() {
        let (pool, store, heap) = setup(8);
        let slots = heap.layout().slot_count();
        let txn = TransactionId::new();

        for i in 0..slots + 1 {
            let mut t = tuple(i as u8 + 1);
            pool.insert_tuple(txn, TABLE, &mut t).unwrap();
            assert!(t.record_id().is_some());
        }
        assert_eq!(store.page_count().unwrap(), 2);

        let tuples = heap.scan(&pool, txn).unwrap();
        assert_eq!(tuples.len(), slots + 1);
        assert_eq!(
            tuples.last().unwrap().record_id().unwrap().page_id,
            PageId::new(TABLE, 1)
        );
    }

    #[test]
    fn test_insert_size_mismatch() {
        let (pool, _store, _heap) = setup(4);
        let mut t = Tuple::new(vec![1; RECORD_SIZE + 1]);
        let result = pool.insert_tuple(TransactionId::new(), TABLE, &mut t);
        assert!(matches!(
            result,
            Err(BufferError::Record(RecordError::SizeMismatch { .. }))
        ));
    }

    #[test]
    fn test_committed_insert_is_durable() {
        let (pool, store, heap) = setup(4);
        let txn = TransactionId::new();
        let mut t = tuple(7);
        pool.insert_tuple(txn, TABLE, &mut t).unwrap();
        pool.commit(txn).unwrap();

        let page_no = t.record_id().unwrap().page_id.page_number();
        let stored = store.stored(page_no).unwrap();
        assert_eq!(heap.layout().read(&stored, 0), Some(&[7u8; RECORD_SIZE][..]));
    }

    #[test]
    fn test_aborted_insert_disappears() {
        let (pool, _store, heap) = setup(4);

        let setup_txn = TransactionId::new();
        pool.insert_tuple(setup_txn, TABLE, &mut tuple(1)).unwrap();
        pool.commit(setup_txn).unwrap();

        let txn = TransactionId::new();
        pool.insert_tuple(txn, TABLE, &mut tuple(2)).unwrap();
        pool.abort(txn).unwrap();

        let reader = TransactionId::new();
        let tuples = heap.scan(&pool, reader).unwrap();
        assert_eq!(tuples.len(), 1);
        assert_eq!(tuples[0].data(), &[1u8; RECORD_SIZE]);
    }

    #[test]
    fn test_delete_tuple() {
        let (pool, _store, heap) = setup(4);
        let txn = TransactionId::new();
        let mut a = tuple(1);
        let mut b = tuple(2);
        pool.insert_tuple(txn, TABLE, &mut a).unwrap();
        pool.insert_tuple(txn, TABLE, &mut b).unwrap();

        pool.delete_tuple(txn, &a).unwrap();
        let remaining = heap.scan(&pool, txn).unwrap();
        assert_eq!(remaining, vec![b.clone()]);

        let again = pool.delete_tuple(txn, &a);
        assert!(matches!(
            again,
            Err(BufferError::Record(RecordError::SlotEmpty(_)))
        ));
        assert!(matches!(
            pool.delete_tuple(txn, &tuple(3)),
            Err(BufferError::Record(RecordError::MissingRecordId))
        ));
    }

    #[test]
    fn test_full_pages_are_released_during_insert() {
        let (pool, _store, heap) = setup(8);
        let slots = heap.layout().slot_count();

        let filler = TransactionId::new();
        for i in 0..slots {
            pool.insert_tuple(filler, TABLE, &mut tuple(i as u8)).unwrap();
        }
        pool.commit(filler).unwrap();

        let txn = TransactionId::new();
        pool.insert_tuple(txn, TABLE, &mut tuple(0xEE)).unwrap();
        // The full first page was only inspected, so its lock is gone
        assert!(!pool.holds_lock(txn, PageId::new(TABLE, 0)));
        assert!(pool.holds_lock(txn, PageId::new(TABLE, 1)));
    }

    #[test]
    fn test_reopen_file_after_commit() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("heap.dat");
        let log_path = temp_dir.path().join("wal.log");

        {
            let store = Arc::new(PagedFile::create(&path, TABLE).unwrap().with_page_size(PAGE_SIZE));
            let heap = Arc::new(HeapTable::new(store.clone(), RECORD_SIZE).unwrap());
            let catalog = Arc::new(Catalog::new());
            catalog.add_table("heap", store, Some(heap));
            let log = Arc::new(FileLog::open(&log_path).unwrap());
            let pool = BufferPool::new(&PoolConfig::new(4), catalog, log).unwrap();

            let txn = TransactionId::new();
            for byte in 1..=3 {
                pool.insert_tuple(txn, TABLE, &mut tuple(byte)).unwrap();
            }
            pool.commit(txn).unwrap();
        }

        let store = Arc::new(PagedFile::open(&path, TABLE).unwrap().with_page_size(PAGE_SIZE));
        let heap = Arc::new(HeapTable::new(store.clone(), RECORD_SIZE).unwrap());
        let catalog = Arc::new(Catalog::new());
        catalog.add_table("heap", store, Some(heap.clone()));
        let pool =
            BufferPool::new(&PoolConfig::new(4), catalog, Arc::new(MemoryLog::new())).unwrap();

        let tuples = heap.scan(&pool, TransactionId::new()).unwrap();
        assert_eq!(tuples.len(), 3);
        assert_eq!(FileLog::read_records(&log_path).unwrap().len(), 1);
    }
}
