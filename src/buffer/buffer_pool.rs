use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::{BufferError, BufferResult};
use super::eviction::{Candidate, EvictionPolicy, policy_for};
use crate::catalog::Catalog;
use crate::config::PoolConfig;
use crate::file::{Page, PageId, TableId};
use crate::lock::LockManager;
use crate::record::{RecordError, Tuple};
use crate::transaction::{Permission, TransactionId};
use crate::wal::WriteAheadLog;

/// Shared handle to a resident page
pub type PageRef = Arc<RwLock<Page>>;

/// A resident page and its last-use stamp
struct Frame {
    page: PageRef,
    stamp: u64,
}

/// Page-id map plus the eviction state, guarded by one mutex
struct PageTable {
    frames: AHashMap<PageId, Frame>,
    /// Logical clock, bumped on every touch
    clock: u64,
    policy: Box<dyn EvictionPolicy>,
}

impl PageTable {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Stamp a resident page and return it
    fn touch(&mut self, page_id: PageId) -> Option<PageRef> {
        let stamp = self.tick();
        let frame = self.frames.get_mut(&page_id)?;
        frame.stamp = stamp;
        Some(Arc::clone(&frame.page))
    }

    /// Insert or replace a page with a fresh stamp
    fn insert(&mut self, page_id: PageId, page: PageRef) {
        let stamp = self.tick();
        self.frames.insert(page_id, Frame { page, stamp });
    }

    /// Eviction view of every frame. A page is pinned while it is dirty,
    /// write-guarded, or exclusively locked: an exclusive holder may have
    /// changed it in place without it being marked dirty yet.
    fn candidates(&self, locks: &LockManager) -> Vec<Candidate> {
        self.frames
            .iter()
            .map(|(&page_id, frame)| Candidate {
                page_id,
                stamp: frame.stamp,
                pinned: frame.page.try_read().is_none_or(|page| page.is_dirty())
                    || locks.exclusive_holder(page_id).is_some(),
            })
            .collect()
    }
}

/// Fixed-capacity page cache that enforces two-phase locking.
///
/// Every page access goes through `get_page`, which takes the matching
/// page lock before serving the page. Dirty pages are never evicted: they
/// are written back (log first) when their transaction commits and dropped
/// when it aborts.
pub struct BufferPool {
    capacity: usize,
    table: Mutex<PageTable>,
    locks: LockManager,
    catalog: Arc<Catalog>,
    log: Arc<dyn WriteAheadLog>,
}

impl BufferPool {
    /// Create a buffer pool from a configuration
    pub fn new(
        config: &PoolConfig,
        catalog: Arc<Catalog>,
        log: Arc<dyn WriteAheadLog>,
    ) -> BufferResult<Self> {
        let policy = policy_for(config.eviction, config.seed);
        Self::with_policy(config, catalog, log, policy)
    }

    /// Create a buffer pool with a custom replacement policy
    pub fn with_policy(
        config: &PoolConfig,
        catalog: Arc<Catalog>,
        log: Arc<dyn WriteAheadLog>,
        policy: Box<dyn EvictionPolicy>,
    ) -> BufferResult<Self> {
        config.validate()?;
        Ok(Self {
            capacity: config.capacity,
            table: Mutex::new(PageTable {
                frames: AHashMap::with_capacity(config.capacity),
                clock: 0,
                policy,
            }),
            locks: LockManager::new(config.lock_timeout, config.seed),
            catalog,
            log,
        })
    }

    /// Create a buffer pool with specified capacity and default settings
    pub fn with_capacity(
        capacity: usize,
        catalog: Arc<Catalog>,
        log: Arc<dyn WriteAheadLog>,
    ) -> BufferResult<Self> {
        Self::new(&PoolConfig::new(capacity), catalog, log)
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the number of pages currently in the buffer pool
    pub fn len(&self) -> usize {
        self.table.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if a page is in the buffer pool
    pub fn is_cached(&self, page_id: PageId) -> bool {
        self.table.lock().frames.contains_key(&page_id)
    }

    /// Resident page ids, ordered
    pub fn resident_pages(&self) -> Vec<PageId> {
        let mut pages: Vec<PageId> = self.table.lock().frames.keys().copied().collect();
        pages.sort();
        pages
    }

    /// Get the number of dirty pages in the buffer pool
    pub fn dirty_page_count(&self) -> usize {
        self.table
            .lock()
            .frames
            .values()
            .filter(|frame| frame.page.read().is_dirty())
            .count()
    }

    /// Lock `page_id` for `txn` with `perm`, then return the cached page,
    /// loading it from its table's store on a miss.
    ///
    /// May block while another transaction holds a conflicting lock. Fails
    /// with `BufferError::Aborted` if the lock is not granted in time, and
    /// with `BufferError::CacheFull` if a miss finds every resident page
    /// dirty or exclusively locked.
    pub fn get_page(
        &self,
        txn: TransactionId,
        page_id: PageId,
        perm: Permission,
    ) -> BufferResult<PageRef> {
        self.locks.acquire(txn, page_id, perm)?;

        let mut table = self.table.lock();
        if let Some(page) = table.touch(page_id) {
            return Ok(page);
        }

        self.make_room(&mut table)?;
        let page = self
            .catalog
            .store(page_id.table_id())?
            .read_page(page_id)?;
        let page = Arc::new(RwLock::new(page));
        table.insert(page_id, Arc::clone(&page));
        debug!(%txn, page = %page_id, resident = table.frames.len(), "loaded page");
        Ok(page)
    }

    /// Add a tuple to a table on behalf of `txn`.
    ///
    /// The table's mutator takes the page locks it needs; every page it
    /// reports is cached and marked dirty by `txn`.
    pub fn insert_tuple(
        &self,
        txn: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> BufferResult<()> {
        let mutator = self.catalog.mutator(table_id)?;
        let dirtied = mutator.insert_tuple(self, txn, tuple)?;
        self.absorb_dirty_pages(txn, dirtied)
    }

    /// Remove a tuple from its table on behalf of `txn`
    pub fn delete_tuple(&self, txn: TransactionId, tuple: &Tuple) -> BufferResult<()> {
        let record = tuple.record_id().ok_or(RecordError::MissingRecordId)?;
        let mutator = self.catalog.mutator(record.page_id.table_id())?;
        let dirtied = mutator.delete_tuple(self, txn, tuple)?;
        self.absorb_dirty_pages(txn, dirtied)
    }

    fn absorb_dirty_pages(&self, txn: TransactionId, pages: Vec<PageRef>) -> BufferResult<()> {
        // Mark first so making room below cannot pick one of these pages
        for page in &pages {
            page.write().mark_dirty(txn);
        }

        let mut table = self.table.lock();
        for page in pages {
            let page_id = page.read().id();
            if !table.frames.contains_key(&page_id) {
                self.make_room(&mut table)?;
            }
            table.insert(page_id, page);
        }
        Ok(())
    }

    /// Release a single lock before the transaction ends.
    ///
    /// This breaks two-phase locking. Only use it for pages the transaction
    /// merely inspected and whose content it does not depend on.
    pub fn release_page(&self, txn: TransactionId, page_id: PageId) {
        self.locks.release(txn, page_id);
    }

    /// Return true if the specified transaction has a lock on the specified page
    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.locks.holds_lock(txn, page_id)
    }

    /// Commit `txn`
    pub fn commit(&self, txn: TransactionId) -> BufferResult<()> {
        self.transaction_complete(txn, true)
    }

    /// Abort `txn`
    pub fn abort(&self, txn: TransactionId) -> BufferResult<()> {
        self.transaction_complete(txn, false)
    }

    /// Finish `txn` and release all of its locks.
    ///
    /// On commit every page `txn` holds exclusively is flushed before the
    /// locks go; if a flush fails the error is returned and the locks are
    /// kept so the caller can abort instead. On abort those pages are
    /// dropped from the cache without writeback, so the next reader loads
    /// the last durable version.
    pub fn transaction_complete(&self, txn: TransactionId, commit: bool) -> BufferResult<()> {
        if commit {
            self.flush_pages(txn)?;
        } else {
            self.discard_pages(txn);
        }

        let released = self.locks.release_all(txn);
        info!(%txn, commit, locks = released.len(), "transaction complete");
        Ok(())
    }

    /// Write all pages of the specified transaction to disk
    pub fn flush_pages(&self, txn: TransactionId) -> BufferResult<()> {
        let page_ids = self.locks.exclusive_pages(txn);
        let pages: Vec<PageRef> = {
            let table = self.table.lock();
            page_ids
                .iter()
                .filter_map(|page_id| table.frames.get(page_id))
                .map(|frame| Arc::clone(&frame.page))
                .collect()
        };
        // Written outside the page-table mutex so cache hits don't wait on the
        // log force; the pages stay pinned while dirty and locked
        for page in &pages {
            self.write_back(page)?;
        }
        Ok(())
    }

    fn discard_pages(&self, txn: TransactionId) {
        let pages = self.locks.exclusive_pages(txn);
        let mut table = self.table.lock();
        for page_id in pages {
            if table.frames.remove(&page_id).is_some() {
                debug!(%txn, page = %page_id, "discarded page on abort");
            }
        }
    }

    /// Flush all dirty pages to disk.
    ///
    /// Writes uncommitted data too, which breaks the no-steal discipline.
    /// Meant for shutdown and checkpoints with no transactions running.
    pub fn flush_all_pages(&self) -> BufferResult<()> {
        let pages: Vec<PageRef> = self
            .table
            .lock()
            .frames
            .values()
            .map(|frame| Arc::clone(&frame.page))
            .collect();
        for page in &pages {
            self.write_back(page)?;
        }
        Ok(())
    }

    /// Drop a page from the cache without writing it back
    pub fn discard_page(&self, page_id: PageId) {
        self.table.lock().frames.remove(&page_id);
    }

    /// Log the before-image, force the log, then write the page and mark it
    /// clean. No-op for a clean page.
    fn write_back(&self, page: &PageRef) -> BufferResult<()> {
        let mut page = page.write();
        let Some(dirtier) = page.dirtier() else {
            return Ok(());
        };

        self.log.log_before_image(dirtier, &page)?;
        self.log.force()?;
        self.catalog
            .store(page.id().table_id())?
            .write_page(&page)?;
        page.mark_clean();
        page.set_before_image();
        debug!(txn = %dirtier, page = %page.id(), "flushed page");
        Ok(())
    }

    /// Evict unpinned pages until there is room for one more. Takes the
    /// lock table after the page table; the lock manager never calls back
    /// into the pool.
    fn make_room(&self, table: &mut PageTable) -> BufferResult<()> {
        while table.frames.len() >= self.capacity {
            let candidates = table.candidates(&self.locks);
            let Some(victim) = table.policy.choose_victim(&candidates) else {
                warn!(capacity = self.capacity, "no clean page to evict");
                return Err(BufferError::CacheFull {
                    capacity: self.capacity,
                });
            };
            // Victims are clean, so there is nothing to write back
            table.frames.remove(&victim);
            debug!(page = %victim, "evicted page");
        }
        Ok(())
    }
}
