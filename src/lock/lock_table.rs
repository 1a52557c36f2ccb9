//! Lock bookkeeping: who holds what on which page.
//!
//! The table never blocks. `LockManager` wraps it in a monitor and decides
//! when a caller waits.

use ahash::{AHashMap, AHashSet};

use crate::file::PageId;
use crate::transaction::TransactionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lock {
    pub txn: TransactionId,
    pub page_id: PageId,
    pub mode: LockMode,
}

/// Per-page holders plus a per-transaction index of held locks
#[derive(Debug, Default)]
pub struct LockTable {
    shared: AHashMap<PageId, AHashSet<TransactionId>>,
    exclusive: AHashMap<PageId, TransactionId>,
    held: AHashMap<TransactionId, AHashSet<Lock>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `txn` already has a lock at least as strong as `mode`
    pub fn covers(&self, txn: TransactionId, page_id: PageId, mode: LockMode) -> bool {
        let exclusive = self.exclusive.get(&page_id) == Some(&txn);
        match mode {
            LockMode::Exclusive => exclusive,
            LockMode::Shared => {
                exclusive
                    || self
                        .shared
                        .get(&page_id)
                        .is_some_and(|holders| holders.contains(&txn))
            }
        }
    }

    /// Whether `mode` on `page_id` can be granted to `txn` right now.
    ///
    /// Shared conflicts only with another transaction's exclusive lock.
    /// Exclusive also conflicts with shared locks held by anyone but `txn`,
    /// so a sole shared holder may upgrade.
    pub fn can_grant(&self, txn: TransactionId, page_id: PageId, mode: LockMode) -> bool {
        let foreign_exclusive = self
            .exclusive
            .get(&page_id)
            .is_some_and(|holder| *holder != txn);

        match mode {
            LockMode::Shared => !foreign_exclusive,
            LockMode::Exclusive => {
                !foreign_exclusive
                    && self
                        .shared
                        .get(&page_id)
                        .is_none_or(|holders| holders.iter().all(|holder| *holder == txn))
            }
        }
    }

    /// Record a granted lock. Callers check `can_grant` first.
    ///
    /// An upgrade keeps the earlier shared record; the transaction then
    /// holds both until release.
    pub fn grant(&mut self, txn: TransactionId, page_id: PageId, mode: LockMode) {
        debug_assert!(self.can_grant(txn, page_id, mode));
        match mode {
            LockMode::Shared => {
                self.shared.entry(page_id).or_default().insert(txn);
            }
            LockMode::Exclusive => {
                self.exclusive.insert(page_id, txn);
            }
        }
        self.held.entry(txn).or_default().insert(Lock {
            txn,
            page_id,
            mode,
        });
    }

    /// Drop every lock `txn` has on `page_id`. Returns whether any existed.
    pub fn release(&mut self, txn: TransactionId, page_id: PageId) -> bool {
        let Some(locks) = self.held.get_mut(&txn) else {
            return false;
        };
        let before = locks.len();
        locks.retain(|lock| lock.page_id != page_id);
        let released = locks.len() != before;
        if locks.is_empty() {
            self.held.remove(&txn);
        }

        self.forget_holder(txn, page_id);
        released
    }

    /// Drop every lock `txn` holds and return them
    pub fn release_all(&mut self, txn: TransactionId) -> Vec<Lock> {
        let locks: Vec<Lock> = self
            .held
            .remove(&txn)
            .map(|locks| locks.into_iter().collect())
            .unwrap_or_default();

        for lock in &locks {
            self.forget_holder(txn, lock.page_id);
        }
        locks
    }

    fn forget_holder(&mut self, txn: TransactionId, page_id: PageId) {
        if let Some(holders) = self.shared.get_mut(&page_id) {
            holders.remove(&txn);
            if holders.is_empty() {
                self.shared.remove(&page_id);
            }
        }
        if self.exclusive.get(&page_id) == Some(&txn) {
            self.exclusive.remove(&page_id);
        }
    }

    /// Whether `txn` holds any lock on `page_id`
    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.held
            .get(&txn)
            .is_some_and(|locks| locks.iter().any(|lock| lock.page_id == page_id))
    }

    /// Every lock `txn` holds, ordered by page
    pub fn locks_held(&self, txn: TransactionId) -> Vec<Lock> {
        let mut locks: Vec<Lock> = self
            .held
            .get(&txn)
            .map(|locks| locks.iter().copied().collect())
            .unwrap_or_default();
        locks.sort_by_key(|lock| (lock.page_id, lock.mode == LockMode::Exclusive));
        locks
    }

    /// Pages `txn` holds exclusively, ordered by page
    pub fn exclusive_pages(&self, txn: TransactionId) -> Vec<PageId> {
        let mut pages: Vec<PageId> = self
            .held
            .get(&txn)
            .map(|locks| {
                locks
                    .iter()
                    .filter(|lock| lock.mode == LockMode::Exclusive)
                    .map(|lock| lock.page_id)
                    .collect()
            })
            .unwrap_or_default();
        pages.sort();
        pages
    }

    pub fn exclusive_holder(&self, page_id: PageId) -> Option<TransactionId> {
        self.exclusive.get(&page_id).copied()
    }

    pub fn shared_holders(&self, page_id: PageId) -> Vec<TransactionId> {
        let mut holders: Vec<TransactionId> = self
            .shared
            .get(&page_id)
            .map(|holders| holders.iter().copied().collect())
            .unwrap_or_default();
        holders.sort();
        holders
    }
}
