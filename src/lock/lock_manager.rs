//! Two-phase page locking with timeout-based deadlock avoidance.

use parking_lot::{Condvar, Mutex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};
use tracing::{trace, warn};

use super::error::{LockError, LockResult};
use super::lock_table::{Lock, LockTable};
use crate::config::LockTimeout;
use crate::file::PageId;
use crate::transaction::{Permission, TransactionId};

/// Grants shared/exclusive page locks and parks callers until a request
/// is grantable.
///
/// There is no wait-for graph. A blocked request gives up once it has
/// waited longer than a randomized window, and the caller must abort its
/// transaction. This bounds blocking but may abort transactions that were
/// not deadlocked, and two transactions racing for the same pages can both
/// abort.
pub struct LockManager {
    table: Mutex<LockTable>,
    released: Condvar,
    timeout: LockTimeout,
    rng: Mutex<StdRng>,
}

impl LockManager {
    pub fn new(timeout: LockTimeout, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            table: Mutex::new(LockTable::new()),
            released: Condvar::new(),
            timeout,
            rng: Mutex::new(rng),
        }
    }

    /// Block until `perm` on `page_id` is granted to `txn`, or fail with
    /// `LockError::Aborted` once the abort window has elapsed
    pub fn acquire(
        &self,
        txn: TransactionId,
        page_id: PageId,
        perm: Permission,
    ) -> LockResult<()> {
        let mode = perm.lock_mode();
        let window = self.abort_window();

        let mut table = self.table.lock();
        if table.covers(txn, page_id, mode) {
            return Ok(());
        }

        let arrived = Instant::now();
        let deadline = arrived + window;
        while !table.can_grant(txn, page_id, mode) {
            if Instant::now() >= deadline {
                let waited = arrived.elapsed();
                warn!(%txn, page = %page_id, ?mode, ?waited, "lock wait timed out, aborting");
                return Err(LockError::Aborted {
                    txn,
                    page_id,
                    waited,
                });
            }
            // Releases the table while parked; every release wakes all waiters
            self.released.wait_until(&mut table, deadline);
        }

        table.grant(txn, page_id, mode);
        trace!(%txn, page = %page_id, ?mode, "lock granted");
        Ok(())
    }

    /// Release `txn`'s locks on one page and wake all waiters
    pub fn release(&self, txn: TransactionId, page_id: PageId) {
        self.table.lock().release(txn, page_id);
        self.released.notify_all();
    }

    /// Release every lock `txn` holds and wake all waiters
    pub fn release_all(&self, txn: TransactionId) -> Vec<Lock> {
        let locks = self.table.lock().release_all(txn);
        self.released.notify_all();
        locks
    }

    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.table.lock().holds_lock(txn, page_id)
    }

    pub fn locks_held(&self, txn: TransactionId) -> Vec<Lock> {
        self.table.lock().locks_held(txn)
    }

    /// Pages `txn` holds exclusively; these are the pages it may have dirtied
    pub fn exclusive_pages(&self, txn: TransactionId) -> Vec<PageId> {
        self.table.lock().exclusive_pages(txn)
    }

    pub fn exclusive_holder(&self, page_id: PageId) -> Option<TransactionId> {
        self.table.lock().exclusive_holder(page_id)
    }

    pub fn shared_holders(&self, page_id: PageId) -> Vec<TransactionId> {
        self.table.lock().shared_holders(page_id)
    }

    fn abort_window(&self) -> Duration {
        let jitter_ms = self.timeout.abort_jitter_ms;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            self.rng.lock().gen_range(0..=jitter_ms)
        };
        self.timeout.min() + Duration::from_millis(jitter)
    }
}
