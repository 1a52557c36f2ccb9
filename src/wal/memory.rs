use parking_lot::Mutex;

use super::WriteAheadLog;
use super::error::WalResult;
use crate::file::{Page, PageId};
use crate::transaction::TransactionId;

/// One call observed by a `MemoryLog`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    BeforeImage {
        txn: TransactionId,
        page_id: PageId,
        before: Vec<u8>,
    },
    Force,
}

/// Write-ahead log that keeps its records in memory
#[derive(Debug, Default)]
pub struct MemoryLog {
    events: Mutex<Vec<LogEvent>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().clone()
    }

    /// Number of before-images logged for a page
    pub fn images_logged(&self, page_id: PageId) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, LogEvent::BeforeImage { page_id: p, .. } if *p == page_id))
            .count()
    }
}

impl WriteAheadLog for MemoryLog {
    fn log_before_image(&self, txn: TransactionId, page: &Page) -> WalResult<()> {
        self.events.lock().push(LogEvent::BeforeImage {
            txn,
            page_id: page.id(),
            before: page.before_image().to_vec(),
        });
        Ok(())
    }

    fn force(&self) -> WalResult<()> {
        self.events.lock().push(LogEvent::Force);
        Ok(())
    }
}
