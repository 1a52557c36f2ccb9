use std::fmt;

use crate::transaction::TransactionId;

/// Table identifier
pub type TableId = u32;

/// Identifies a page in the whole database: owning table plus page number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    table: TableId,
    page_no: u32,
}

impl PageId {
    pub const fn new(table: TableId, page_no: u32) -> Self {
        Self { table, page_no }
    }

    pub fn table_id(&self) -> TableId {
        self.table
    }

    pub fn page_number(&self) -> u32 {
        self.page_no
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table, self.page_no)
    }
}

/// In-memory image of exactly one disk block.
///
/// Besides the raw bytes a page remembers which transaction dirtied it last
/// and a before-image: the content as of the last time it was clean. The
/// before-image is what goes to the write-ahead log when the page is flushed.
#[derive(Debug, Clone)]
pub struct Page {
    id: PageId,
    data: Vec<u8>,
    dirtier: Option<TransactionId>,
    before_image: Vec<u8>,
}

impl Page {
    /// Wrap freshly read content; the content is also the before-image
    pub fn new(id: PageId, data: Vec<u8>) -> Self {
        Self {
            id,
            before_image: data.clone(),
            data,
            dirtier: None,
        }
    }

    /// An all-zero page
    pub fn zeroed(id: PageId, page_size: usize) -> Self {
        Self::new(id, vec![0u8; page_size])
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the content. Does not mark the page dirty; the
    /// buffer pool does that when a mutator hands the page back.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Transaction that dirtied this page, `None` when clean
    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirtier
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtier.is_some()
    }

    pub fn mark_dirty(&mut self, txn: TransactionId) {
        self.dirtier = Some(txn);
    }

    pub fn mark_clean(&mut self) {
        self.dirtier = None;
    }

    pub fn before_image(&self) -> &[u8] {
        &self.before_image
    }

    /// Snapshot the current content as the before-image for the next writer
    pub fn set_before_image(&mut self) {
        self.before_image.clear();
        self.before_image.extend_from_slice(&self.data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_accessors() {
        let pid = PageId::new(7, 3);
        assert_eq!(pid.table_id(), 7);
        assert_eq!(pid.page_number(), 3);
        assert_eq!(pid.to_string(), "7:3");
        assert_eq!(pid, PageId::new(7, 3));
        assert_ne!(pid, PageId::new(8, 3));
    }

    #[test]
    fn test_dirty_tracking() {
        let txn = TransactionId::from_raw(42);
        let mut page = Page::zeroed(PageId::new(1, 0), 64);
        assert!(!page.is_dirty());

        page.mark_dirty(txn);
        assert_eq!(page.dirtier(), Some(txn));

        page.mark_clean();
        assert_eq!(page.dirtier(), None);
    }

    #[test]
    fn test_before_image_survives_mutation() {
        let mut page = Page::new(PageId::new(1, 0), vec![1, 2, 3, 4]);
        page.data_mut()[0] = 9;
        assert_eq!(page.data(), &[9, 2, 3, 4]);
        assert_eq!(page.before_image(), &[1, 2, 3, 4]);

        page.set_before_image();
        assert_eq!(page.before_image(), &[9, 2, 3, 4]);
    }
}
