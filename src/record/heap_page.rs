use super::error::{RecordError, RecordResult};
use super::record::SlotId;

/// Fixed-size slot layout of a heap page: an occupancy bitmap followed by
/// `slot_count` records of `record_size` bytes.
///
/// An all-zero page is a valid empty page, so freshly allocated pages need
/// no initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLayout {
    record_size: usize,
    slot_count: usize,
    bitmap_size: usize,
}

impl SlotLayout {
    pub fn new(record_size: usize, page_size: usize) -> RecordResult<Self> {
        let slot_count = Self::calculate_slot_count(record_size, page_size);
        if slot_count == 0 {
            return Err(RecordError::RecordTooLarge {
                record_size,
                page_size,
            });
        }

        Ok(Self {
            record_size,
            slot_count,
            bitmap_size: slot_count.div_ceil(8),
        })
    }

    /// Calculate maximum number of slots for a given record size
    pub fn calculate_slot_count(record_size: usize, page_size: usize) -> usize {
        if record_size == 0 || record_size > page_size {
            return 0;
        }

        // We need: ⌈slot_count / 8⌉ + slot_count * record_size <= page_size
        let max_slots = (page_size * 8) / (1 + record_size * 8);
        max_slots.min(SlotId::MAX as usize)
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn is_slot_used(&self, page: &[u8], slot_id: SlotId) -> bool {
        let slot = slot_id as usize;
        slot < self.slot_count && page[slot / 8] & (1 << (slot % 8)) != 0
    }

    /// Find a free slot, returns None if page is full
    pub fn find_free_slot(&self, page: &[u8]) -> Option<SlotId> {
        (0..self.slot_count as SlotId).find(|&slot| !self.is_slot_used(page, slot))
    }

    pub fn used_slots<'a>(&'a self, page: &'a [u8]) -> impl Iterator<Item = SlotId> + 'a {
        (0..self.slot_count as SlotId).filter(move |&slot| self.is_slot_used(page, slot))
    }

    pub fn read<'a>(&self, page: &'a [u8], slot_id: SlotId) -> Option<&'a [u8]> {
        if !self.is_slot_used(page, slot_id) {
            return None;
        }
        let start = self.slot_offset(slot_id);
        Some(&page[start..start + self.record_size])
    }

    /// Store `bytes` in a slot and mark it used
    pub fn write(&self, page: &mut [u8], slot_id: SlotId, bytes: &[u8]) {
        debug_assert_eq!(bytes.len(), self.record_size);
        let slot = slot_id as usize;
        let start = self.slot_offset(slot_id);
        page[start..start + self.record_size].copy_from_slice(bytes);
        page[slot / 8] |= 1 << (slot % 8);
    }

    /// Mark a slot free and zero its bytes. Returns false if it was already free.
    pub fn clear(&self, page: &mut [u8], slot_id: SlotId) -> bool {
        if !self.is_slot_used(page, slot_id) {
            return false;
        }
        let slot = slot_id as usize;
        let start = self.slot_offset(slot_id);
        page[start..start + self.record_size].fill(0);
        page[slot / 8] &= !(1 << (slot % 8));
        true
    }

    fn slot_offset(&self, slot_id: SlotId) -> usize {
        self.bitmap_size + slot_id as usize * self.record_size
    }
}
