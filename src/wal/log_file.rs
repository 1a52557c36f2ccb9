//! Append-only, file-backed write-ahead log.

use crc32fast::Hasher;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::WriteAheadLog;
use super::error::{WalError, WalResult};
use crate::file::{Page, PageId};
use crate::transaction::TransactionId;

/// Frame header: total record length, then CRC32 of the body
const HEADER_SIZE: usize = 8;
/// Body prefix: txn id, table id, page number, image length
const BODY_PREFIX_SIZE: usize = 20;

/// A before/after image pair read back from the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub txn: TransactionId,
    pub page_id: PageId,
    pub before: Vec<u8>,
    pub after: Vec<u8>,
}

/// The log manager
pub struct FileLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileLog {
    /// Open the log file, creating it if it doesn't exist
    pub fn open<P: AsRef<Path>>(path: P) -> WalResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&path)?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record in the log, verifying checksums
    pub fn read_records<P: AsRef<Path>>(path: P) -> WalResult<Vec<LogRecord>> {
        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;

        let mut records = Vec::new();
        let mut offset = 0usize;
        while offset < bytes.len() {
            let corrupt = WalError::Corrupt {
                offset: offset as u64,
            };
            // A crash mid-append leaves a short final frame; keep what came before it
            if bytes.len() - offset < HEADER_SIZE {
                warn!(offset, "ignoring torn log tail");
                break;
            }

            let total_len = read_u32(&bytes, offset) as usize;
            let crc = read_u32(&bytes, offset + 4);
            if total_len < HEADER_SIZE + BODY_PREFIX_SIZE {
                return Err(corrupt);
            }
            if offset + total_len > bytes.len() {
                warn!(offset, "ignoring torn log tail");
                break;
            }

            let body = &bytes[offset + HEADER_SIZE..offset + total_len];
            if crc32fast::hash(body) != crc {
                return Err(corrupt);
            }
            records.push(decode_body(body).ok_or(corrupt)?);
            offset += total_len;
        }

        Ok(records)
    }
}

impl WriteAheadLog for FileLog {
    fn log_before_image(&self, txn: TransactionId, page: &Page) -> WalResult<()> {
        let before = page.before_image();
        let after = page.data();

        let mut body = Vec::with_capacity(BODY_PREFIX_SIZE + before.len() + after.len());
        body.extend_from_slice(&txn.as_u64().to_be_bytes());
        body.extend_from_slice(&page.id().table_id().to_be_bytes());
        body.extend_from_slice(&page.id().page_number().to_be_bytes());
        body.extend_from_slice(&(before.len() as u32).to_be_bytes());
        body.extend_from_slice(before);
        body.extend_from_slice(after);

        let mut hasher = Hasher::new();
        hasher.update(&body);
        let crc = hasher.finalize();
        let total_len = (HEADER_SIZE + body.len()) as u32;

        let mut writer = self.writer.lock();
        writer.write_all(&total_len.to_be_bytes())?;
        writer.write_all(&crc.to_be_bytes())?;
        writer.write_all(&body)?;
        Ok(())
    }

    fn force(&self) -> WalResult<()> {
        let mut writer = self.writer.lock();
        writer.flush()?;
        writer.get_ref().sync_data()?;
        Ok(())
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn decode_body(body: &[u8]) -> Option<LogRecord> {
    let txn = u64::from_be_bytes(body.get(0..8)?.try_into().ok()?);
    let table = u32::from_be_bytes(body.get(8..12)?.try_into().ok()?);
    let page_no = u32::from_be_bytes(body.get(12..16)?.try_into().ok()?);
    let image_len = u32::from_be_bytes(body.get(16..20)?.try_into().ok()?) as usize;

    let images = body.get(BODY_PREFIX_SIZE..)?;
    if images.len() < image_len {
        return None;
    }
    let (before, after) = images.split_at(image_len);

    Some(LogRecord {
        txn: TransactionId::from_raw(txn),
        page_id: PageId::new(table, page_no),
        before: before.to_vec(),
        after: after.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dirty_page(page_no: u32, old: u8, new: u8) -> Page {
        let mut page = Page::new(PageId::new(2, page_no), vec![old; 32]);
        page.data_mut().fill(new);
        page
    }

    #[test]
    fn test_log_and_read_back() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("wal.log");
        let log = FileLog::open(&path).unwrap();

        let t1 = TransactionId::from_raw(11);
        let t2 = TransactionId::from_raw(12);
        log.log_before_image(t1, &dirty_page(0, 1, 2)).unwrap();
        log.log_before_image(t2, &dirty_page(5, 3, 4)).unwrap();
        log.force().unwrap();

        let records = FileLog::read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].txn, t1);
        assert_eq!(records[0].page_id, PageId::new(2, 0));
        assert_eq!(records[0].before, vec![1; 32]);
        assert_eq!(records[0].after, vec![2; 32]);
        assert_eq!(records[1].txn, t2);
        assert_eq!(records[1].page_id, PageId::new(2, 5));
    }

    #[test]
    fn test_unforced_records_stay_buffered() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("wal.log");
        let log = FileLog::open(&path).unwrap();

        log.log_before_image(TransactionId::from_raw(1), &dirty_page(0, 0, 1))
            .unwrap();
        assert!(FileLog::read_records(&path).unwrap().is_empty());

        log.force().unwrap();
        assert_eq!(FileLog::read_records(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_reopen_appends() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("wal.log");

        for round in 0..2u8 {
            let log = FileLog::open(&path).unwrap();
            log.log_before_image(TransactionId::from_raw(round as u64), &dirty_page(0, round, 9))
                .unwrap();
            log.force().unwrap();
        }

        assert_eq!(FileLog::read_records(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_corruption_detected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("wal.log");
        let log = FileLog::open(&path).unwrap();
        log.log_before_image(TransactionId::from_raw(1), &dirty_page(0, 0, 1))
            .unwrap();
        log.force().unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        let result = FileLog::read_records(&path);
        assert!(matches!(result, Err(WalError::Corrupt { offset: 0 })));
    }

    #[test]
    fn test_torn_tail_keeps_durable_records() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("wal.log");
        let log = FileLog::open(&path).unwrap();
        log.log_before_image(TransactionId::from_raw(1), &dirty_page(0, 0, 1))
            .unwrap();
        log.log_before_image(TransactionId::from_raw(2), &dirty_page(1, 0, 2))
            .unwrap();
        log.force().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let frame = bytes.len() / 2;

        // Part of a header
        std::fs::write(&path, &bytes[..frame + 5]).unwrap();
        let records = FileLog::read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].txn, TransactionId::from_raw(1));

        // Full header, partial body
        std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();
        assert_eq!(FileLog::read_records(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_bad_checksum_before_tail_is_corrupt() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("wal.log");
        let log = FileLog::open(&path).unwrap();
        for page_no in 0..2 {
            log.log_before_image(TransactionId::from_raw(1), &dirty_page(page_no, 0, 1))
                .unwrap();
        }
        log.force().unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[HEADER_SIZE] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        let result = FileLog::read_records(&path);
        assert!(matches!(result, Err(WalError::Corrupt { offset: 0 })));
    }
}
