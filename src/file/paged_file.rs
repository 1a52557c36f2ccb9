use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::error::{FileError, FileResult};
use super::page_store::PageStore;
use super::{PAGE_SIZE, Page, PageId, TableId};

/// A table's backing file, addressed in fixed-size pages
pub struct PagedFile {
    table_id: TableId,
    page_size: usize,
    path: PathBuf,
    file: Mutex<File>,
}

impl PagedFile {
    /// Create a new, empty file for a table
    pub fn create<P: AsRef<Path>>(path: P, table_id: TableId) -> FileResult<Self> {
        let path = path.as_ref();

        if path.exists() {
            return Err(FileError::FileAlreadyExists(path.display().to_string()));
        }

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        File::create(path)?;
        Self::open(path, table_id)
    }

    /// Open an existing table file
    pub fn open<P: AsRef<Path>>(path: P, table_id: TableId) -> FileResult<Self> {
        let path_ref = path.as_ref();
        let path = path_ref
            .canonicalize()
            .map_err(|_| FileError::FileNotFound(path_ref.display().to_string()))?;

        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        Ok(Self {
            table_id,
            page_size: PAGE_SIZE,
            path,
            file: Mutex::new(file),
        })
    }

    /// Use a non-default page size (test harnesses only)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sync the file to disk (flush all OS buffers)
    pub fn sync(&self) -> FileResult<()> {
        self.file.lock().sync_data()?;
        Ok(())
    }

    fn check_owner(&self, page_id: PageId) -> FileResult<()> {
        if page_id.table_id() != self.table_id {
            return Err(FileError::ForeignPage {
                table: self.table_id,
                page_id,
            });
        }
        Ok(())
    }

    fn count_pages(&self, file: &File) -> FileResult<u32> {
        let file_size = file.metadata()?.len();
        Ok(file_size.div_ceil(self.page_size as u64) as u32)
    }
}

impl PageStore for PagedFile {
    fn table_id(&self) -> TableId {
        self.table_id
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn read_page(&self, page_id: PageId) -> FileResult<Page> {
        self.check_owner(page_id)?;
        let mut file = self.file.lock();

        let page_count = self.count_pages(&file)?;
        if page_id.page_number() >= page_count {
            return Err(FileError::PageOutOfRange {
                page_id,
                page_count,
            });
        }

        let offset = page_id.page_number() as u64 * self.page_size as u64;
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; self.page_size];
        let mut filled = 0;
        while filled < buffer.len() {
            match file.read(&mut buffer[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        // A torn tail page reads as zeros past the end of the file
        buffer[filled..].fill(0);

        Ok(Page::new(page_id, buffer))
    }

    fn write_page(&self, page: &Page) -> FileResult<()> {
        let page_id = page.id();
        self.check_owner(page_id)?;
        if page.size() != self.page_size {
            return Err(FileError::InvalidPageSize {
                expected: self.page_size,
                actual: page.size(),
            });
        }

        let mut file = self.file.lock();
        let offset = page_id.page_number() as u64 * self.page_size as u64;
        let required_size = offset + self.page_size as u64;

        // Extend file if necessary to ensure we can write at this offset
        let current_size = file.metadata()?.len();
        if current_size < required_size {
            file.set_len(required_size)?;
        }

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(page.data())?;
        Ok(())
    }

    fn allocate_page(&self) -> FileResult<PageId> {
        let file = self.file.lock();
        let page_no = self.count_pages(&file)?;
        file.set_len((page_no as u64 + 1) * self.page_size as u64)?;
        Ok(PageId::new(self.table_id, page_no))
    }

    fn page_count(&self) -> FileResult<u32> {
        let file = self.file.lock();
        self.count_pages(&file)
    }
}
