mod error;
mod heap_page;
mod heap_table;
mod record;

pub use error::{RecordError, RecordResult};
pub use heap_page::SlotLayout;
pub use heap_table::HeapTable;
pub use record::{RecordId, SlotId, Tuple};
