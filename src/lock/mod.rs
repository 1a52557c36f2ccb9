mod error;
mod lock_manager;
mod lock_table;

pub use error::{LockError, LockResult};
pub use lock_manager::LockManager;
pub use lock_table::{Lock, LockMode, LockTable};
