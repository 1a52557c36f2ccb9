mod buffer_pool;
mod error;
mod eviction;


pub use buffer_pool::{BufferPool, PageRef};
pub use error::{BufferError, BufferResult};
pub use eviction::{
    Candidate, EvictionPolicy, FirstCleanPolicy, RandomPolicy, RecencyPolicy, policy_for,
};
