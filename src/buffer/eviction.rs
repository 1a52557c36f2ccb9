//! Victim selection for a full buffer pool.
//!
//! Every policy only ever picks a clean page. When all candidates are dirty
//! the pool reports `CacheFull` instead of evicting.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::config::EvictionStrategy;
use crate::file::PageId;

/// What a policy sees of one resident page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub page_id: PageId,
    /// Logical last-use time; larger is more recent
    pub stamp: u64,
    /// Dirty, write-guarded, or held under an exclusive page lock
    pub pinned: bool,
}

/// Page replacement policy. Runs under the pool's page-table mutex.
pub trait EvictionPolicy: Send {
    /// Pick an unpinned page to evict, or `None` if there is none
    fn choose_victim(&mut self, candidates: &[Candidate]) -> Option<PageId>;
}

/// Evicts the clean page with the oldest stamp
#[derive(Debug, Default)]
pub struct RecencyPolicy;

impl EvictionPolicy for RecencyPolicy {
    fn choose_victim(&mut self, candidates: &[Candidate]) -> Option<PageId> {
        candidates
            .iter()
            .filter(|c| !c.pinned)
            .min_by_key(|c| c.stamp)
            .map(|c| c.page_id)
    }
}

/// Evicts a uniformly random clean page
pub struct RandomPolicy {
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
}

impl EvictionPolicy for RandomPolicy {
    fn choose_victim(&mut self, candidates: &[Candidate]) -> Option<PageId> {
        let clean: Vec<PageId> = candidates
            .iter()
            .filter(|c| !c.pinned)
            .map(|c| c.page_id)
            .collect();
        clean.choose(&mut self.rng).copied()
    }
}

/// Evicts the first clean page in table order
#[derive(Debug, Default)]
pub struct FirstCleanPolicy;

impl EvictionPolicy for FirstCleanPolicy {
    fn choose_victim(&mut self, candidates: &[Candidate]) -> Option<PageId> {
        candidates.iter().find(|c| !c.pinned).map(|c| c.page_id)
    }
}

/// Build the policy a configuration asks for
pub fn policy_for(strategy: EvictionStrategy, seed: Option<u64>) -> Box<dyn EvictionPolicy> {
    match strategy {
        EvictionStrategy::Recency => Box::new(RecencyPolicy),
        EvictionStrategy::Random => Box::new(RandomPolicy::new(seed)),
        EvictionStrategy::FirstClean => Box::new(FirstCleanPolicy),
    }
}
