//! Proof-of-work search that can be abandoned.
//!
//! [`Miner::spawn`] runs the search on its own thread and hands back a
//! [`MineHandle`]. Cancelling it makes the search give up at the next nonce
//! it checks, so a supervisor can drop work on a tip that is no longer
//! current.

use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

use crate::block::{Block, BlockPayload, Search};

/// Sequential nonces between two looks at the cancel flag.
const CANCEL_CHECK_INTERVAL: u64 = 1_024;

/// Shared flag that tells a running search to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Same search as [`Block::mine_block`], giving up with `None` once `cancel`
/// is set.
pub fn mine_block_cancellable(
    last_block: &Block,
    data: BlockPayload,
    cancel: &CancelToken,
) -> Option<Block> {
    let search = Search::new(last_block, &data);
    let mut nonce = 0u64;
    loop {
        nonce = nonce.wrapping_add(1);
        if nonce % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return None;
        }
        if let Some(found) = search.attempt(nonce) {
            return Some(found.into_block(last_block, data));
        }
    }
}

/// Searches nonces in parallel until a hash meets the difficulty retargeted
/// for the moment it was computed. Returns `None` if cancelled first.
pub fn mine_block_parallel(
    last_block: &Block,
    data: BlockPayload,
    cancel: &CancelToken,
) -> Option<Block> {
    let search = Search::new(last_block, &data);

    // Rayon splits the nonce range across threads; any hit (or a cancel) ends it.
    let found = (1u64..u64::MAX)
        .into_par_iter()
        .find_map_any(|nonce| {
            if cancel.is_cancelled() {
                return Some(None);
            }
            search.attempt(nonce).map(Some)
        })
        .flatten()?;

    info!(
        "Mined block on {} with nonce {} and hash {}",
        last_block.hash, found.nonce, found.hash
    );
    Some(found.into_block(last_block, data))
}

pub struct Miner;

impl Miner {
    /// Start mining `data` on top of `last_block` on a dedicated thread.
    pub fn spawn(last_block: Block, data: BlockPayload) -> MineHandle {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let handle = thread::spawn(move || mine_block_parallel(&last_block, data, &token));
        MineHandle { cancel, handle }
    }
}

pub struct MineHandle {
    cancel: CancelToken,
    handle: JoinHandle<Option<Block>>,
}

impl MineHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the search. `None` if it was cancelled.
    pub fn join(self) -> Option<Block> {
        match self.handle.join() {
            Ok(block) => block,
            Err(_) => {
                warn!("mining thread panicked");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Blockchain;
    use crate::pow;
    use crate::test_support::easy_parent;

    #[test]
    fn parallel_mining_meets_difficulty() {
        let parent = Block::genesis();
        let block = mine_block_parallel(&parent, "parallel".into(), &CancelToken::new()).unwrap();
        assert_eq!(block.last_hash, parent.hash);
        assert_eq!(block.hash, block.recompute_hash());
        assert!(pow::leading_zero_bits(&block.hash) >= block.difficulty);
    }

    #[test]
    fn cancellable_mining_finds_block() {
        let parent = easy_parent();
        let block = mine_block_cancellable(&parent, "seq".into(), &CancelToken::new()).unwrap();
        assert_eq!(block.difficulty, 1);
        assert_eq!(block.hash, block.recompute_hash());
    }

    #[test]
    fn cancelled_search_gives_up() {
        // Far above anything reachable, so only the cancel flag can end it.
        let mut parent = Block::genesis();
        parent.timestamp = u64::MAX;
        parent.difficulty = 200;
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(mine_block_parallel(&parent, "never".into(), &cancel).is_none());
        assert!(mine_block_cancellable(&parent, "never".into(), &cancel).is_none());
    }

    #[test]
    fn spawned_miner_extends_chain() {
        let mut blockchain = Blockchain::new();
        let handle = Miner::spawn(blockchain.last_block().clone(), "worker".into());
        let block = handle.join().unwrap();
        assert!(blockchain.push_mined(block));
        assert!(Blockchain::is_valid_chain(blockchain.blocks()));
    }

    #[test]
    fn spawned_miner_can_be_cancelled() {
        let mut parent = Block::genesis();
        parent.timestamp = u64::MAX;
        parent.difficulty = 200;
        let handle = Miner::spawn(parent, "never".into());
        handle.cancel();
        assert!(handle.join().is_none());
    }
}
