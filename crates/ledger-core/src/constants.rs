pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;

/// Difficulty of the genesis block, in leading zero bits.
pub const INITIAL_DIFFICULTY: u32 = 3;
/// Target interval between two blocks, in milliseconds.
pub const MINE_RATE_MS: u64 = 1_000;

pub const STARTING_BALANCE: u64 = 1_000;
pub const MINING_REWARD: u64 = 50;
pub const REWARD_INPUT_ADDRESS: &str = "*authorized-reward*";

pub const BLOCKS_PER_PAGE: usize = 5;

pub const GENESIS_TIMESTAMP: u64 = 1;
pub const GENESIS_LAST_HASH: &str = "00";
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000001";
