use crate::block::Block;

/// A parent old enough that the next block steps difficulty down to 1.
pub fn easy_parent() -> Block {
    let mut parent = Block::genesis();
    parent.timestamp = 0;
    parent.difficulty = 1;
    parent
}
