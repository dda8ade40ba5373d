use ledger_core::{codec, Node, Transaction};

/// Hand `tx` to `node` the way the broadcast transport would.
pub fn deliver_transaction(node: &mut Node, tx: &Transaction) {
    let bytes = codec::encode_transaction(tx).expect("Failed to encode transaction");
    node.receive_transaction(&bytes)
        .expect("Failed to deliver transaction");
}

/// Hand `from`'s chain to `to`; returns whether `to` adopted it.
pub fn deliver_chain(from: &Node, to: &mut Node) -> bool {
    let bytes = from.encode_chain().expect("Failed to encode chain");
    to.receive_chain(&bytes)
        .expect("Failed to decode chain")
        .is_replaced()
}
