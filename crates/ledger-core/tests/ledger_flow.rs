mod helpers;

use helpers::{deliver_chain, deliver_transaction};
use ledger_core::constants::{MINING_REWARD, STARTING_BALANCE};
use ledger_core::{Blockchain, Miner, Node};

#[test]
fn two_nodes_converge_on_mined_transactions() -> anyhow::Result<()> {
    let mut miner = Node::new();
    let mut peer = Node::new();
    let peer_address = peer.wallet().address().to_owned();

    // The peer pays the miner and gossips the transaction.
    let tx = peer.transact(miner.wallet().address(), 100)?;
    deliver_transaction(&mut miner, &tx);
    assert_eq!(miner.pool().len(), 1);

    let block = miner.mine_transactions();
    assert_eq!(block.transactions().len(), 2);
    assert!(deliver_chain(&miner, &mut peer));

    assert!(peer.pool().is_empty());
    assert_eq!(peer.blockchain().blocks(), miner.blockchain().blocks());
    assert_eq!(
        peer.wallet_info(None).balance,
        STARTING_BALANCE - 100
    );
    assert_eq!(
        miner.wallet_info(None).balance,
        STARTING_BALANCE + 100 + MINING_REWARD
    );
    assert_eq!(
        miner.wallet_info(Some(&peer_address)),
        peer.wallet_info(None)
    );

    // Delivering the same chain back changes nothing.
    assert!(!deliver_chain(&peer, &mut miner));
    Ok(())
}

#[test]
fn balances_follow_several_rounds() -> anyhow::Result<()> {
    let mut alice = Node::new();
    let mut bob = Node::new();
    let bob_address = bob.wallet().address().to_owned();

    alice.transact(&bob_address, 300)?;
    alice.mine_transactions();
    assert!(deliver_chain(&alice, &mut bob));

    let back = bob.transact(alice.wallet().address(), 50)?;
    deliver_transaction(&mut alice, &back);
    alice.mine_transactions();

    // Balances are checked against the receiver's chain as it stands. Bob's
    // copy already shows alice's first spend, so her claimed input no longer
    // matches and only the unchecked sync path adopts the new chain.
    assert!(!deliver_chain(&alice, &mut bob));
    assert!(bob.sync_chain(&alice.encode_chain()?)?.is_replaced());

    let alice_balance = STARTING_BALANCE - 300 + MINING_REWARD + 50 + MINING_REWARD;
    assert_eq!(alice.wallet_info(None).balance, alice_balance);
    assert_eq!(bob.wallet_info(None).balance, STARTING_BALANCE + 300 - 50);
    assert!(Blockchain::is_valid_chain(bob.blockchain().blocks()));

    let mut addresses = alice.blockchain().known_addresses();
    addresses.sort();
    let mut expected = vec![alice.wallet().address().to_owned(), bob_address];
    expected.sort();
    assert_eq!(addresses, expected);
    Ok(())
}

#[test]
fn background_miner_block_lands_on_node() -> anyhow::Result<()> {
    let mut node = Node::new();
    node.transact("someone", 5)?;

    let handle = Miner::spawn(
        node.blockchain().last_block().clone(),
        node.pending_block_data(),
    );
    let block = handle.join().expect("uncancelled mining finds a block");

    assert!(node.submit_mined(block));
    assert_eq!(node.blockchain().len(), 2);
    assert!(node.pool().is_empty());
    assert_eq!(node.wallet_info(Some("someone")).balance, STARTING_BALANCE + 5);
    Ok(())
}

#[test]
fn forged_chain_is_refused() -> anyhow::Result<()> {
    let mut honest = Node::new();
    let mut forger = Node::new();

    forger.transact("thief", 10)?;
    forger.mine_transactions();
    let mut blocks = forger.blockchain().blocks().to_vec();
    blocks[1].data = "rewritten history".into();

    let bytes = ledger_core::codec::encode_chain(&blocks)?;
    assert!(!honest.receive_chain(&bytes)?.is_replaced());
    assert_eq!(honest.blockchain().len(), 1);
    Ok(())
}
