// Copyright (c) 2023 RBB S.r.l
// opensource@mintlayer.org
// SPDX-License-Identifier: MIT
// Licensed under the MIT License;
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://github.com/mintlayer/mintlayer-core/blob/master/LICENSE
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use common::primitives::H256;

use crate::pool::{remove_for_reorg, update_mempool_for_reorg};

use super::*;

// A disconnected block's chain of transactions is resurrected in dependency
// order and ends up properly linked.
#[test]
fn reorg_resurrects_disconnected_chain() {
    let TestHarness {
        mut mempool, coins, ..
    } = setup();

    let outpoint = confirmed_outpoint(&coins);
    let a = spend_outpoint(outpoint, 0, COIN_VALUE, TEST_FEE);
    let a_id = a.get_id();
    let a_out = (COIN_VALUE - TEST_FEE).unwrap();
    let b = spend_outpoint(OutPoint::new(a_id, 0), 0, a_out, TEST_FEE);
    let b_id = b.get_id();
    let b_out = (a_out - TEST_FEE).unwrap();
    let c = spend_outpoint(OutPoint::new(b_id, 0), 0, b_out, TEST_FEE);
    let c_id = c.get_id();

    // Disconnection queues transactions in reverse block order, newest
    // block first; the block held [a, b, c]
    update_mempool_for_reorg(&mut mempool, vec![c.clone(), b.clone(), a.clone()], true).unwrap();

    assert_eq!(mempool.query_hashes(), vec![a_id, b_id, c_id]);

    let entry_b = mempool.store.get_entry(&b_id).unwrap();
    assert_eq!(entry_b.parents().iter().copied().collect::<Vec<_>>(), vec![a_id]);
    assert_eq!(entry_b.children().iter().copied().collect::<Vec<_>>(), vec![c_id]);
    assert_eq!(entry_b.count_with_ancestors(), 2);
    assert_eq!(entry_b.count_with_descendants(), 2);
    mempool.force_check();
}

#[test]
fn reorg_with_add_back_disabled_erases() {
    let TestHarness {
        mut mempool, coins, ..
    } = setup();

    let outpoint = confirmed_outpoint(&coins);
    let a = spend_outpoint(outpoint, 0, COIN_VALUE, TEST_FEE);

    update_mempool_for_reorg(&mut mempool, vec![a.clone()], false).unwrap();
    assert!(!mempool.contains_transaction(&a.get_id()));
    assert!(mempool.query_hashes().is_empty());
}

// A resurrected parent is stitched back to the descendants it had in the
// pool before it was mined.
#[test]
fn reorg_restitches_existing_descendants() {
    let TestHarness {
        mut mempool, coins, ..
    } = setup();

    // While `a` was confirmed, its output was a utxo and `d` spent it from
    // the pool
    let a_input = confirmed_outpoint(&coins);
    let a = spend_outpoint(a_input, 0, COIN_VALUE, TEST_FEE);
    let a_id = a.get_id();
    let a_out_value = (COIN_VALUE - TEST_FEE).unwrap();
    let a_outpoint = OutPoint::new(a_id, 0);
    coins.add_cached_coin(
        a_outpoint,
        Coin::new(
            TxOutput::new(a_out_value, Destination::AnyoneCanSpend),
            BlockHeight::new(90),
            false,
        ),
    );
    let d = spend_outpoint(a_outpoint, 0, a_out_value, TEST_FEE);
    let d_id = d.get_id();
    mempool.add_transaction(d.clone(), TxOptions::default()).unwrap().assert_in_mempool();

    // The block containing `a` is disconnected: its output leaves the utxo
    // set and `a` itself returns to the pool
    coins.remove_coin(&a_outpoint);
    update_mempool_for_reorg(&mut mempool, vec![a.clone()], true).unwrap();

    assert!(mempool.contains_transaction(&a_id));
    assert!(mempool.contains_transaction(&d_id));

    let entry_a = mempool.store.get_entry(&a_id).unwrap();
    assert!(entry_a.children().contains(&d_id));
    assert_eq!(entry_a.count_with_descendants(), 2);

    let entry_d = mempool.store.get_entry(&d_id).unwrap();
    assert!(entry_d.parents().contains(&a_id));
    assert_eq!(entry_d.count_with_ancestors(), 2);

    mempool.force_check();
}

#[test]
fn block_confirmation_keeps_descendants() {
    let TestHarness {
        mut mempool,
        coins,
        chain,
        ..
    } = setup();
    let estimator_events = Arc::new(Mutex::new(Vec::new()));
    mempool.set_fee_estimator(Box::new(RecordingFeeEstimator {
        events: Arc::clone(&estimator_events),
    }));
    let events = subscribe_events(&mut mempool);

    let a = spend_outpoint(confirmed_outpoint(&coins), 0, COIN_VALUE, TEST_FEE);
    let a_id = a.get_id();
    let a_out = (COIN_VALUE - TEST_FEE).unwrap();
    let b = spend_outpoint(OutPoint::new(a_id, 0), 0, a_out, TEST_FEE);
    let b_id = b.get_id();
    mempool.add_transaction(a.clone(), TxOptions::default()).unwrap().assert_in_mempool();
    mempool.add_transaction(b, TxOptions::default()).unwrap().assert_in_mempool();

    // `a` gets mined; its output must now be provided by the utxo view
    let a_outpoint = OutPoint::new(a_id, 0);
    coins.add_cached_coin(
        a_outpoint,
        Coin::new(
            TxOutput::new(a_out, Destination::AnyoneCanSpend),
            BlockHeight::new(101),
            false,
        ),
    );
    chain.set_tip(101, H256::from_low_u64_be(101));
    mempool.remove_for_block(std::slice::from_ref(&a), BlockHeight::new(101));

    assert!(!mempool.contains_transaction(&a_id));
    assert!(mempool.contains_transaction(&b_id));

    // The survivor's ancestor package shrank back to itself
    let entry_b = mempool.store.get_entry(&b_id).unwrap();
    assert_eq!(entry_b.count_with_ancestors(), 1);
    assert!(entry_b.parents().is_empty());

    // The estimator saw the block once and the removal as in-block
    let recorded = estimator_events.lock().unwrap();
    assert!(recorded.contains(&EstimatorEvent::Block(BlockHeight::new(101), vec![a_id])));
    assert!(recorded.contains(&EstimatorEvent::Removed(a_id, true)));
    drop(recorded);

    // A new-tip notification went out
    assert!(events.lock().unwrap().iter().any(|event| matches!(
        event,
        MempoolEvent::NewTip(tip) if tip.block_height() == BlockHeight::new(101)
    )));

    mempool.force_check();
}

#[test]
fn block_evicts_conflicts_and_their_priorities() {
    let TestHarness {
        mut mempool, coins, ..
    } = setup();
    let events = subscribe_events(&mut mempool);

    let outpoint = confirmed_outpoint(&coins);
    let pool_tx = spend_outpoint(outpoint, 0, COIN_VALUE, TEST_FEE);
    let pool_tx_id = pool_tx.get_id();
    mempool.add_transaction(pool_tx, TxOptions::default()).unwrap().assert_in_mempool();
    mempool.prioritise_transaction(pool_tx_id, SignedAmount::from_atoms(999));

    // The block confirms a different spend of the same outpoint
    let mined = spend_outpoint(outpoint, 0, COIN_VALUE, (TEST_FEE * 2).unwrap());
    mempool.remove_for_block(&[mined], BlockHeight::new(101));

    assert!(!mempool.contains_transaction(&pool_tx_id));
    assert!(events.lock().unwrap().iter().any(|event| matches!(
        event,
        MempoolEvent::TransactionRemoved(removed)
            if *removed.tx_id() == pool_tx_id
                && removed.reason() == MempoolRemovalReason::Conflict
    )));
    // The evicted conflict's prioritisation was dropped
    assert_eq!(mempool.apply_delta(&pool_tx_id, Fee::ZERO), Fee::ZERO);
    mempool.force_check();
}

#[test]
fn reorg_removes_immature_coinbase_spends() {
    let TestHarness {
        mut mempool, coins, ..
    } = setup();

    // A coinbase output only 6 blocks deep (tip is at 100)
    let young_coinbase = confirmed_outpoint_with(&coins, COIN_VALUE, true, 95);
    let spender = spend_outpoint(young_coinbase, 0, COIN_VALUE, TEST_FEE);
    let spender_id = spender.get_id();
    mempool.add_transaction(spender, TxOptions::default()).unwrap().assert_in_mempool();

    remove_for_reorg(&mut mempool);
    assert!(!mempool.contains_transaction(&spender_id));
    mempool.force_check();

    // A mature one survives the same sweep
    let deep_coinbase = confirmed_outpoint_with(&coins, COIN_VALUE, true, 1);
    let spender = spend_outpoint(deep_coinbase, 0, COIN_VALUE, TEST_FEE);
    let spender_id = spender.get_id();
    mempool.add_transaction(spender, TxOptions::default()).unwrap().assert_in_mempool();

    remove_for_reorg(&mut mempool);
    assert!(mempool.contains_transaction(&spender_id));
    mempool.force_check();
}

#[test]
fn reorg_removes_no_longer_final_transactions() {
    let TestHarness {
        mut mempool,
        coins,
        chain,
        ..
    } = setup();

    let parent = spend_outpoint(confirmed_outpoint(&coins), 0, COIN_VALUE, TEST_FEE);
    let parent_id = parent.get_id();
    let child_value = (COIN_VALUE - TEST_FEE).unwrap();
    let child = spend_outpoint(OutPoint::new(parent_id, 0), 0, child_value, TEST_FEE);
    let child_id = child.get_id();
    mempool.add_transaction(parent, TxOptions::default()).unwrap().assert_in_mempool();
    mempool.add_transaction(child, TxOptions::default()).unwrap().assert_in_mempool();

    // After the reorg the parent is no longer final
    chain.set_non_final(parent_id);
    remove_for_reorg(&mut mempool);

    assert!(!mempool.contains_transaction(&parent_id));
    assert!(!mempool.contains_transaction(&child_id));
    mempool.force_check();
}

#[test]
fn reorg_refreshes_stale_lock_points() {
    let TestHarness {
        mut mempool,
        coins,
        chain,
        ..
    } = setup();

    let tx = spend_outpoint(confirmed_outpoint(&coins), 0, COIN_VALUE, TEST_FEE);
    let tx_id = tx.get_id();
    mempool.add_transaction(tx, TxOptions::default()).unwrap().assert_in_mempool();
    assert_eq!(
        mempool.store.get_entry(&tx_id).unwrap().lock_points().max_input_height,
        Some(BlockHeight::new(100))
    );

    // The tip moves below the cached lock points; they are invalid now but
    // the locks themselves still pass, so the entry survives with fresh
    // lock points
    chain.set_tip(99, H256::from_low_u64_be(99));
    remove_for_reorg(&mut mempool);

    assert!(mempool.contains_transaction(&tx_id));
    assert_eq!(
        mempool.store.get_entry(&tx_id).unwrap().lock_points().max_input_height,
        Some(BlockHeight::new(99))
    );
    mempool.force_check();
}
