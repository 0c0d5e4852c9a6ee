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

use crate::tx_accumulator::{DefaultTxAccumulator, TransactionAccumulator};

use super::*;

#[test]
fn collects_by_ancestor_feerate() {
    let TestHarness {
        mut mempool, coins, ..
    } = setup();

    let fees = [30_000u128, 90_000, 10_000].map(Amount::from_atoms);
    let ids: Vec<_> = fees
        .iter()
        .map(|fee| {
            let tx = spend_outpoint(confirmed_outpoint(&coins), 0, COIN_VALUE, *fee);
            let tx_id = tx.get_id();
            mempool.add_transaction(tx, TxOptions::default()).unwrap().assert_in_mempool();
            tx_id
        })
        .collect();

    let accumulator = mempool.collect_txs(Box::new(DefaultTxAccumulator::new(1_000_000)));
    let collected: Vec<_> = accumulator.transactions().iter().map(Idable::get_id).collect();

    // Best feerate first: 90k, 30k, 10k
    assert_eq!(collected, vec![ids[1], ids[0], ids[2]]);

    let expected_total = fees.into_iter().sum::<Option<Amount>>().unwrap();
    assert_eq!(accumulator.total_fees(), Fee::new(expected_total));
}

#[test]
fn high_fee_child_lifts_its_parent_package() {
    let TestHarness {
        mut mempool, coins, ..
    } = setup();

    // Parent pays the bare minimum, its child pays a lot; an unrelated
    // transaction sits in between the parent alone and the package
    let parent = spend_outpoint(confirmed_outpoint(&coins), 0, COIN_VALUE, Amount::from_atoms(200));
    let parent_id = parent.get_id();
    mempool.add_transaction(parent, TxOptions::default()).unwrap().assert_in_mempool();

    let child_value = (COIN_VALUE - Amount::from_atoms(200)).unwrap();
    let child = spend_outpoint(
        OutPoint::new(parent_id, 0),
        0,
        child_value,
        Amount::from_atoms(500_000),
    );
    let child_id = child.get_id();
    mempool.add_transaction(child, TxOptions::default()).unwrap().assert_in_mempool();

    let middle = spend_outpoint(confirmed_outpoint(&coins), 0, COIN_VALUE, Amount::from_atoms(50_000));
    let middle_id = middle.get_id();
    mempool.add_transaction(middle, TxOptions::default()).unwrap().assert_in_mempool();

    let accumulator = mempool.collect_txs(Box::new(DefaultTxAccumulator::new(1_000_000)));
    let collected: Vec<_> = accumulator.transactions().iter().map(Idable::get_id).collect();

    // The child's ancestor package feerate beats the unrelated middle
    // transaction, which in turn beats the parent on its own
    assert_eq!(collected, vec![child_id, middle_id, parent_id]);
}

#[test]
fn accumulator_stops_at_its_size_limit() {
    let TestHarness {
        mut mempool, coins, ..
    } = setup();

    let mut sizes = Vec::new();
    for fee in [90_000u128, 60_000, 30_000].map(Amount::from_atoms) {
        let tx = spend_outpoint(confirmed_outpoint(&coins), 0, COIN_VALUE, fee);
        sizes.push(tx.encoded_size());
        mempool.add_transaction(tx, TxOptions::default()).unwrap().assert_in_mempool();
    }

    // Room for the two best transactions only
    let limit = sizes[0] + sizes[1];
    let accumulator = mempool.collect_txs(Box::new(DefaultTxAccumulator::new(limit)));
    assert_eq!(accumulator.transactions().len(), 2);
    assert!(accumulator.done());
}
