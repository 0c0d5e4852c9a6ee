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

//! Support for updating the mempool upon a reorg

use std::collections::BTreeSet;

use common::{chain::Transaction, primitives::Idable};
use logging::log;

use crate::config::COINBASE_MATURITY;
use crate::error::ReorgError;
use crate::event::NewTip;
use crate::interface::{ChainView, CoinsView, ConsensusChecker};
use crate::tx_options::TxOptions;
use crate::TxStatus;

use super::memory_usage_estimator::MemoryUsageEstimator;
use super::store::MempoolRemovalReason;
use super::utxo_view::MempoolCoinsView;
use super::Mempool;

/// Make the pool consistent again after a reorg.
///
/// `disconnected` holds the transactions of the disconnected blocks in the
/// order they were queued during disconnection, i.e. newest block first.
/// They are re-admitted oldest block first, so parents always precede their
/// children. Anything that fails re-admission (or everything, when
/// `add_back` is false) is recursively erased together with the dependents
/// it leaves orphaned.
pub fn update_mempool_for_reorg<C, V, M>(
    mempool: &mut Mempool<C, V, M>,
    disconnected: Vec<Transaction>,
    add_back: bool,
) -> Result<(), ReorgError>
where
    C: ChainView + ConsensusChecker,
    V: CoinsView,
    M: MemoryUsageEstimator,
{
    let mut resurrected = Vec::new();

    for tx in disconnected.into_iter().rev() {
        let tx_id = tx.get_id();
        let re_admitted = add_back
            && !tx.is_coinbase()
            && matches!(
                mempool.add_transaction(tx.clone(), TxOptions::default_resurrected()),
                Ok(TxStatus::InMempool)
            );

        if !re_admitted {
            mempool.remove_recursive(&tx, MempoolRemovalReason::Reorg);
        } else if mempool.contains_transaction(&tx_id) {
            resurrected.push(tx_id);
        }
    }

    // Re-admission assumed the resurrected transactions have no in-pool
    // children, which is false for anything that already had descendants in
    // the pool before it was mined. Stitch those links back.
    mempool.update_transactions_from_block(&resurrected);

    remove_for_reorg(mempool);

    mempool.limit_mempool_size()?;
    mempool.check();

    let tip_hash = mempool.chain_state.tip_hash();
    let tip_height = mempool.chain_state.tip_height();
    mempool.events_controller.broadcast(NewTip::new(tip_hash, tip_height).into());

    Ok(())
}

/// Drop transactions that the new chain makes invalid: no-longer-final ones,
/// those whose relative lock times stopped being satisfied, and spenders of
/// coinbases that are immature again. Stale lock points of surviving entries
/// are refreshed.
pub fn remove_for_reorg<C, V, M>(mempool: &mut Mempool<C, V, M>)
where
    C: ChainView + ConsensusChecker,
    V: CoinsView,
    M: MemoryUsageEstimator,
{
    let spend_height = mempool.chain_state.spend_height();
    let tx_ids: Vec<_> = mempool.store.txs_by_id.keys().copied().collect();

    let mut to_remove = BTreeSet::new();
    let mut lock_point_updates = Vec::new();

    for tx_id in tx_ids {
        let entry = mempool.store.get_entry(&tx_id).expect("iterating the pool's own ids");
        let lock_points = *entry.lock_points();
        let valid_lock_points = mempool.chain_state.test_lock_point_validity(&lock_points);

        let view = MempoolCoinsView::new(&mempool.utxo_view, &mempool.store);
        let tx = entry.transaction();
        let sequence_locks = mempool.chain_state.check_sequence_locks(
            tx,
            &view,
            valid_lock_points.then_some(&lock_points),
        );

        if !mempool.chain_state.is_final_tx(tx) || sequence_locks.is_none() {
            // The lock points may be stale too, so the entry goes, not the
            // lock points
            to_remove.insert(tx_id);
        } else if entry.spends_coinbase() {
            for input in tx.inputs() {
                if mempool.store.contains(&input.outpoint().txid()) {
                    continue;
                }
                let immature = match mempool.utxo_view.lookup(input.outpoint()) {
                    None => true,
                    Some(coin) => {
                        coin.is_coinbase()
                            && spend_height
                                .distance_since(coin.height())
                                .map_or(true, |depth| depth < COINBASE_MATURITY)
                    }
                };
                if immature {
                    to_remove.insert(tx_id);
                    break;
                }
            }
        }

        if !valid_lock_points {
            if let Some(new_lock_points) = sequence_locks {
                lock_point_updates.push((tx_id, new_lock_points));
            }
        }
    }

    for (tx_id, lock_points) in lock_point_updates {
        if !to_remove.contains(&tx_id) {
            mempool.store.modify_entry(&tx_id, |entry| entry.update_lock_points(lock_points));
        }
    }

    let mut stage = BTreeSet::new();
    for tx_id in &to_remove {
        log::trace!("Removing {tx_id} after reorg");
        stage.extend(BTreeSet::from(mempool.store.calculate_descendants(tx_id)));
    }
    if !stage.is_empty() {
        let removed = mempool.store.remove_staged(&stage, false, MempoolRemovalReason::Reorg);
        mempool.notify_removed(&removed, MempoolRemovalReason::Reorg);
    }
}
