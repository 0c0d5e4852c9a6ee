// Copyright (c) 2022-2023 RBB S.r.l
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

//! The multi-indexed transaction container and the package accountant that
//! keeps per-entry ancestor/descendant aggregates in sync with the graph.

use std::collections::{BTreeMap, BTreeSet};

use common::{
    chain::{Coin, OutPoint, Transaction},
    primitives::{Id, Rational, SignedAmount, H256},
};
use logging::log;
use utils::{ensure, newtype};

use crate::config::{ChainLimits, Time, MEMPOOL_HEIGHT};
use crate::error::ChainLimitsError;

use super::entry::TxMempoolEntry;
use super::fee::Fee;

newtype! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Ancestors(BTreeSet<Id<Transaction>>)
}

newtype! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Descendants(BTreeSet<Id<Transaction>>)
}

newtype! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Conflicts(BTreeSet<Id<Transaction>>)
}

/// Why an entry left the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MempoolRemovalReason {
    Expiry,
    SizeLimit,
    Reorg,
    Block,
    Conflict,
    Replaced,
    Manual,
}

// Eviction order: lowest descendant-package feerate first. Distinct
// fee/size pairs of equal value compare equal, which is exactly what a
// feerate ordering wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DescendantScore(pub Rational<u128>);

impl Ord for DescendantScore {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for DescendantScore {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AncestorScore(pub Rational<u128>);

impl Ord for AncestorScore {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for AncestorScore {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// Memory bookkeeping constants. These are estimates in the spirit of the
// usual malloc-overhead guesses; the exact numbers only need to be applied
// consistently between accounting and the consistency check.
const MAP_NODE_USAGE: usize = 15 * std::mem::size_of::<usize>();
const LINK_USAGE: usize = 32;

/// Container for in-pool transactions.
///
/// Four live orderings: by id (primary), by creation time, by descendant
/// package feerate, by ancestor package feerate. Every aggregate mutation
/// goes through [MempoolStore::modify_entry], which re-sorts the affected
/// secondary indices, so iterators over the score maps always observe keys
/// consistent with entry state.
#[derive(Debug)]
pub struct MempoolStore {
    pub(crate) txs_by_id: BTreeMap<Id<Transaction>, TxMempoolEntry>,
    pub(crate) txs_by_descendant_score: BTreeMap<DescendantScore, BTreeSet<Id<Transaction>>>,
    pub(crate) txs_by_ancestor_score: BTreeMap<AncestorScore, BTreeSet<Id<Transaction>>>,
    pub(crate) txs_by_creation_time: BTreeMap<Time, BTreeSet<Id<Transaction>>>,
    pub(crate) spender_txs: BTreeMap<OutPoint, Id<Transaction>>,

    // Flat (witness hash, id) sequence for bulk enumeration by relay code.
    // Compacted by swap-removal; each entry stores its position.
    witness_hashes: Vec<(H256, Id<Transaction>)>,

    total_tx_size: usize,
    cached_inner_usage: usize,
    transactions_updated: u64,
}

impl MempoolStore {
    pub fn new() -> Self {
        Self {
            txs_by_id: BTreeMap::new(),
            txs_by_descendant_score: BTreeMap::new(),
            txs_by_ancestor_score: BTreeMap::new(),
            txs_by_creation_time: BTreeMap::new(),
            spender_txs: BTreeMap::new(),
            witness_hashes: Vec::new(),
            total_tx_size: 0,
            cached_inner_usage: 0,
            transactions_updated: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.txs_by_id.is_empty()
    }

    pub fn len(&self) -> usize {
        self.txs_by_id.len()
    }

    pub fn contains(&self, tx_id: &Id<Transaction>) -> bool {
        self.txs_by_id.contains_key(tx_id)
    }

    pub fn get_entry(&self, tx_id: &Id<Transaction>) -> Option<&TxMempoolEntry> {
        self.txs_by_id.get(tx_id)
    }

    pub fn find_conflicting_tx(&self, outpoint: &OutPoint) -> Option<Id<Transaction>> {
        self.spender_txs.get(outpoint).copied()
    }

    pub fn is_spent(&self, outpoint: &OutPoint) -> bool {
        self.spender_txs.contains_key(outpoint)
    }

    /// The coin created by an in-pool transaction, given the virtual
    /// in-mempool height, if the outpoint refers to one.
    pub fn unconfirmed_coin(&self, outpoint: &OutPoint) -> Option<Coin> {
        self.txs_by_id.get(&outpoint.txid()).and_then(|entry| {
            entry
                .transaction()
                .outputs()
                .get(outpoint.index() as usize)
                .map(|output| Coin::new(output.clone(), MEMPOOL_HEIGHT, false))
        })
    }

    pub fn witness_hashes(&self) -> &[(H256, Id<Transaction>)] {
        &self.witness_hashes
    }

    pub fn total_tx_size(&self) -> usize {
        self.total_tx_size
    }

    pub fn transactions_updated(&self) -> u64 {
        self.transactions_updated
    }

    pub(crate) fn bump_transactions_updated(&mut self) {
        self.transactions_updated += 1;
    }

    /// Estimated heap usage of the whole container.
    pub fn dynamic_memory_usage(&self) -> usize {
        self.txs_by_id.len() * (std::mem::size_of::<TxMempoolEntry>() + MAP_NODE_USAGE)
            + self.spender_txs.len()
                * (std::mem::size_of::<(OutPoint, Id<Transaction>)>() + MAP_NODE_USAGE)
            + self.witness_hashes.len() * std::mem::size_of::<(H256, Id<Transaction>)>()
            + self.cached_inner_usage
    }

    /// Wipe all containers and counters.
    pub fn clear(&mut self) {
        self.txs_by_id.clear();
        self.txs_by_descendant_score.clear();
        self.txs_by_ancestor_score.clear();
        self.txs_by_creation_time.clear();
        self.spender_txs.clear();
        self.witness_hashes.clear();
        self.total_tx_size = 0;
        self.cached_inner_usage = 0;
        self.transactions_updated += 1;
    }
}

// Secondary index maintenance
impl MempoolStore {
    fn add_to_indices(&mut self, entry: &TxMempoolEntry) {
        let tx_id = *entry.tx_id();
        self.txs_by_descendant_score
            .entry(DescendantScore(entry.descendant_score()))
            .or_default()
            .insert(tx_id);
        self.txs_by_ancestor_score
            .entry(AncestorScore(entry.ancestor_score()))
            .or_default()
            .insert(tx_id);
        self.txs_by_creation_time
            .entry(entry.creation_time())
            .or_default()
            .insert(tx_id);
    }

    fn remove_from_indices(&mut self, entry: &TxMempoolEntry) {
        let tx_id = entry.tx_id();
        remove_from_bucket(
            &mut self.txs_by_descendant_score,
            DescendantScore(entry.descendant_score()),
            tx_id,
        );
        remove_from_bucket(
            &mut self.txs_by_ancestor_score,
            AncestorScore(entry.ancestor_score()),
            tx_id,
        );
        remove_from_bucket(
            &mut self.txs_by_creation_time,
            entry.creation_time(),
            tx_id,
        );
    }

    /// All in-place entry mutations go through here so the score indices are
    /// re-sorted atomically with the change. The closure must not change the
    /// creation time.
    pub(crate) fn modify_entry(
        &mut self,
        tx_id: &Id<Transaction>,
        modify: impl FnOnce(&mut TxMempoolEntry),
    ) {
        let entry = self.txs_by_id.get_mut(tx_id).expect("modify_entry: entry must exist");
        let old_descendant_score = DescendantScore(entry.descendant_score());
        let old_ancestor_score = AncestorScore(entry.ancestor_score());

        modify(entry);

        let new_descendant_score = DescendantScore(entry.descendant_score());
        let new_ancestor_score = AncestorScore(entry.ancestor_score());

        remove_from_bucket(
            &mut self.txs_by_descendant_score,
            old_descendant_score,
            tx_id,
        );
        self.txs_by_descendant_score
            .entry(new_descendant_score)
            .or_default()
            .insert(*tx_id);

        remove_from_bucket(&mut self.txs_by_ancestor_score, old_ancestor_score, tx_id);
        self.txs_by_ancestor_score.entry(new_ancestor_score).or_default().insert(*tx_id);
    }
}

fn remove_from_bucket<K: Ord>(
    map: &mut BTreeMap<K, BTreeSet<Id<Transaction>>>,
    key: K,
    tx_id: &Id<Transaction>,
) {
    let bucket = map.get_mut(&key).expect("index bucket must exist");
    assert!(bucket.remove(tx_id), "entry missing from secondary index");
    if bucket.is_empty() {
        map.remove(&key);
    }
}

// Link graph maintenance. Links never influence the score indices, so they
// are mutated directly; dynamic-usage accounting happens here.
impl MempoolStore {
    fn update_child(&mut self, entry_id: &Id<Transaction>, child: &Id<Transaction>, add: bool) {
        let entry =
            self.txs_by_id.get_mut(entry_id).expect("update_child: entry must exist");
        if add {
            if entry.children_mut().insert(*child) {
                self.cached_inner_usage += LINK_USAGE;
            }
        } else if entry.children_mut().remove(child) {
            self.cached_inner_usage -= LINK_USAGE;
        }
    }

    fn update_parent(&mut self, entry_id: &Id<Transaction>, parent: &Id<Transaction>, add: bool) {
        let entry =
            self.txs_by_id.get_mut(entry_id).expect("update_parent: entry must exist");
        if add {
            if entry.parents_mut().insert(*parent) {
                self.cached_inner_usage += LINK_USAGE;
            }
        } else if entry.parents_mut().remove(parent) {
            self.cached_inner_usage -= LINK_USAGE;
        }
    }
}

// The package accountant
impl MempoolStore {
    /// Collect the in-pool ancestors of `entry`, enforcing package limits.
    ///
    /// With `search_for_parents`, direct parents are discovered by looking
    /// the entry's inputs up in the pool, for candidates not yet inserted.
    /// Otherwise the entry's link set is authoritative; during a reorg the
    /// two notions diverge and the links are the correct one to use.
    pub fn calculate_mem_pool_ancestors(
        &self,
        entry: &TxMempoolEntry,
        limits: &ChainLimits,
        search_for_parents: bool,
    ) -> Result<Ancestors, ChainLimitsError> {
        let mut parent_work = if search_for_parents {
            let mut parents = BTreeSet::new();
            for input in entry.transaction().inputs() {
                let parent_id = input.outpoint().txid();
                if self.txs_by_id.contains_key(&parent_id) {
                    parents.insert(parent_id);
                    ensure!(
                        parents.len() + 1 <= limits.ancestor_count,
                        ChainLimitsError::TooManyParents(limits.ancestor_count)
                    );
                }
            }
            parents
        } else {
            self.txs_by_id
                .get(entry.tx_id())
                .expect("calculate_mem_pool_ancestors: entry must be in pool")
                .parents()
                .clone()
        };

        let mut ancestors = BTreeSet::new();
        let mut total_size_with_ancestors = entry.tx_size();

        while let Some(stage_id) = parent_work.pop_first() {
            let stage = self.txs_by_id.get(&stage_id).expect("ancestor must be in pool");
            ancestors.insert(stage_id);
            total_size_with_ancestors += stage.tx_size();

            ensure!(
                stage.size_with_descendants() + entry.tx_size()
                    <= limits.descendant_size_bytes,
                ChainLimitsError::DescendantSize(stage_id, limits.descendant_size_bytes)
            );
            ensure!(
                stage.count_with_descendants() + 1 <= limits.descendant_count,
                ChainLimitsError::TooManyDescendants(stage_id, limits.descendant_count)
            );
            ensure!(
                total_size_with_ancestors <= limits.ancestor_size_bytes,
                ChainLimitsError::AncestorSize(limits.ancestor_size_bytes)
            );

            for parent in stage.parents() {
                if !ancestors.contains(parent) {
                    parent_work.insert(*parent);
                }
                ensure!(
                    parent_work.len() + ancestors.len() + 1 <= limits.ancestor_count,
                    ChainLimitsError::TooManyAncestors(limits.ancestor_count)
                );
            }
        }

        Ok(Ancestors(ancestors))
    }

    /// The descendant closure of `tx_id`, self included. Never fails.
    pub fn calculate_descendants(&self, tx_id: &Id<Transaction>) -> Descendants {
        let mut descendants = BTreeSet::new();
        let mut stage = BTreeSet::from([*tx_id]);
        while let Some(current) = stage.pop_first() {
            descendants.insert(current);
            let entry = self.txs_by_id.get(&current).expect("descendant must be in pool");
            for child in entry.children() {
                if !descendants.contains(child) {
                    stage.insert(*child);
                }
            }
        }
        Descendants(descendants)
    }

    /// Insert a fully validated entry. `ancestors` must be the set computed
    /// by [Self::calculate_mem_pool_ancestors] for this entry.
    ///
    /// New entries are assumed to have no in-pool children; resurrected
    /// block transactions violate that assumption, which
    /// [Self::update_transactions_from_block] repairs afterwards.
    pub fn add_transaction(&mut self, mut entry: TxMempoolEntry, ancestors: &Ancestors) {
        let tx_id = *entry.tx_id();
        assert!(
            !self.txs_by_id.contains_key(&tx_id),
            "add_transaction: duplicate transaction"
        );
        log::trace!("store: adding transaction {tx_id}");

        // Set the entry's ancestor aggregates from the ancestor set
        let mut ancestor_size = 0usize;
        let mut ancestor_fees = Fee::ZERO;
        let mut ancestor_sigops = 0u64;
        for ancestor_id in ancestors.iter() {
            let ancestor = self.txs_by_id.get(ancestor_id).expect("ancestor must be in pool");
            ancestor_size += ancestor.tx_size();
            ancestor_fees = (ancestor_fees + ancestor.modified_fee())
                .expect("ancestor fee aggregate overflow");
            ancestor_sigops += ancestor.sig_op_cost();
        }
        entry.update_ancestor_state(
            ancestor_size as i64,
            fee_to_signed(ancestor_fees),
            ancestors.len() as i64,
            ancestor_sigops as i64,
        );

        // Direct in-pool parents, from the inputs
        let parent_ids: BTreeSet<Id<Transaction>> = entry
            .transaction()
            .inputs()
            .iter()
            .map(|input| input.outpoint().txid())
            .filter(|id| self.txs_by_id.contains_key(id))
            .collect();
        for parent_id in &parent_ids {
            if entry.parents_mut().insert(*parent_id) {
                self.cached_inner_usage += LINK_USAGE;
            }
        }

        self.cached_inner_usage += entry.dynamic_memory_usage();
        self.total_tx_size += entry.tx_size();
        self.transactions_updated += 1;

        for input in entry.transaction().inputs() {
            self.spender_txs.insert(*input.outpoint(), tx_id);
        }

        entry.witness_hash_index = self.witness_hashes.len();
        self.witness_hashes.push((entry.witness_hash(), tx_id));

        self.add_to_indices(&entry);
        self.txs_by_id.insert(tx_id, entry);

        // Register the new entry with its parents and propagate its
        // contribution to every ancestor's descendant aggregate
        for parent_id in &parent_ids {
            self.update_child(parent_id, &tx_id, true);
        }
        let (size, fee) = {
            let entry = self.txs_by_id.get(&tx_id).expect("just inserted");
            (entry.tx_size(), entry.modified_fee())
        };
        for ancestor_id in ancestors.iter() {
            self.modify_entry(ancestor_id, |ancestor| {
                ancestor.update_descendant_state(size as i64, fee_to_signed(fee), 1)
            });
        }
    }

    /// Remove a set of entries, unwinding their contributions from the
    /// aggregates of the entries that stay.
    ///
    /// `update_descendants` must be set when survivors may live below the
    /// removed entries (a transaction confirmed in a block leaves its
    /// children behind); it is false when whole subtrees go at once.
    pub fn remove_staged(
        &mut self,
        stage: &BTreeSet<Id<Transaction>>,
        update_descendants: bool,
        reason: MempoolRemovalReason,
    ) -> Vec<TxMempoolEntry> {
        self.update_for_remove_from_mempool(stage, update_descendants);
        stage
            .iter()
            .map(|tx_id| {
                log::trace!("store: removing transaction {tx_id} ({reason:?})");
                self.remove_unchecked(tx_id)
            })
            .collect()
    }

    fn update_for_remove_from_mempool(
        &mut self,
        stage: &BTreeSet<Id<Transaction>>,
        update_descendants: bool,
    ) {
        if update_descendants {
            for removed_id in stage {
                let removed = self.txs_by_id.get(removed_id).expect("staged entry must exist");
                let size = removed.tx_size() as i64;
                let fee = fee_to_signed(removed.modified_fee());
                let sigops = removed.sig_op_cost() as i64;
                let descendants = self.calculate_descendants(removed_id);
                for descendant_id in descendants.iter().filter(|id| *id != removed_id) {
                    self.modify_entry(descendant_id, |d| {
                        d.update_ancestor_state(
                            -size,
                            (-fee).expect("fee negation overflow"),
                            -1,
                            -sigops,
                        )
                    });
                }
            }
        }

        for removed_id in stage {
            let removed = self.txs_by_id.get(removed_id).expect("staged entry must exist");
            let size = removed.tx_size() as i64;
            let fee = fee_to_signed(removed.modified_fee());
            let parents: Vec<_> = removed.parents().iter().copied().collect();

            // The link graph, not a parent search, is authoritative here:
            // during a reorg resurrected parents are not linked up yet and
            // only the linked ancestors actually account for this entry.
            let ancestors = self
                .calculate_mem_pool_ancestors(removed, &ChainLimits::unlimited(), false)
                .expect("unlimited ancestor walk cannot fail");

            for parent_id in &parents {
                self.update_child(parent_id, removed_id, false);
            }
            for ancestor_id in ancestors.iter() {
                self.modify_entry(ancestor_id, |a| {
                    a.update_descendant_state(-size, (-fee).expect("fee negation overflow"), -1)
                });
            }
        }

        // Finally sever the parent links of surviving children
        for removed_id in stage {
            let children: Vec<_> = self
                .txs_by_id
                .get(removed_id)
                .expect("staged entry must exist")
                .children()
                .iter()
                .copied()
                .collect();
            for child_id in &children {
                self.update_parent(child_id, removed_id, false);
            }
        }
    }

    fn remove_unchecked(&mut self, tx_id: &Id<Transaction>) -> TxMempoolEntry {
        let entry = self.txs_by_id.remove(tx_id).expect("remove_unchecked: entry must exist");
        self.remove_from_indices(&entry);

        for input in entry.transaction().inputs() {
            self.spender_txs.remove(input.outpoint());
        }

        // Swap-remove from the witness hash sequence, fixing up the moved
        // element's back-pointer
        let index = entry.witness_hash_index;
        self.witness_hashes.swap_remove(index);
        if index < self.witness_hashes.len() {
            let moved_id = self.witness_hashes[index].1;
            self.txs_by_id
                .get_mut(&moved_id)
                .expect("moved witness hash refers to in-pool tx")
                .witness_hash_index = index;
        }

        self.total_tx_size = self
            .total_tx_size
            .checked_sub(entry.tx_size())
            .expect("total size accounting underflow");
        let residual_links = LINK_USAGE * (entry.parents().len() + entry.children().len());
        self.cached_inner_usage = self
            .cached_inner_usage
            .checked_sub(entry.dynamic_memory_usage() + residual_links)
            .expect("usage accounting underflow");
        self.transactions_updated += 1;
        entry
    }

    /// Stitch resurrected block transactions back together with the
    /// descendants they had before being mined.
    ///
    /// `tx_ids` lists the resurrected transactions in dependency order;
    /// admission assumed each had no in-pool children, so child links from
    /// pre-existing pool entries and the corresponding aggregates are
    /// missing. Iterating newest-first guarantees that by the time an entry
    /// is processed, all of its in-pool descendants have correct links.
    pub fn update_transactions_from_block(&mut self, tx_ids: &[Id<Transaction>]) {
        let already_included: BTreeSet<Id<Transaction>> = tx_ids.iter().copied().collect();

        for tx_id in tx_ids.iter().rev() {
            let n_outputs = match self.txs_by_id.get(tx_id) {
                Some(entry) => entry.transaction().outputs().len() as u32,
                None => continue,
            };

            let mut children = BTreeSet::new();
            for index in 0..n_outputs {
                let spender =
                    self.spender_txs.get(&OutPoint::new(*tx_id, index)).copied();
                if let Some(child_id) = spender {
                    if children.insert(child_id) && !already_included.contains(&child_id) {
                        self.update_child(tx_id, &child_id, true);
                        self.update_parent(&child_id, tx_id, true);
                    }
                }
            }

            self.update_for_descendants(tx_id, &already_included);
        }
    }

    // Credit `tx_id` to the ancestor aggregates of its (freshly linked)
    // descendants and fold their totals into its own descendant aggregate.
    // Entries in `exclude` were accounted for through the normal admission
    // path already.
    fn update_for_descendants(
        &mut self,
        tx_id: &Id<Transaction>,
        exclude: &BTreeSet<Id<Transaction>>,
    ) {
        let entry = self.txs_by_id.get(tx_id).expect("entry must be in pool");
        let self_size = entry.tx_size() as i64;
        let self_fee = fee_to_signed(entry.modified_fee());
        let self_sigops = entry.sig_op_cost() as i64;

        let descendants = self.calculate_descendants(tx_id);

        let mut total_size = 0i64;
        let mut total_fee = SignedAmount::ZERO;
        let mut total_count = 0i64;
        for descendant_id in descendants.iter().filter(|id| *id != tx_id) {
            if exclude.contains(descendant_id) {
                continue;
            }
            {
                let descendant =
                    self.txs_by_id.get(descendant_id).expect("descendant must be in pool");
                total_size += descendant.tx_size() as i64;
                total_fee = (total_fee + fee_to_signed(descendant.modified_fee()))
                    .expect("descendant fee sum overflow");
                total_count += 1;
            }
            self.modify_entry(descendant_id, |d| {
                d.update_ancestor_state(self_size, self_fee, 1, self_sigops)
            });
        }

        if total_count > 0 {
            self.modify_entry(tx_id, |e| {
                e.update_descendant_state(total_size, total_fee, total_count)
            });
        }
    }
}

fn fee_to_signed(fee: Fee) -> SignedAmount {
    fee.into_inner().into_signed().expect("fee does not fit signed amount")
}

// Consistency checking
impl MempoolStore {
    /// Verify every invariant of the container against a full recomputation.
    /// Panics on any mismatch; a failure here is a programming bug in the
    /// accountant, never a property of the transactions.
    pub fn assert_valid(&self) {
        let mut total_size = 0usize;
        let mut inner_usage = 0usize;

        for (tx_id, entry) in &self.txs_by_id {
            assert_eq!(tx_id, entry.tx_id());
            total_size += entry.tx_size();
            inner_usage += entry.dynamic_memory_usage()
                + LINK_USAGE * (entry.parents().len() + entry.children().len());

            // Parent links match the inputs
            let parent_check: BTreeSet<Id<Transaction>> = entry
                .transaction()
                .inputs()
                .iter()
                .map(|input| input.outpoint().txid())
                .filter(|id| self.txs_by_id.contains_key(id))
                .collect();
            assert_eq!(
                &parent_check,
                entry.parents(),
                "parent links of {tx_id} disagree with inputs"
            );

            for input in entry.transaction().inputs() {
                // Every input is registered in the spend index
                assert_eq!(self.spender_txs.get(input.outpoint()), Some(tx_id));
                // In-pool parents actually provide the spent output
                if let Some(parent) = self.txs_by_id.get(&input.outpoint().txid()) {
                    assert!(
                        (input.outpoint().index() as usize)
                            < parent.transaction().outputs().len()
                    );
                }
            }

            // Child links match the spend index over this entry's outputs
            let child_check: BTreeSet<Id<Transaction>> = (0..entry
                .transaction()
                .outputs()
                .len() as u32)
                .filter_map(|i| self.spender_txs.get(&OutPoint::new(*tx_id, i)).copied())
                .collect();
            assert_eq!(
                &child_check,
                entry.children(),
                "child links of {tx_id} disagree with spend index"
            );

            let child_sizes: usize = child_check
                .iter()
                .map(|id| self.txs_by_id.get(id).expect("child must be in pool").tx_size())
                .sum();
            assert!(entry.size_with_descendants() >= entry.tx_size() + child_sizes);

            // Ancestor aggregates agree with a full recomputation
            let ancestors = self
                .calculate_mem_pool_ancestors(entry, &ChainLimits::unlimited(), false)
                .expect("unlimited ancestor walk cannot fail");
            let mut count = 1usize;
            let mut size = entry.tx_size();
            let mut fees = entry.modified_fee();
            let mut sigops = entry.sig_op_cost();
            for ancestor_id in ancestors.iter() {
                let ancestor =
                    self.txs_by_id.get(ancestor_id).expect("ancestor must be in pool");
                count += 1;
                size += ancestor.tx_size();
                fees = (fees + ancestor.modified_fee()).expect("fee overflow");
                sigops += ancestor.sig_op_cost();
            }
            assert_eq!(entry.count_with_ancestors(), count);
            assert_eq!(entry.size_with_ancestors(), size);
            assert_eq!(entry.fees_with_ancestors(), fees);
            assert_eq!(entry.sig_op_cost_with_ancestors(), sigops);

            // Descendant aggregates agree with a full recomputation
            let descendants = self.calculate_descendants(tx_id);
            let mut count = 0usize;
            let mut size = 0usize;
            let mut fees = Fee::ZERO;
            for descendant_id in descendants.iter() {
                let descendant =
                    self.txs_by_id.get(descendant_id).expect("descendant must be in pool");
                count += 1;
                size += descendant.tx_size();
                fees = (fees + descendant.modified_fee()).expect("fee overflow");
            }
            assert_eq!(entry.count_with_descendants(), count);
            assert_eq!(entry.size_with_descendants(), size);
            assert_eq!(entry.fees_with_descendants(), fees);

            // Secondary index membership with up-to-date keys
            assert!(self
                .txs_by_descendant_score
                .get(&DescendantScore(entry.descendant_score()))
                .is_some_and(|bucket| bucket.contains(tx_id)));
            assert!(self
                .txs_by_ancestor_score
                .get(&AncestorScore(entry.ancestor_score()))
                .is_some_and(|bucket| bucket.contains(tx_id)));
            assert!(self
                .txs_by_creation_time
                .get(&entry.creation_time())
                .is_some_and(|bucket| bucket.contains(tx_id)));
        }

        // The spend index maps only actual spends of in-pool transactions
        for (outpoint, spender_id) in &self.spender_txs {
            let spender = self.txs_by_id.get(spender_id).expect("spender must be in pool");
            assert!(spender
                .transaction()
                .inputs()
                .iter()
                .any(|input| input.outpoint() == outpoint));
        }

        // Secondary indices hold exactly the pool's ids
        for index_size in [
            self.txs_by_descendant_score.values().map(BTreeSet::len).sum::<usize>(),
            self.txs_by_ancestor_score.values().map(BTreeSet::len).sum::<usize>(),
            self.txs_by_creation_time.values().map(BTreeSet::len).sum::<usize>(),
        ] {
            assert_eq!(index_size, self.txs_by_id.len());
        }

        // The dependency graph is acyclic: peeling entries whose parents
        // have all been peeled must eventually consume the whole pool
        let mut peeled: BTreeSet<Id<Transaction>> = BTreeSet::new();
        loop {
            let ready: Vec<Id<Transaction>> = self
                .txs_by_id
                .iter()
                .filter(|(id, entry)| {
                    !peeled.contains(id)
                        && entry.parents().iter().all(|parent| peeled.contains(parent))
                })
                .map(|(id, _)| *id)
                .collect();
            if ready.is_empty() {
                break;
            }
            peeled.extend(ready);
        }
        assert_eq!(
            peeled.len(),
            self.txs_by_id.len(),
            "dependency graph contains a cycle"
        );

        // Witness hash sequence is a bijection with correct back-pointers
        assert_eq!(self.witness_hashes.len(), self.txs_by_id.len());
        for (index, (witness_hash, tx_id)) in self.witness_hashes.iter().enumerate() {
            let entry = self.txs_by_id.get(tx_id).expect("witness hash refers to in-pool tx");
            assert_eq!(*witness_hash, entry.witness_hash());
            assert_eq!(entry.witness_hash_index, index);
        }

        assert_eq!(self.total_tx_size, total_size);
        assert_eq!(self.cached_inner_usage, inner_usage);
    }
}

impl Default for MempoolStore {
    fn default() -> Self {
        Self::new()
    }
}
