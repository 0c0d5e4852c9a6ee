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

use std::collections::BTreeSet;

use common::{
    chain::{transaction::WITNESS_SCALE_FACTOR, Transaction, MAX_BIP125_RBF_SEQUENCE},
    primitives::{BlockHeight, Id, Idable, Rational, SignedAmount, H256},
};

use crate::config::{Time, BYTES_PER_SIGOP};
use crate::interface::LockPoints;

use super::fee::Fee;

/// A transaction resident in the pool, together with the package aggregates
/// over its in-pool ancestors and descendants.
///
/// The aggregates and the parent/child link sets are only ever mutated by
/// [super::store::MempoolStore], which keeps them consistent with the
/// dependency graph as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxMempoolEntry {
    transaction: Transaction,
    tx_id: Id<Transaction>,
    witness_hash: H256,
    fee: Fee,
    creation_time: Time,
    entry_height: BlockHeight,
    weight: usize,
    sig_op_cost: u64,
    spends_coinbase: bool,
    lock_points: LockPoints,
    fee_delta: SignedAmount,

    parents: BTreeSet<Id<Transaction>>,
    children: BTreeSet<Id<Transaction>>,

    count_with_descendants: usize,
    size_with_descendants: usize,
    fees_with_descendants: Fee,

    count_with_ancestors: usize,
    size_with_ancestors: usize,
    fees_with_ancestors: Fee,
    sig_op_cost_with_ancestors: u64,

    // Position in the store's flat witness-hash sequence; maintained by the
    // store on insertion and swap-removal.
    pub(super) witness_hash_index: usize,
}

#[allow(clippy::too_many_arguments)]
impl TxMempoolEntry {
    pub fn new(
        transaction: Transaction,
        fee: Fee,
        creation_time: Time,
        entry_height: BlockHeight,
        sig_op_cost: u64,
        spends_coinbase: bool,
        lock_points: LockPoints,
        fee_delta: SignedAmount,
    ) -> Self {
        let tx_id = transaction.get_id();
        let witness_hash = transaction.witness_hash();
        let weight = transaction.weight();

        let mut entry = Self {
            transaction,
            tx_id,
            witness_hash,
            fee,
            creation_time,
            entry_height,
            weight,
            sig_op_cost,
            spends_coinbase,
            lock_points,
            fee_delta: SignedAmount::ZERO,
            parents: BTreeSet::new(),
            children: BTreeSet::new(),
            count_with_descendants: 1,
            size_with_descendants: 0,
            fees_with_descendants: fee,
            count_with_ancestors: 1,
            size_with_ancestors: 0,
            fees_with_ancestors: fee,
            sig_op_cost_with_ancestors: sig_op_cost,
            witness_hash_index: usize::MAX,
        };
        entry.size_with_descendants = entry.tx_size();
        entry.size_with_ancestors = entry.tx_size();
        entry.update_fee_delta(fee_delta);
        entry
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn tx_id(&self) -> &Id<Transaction> {
        &self.tx_id
    }

    pub fn witness_hash(&self) -> H256 {
        self.witness_hash
    }

    pub fn fee(&self) -> Fee {
        self.fee
    }

    /// Base fee adjusted by the operator-supplied prioritisation delta.
    pub fn modified_fee(&self) -> Fee {
        self.fee.saturating_add_signed(self.fee_delta)
    }

    pub fn fee_delta(&self) -> SignedAmount {
        self.fee_delta
    }

    pub fn creation_time(&self) -> Time {
        self.creation_time
    }

    pub fn entry_height(&self) -> BlockHeight {
        self.entry_height
    }

    pub fn sig_op_cost(&self) -> u64 {
        self.sig_op_cost
    }

    pub fn spends_coinbase(&self) -> bool {
        self.spends_coinbase
    }

    pub fn lock_points(&self) -> &LockPoints {
        &self.lock_points
    }

    /// Virtual size: weight normalized by the witness discount, with a floor
    /// proportional to the sig-op cost so that sig-op-heavy transactions
    /// cannot pay for less space than they consume in a block.
    pub fn tx_size(&self) -> usize {
        let sigop_weight = (self.sig_op_cost * BYTES_PER_SIGOP) as usize;
        (std::cmp::max(self.weight, sigop_weight) + WITNESS_SCALE_FACTOR - 1)
            / WITNESS_SCALE_FACTOR
    }

    /// Heap footprint attributable to this entry, excluding link sets.
    pub fn dynamic_memory_usage(&self) -> usize {
        self.transaction.encoded_size()
    }

    /// Opt-in replaceability: every input must signal it.
    pub fn is_replaceable(&self) -> bool {
        self.transaction
            .inputs()
            .iter()
            .all(|input| input.sequence() <= MAX_BIP125_RBF_SEQUENCE)
    }

    pub fn parents(&self) -> &BTreeSet<Id<Transaction>> {
        &self.parents
    }

    pub fn children(&self) -> &BTreeSet<Id<Transaction>> {
        &self.children
    }

    pub(super) fn parents_mut(&mut self) -> &mut BTreeSet<Id<Transaction>> {
        &mut self.parents
    }

    pub(super) fn children_mut(&mut self) -> &mut BTreeSet<Id<Transaction>> {
        &mut self.children
    }

    pub fn count_with_descendants(&self) -> usize {
        self.count_with_descendants
    }

    pub fn size_with_descendants(&self) -> usize {
        self.size_with_descendants
    }

    pub fn fees_with_descendants(&self) -> Fee {
        self.fees_with_descendants
    }

    pub fn count_with_ancestors(&self) -> usize {
        self.count_with_ancestors
    }

    pub fn size_with_ancestors(&self) -> usize {
        self.size_with_ancestors
    }

    pub fn fees_with_ancestors(&self) -> Fee {
        self.fees_with_ancestors
    }

    pub fn sig_op_cost_with_ancestors(&self) -> u64 {
        self.sig_op_cost_with_ancestors
    }

    /// Eviction key: feerate of the whole descendant package.
    pub fn descendant_score(&self) -> Rational<u128> {
        Rational::new(
            self.fees_with_descendants.into_inner().into_atoms(),
            self.size_with_descendants as u128,
        )
    }

    /// Block-building key: feerate of the whole ancestor package.
    pub fn ancestor_score(&self) -> Rational<u128> {
        Rational::new(
            self.fees_with_ancestors.into_inner().into_atoms(),
            self.size_with_ancestors as u128,
        )
    }

    /// Feerate of this transaction alone, by modified fee.
    pub fn modified_fee_rate(&self) -> Rational<u128> {
        Rational::new(
            self.modified_fee().into_inner().into_atoms(),
            self.tx_size() as u128,
        )
    }

    /// Replace the prioritisation delta, keeping both package fee aggregates
    /// in sync with the change.
    pub(super) fn update_fee_delta(&mut self, new_delta: SignedAmount) {
        let diff = (new_delta - self.fee_delta).expect("fee delta diff overflow");
        self.fees_with_descendants = self.fees_with_descendants.saturating_add_signed(diff);
        self.fees_with_ancestors = self.fees_with_ancestors.saturating_add_signed(diff);
        self.fee_delta = new_delta;
    }

    pub(super) fn update_lock_points(&mut self, lock_points: LockPoints) {
        self.lock_points = lock_points;
    }

    /// Apply a signed delta to the descendant aggregates. Driving the count
    /// or size negative means the accountant over-subtracted, which is a bug.
    pub(super) fn update_descendant_state(
        &mut self,
        size_delta: i64,
        fee_delta: SignedAmount,
        count_delta: i64,
    ) {
        self.size_with_descendants = apply_delta(self.size_with_descendants, size_delta);
        assert!(self.size_with_descendants > 0);
        self.count_with_descendants = apply_delta(self.count_with_descendants, count_delta);
        assert!(self.count_with_descendants > 0);
        self.fees_with_descendants = self
            .fees_with_descendants
            .add_signed(fee_delta)
            .expect("descendant fee aggregate out of range");
    }

    /// Apply a signed delta to the ancestor aggregates.
    pub(super) fn update_ancestor_state(
        &mut self,
        size_delta: i64,
        fee_delta: SignedAmount,
        count_delta: i64,
        sig_ops_delta: i64,
    ) {
        self.size_with_ancestors = apply_delta(self.size_with_ancestors, size_delta);
        assert!(self.size_with_ancestors > 0);
        self.count_with_ancestors = apply_delta(self.count_with_ancestors, count_delta);
        assert!(self.count_with_ancestors > 0);
        self.fees_with_ancestors = self
            .fees_with_ancestors
            .add_signed(fee_delta)
            .expect("ancestor fee aggregate out of range");
        self.sig_op_cost_with_ancestors =
            apply_delta(self.sig_op_cost_with_ancestors as usize, sig_ops_delta) as u64;
    }
}

fn apply_delta(value: usize, delta: i64) -> usize {
    let result = if delta >= 0 {
        value.checked_add(delta as usize)
    } else {
        value.checked_sub(delta.unsigned_abs() as usize)
    };
    result.expect("package aggregate over-subtracted")
}
