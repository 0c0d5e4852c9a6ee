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

//! Interfaces the mempool consumes. The pool itself never inspects scripts
//! or the chain database; everything it needs is reached through the traits
//! in this module.

use common::{
    chain::{Coin, OutPoint, Transaction},
    primitives::{BlockHeight, Id, H256},
};
use thiserror::Error;

use crate::pool::entry::TxMempoolEntry;

pub type ScriptVerifyFlags = u32;

pub const SCRIPT_VERIFY_P2SH: ScriptVerifyFlags = 1 << 0;
pub const SCRIPT_VERIFY_DERSIG: ScriptVerifyFlags = 1 << 2;
pub const SCRIPT_VERIFY_CLEANSTACK: ScriptVerifyFlags = 1 << 8;
pub const SCRIPT_VERIFY_WITNESS: ScriptVerifyFlags = 1 << 11;

pub const MANDATORY_SCRIPT_VERIFY_FLAGS: ScriptVerifyFlags = SCRIPT_VERIFY_P2SH;

pub const STANDARD_SCRIPT_VERIFY_FLAGS: ScriptVerifyFlags = MANDATORY_SCRIPT_VERIFY_FLAGS
    | SCRIPT_VERIFY_DERSIG
    | SCRIPT_VERIFY_CLEANSTACK
    | SCRIPT_VERIFY_WITNESS;

/// A failed consensus or standardness check, with the reason tag the check
/// produced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct CheckError {
    pub reason: String,
}

impl CheckError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Read access to the confirmed utxo set, usually backed by an in-memory
/// cache over the chain database.
pub trait CoinsView {
    fn lookup(&self, outpoint: &OutPoint) -> Option<Coin>;

    /// Whether the outpoint is already present in the cache layer. Used to
    /// decide which lookups must be rolled back on failed admission.
    fn have_in_cache(&self, outpoint: &OutPoint) -> bool;

    /// Drop an entry from the cache layer, if present.
    fn uncache(&self, outpoint: &OutPoint);
}

/// Cached data for re-validating relative lock times after a reorg without
/// recomputing them from the utxo set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPoints {
    pub height: BlockHeight,
    pub time: i64,
    /// Height of the newest block providing an input, if the lock points
    /// were computed against a specific chain.
    pub max_input_height: Option<BlockHeight>,
}

impl Default for LockPoints {
    fn default() -> Self {
        Self {
            height: BlockHeight::zero(),
            time: 0,
            max_input_height: None,
        }
    }
}

/// The active chain as seen by the mempool.
pub trait ChainView {
    fn tip_height(&self) -> BlockHeight;

    fn tip_hash(&self) -> H256;

    /// Whether witness commitments are enforced at the current tip.
    fn is_witness_enabled(&self) -> bool;

    /// Script flags the next block will be validated with.
    fn tip_script_flags(&self) -> ScriptVerifyFlags;

    /// Whether the node is synced far enough for its mempool traffic to be a
    /// meaningful input to fee estimation.
    fn is_current_for_fee_estimation(&self) -> bool;

    /// Height at which a transaction accepted now would be mined.
    fn spend_height(&self) -> BlockHeight {
        self.tip_height().next_height()
    }
}

/// Transaction, script, and lock-time validation primitives.
///
/// Implementations hold whatever chain context they need; the pool only
/// supplies the transaction and a coin view resolving its inputs.
pub trait ConsensusChecker {
    /// Context-free structural and value-range checks.
    fn check_transaction(&self, tx: &Transaction) -> Result<(), CheckError>;

    /// Standardness of the transaction shape (policy, not consensus).
    fn is_standard(&self, tx: &Transaction) -> Result<(), CheckError>;

    /// Whether the transaction is final for the next block under standard
    /// lock-time flags.
    fn is_final_tx(&self, tx: &Transaction) -> bool;

    /// Evaluate BIP68-style relative lock times against the given view.
    /// Returns the lock points to cache, or `None` when the locks are not
    /// satisfied. `use_existing` skips recomputation when the cached points
    /// are still valid.
    fn check_sequence_locks(
        &self,
        tx: &Transaction,
        view: &dyn CoinsView,
        use_existing: Option<&LockPoints>,
    ) -> Option<LockPoints>;

    /// Whether cached lock points are still meaningful on the current chain.
    fn test_lock_point_validity(&self, lock_points: &LockPoints) -> bool;

    /// Standardness of the scripts consumed by the inputs.
    fn are_inputs_standard(&self, tx: &Transaction, view: &dyn CoinsView) -> bool;

    /// Standardness of the witness data.
    fn is_witness_standard(&self, tx: &Transaction, view: &dyn CoinsView) -> bool;

    /// Signature-operation cost of the transaction under the given flags.
    fn sig_op_cost(
        &self,
        tx: &Transaction,
        view: &dyn CoinsView,
        flags: ScriptVerifyFlags,
    ) -> u64;

    /// Full input and script verification under the given flags.
    fn check_inputs(
        &self,
        tx: &Transaction,
        view: &dyn CoinsView,
        flags: ScriptVerifyFlags,
    ) -> Result<(), CheckError>;
}

/// Observer fed by the pool so that the node can estimate feerates from
/// mempool flow. Must not call back into the pool.
pub trait FeeEstimator {
    fn process_transaction(&mut self, entry: &TxMempoolEntry, valid_for_estimation: bool);

    fn process_block(&mut self, height: BlockHeight, entries: &[&TxMempoolEntry]);

    fn remove_tx(&mut self, tx_id: Id<Transaction>, in_block: bool);
}
