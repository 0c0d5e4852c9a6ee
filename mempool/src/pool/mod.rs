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

//! The unconfirmed transaction pool.
//!
//! [Mempool] is a synchronous data structure: the embedding node serializes
//! access behind a single coarse lock and may farm the expensive consensus
//! script checks out to worker threads, but nothing here suspends. Event
//! handlers run under that same lock and must not re-enter the pool.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use parking_lot::RwLock;
use randomness::Rng;

use common::{
    chain::{OutPoint, Transaction, TxOutput},
    primitives::{Amount, BlockHeight, Id, Idable, SignedAmount, H256},
};
use logging::log;
use utils::{ensure, eventhandler::EventsController, tap_error_log::LogError};

use crate::config::{
    ChainLimits, MempoolConfig, MempoolMaxSize, Time, MAX_BIP125_REPLACEMENT_CANDIDATES,
    MAX_STANDARD_TX_SIGOPS_COST, ROLLING_FEE_BASE_HALFLIFE, ROLLING_FEE_DECAY_INTERVAL,
};
use crate::error::{Error, MempoolConflictError, MempoolPolicyError, TxValidationError};
use crate::event::{MempoolEvent, NewTip, TransactionAdded, TransactionRemoved, TransactionReplaced};
use crate::feerate::FeeRate;
use crate::interface::{
    ChainView, CheckError, CoinsView, ConsensusChecker, FeeEstimator,
    MANDATORY_SCRIPT_VERIFY_FLAGS, SCRIPT_VERIFY_CLEANSTACK, SCRIPT_VERIFY_WITNESS,
    STANDARD_SCRIPT_VERIFY_FLAGS, ScriptVerifyFlags,
};
use crate::tx_accumulator::TransactionAccumulator;
use crate::tx_options::TxOptions;
use crate::TxStatus;

use common::time_getter::TimeGetter;

use self::entry::TxMempoolEntry;
use self::fee::Fee;
use self::rolling_fee_rate::RollingFeeRate;
use self::store::{Ancestors, Conflicts, MempoolStore};

pub mod entry;
pub mod fee;
pub mod memory_usage_estimator;
mod reorg;
mod rolling_fee_rate;
mod store;
mod utxo_view;

pub use memory_usage_estimator::{MemoryUsageEstimator, StoreMemoryUsageEstimator};
pub use reorg::{remove_for_reorg, update_mempool_for_reorg};
pub use store::MempoolRemovalReason;
pub use utxo_view::MempoolCoinsView;

#[cfg(test)]
mod tests;

/// Per-transaction information handed out to relay and RPC code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxMempoolInfo {
    pub tx: Transaction,
    pub creation_time: Time,
    pub fee_rate: FeeRate,
    pub fee_delta: SignedAmount,
}

impl From<&TxMempoolEntry> for TxMempoolInfo {
    fn from(entry: &TxMempoolEntry) -> Self {
        let size = NonZeroUsize::new(entry.tx_size()).expect("transaction size is non-zero");
        Self {
            tx: entry.transaction().clone(),
            creation_time: entry.creation_time(),
            fee_rate: FeeRate::from_total_tx_fee(entry.fee(), size)
                .expect("feerate of an accepted entry is representable"),
            fee_delta: entry.fee_delta(),
        }
    }
}

pub struct Mempool<C, V, M> {
    config: MempoolConfig,
    store: MempoolStore,
    rolling_fee_rate: RwLock<RollingFeeRate>,
    chain_state: C,
    utxo_view: V,
    clock: TimeGetter,
    memory_usage_estimator: M,
    fee_estimator: Option<Box<dyn FeeEstimator>>,
    events_controller: EventsController<MempoolEvent>,
    map_deltas: std::collections::BTreeMap<Id<Transaction>, SignedAmount>,
}

impl<C, V, M> std::fmt::Debug for Mempool<C, V, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.store)
    }
}

// Construction and basic accessors
impl<C, V, M> Mempool<C, V, M> {
    pub fn new(
        config: MempoolConfig,
        chain_state: C,
        utxo_view: V,
        clock: TimeGetter,
        memory_usage_estimator: M,
    ) -> Self {
        log::trace!("Creating mempool object");
        Self {
            rolling_fee_rate: RwLock::new(RollingFeeRate::new(clock.get_time())),
            config,
            store: MempoolStore::new(),
            chain_state,
            utxo_view,
            clock,
            memory_usage_estimator,
            fee_estimator: None,
            events_controller: Default::default(),
            map_deltas: Default::default(),
        }
    }

    pub fn set_fee_estimator(&mut self, estimator: Box<dyn FeeEstimator>) {
        self.fee_estimator = Some(estimator);
    }

    pub fn subscribe_to_events(&mut self, handler: Arc<dyn Fn(MempoolEvent) + Send + Sync>) {
        self.events_controller.subscribe_to_events(handler)
    }

    pub fn config(&self) -> &MempoolConfig {
        &self.config
    }

    pub fn max_size(&self) -> MempoolMaxSize {
        self.config.max_size
    }
}

// Simple queries
impl<C, V, M> Mempool<C, V, M> {
    pub fn contains_transaction(&self, tx_id: &Id<Transaction>) -> bool {
        self.store.contains(tx_id)
    }

    pub fn get(&self, tx_id: &Id<Transaction>) -> Option<Transaction> {
        self.store.get_entry(tx_id).map(|entry| entry.transaction().clone())
    }

    pub fn info(&self, tx_id: &Id<Transaction>) -> Option<TxMempoolInfo> {
        self.store.get_entry(tx_id).map(TxMempoolInfo::from)
    }

    pub fn info_all(&self) -> Vec<TxMempoolInfo> {
        self.sorted_by_depth_and_score().into_iter().map(TxMempoolInfo::from).collect()
    }

    /// All txids, most relay-worthy first: fewest unconfirmed ancestors,
    /// then higher feerate.
    pub fn query_hashes(&self) -> Vec<Id<Transaction>> {
        self.sorted_by_depth_and_score().into_iter().map(|entry| *entry.tx_id()).collect()
    }

    /// Relay ordering predicate: does `a` sort before `b`? Transactions not
    /// in the pool sort last.
    pub fn compare_depth_and_score(&self, a: &Id<Transaction>, b: &Id<Transaction>) -> bool {
        let entry_a = match self.store.get_entry(a) {
            Some(entry) => entry,
            None => return false,
        };
        let entry_b = match self.store.get_entry(b) {
            Some(entry) => entry,
            None => return true,
        };
        depth_and_score_cmp(entry_a, entry_b).is_lt()
    }

    fn sorted_by_depth_and_score(&self) -> Vec<&TxMempoolEntry> {
        let mut entries: Vec<&TxMempoolEntry> = self.store.txs_by_id.values().collect();
        entries.sort_by(|a, b| depth_and_score_cmp(a, b));
        entries
    }

    /// Flat (witness hash, txid) sequence for bulk relay enumeration.
    pub fn witness_hashes(&self) -> &[(H256, Id<Transaction>)] {
        self.store.witness_hashes()
    }

    pub fn is_spent(&self, outpoint: &OutPoint) -> bool {
        self.store.is_spent(outpoint)
    }

    /// True when no input of `tx` spends an in-pool output.
    pub fn has_no_inputs_of(&self, tx: &Transaction) -> bool {
        tx.inputs().iter().all(|input| !self.store.contains(&input.outpoint().txid()))
    }

    /// Whether the transaction's packages stay strictly below `chain_limit`
    /// on both sides. Missing transactions trivially satisfy any limit.
    pub fn transaction_within_chain_limit(
        &self,
        tx_id: &Id<Transaction>,
        chain_limit: usize,
    ) -> bool {
        self.store.get_entry(tx_id).map_or(true, |entry| {
            entry.count_with_ancestors() < chain_limit
                && entry.count_with_descendants() < chain_limit
        })
    }

    pub fn transactions_updated(&self) -> u64 {
        self.store.transactions_updated()
    }

    pub fn total_tx_size(&self) -> usize {
        self.store.total_tx_size()
    }
}

fn depth_and_score_cmp(a: &TxMempoolEntry, b: &TxMempoolEntry) -> std::cmp::Ordering {
    a.count_with_ancestors()
        .cmp(&b.count_with_ancestors())
        .then_with(|| b.modified_fee_rate().cmp(&a.modified_fee_rate()))
        .then_with(|| a.tx_id().cmp(b.tx_id()))
}

// Rolling-fee state
impl<C, V, M: MemoryUsageEstimator> Mempool<C, V, M> {
    pub fn memory_usage(&self) -> usize {
        self.memory_usage_estimator.estimate_memory_usage(&self.store)
    }

    fn rolling_fee_halflife(&self, size_limit: usize) -> Time {
        let mem_usage = self.memory_usage();
        if mem_usage < size_limit / 4 {
            ROLLING_FEE_BASE_HALFLIFE / 4
        } else if mem_usage < size_limit / 2 {
            ROLLING_FEE_BASE_HALFLIFE / 2
        } else {
            ROLLING_FEE_BASE_HALFLIFE
        }
    }

    /// The feerate floor a transaction must clear to enter the pool, with
    /// time-based decay applied on query.
    pub fn get_min_fee(&self, size_limit: usize) -> FeeRate {
        let rolling = *self.rolling_fee_rate.read();
        if !rolling.block_since_last_rolling_fee_bump()
            || rolling.rolling_minimum_fee_rate() == FeeRate::new(Amount::ZERO)
        {
            return rolling.rolling_minimum_fee_rate();
        }

        let now = self.clock.get_time();
        if now > rolling.last_rolling_fee_update() + ROLLING_FEE_DECAY_INTERVAL {
            let halflife = self.rolling_fee_halflife(size_limit);
            let mut rolling = self.rolling_fee_rate.write();
            *rolling = rolling.decay_fee(halflife, now);

            let threshold = FeeRate::new(Amount::from_atoms(
                self.config.incremental_relay_fee_rate.atoms_per_kb() / 2,
            ));
            if rolling.rolling_minimum_fee_rate() < threshold {
                log::trace!(
                    "rolling fee rate {:?} below half the incremental relay fee, dropping to zero",
                    rolling.rolling_minimum_fee_rate(),
                );
                rolling.set_rolling_minimum_fee_rate(FeeRate::new(Amount::ZERO));
                return FeeRate::new(Amount::ZERO);
            }
        }

        std::cmp::max(
            self.rolling_fee_rate.read().rolling_minimum_fee_rate(),
            self.config.incremental_relay_fee_rate,
        )
    }

    fn get_update_min_fee_rate(&self) -> FeeRate {
        self.get_min_fee(self.config.max_size.as_bytes())
    }

    fn update_min_fee_rate(&self, rate: FeeRate) {
        let mut rolling = self.rolling_fee_rate.write();
        rolling.set_rolling_minimum_fee_rate(rate);
        rolling.set_block_since_last_rolling_fee_bump(false);
    }

    fn drop_rolling_fee(&self) {
        self.rolling_fee_rate.write().set_rolling_minimum_fee_rate(FeeRate::new(Amount::ZERO));
    }

    // Raise the floor to the feerate of an evicted package, plus the
    // incremental relay fee, so re-submissions must actually pay more.
    fn track_package_removed(&self, rate: FeeRate) {
        if rate > self.rolling_fee_rate.read().rolling_minimum_fee_rate() {
            self.update_min_fee_rate(rate);
        }
    }
}

/// Result of validating a candidate transaction
enum ValidationOutcome {
    /// Valid for insertion, possibly displacing a set of conflicts
    Valid {
        entry: TxMempoolEntry,
        ancestors: Ancestors,
        replacement: ReplacementInfo,
    },

    /// Some inputs are unknown; the candidate may be an orphan whose
    /// parents simply have not arrived yet. Not an error and no state was
    /// changed.
    MissingInputs,
}

/// What a replacement is about to evict
struct ReplacementInfo {
    is_replacement: bool,
    all_conflicting: BTreeSet<Id<Transaction>>,
    conflict_fees: Fee,
}

impl ReplacementInfo {
    fn no_replacement() -> Self {
        Self {
            is_replacement: false,
            all_conflicting: BTreeSet::new(),
            conflict_fees: Fee::ZERO,
        }
    }
}

// The admission pipeline
impl<C, V, M> Mempool<C, V, M>
where
    C: ChainView + ConsensusChecker,
    V: CoinsView,
    M: MemoryUsageEstimator,
{
    /// Try to accept a transaction into the pool.
    ///
    /// On rejection no state is retained; in particular, coins pulled into
    /// the utxo cache while resolving inputs are uncached again.
    pub fn add_transaction(
        &mut self,
        tx: Transaction,
        options: TxOptions,
    ) -> crate::Result<TxStatus> {
        let tx_id = tx.get_id();
        log::debug!("Adding transaction {tx_id}");

        let mut coins_to_uncache = Vec::new();
        let result = self
            .add_transaction_inner(tx, &options, &mut coins_to_uncache)
            .log_warn_pfx("Transaction rejected");

        match &result {
            Ok(TxStatus::InMempool) => {}
            Ok(TxStatus::MissingInputs) | Err(_) => {
                for outpoint in &coins_to_uncache {
                    self.utxo_view.uncache(outpoint);
                }
            }
        }
        result
    }

    fn add_transaction_inner(
        &mut self,
        tx: Transaction,
        options: &TxOptions,
        coins_to_uncache: &mut Vec<OutPoint>,
    ) -> crate::Result<TxStatus> {
        match self.validate_transaction(tx, options, coins_to_uncache)? {
            ValidationOutcome::MissingInputs => Ok(TxStatus::MissingInputs),
            ValidationOutcome::Valid {
                entry,
                ancestors,
                replacement,
            } => {
                self.finalize_tx(entry, ancestors, replacement, options)?;
                Ok(TxStatus::InMempool)
            }
        }
    }

    fn validate_transaction(
        &self,
        tx: Transaction,
        options: &TxOptions,
        coins_to_uncache: &mut Vec<OutPoint>,
    ) -> Result<ValidationOutcome, Error> {
        let tx_id = tx.get_id();

        // Syntactic checks and the coinbase gate
        self.chain_state
            .check_transaction(&tx)
            .map_err(|e| TxValidationError::CheckTransactionFailed(e.reason))?;
        ensure!(!tx.is_coinbase(), MempoolPolicyError::Coinbase);

        // No witness transactions before the chain enforces commitments
        ensure!(
            self.chain_state.is_witness_enabled()
                || self.config.accept_premature_witness
                || !tx.has_witness(),
            MempoolPolicyError::PrematureWitness
        );

        if self.config.require_standard {
            self.chain_state
                .is_standard(&tx)
                .map_err(|e| MempoolPolicyError::NonStandardTx(e.reason))?;
        }

        // Only transactions minable in the next block belong in the pool
        ensure!(self.chain_state.is_final_tx(&tx), MempoolPolicyError::NonFinal);

        ensure!(!self.store.contains(&tx_id), MempoolPolicyError::AlreadyInMempool);

        let conflicts = self.check_conflicts(&tx)?;

        // Resolve inputs against the pool-over-utxo composed view, keeping
        // track of which lookups warmed the cache
        let view = MempoolCoinsView::new(&self.utxo_view, &self.store);
        let mut value_in = Amount::ZERO;
        let mut spends_coinbase = false;
        for input in tx.inputs() {
            let outpoint = input.outpoint();
            if !self.utxo_view.have_in_cache(outpoint) {
                coins_to_uncache.push(*outpoint);
            }
            let coin = match view.lookup(outpoint) {
                Some(coin) => coin,
                None => {
                    // Are the inputs missing because we already know the tx?
                    for index in 0..tx.outputs().len() as u32 {
                        ensure!(
                            !self.utxo_view.have_in_cache(&OutPoint::new(tx_id, index)),
                            MempoolPolicyError::AlreadyKnown
                        );
                    }
                    return Ok(ValidationOutcome::MissingInputs);
                }
            };
            value_in = (value_in + coin.output().value())
                .ok_or(MempoolPolicyError::InputValuesOverflow)?;
            spends_coinbase |= coin.is_coinbase();
        }

        // Relative lock times, evaluated against the in-pool view
        let lock_points = self
            .chain_state
            .check_sequence_locks(&tx, &view, None)
            .ok_or(MempoolPolicyError::NonBIP68Final)?;

        if self.config.require_standard {
            ensure!(
                self.chain_state.are_inputs_standard(&tx, &view),
                MempoolPolicyError::NonStandardInputs
            );
            ensure!(
                !tx.has_witness() || self.chain_state.is_witness_standard(&tx, &view),
                MempoolPolicyError::NonStandardWitness
            );
        }

        let sig_op_cost = self.chain_state.sig_op_cost(&tx, &view, STANDARD_SCRIPT_VERIFY_FLAGS);
        ensure!(
            sig_op_cost <= MAX_STANDARD_TX_SIGOPS_COST,
            MempoolPolicyError::TooManySigops {
                cost: sig_op_cost,
                max: MAX_STANDARD_TX_SIGOPS_COST,
            }
        );

        let value_out = tx
            .outputs()
            .iter()
            .map(TxOutput::value)
            .sum::<Option<Amount>>()
            .ok_or(MempoolPolicyError::OutputValuesOverflow)?;
        let fee =
            Fee::new((value_in - value_out).ok_or(MempoolPolicyError::InputsBelowOutputs)?);
        let fee_delta = self.map_deltas.get(&tx_id).copied().unwrap_or(SignedAmount::ZERO);

        let accept_time = options.accept_time().unwrap_or_else(|| self.clock.get_time());
        let entry = TxMempoolEntry::new(
            tx,
            fee,
            accept_time,
            self.chain_state.tip_height(),
            sig_op_cost,
            spends_coinbase,
            lock_points,
            fee_delta,
        );
        let tx_size = entry.tx_size();
        let modified_fee = entry.modified_fee();

        // Fee floors: the rolling mempool minimum, and the static relay
        // floor unless the caller vouches for the transaction
        let min_fee = self.get_update_min_fee_rate().compute_fee(tx_size)?;
        if min_fee > Fee::ZERO {
            ensure!(
                modified_fee >= min_fee,
                MempoolPolicyError::RollingFeeThresholdNotMet {
                    minimum_fee: min_fee,
                    tx_fee: modified_fee,
                }
            );
        }
        if options.limit_free() {
            let relay_fee = self.config.min_relay_fee_rate.compute_fee(tx_size)?;
            ensure!(
                modified_fee >= relay_fee,
                MempoolPolicyError::RelayFeeNotMet {
                    tx_fee: modified_fee,
                    relay_fee,
                }
            );
        }
        if let Some(threshold) = options.absurd_fee() {
            let threshold = Fee::new(threshold);
            ensure!(
                fee <= threshold,
                MempoolPolicyError::AbsurdlyHighFee {
                    tx_fee: fee,
                    threshold,
                }
            );
        }

        // Package limits
        let ancestors = self
            .store
            .calculate_mem_pool_ancestors(&entry, &self.config.chain_limits(), true)
            .map_err(MempoolPolicyError::ChainLimits)?;

        // A transaction spending an output of something it also replaces
        // can never be valid
        for ancestor_id in ancestors.iter() {
            ensure!(
                !conflicts.contains(ancestor_id),
                MempoolPolicyError::SpendsConflictingTx {
                    tx_id,
                    ancestor: *ancestor_id,
                }
            );
        }

        let replacement = self.check_replacement(&entry, &conflicts)?;

        // Script verification last, so cheap rejections shield the
        // expensive one from denial-of-service traffic
        let script_flags = self.script_verify_flags();
        if let Err(err) = self.chain_state.check_inputs(entry.transaction(), &view, script_flags) {
            let corruption_possible = !entry.transaction().has_witness()
                && self
                    .chain_state
                    .check_inputs(
                        entry.transaction(),
                        &view,
                        script_flags & !(SCRIPT_VERIFY_WITNESS | SCRIPT_VERIFY_CLEANSTACK),
                    )
                    .is_ok()
                && self
                    .chain_state
                    .check_inputs(
                        entry.transaction(),
                        &view,
                        script_flags & !SCRIPT_VERIFY_CLEANSTACK,
                    )
                    .is_err();
            return Err(TxValidationError::ScriptCheckFailed {
                reason: err.reason,
                corruption_possible,
            }
            .into());
        }

        self.reconcile_with_tip_flags(&entry, &view, script_flags)?;

        Ok(ValidationOutcome::Valid {
            entry,
            ancestors,
            replacement,
        })
    }

    fn script_verify_flags(&self) -> ScriptVerifyFlags {
        if self.config.require_standard {
            STANDARD_SCRIPT_VERIFY_FLAGS
        } else {
            self.config.promiscuous_mempool_flags.unwrap_or(STANDARD_SCRIPT_VERIFY_FLAGS)
        }
    }

    /// Re-run the scripts with the flags the next block will actually be
    /// validated with. Passing standard policy but failing tip consensus is
    /// a bug in one of the two unless the operator deliberately weakened the
    /// policy flags.
    fn reconcile_with_tip_flags(
        &self,
        entry: &TxMempoolEntry,
        view: &MempoolCoinsView<V>,
        script_flags: ScriptVerifyFlags,
    ) -> Result<(), Error> {
        let tip_flags = self.chain_state.tip_script_flags();
        let err = match self.check_inputs_from_mempool_and_cache(entry.transaction(), view, tip_flags)
        {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        if tip_flags & !script_flags == 0 {
            log::error!(
                "CRITICAL: scripts of {} failed against tip flags but passed standard flags: {err}",
                entry.tx_id(),
            );
            Err(TxValidationError::PolicyConsensusDivergence(err.reason).into())
        } else if let Err(err) = self.chain_state.check_inputs(
            entry.transaction(),
            view,
            MANDATORY_SCRIPT_VERIFY_FLAGS,
        ) {
            Err(TxValidationError::MandatoryFlagsFailed(err.reason).into())
        } else {
            log::warn!(
                "promiscuous mempool flags omit currently enforced soft forks, this may break mining"
            );
            Ok(())
        }
    }

    // Guard against the composed view handing out outputs that disagree
    // with the pool or the utxo set before letting its coins near a
    // consensus-critical check.
    fn check_inputs_from_mempool_and_cache(
        &self,
        tx: &Transaction,
        view: &MempoolCoinsView<V>,
        flags: ScriptVerifyFlags,
    ) -> Result<(), CheckError> {
        assert!(!tx.is_coinbase());
        for input in tx.inputs() {
            let outpoint = input.outpoint();
            let coin = view.lookup(outpoint).ok_or_else(|| CheckError::new("input-missing"))?;
            match self.store.get_entry(&outpoint.txid()) {
                Some(parent) => {
                    let output = parent
                        .transaction()
                        .outputs()
                        .get(outpoint.index() as usize)
                        .expect("spend index consistency");
                    assert_eq!(output, coin.output());
                }
                None => {
                    let from_disk =
                        self.utxo_view.lookup(outpoint).expect("coin resolved a moment ago");
                    assert_eq!(from_disk.output(), coin.output());
                }
            }
        }
        self.chain_state.check_inputs(tx, view, flags)
    }

    /// Detect double-spends of in-pool transactions and apply the opt-in
    /// replaceability gate: every conflict must signal on all its inputs.
    fn check_conflicts(&self, tx: &Transaction) -> Result<Conflicts, MempoolPolicyError> {
        let mut conflicts = BTreeSet::new();
        for input in tx.inputs() {
            if let Some(conflict_id) = self.store.find_conflicting_tx(input.outpoint()) {
                if conflicts.contains(&conflict_id) {
                    continue;
                }
                let replaceable = self.config.enable_replacement
                    && self
                        .store
                        .get_entry(&conflict_id)
                        .expect("conflicting tx must be in pool")
                        .is_replaceable();
                ensure!(replaceable, MempoolConflictError::Irreplaceable);
                conflicts.insert(conflict_id);
            }
        }
        Ok(Conflicts(conflicts))
    }
}

// Replacement arbitration
impl<C, V, M> Mempool<C, V, M>
where
    C: ChainView + ConsensusChecker,
    V: CoinsView,
    M: MemoryUsageEstimator,
{
    fn check_replacement(
        &self,
        entry: &TxMempoolEntry,
        conflicts: &Conflicts,
    ) -> Result<ReplacementInfo, MempoolPolicyError> {
        if conflicts.is_empty() {
            return Ok(ReplacementInfo::no_replacement());
        }

        let new_fee_rate = entry.modified_fee_rate();
        let mut conflict_parents = BTreeSet::new();
        let mut conflicting_count = 0usize;
        for conflict_id in conflicts.iter() {
            let conflict = match self.store.get_entry(conflict_id) {
                Some(conflict) => conflict,
                None => continue,
            };

            // The feerate of the pool must not go down: the replacement has
            // to beat every transaction it directly displaces, descendants
            // are handled by the total-fee rule below
            ensure!(
                new_fee_rate > conflict.modified_fee_rate(),
                MempoolConflictError::ReplacementFeeRateTooLow {
                    conflict: *conflict_id,
                }
            );

            conflict_parents
                .extend(conflict.transaction().inputs().iter().map(|i| i.outpoint().txid()));
            conflicting_count += conflict.count_with_descendants();
        }

        // Overestimates the evicted set, which errs on the safe side
        ensure!(
            conflicting_count <= MAX_BIP125_REPLACEMENT_CANDIDATES,
            MempoolConflictError::ReplacesTooMany {
                count: conflicting_count,
                max: MAX_BIP125_REPLACEMENT_CANDIDATES,
            }
        );

        let mut all_conflicting: BTreeSet<Id<Transaction>> = BTreeSet::new();
        for conflict_id in conflicts.iter() {
            all_conflicting.extend(BTreeSet::from(self.store.calculate_descendants(conflict_id)));
        }
        let conflict_fees = all_conflicting
            .iter()
            .map(|id| {
                self.store.get_entry(id).expect("conflict must be in pool").modified_fee()
            })
            .sum::<Option<Fee>>()
            .ok_or(MempoolPolicyError::FeeOverflow)?;

        // Replacements must not pull in unconfirmed ancestry the conflicts
        // did not already have; low-feerate junk would have to be mined
        // first otherwise
        for (index, input) in entry.transaction().inputs().iter().enumerate() {
            let parent_id = input.outpoint().txid();
            if !conflict_parents.contains(&parent_id) && self.store.contains(&parent_id) {
                return Err(
                    MempoolConflictError::SpendsNewUnconfirmed { input_index: index }.into()
                );
            }
        }

        // The replacement pays for everything it evicts, plus its own
        // bandwidth at the incremental relay rate
        let modified_fee = entry.modified_fee();
        ensure!(
            modified_fee >= conflict_fees,
            MempoolConflictError::FeesLowerThanConflicts {
                replacement_fees: modified_fee,
                conflict_fees,
            }
        );
        let additional_fees = (modified_fee - conflict_fees).expect("bounded above");
        let required_fees =
            self.config.incremental_relay_fee_rate.compute_fee(entry.tx_size())?;
        ensure!(
            additional_fees >= required_fees,
            MempoolConflictError::NotEnoughAdditionalFees {
                additional_fees,
                required_fees,
            }
        );

        Ok(ReplacementInfo {
            is_replacement: true,
            all_conflicting,
            conflict_fees,
        })
    }
}

// Transaction finalization and eviction
impl<C, V, M> Mempool<C, V, M>
where
    C: ChainView + ConsensusChecker,
    V: CoinsView,
    M: MemoryUsageEstimator,
{
    fn finalize_tx(
        &mut self,
        entry: TxMempoolEntry,
        ancestors: Ancestors,
        replacement: ReplacementInfo,
        options: &TxOptions,
    ) -> Result<(), Error> {
        let tx_id = *entry.tx_id();

        // The fee-estimation marker must be decided before the pool mutates
        let valid_for_estimation = !replacement.is_replacement
            && self.chain_state.is_current_for_fee_estimation()
            && self.has_no_inputs_of(entry.transaction());

        if !replacement.all_conflicting.is_empty() {
            log::info!(
                "replacing {} transaction(s) with {tx_id} for {} additional fees",
                replacement.all_conflicting.len(),
                (entry.modified_fee() - replacement.conflict_fees)
                    .map_or_else(|| "?".to_string(), |fee| fee.to_string()),
            );
            let removed = self.store.remove_staged(
                &replacement.all_conflicting,
                false,
                MempoolRemovalReason::Replaced,
            );
            for replaced in &removed {
                self.events_controller
                    .broadcast(TransactionReplaced::new(*replaced.tx_id(), tx_id).into());
            }
            self.notify_removed(&removed, MempoolRemovalReason::Replaced);
        }

        self.store.add_transaction(entry, &ancestors);

        {
            let Self {
                store,
                fee_estimator,
                ..
            } = self;
            if let Some(estimator) = fee_estimator.as_mut() {
                let entry = store.get_entry(&tx_id).expect("entry was just added");
                estimator.process_transaction(entry, valid_for_estimation);
            }
        }

        if !options.bypass_limits() {
            self.limit_mempool_size()?;
            ensure!(self.store.contains(&tx_id), MempoolPolicyError::MempoolFull);
        }

        self.events_controller.broadcast(TransactionAdded::new(tx_id).into());
        Ok(())
    }

    fn notify_removed(&mut self, removed: &[TxMempoolEntry], reason: MempoolRemovalReason) {
        for entry in removed {
            if let Some(estimator) = self.fee_estimator.as_mut() {
                estimator.remove_tx(*entry.tx_id(), reason == MempoolRemovalReason::Block);
            }
            self.events_controller
                .broadcast(TransactionRemoved::new(*entry.tx_id(), reason).into());
        }
    }

    /// Expire old transactions and trim to the memory budget, releasing
    /// utxo cache entries that are no longer referenced.
    pub fn limit_mempool_size(&mut self) -> Result<(), MempoolPolicyError> {
        let now = self.clock.get_time();
        let expired = self.expire(now.saturating_sub(self.config.max_tx_age));
        if expired != 0 {
            log::info!("Expired {expired} transactions from the mempool");
        }

        let no_spends_remaining = self.trim_to_size(self.config.max_size.as_bytes())?;
        for outpoint in &no_spends_remaining {
            self.utxo_view.uncache(outpoint);
        }
        Ok(())
    }

    /// Remove everything accepted before `cutoff`, descendants included.
    /// Returns the number of transactions removed.
    pub fn expire(&mut self, cutoff: Time) -> usize {
        let mut expired = BTreeSet::new();
        for (time, tx_ids) in self.store.txs_by_creation_time.iter() {
            if *time >= cutoff {
                break;
            }
            expired.extend(tx_ids.iter().copied());
        }

        let mut stage = BTreeSet::new();
        for tx_id in &expired {
            log::trace!("Expiring tx {tx_id} and its descendants");
            stage.extend(BTreeSet::from(self.store.calculate_descendants(tx_id)));
        }

        let count = stage.len();
        if count > 0 {
            let removed = self.store.remove_staged(&stage, false, MempoolRemovalReason::Expiry);
            self.notify_removed(&removed, MempoolRemovalReason::Expiry);
        }
        count
    }

    /// Evict lowest-value packages until memory usage fits in `limit`.
    /// Returns the outpoints spent by evicted transactions that no pool
    /// transaction references anymore, for the caller to uncache.
    pub fn trim_to_size(&mut self, limit: usize) -> Result<Vec<OutPoint>, MempoolPolicyError> {
        let mut no_spends_remaining = Vec::new();
        let mut removed_count = 0usize;
        let mut max_rate_removed = None;

        while !self.store.is_empty() && self.memory_usage() > limit {
            let worst_id = *self
                .store
                .txs_by_descendant_score
                .values()
                .next()
                .expect("pool not empty")
                .first()
                .expect("score buckets are never empty");

            let (package_fees, package_size) = {
                let worst = self.store.get_entry(&worst_id).expect("picked from index");
                (worst.fees_with_descendants(), worst.size_with_descendants())
            };
            let package_size =
                NonZeroUsize::new(package_size).expect("package size is non-zero");
            let removed_rate = (FeeRate::from_total_tx_fee(package_fees, package_size)?
                + self.config.incremental_relay_fee_rate)
                .ok_or(MempoolPolicyError::FeeOverflow)?;
            self.track_package_removed(removed_rate);
            max_rate_removed = std::cmp::max(max_rate_removed, Some(removed_rate));

            let stage = BTreeSet::from(self.store.calculate_descendants(&worst_id));
            removed_count += stage.len();
            let removed =
                self.store.remove_staged(&stage, false, MempoolRemovalReason::SizeLimit);
            self.notify_removed(&removed, MempoolRemovalReason::SizeLimit);

            for entry in &removed {
                for input in entry.transaction().inputs() {
                    if !self.store.contains(&input.outpoint().txid()) {
                        no_spends_remaining.push(*input.outpoint());
                    }
                }
            }
        }

        if let Some(rate) = max_rate_removed {
            log::info!(
                "Removed {removed_count} transactions, rolling minimum fee bumped to {rate:?}"
            );
        }
        Ok(no_spends_remaining)
    }

    pub fn set_max_size(&mut self, max_size: MempoolMaxSize) -> Result<(), Error> {
        if max_size > self.config.max_size {
            self.drop_rolling_fee();
        }
        self.config.max_size = max_size;
        Ok(self.limit_mempool_size()?)
    }
}

// Removal driven by chain events
impl<C, V, M> Mempool<C, V, M>
where
    C: ChainView + ConsensusChecker,
    V: CoinsView,
    M: MemoryUsageEstimator,
{
    /// Remove `tx` and everything that depends on it. Also covers the case
    /// where `tx` itself is not in the pool but stray children are.
    pub fn remove_recursive(&mut self, tx: &Transaction, reason: MempoolRemovalReason) {
        let tx_id = tx.get_id();
        let mut roots = BTreeSet::new();
        if self.store.contains(&tx_id) {
            roots.insert(tx_id);
        } else {
            for index in 0..tx.outputs().len() as u32 {
                if let Some(child_id) =
                    self.store.find_conflicting_tx(&OutPoint::new(tx_id, index))
                {
                    roots.insert(child_id);
                }
            }
        }

        let mut stage = BTreeSet::new();
        for root in &roots {
            stage.extend(BTreeSet::from(self.store.calculate_descendants(root)));
        }
        if !stage.is_empty() {
            let removed = self.store.remove_staged(&stage, false, reason);
            self.notify_removed(&removed, reason);
        }
    }

    /// Remove all pool transactions that double-spend an input of `tx`,
    /// recursively.
    pub fn remove_conflicts(&mut self, tx: &Transaction) {
        let tx_id = tx.get_id();
        for input in tx.inputs() {
            if let Some(conflict_id) = self.store.find_conflicting_tx(input.outpoint()) {
                if conflict_id != tx_id {
                    log::debug!("Removing conflicting tx {conflict_id}");
                    let conflict_tx = self
                        .store
                        .get_entry(&conflict_id)
                        .expect("conflicting tx must be in pool")
                        .transaction()
                        .clone();
                    self.clear_prioritisation(&conflict_id);
                    self.remove_recursive(&conflict_tx, MempoolRemovalReason::Conflict);
                }
            }
        }
    }

    /// A block was connected: drop its transactions from the pool (keeping
    /// their descendants), evict anything they conflict with, and let the
    /// fee estimator see the confirmed set once.
    pub fn remove_for_block(&mut self, txs: &[Transaction], height: BlockHeight) {
        {
            let Self {
                store,
                fee_estimator,
                ..
            } = self;
            let store = &*store;
            if let Some(estimator) = fee_estimator.as_mut() {
                let entries: Vec<&TxMempoolEntry> =
                    txs.iter().filter_map(|tx| store.get_entry(&tx.get_id())).collect();
                estimator.process_block(height, &entries);
            }
        }

        for tx in txs {
            let tx_id = tx.get_id();
            if self.store.contains(&tx_id) {
                let stage = BTreeSet::from([tx_id]);
                let removed = self.store.remove_staged(&stage, true, MempoolRemovalReason::Block);
                self.notify_removed(&removed, MempoolRemovalReason::Block);
            }
            self.remove_conflicts(tx);
            self.clear_prioritisation(&tx_id);
        }

        {
            let mut rolling = self.rolling_fee_rate.write();
            rolling.set_last_rolling_fee_update(self.clock.get_time());
            rolling.set_block_since_last_rolling_fee_bump(true);
        }

        self.events_controller
            .broadcast(NewTip::new(self.chain_state.tip_hash(), height).into());
    }

    /// Repair child links and aggregates after block transactions were
    /// re-admitted by a reorg; see
    /// [store::MempoolStore::update_transactions_from_block].
    pub fn update_transactions_from_block(&mut self, tx_ids: &[Id<Transaction>]) {
        self.store.update_transactions_from_block(tx_ids);
    }

    /// Drop everything. Prioritisation deltas survive.
    pub fn clear(&mut self) {
        self.store.clear();
        *self.rolling_fee_rate.write() = RollingFeeRate::new(self.clock.get_time());
    }
}

// Prioritisation
impl<C, V, M> Mempool<C, V, M> {
    /// Add a fee delta for `tx_id`, applying it to package aggregates if the
    /// transaction is in the pool. Deltas persist across removals and apply
    /// on (re-)insertion.
    pub fn prioritise_transaction(&mut self, tx_id: Id<Transaction>, delta: SignedAmount) {
        let total = {
            let current = self.map_deltas.entry(tx_id).or_insert(SignedAmount::ZERO);
            *current = (*current + delta).expect("fee delta overflow");
            *current
        };

        if self.store.contains(&tx_id) {
            self.store.modify_entry(&tx_id, |entry| entry.update_fee_delta(total));

            let ancestors = {
                let entry = self.store.get_entry(&tx_id).expect("checked above");
                self.store
                    .calculate_mem_pool_ancestors(entry, &ChainLimits::unlimited(), false)
                    .expect("unlimited ancestor walk cannot fail")
            };
            for ancestor_id in ancestors.iter() {
                self.store.modify_entry(ancestor_id, |ancestor| {
                    ancestor.update_descendant_state(0, delta, 0)
                });
            }

            let descendants = self.store.calculate_descendants(&tx_id);
            for descendant_id in descendants.iter().filter(|id| **id != tx_id) {
                self.store.modify_entry(descendant_id, |descendant| {
                    descendant.update_ancestor_state(0, delta, 0, 0)
                });
            }
            self.store.bump_transactions_updated();
        }

        log::info!("prioritise_transaction: {tx_id} fee delta += {delta}");
    }

    /// The fee of `tx_id` as seen through its prioritisation delta.
    pub fn apply_delta(&self, tx_id: &Id<Transaction>, fee: Fee) -> Fee {
        match self.map_deltas.get(tx_id) {
            Some(delta) => fee.saturating_add_signed(*delta),
            None => fee,
        }
    }

    pub fn clear_prioritisation(&mut self, tx_id: &Id<Transaction>) {
        self.map_deltas.remove(tx_id);
    }
}

// Block building
impl<C, V, M> Mempool<C, V, M> {
    /// Feed transactions to the accumulator from the best ancestor-package
    /// feerate downwards, until it reports it is done.
    pub fn collect_txs(
        &self,
        mut tx_accumulator: Box<dyn TransactionAccumulator>,
    ) -> Box<dyn TransactionAccumulator> {
        let mut tx_iter = self.store.txs_by_ancestor_score.values().flatten().rev();
        while !tx_accumulator.done() {
            let tx_id = match tx_iter.next() {
                Some(tx_id) => tx_id,
                None => break,
            };
            let entry = self.store.get_entry(tx_id).expect("id comes from an index");
            log::debug!(
                "collect_txs: next tx {tx_id} has ancestor score {:?}",
                entry.ancestor_score()
            );
            if let Err(err) = tx_accumulator.add_tx(entry.transaction().clone(), entry.fee()) {
                log::error!("CRITICAL: failed to add transaction {tx_id} to the block: {err}");
            }
        }
        tx_accumulator
    }
}

// Consistency checking
impl<C, V, M> Mempool<C, V, M>
where
    C: ChainView + ConsensusChecker,
    V: CoinsView,
    M: MemoryUsageEstimator,
{
    /// Run the full self-check with the configured probability.
    ///
    /// Callers invoke this at stable points only: while a reorg is being
    /// processed, resurrected transactions are deliberately missing their
    /// child links until
    /// [store::MempoolStore::update_transactions_from_block] runs.
    pub fn check(&self) {
        let frequency = self.config.check_frequency;
        if frequency == 0 || randomness::make_true_rng().gen::<u32>() >= frequency {
            return;
        }
        self.force_check();
    }

    /// Verify the container invariants and that every input resolves in the
    /// composed coin view. Any failure is a bug and panics.
    pub fn force_check(&self) {
        log::debug!(
            "Checking mempool with {} transactions and {} inputs",
            self.store.len(),
            self.store.spender_txs.len(),
        );
        self.store.assert_valid();

        let view = MempoolCoinsView::new(&self.utxo_view, &self.store);
        for (tx_id, entry) in self.store.txs_by_id.iter() {
            for input in entry.transaction().inputs() {
                assert!(
                    view.lookup(input.outpoint()).is_some(),
                    "input {} of {tx_id} resolves to no coin",
                    input.outpoint(),
                );
            }
        }
    }
}
