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

//! Hand-rolled chain-state and coin-view doubles for pool tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use common::{
    chain::{Coin, Destination, OutPoint, Transaction, TxInput, TxOutput},
    primitives::{Amount, BlockHeight, Id, Idable, H256},
};
use common::time_getter::TimeGetter;

use crate::config::MempoolConfig;
use crate::event::MempoolEvent;
use crate::interface::{
    ChainView, CheckError, CoinsView, ConsensusChecker, FeeEstimator, LockPoints,
    ScriptVerifyFlags, SCRIPT_VERIFY_CLEANSTACK, SCRIPT_VERIFY_WITNESS,
    STANDARD_SCRIPT_VERIFY_FLAGS,
};
use crate::pool::entry::TxMempoolEntry;
use crate::pool::memory_usage_estimator::StoreMemoryUsageEstimator;
use crate::pool::Mempool;

pub const COIN_VALUE: Amount = Amount::from_atoms(1_000_000_000);
pub const TEST_FEE: Amount = Amount::from_atoms(100_000);

pub type TestMempool = Mempool<TestChainState, TestCoinsView, StoreMemoryUsageEstimator>;

/// A settable clock shared between the test and the pool.
#[derive(Clone)]
pub struct TestClock(Arc<AtomicU64>);

impl TestClock {
    pub fn new(start_secs: u64) -> Self {
        Self(Arc::new(AtomicU64::new(start_secs)))
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn time_getter(&self) -> TimeGetter {
        let clock = Arc::clone(&self.0);
        TimeGetter::new(Arc::new(move || {
            Duration::from_secs(clock.load(Ordering::SeqCst))
        }))
    }
}

#[derive(Default)]
struct CoinsInner {
    coins: BTreeMap<OutPoint, Coin>,
    cached: BTreeSet<OutPoint>,
    uncache_log: Vec<OutPoint>,
}

/// Confirmed utxo set double. Lookups warm the cache layer, mirroring how a
/// real coin cache pulls entries in from disk.
#[derive(Clone, Default)]
pub struct TestCoinsView {
    inner: Rc<RefCell<CoinsInner>>,
}

impl TestCoinsView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_cached_coin(&self, outpoint: OutPoint, coin: Coin) {
        let mut inner = self.inner.borrow_mut();
        inner.coins.insert(outpoint, coin);
        inner.cached.insert(outpoint);
    }

    pub fn remove_coin(&self, outpoint: &OutPoint) {
        let mut inner = self.inner.borrow_mut();
        inner.coins.remove(outpoint);
        inner.cached.remove(outpoint);
    }

    pub fn uncache_log(&self) -> Vec<OutPoint> {
        self.inner.borrow().uncache_log.clone()
    }

    pub fn clear_uncache_log(&self) {
        self.inner.borrow_mut().uncache_log.clear();
    }
}

impl CoinsView for TestCoinsView {
    fn lookup(&self, outpoint: &OutPoint) -> Option<Coin> {
        let mut inner = self.inner.borrow_mut();
        let coin = inner.coins.get(outpoint).cloned();
        if coin.is_some() {
            inner.cached.insert(*outpoint);
        }
        coin
    }

    fn have_in_cache(&self, outpoint: &OutPoint) -> bool {
        self.inner.borrow().cached.contains(outpoint)
    }

    fn uncache(&self, outpoint: &OutPoint) {
        let mut inner = self.inner.borrow_mut();
        inner.cached.remove(outpoint);
        inner.uncache_log.push(*outpoint);
    }
}

/// How the chain-state double should treat scripts of a given transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFailMode {
    /// Fail under any flags.
    Always,
    /// Fail only when witness rules are enforced; passes with both witness
    /// and cleanstack turned off (a stripped-witness lookalike).
    WitnessOnly,
    /// Fail under the given flag bits.
    UnderFlags(ScriptVerifyFlags),
    /// Fail only when checked with exactly the given flag set.
    UnderExactFlags(ScriptVerifyFlags),
}

#[derive(Default)]
struct ChainStateInner {
    tip_height: u64,
    tip_hash: H256,
    witness_enabled: bool,
    tip_script_flags: ScriptVerifyFlags,
    current_for_fee_estimation: bool,
    non_final: BTreeSet<Id<Transaction>>,
    non_standard: BTreeSet<Id<Transaction>>,
    sequence_locked: BTreeSet<Id<Transaction>>,
    script_failures: BTreeMap<Id<Transaction>, ScriptFailMode>,
    sig_op_costs: BTreeMap<Id<Transaction>, u64>,
}

/// Chain view + consensus checker double, permissive by default with
/// per-transaction failure injection.
#[derive(Clone)]
pub struct TestChainState {
    inner: Rc<RefCell<ChainStateInner>>,
}

impl TestChainState {
    pub fn new() -> Self {
        let inner = ChainStateInner {
            tip_height: 100,
            tip_hash: H256::from_low_u64_be(100),
            witness_enabled: true,
            tip_script_flags: STANDARD_SCRIPT_VERIFY_FLAGS,
            current_for_fee_estimation: true,
            ..Default::default()
        };
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    pub fn set_tip(&self, height: u64, hash: H256) {
        let mut inner = self.inner.borrow_mut();
        inner.tip_height = height;
        inner.tip_hash = hash;
    }

    pub fn set_witness_enabled(&self, enabled: bool) {
        self.inner.borrow_mut().witness_enabled = enabled;
    }

    pub fn set_tip_script_flags(&self, flags: ScriptVerifyFlags) {
        self.inner.borrow_mut().tip_script_flags = flags;
    }

    pub fn set_current_for_fee_estimation(&self, current: bool) {
        self.inner.borrow_mut().current_for_fee_estimation = current;
    }

    pub fn set_non_final(&self, tx_id: Id<Transaction>) {
        self.inner.borrow_mut().non_final.insert(tx_id);
    }

    pub fn set_non_standard(&self, tx_id: Id<Transaction>) {
        self.inner.borrow_mut().non_standard.insert(tx_id);
    }

    pub fn set_sequence_locked(&self, tx_id: Id<Transaction>) {
        self.inner.borrow_mut().sequence_locked.insert(tx_id);
    }

    pub fn set_script_failure(&self, tx_id: Id<Transaction>, mode: ScriptFailMode) {
        self.inner.borrow_mut().script_failures.insert(tx_id, mode);
    }

    pub fn set_sig_op_cost(&self, tx_id: Id<Transaction>, cost: u64) {
        self.inner.borrow_mut().sig_op_costs.insert(tx_id, cost);
    }
}

impl Default for TestChainState {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainView for TestChainState {
    fn tip_height(&self) -> BlockHeight {
        BlockHeight::new(self.inner.borrow().tip_height)
    }

    fn tip_hash(&self) -> H256 {
        self.inner.borrow().tip_hash
    }

    fn is_witness_enabled(&self) -> bool {
        self.inner.borrow().witness_enabled
    }

    fn tip_script_flags(&self) -> ScriptVerifyFlags {
        self.inner.borrow().tip_script_flags
    }

    fn is_current_for_fee_estimation(&self) -> bool {
        self.inner.borrow().current_for_fee_estimation
    }
}

impl ConsensusChecker for TestChainState {
    fn check_transaction(&self, tx: &Transaction) -> Result<(), CheckError> {
        if tx.inputs().is_empty() {
            return Err(CheckError::new("bad-txns-vin-empty"));
        }
        if tx.outputs().is_empty() {
            return Err(CheckError::new("bad-txns-vout-empty"));
        }
        let mut seen = BTreeSet::new();
        for input in tx.inputs() {
            if !seen.insert(*input.outpoint()) {
                return Err(CheckError::new("bad-txns-inputs-duplicate"));
            }
        }
        Ok(())
    }

    fn is_standard(&self, tx: &Transaction) -> Result<(), CheckError> {
        if self.inner.borrow().non_standard.contains(&tx.get_id()) {
            return Err(CheckError::new("scriptpubkey"));
        }
        Ok(())
    }

    fn is_final_tx(&self, tx: &Transaction) -> bool {
        !self.inner.borrow().non_final.contains(&tx.get_id())
    }

    fn check_sequence_locks(
        &self,
        tx: &Transaction,
        _view: &dyn CoinsView,
        use_existing: Option<&LockPoints>,
    ) -> Option<LockPoints> {
        if self.inner.borrow().sequence_locked.contains(&tx.get_id()) {
            return None;
        }
        if let Some(existing) = use_existing {
            return Some(*existing);
        }
        Some(LockPoints {
            height: self.tip_height(),
            time: 0,
            max_input_height: Some(self.tip_height()),
        })
    }

    fn test_lock_point_validity(&self, lock_points: &LockPoints) -> bool {
        lock_points.max_input_height.map_or(true, |height| height <= self.tip_height())
    }

    fn are_inputs_standard(&self, _tx: &Transaction, _view: &dyn CoinsView) -> bool {
        true
    }

    fn is_witness_standard(&self, _tx: &Transaction, _view: &dyn CoinsView) -> bool {
        true
    }

    fn sig_op_cost(
        &self,
        tx: &Transaction,
        _view: &dyn CoinsView,
        _flags: ScriptVerifyFlags,
    ) -> u64 {
        self.inner
            .borrow()
            .sig_op_costs
            .get(&tx.get_id())
            .copied()
            .unwrap_or(tx.inputs().len() as u64)
    }

    fn check_inputs(
        &self,
        tx: &Transaction,
        _view: &dyn CoinsView,
        flags: ScriptVerifyFlags,
    ) -> Result<(), CheckError> {
        let fails = match self.inner.borrow().script_failures.get(&tx.get_id()) {
            None => false,
            Some(ScriptFailMode::Always) => true,
            Some(ScriptFailMode::WitnessOnly) => {
                flags & (SCRIPT_VERIFY_WITNESS | SCRIPT_VERIFY_CLEANSTACK) != 0
            }
            Some(ScriptFailMode::UnderFlags(mask)) => flags & mask != 0,
            Some(ScriptFailMode::UnderExactFlags(exact)) => flags == *exact,
        };
        if fails {
            Err(CheckError::new("mandatory-script-verify-flag-failed"))
        } else {
            Ok(())
        }
    }
}

/// Fee estimator double that records every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EstimatorEvent {
    Transaction(Id<Transaction>, bool),
    Block(BlockHeight, Vec<Id<Transaction>>),
    Removed(Id<Transaction>, bool),
}

pub struct RecordingFeeEstimator {
    pub events: Arc<Mutex<Vec<EstimatorEvent>>>,
}

impl FeeEstimator for RecordingFeeEstimator {
    fn process_transaction(&mut self, entry: &TxMempoolEntry, valid_for_estimation: bool) {
        self.events
            .lock()
            .expect("lock poisoned")
            .push(EstimatorEvent::Transaction(*entry.tx_id(), valid_for_estimation));
    }

    fn process_block(&mut self, height: BlockHeight, entries: &[&TxMempoolEntry]) {
        let ids = entries.iter().map(|e| *e.tx_id()).collect();
        self.events.lock().expect("lock poisoned").push(EstimatorEvent::Block(height, ids));
    }

    fn remove_tx(&mut self, tx_id: Id<Transaction>, in_block: bool) {
        self.events
            .lock()
            .expect("lock poisoned")
            .push(EstimatorEvent::Removed(tx_id, in_block));
    }
}

/// Everything a pool test needs to poke at.
pub struct TestHarness {
    pub mempool: TestMempool,
    pub chain: TestChainState,
    pub coins: TestCoinsView,
    pub clock: TestClock,
}

pub fn test_config() -> MempoolConfig {
    MempoolConfig {
        // Make the randomized self-check effectively unconditional in tests
        check_frequency: u32::MAX,
        ..MempoolConfig::default()
    }
}

pub fn setup() -> TestHarness {
    setup_with_config(test_config())
}

pub fn setup_with_config(config: MempoolConfig) -> TestHarness {
    logging::init_logging();
    let chain = TestChainState::new();
    let coins = TestCoinsView::new();
    let clock = TestClock::new(1_000_000);
    let mempool = Mempool::new(
        config,
        chain.clone(),
        coins.clone(),
        clock.time_getter(),
        StoreMemoryUsageEstimator,
    );
    TestHarness {
        mempool,
        chain,
        coins,
        clock,
    }
}

static NEXT_CONFIRMED_SEED: AtomicU64 = AtomicU64::new(1);

/// Fabricate a fresh confirmed outpoint worth [COIN_VALUE], visible in the
/// utxo view (and its cache layer).
pub fn confirmed_outpoint(coins: &TestCoinsView) -> OutPoint {
    confirmed_outpoint_with(coins, COIN_VALUE, false, 1)
}

pub fn confirmed_outpoint_with(
    coins: &TestCoinsView,
    value: Amount,
    is_coinbase: bool,
    height: u64,
) -> OutPoint {
    let seed = NEXT_CONFIRMED_SEED.fetch_add(1, Ordering::SeqCst);
    let outpoint = OutPoint::new(Id::new(H256::from_low_u64_be(seed)), 0);
    let output = TxOutput::new(value, Destination::AnyoneCanSpend);
    coins.add_cached_coin(outpoint, Coin::new(output, BlockHeight::new(height), is_coinbase));
    outpoint
}

/// Build a transaction spending the given outpoints with the given output
/// values. The fee is whatever the inputs provide beyond the outputs.
pub fn make_tx(inputs: Vec<(OutPoint, u32)>, output_values: Vec<Amount>) -> Transaction {
    let inputs = inputs
        .into_iter()
        .map(|(outpoint, sequence)| TxInput::new(outpoint, sequence))
        .collect();
    let outputs = output_values
        .into_iter()
        .map(|value| TxOutput::new(value, Destination::AnyoneCanSpend))
        .collect();
    Transaction::new(0, inputs, outputs, 0)
}

/// Single-input single-output spend of `outpoint` (assumed worth `in_value`)
/// paying `fee`.
pub fn spend_outpoint(outpoint: OutPoint, sequence: u32, in_value: Amount, fee: Amount) -> Transaction {
    let change = (in_value - fee).expect("fee exceeds input value");
    make_tx(vec![(outpoint, sequence)], vec![change])
}

/// Record of every event the pool broadcast.
pub fn subscribe_events(mempool: &mut TestMempool) -> Arc<Mutex<Vec<MempoolEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    mempool.subscribe_to_events(Arc::new(move |event| {
        sink.lock().expect("lock poisoned").push(event)
    }));
    events
}
