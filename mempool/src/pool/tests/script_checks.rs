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

use crate::error::TxValidationError;
use crate::interface::{
    SCRIPT_VERIFY_DERSIG, SCRIPT_VERIFY_P2SH, STANDARD_SCRIPT_VERIFY_FLAGS,
};

use super::*;

#[test]
fn script_failure_rejects_with_no_state_change() {
    let TestHarness {
        mut mempool, coins, chain, ..
    } = setup();

    let tx = spend_outpoint(confirmed_outpoint(&coins), 0, COIN_VALUE, TEST_FEE);
    chain.set_script_failure(tx.get_id(), ScriptFailMode::Always);

    let err = mempool.add_transaction(tx.clone(), TxOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::Validity(TxValidationError::ScriptCheckFailed {
            corruption_possible: false,
            ..
        })
    ));
    assert_eq!(err.kind(), RejectKind::Invalid);
    assert!(!mempool.contains_transaction(&tx.get_id()));
    assert_eq!(mempool.total_tx_size(), 0);
}

// A witness-free transaction that fails only once witness rules come into
// play may have had its witness stripped in transit; the peer is not
// punished for that.
#[test]
fn witness_only_failure_flags_possible_corruption() {
    let TestHarness {
        mut mempool, coins, chain, ..
    } = setup();

    let tx = spend_outpoint(confirmed_outpoint(&coins), 0, COIN_VALUE, TEST_FEE);
    chain.set_script_failure(tx.get_id(), ScriptFailMode::WitnessOnly);

    let err = mempool.add_transaction(tx, TxOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::Validity(TxValidationError::ScriptCheckFailed {
            corruption_possible: true,
            ..
        })
    ));
    assert_eq!(err.kind(), RejectKind::CorruptionPossible);
}

// A transaction that carries a witness gets no benefit of the doubt.
#[test]
fn witness_carrying_failure_is_not_corruption() {
    let TestHarness {
        mut mempool, coins, chain, ..
    } = setup();

    let outpoint = confirmed_outpoint(&coins);
    let change = (COIN_VALUE - TEST_FEE).unwrap();
    let tx = Transaction::new(
        0,
        vec![TxInput::new(outpoint, 0).with_witness(vec![b"wit".to_vec()])],
        vec![TxOutput::new(change, Destination::AnyoneCanSpend)],
        0,
    );
    chain.set_script_failure(tx.get_id(), ScriptFailMode::WitnessOnly);

    let err = mempool.add_transaction(tx, TxOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::Validity(TxValidationError::ScriptCheckFailed {
            corruption_possible: false,
            ..
        })
    ));
}

// Standard flags pass, tip flags fail, and the tip enforces nothing beyond
// the standard set: policy and consensus have drifted apart, which must
// surface as a fatal error rather than an acceptance.
#[test]
fn policy_consensus_divergence_is_fatal() {
    let TestHarness {
        mut mempool, coins, chain, ..
    } = setup();
    chain.set_tip_script_flags(SCRIPT_VERIFY_P2SH);

    let tx = spend_outpoint(confirmed_outpoint(&coins), 0, COIN_VALUE, TEST_FEE);
    chain.set_script_failure(tx.get_id(), ScriptFailMode::UnderExactFlags(SCRIPT_VERIFY_P2SH));

    let err = mempool.add_transaction(tx.clone(), TxOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::Validity(TxValidationError::PolicyConsensusDivergence(_))
    ));
    assert!(!mempool.contains_transaction(&tx.get_id()));
}

// With deliberately weakened policy flags, a tip-flag failure that still
// passes the mandatory flags is accepted with a warning.
#[test]
fn promiscuous_flags_accept_with_warning() {
    let mut config = test_config();
    config.require_standard = false;
    config.promiscuous_mempool_flags = Some(SCRIPT_VERIFY_P2SH);
    let TestHarness {
        mut mempool, coins, chain, ..
    } = setup_with_config(config);

    let tx = spend_outpoint(confirmed_outpoint(&coins), 0, COIN_VALUE, TEST_FEE);
    chain.set_script_failure(
        tx.get_id(),
        ScriptFailMode::UnderExactFlags(STANDARD_SCRIPT_VERIFY_FLAGS),
    );

    mempool.add_transaction(tx, TxOptions::default()).unwrap().assert_in_mempool();
    mempool.force_check();
}

// Same setup, but the mandatory flags fail too: rejected.
#[test]
fn promiscuous_flags_cannot_bypass_mandatory_checks() {
    let mut config = test_config();
    config.require_standard = false;
    config.promiscuous_mempool_flags = Some(SCRIPT_VERIFY_DERSIG);
    let TestHarness {
        mut mempool, coins, chain, ..
    } = setup_with_config(config);

    let tx = spend_outpoint(confirmed_outpoint(&coins), 0, COIN_VALUE, TEST_FEE);
    chain.set_script_failure(tx.get_id(), ScriptFailMode::UnderFlags(SCRIPT_VERIFY_P2SH));

    let err = mempool.add_transaction(tx, TxOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::Validity(TxValidationError::MandatoryFlagsFailed(_))
    ));
}
