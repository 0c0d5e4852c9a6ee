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

mod reject;

use thiserror::Error;

use common::{chain::Transaction, primitives::Id};

use crate::pool::fee::Fee;

pub use reject::{RejectKind, Rejection};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Validity(#[from] TxValidationError),

    #[error(transparent)]
    Policy(#[from] MempoolPolicyError),

    #[error("Reorg error: {0}")]
    Reorg(#[from] ReorgError),
}

impl From<MempoolConflictError> for Error {
    fn from(e: MempoolConflictError) -> Self {
        MempoolPolicyError::from(e).into()
    }
}

/// An error that can happen in the mempool on a chain reorg
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReorgError {
    #[error("Failed to re-limit the mempool after a reorg: {0}")]
    SizeLimit(#[from] MempoolPolicyError),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MempoolPolicyError {
    #[error(transparent)]
    Conflict(#[from] MempoolConflictError),

    #[error("Coinbase transactions are only valid in a block")]
    Coinbase,

    #[error("Transaction carries witness data before witness activation")]
    PrematureWitness,

    #[error("Transaction is not standard: {0}")]
    NonStandardTx(String),

    #[error("Transaction cannot be mined in the next block")]
    NonFinal,

    #[error("Transaction already in mempool")]
    AlreadyInMempool,

    #[error("Transaction outputs already present in the utxo set")]
    AlreadyKnown,

    #[error("Transaction's relative lock times are not satisfied")]
    NonBIP68Final,

    #[error("Transaction has non-standard inputs")]
    NonStandardInputs,

    #[error("Transaction has a non-standard witness")]
    NonStandardWitness,

    #[error("Transaction sig-op cost {cost} exceeds the limit {max}")]
    TooManySigops { cost: u64, max: u64 },

    #[error("Rolling fee threshold not met (fee {tx_fee}, minimum {minimum_fee})")]
    RollingFeeThresholdNotMet { minimum_fee: Fee, tx_fee: Fee },

    #[error("Transaction does not pay the relay fee floor (fee {tx_fee}, minimum {relay_fee})")]
    RelayFeeNotMet { tx_fee: Fee, relay_fee: Fee },

    #[error("Transaction fee {tx_fee} is absurdly high (threshold {threshold})")]
    AbsurdlyHighFee { tx_fee: Fee, threshold: Fee },

    #[error("Transaction would exceed in-mempool package limits: {0}")]
    ChainLimits(#[from] ChainLimitsError),

    #[error("Transaction {tx_id} spends output of conflicting transaction {ancestor}")]
    SpendsConflictingTx {
        tx_id: Id<Transaction>,
        ancestor: Id<Transaction>,
    },

    #[error("Mempool is full")]
    MempoolFull,

    #[error("Fee computation overflow")]
    FeeOverflow,

    #[error("Sum of input values overflows")]
    InputValuesOverflow,

    #[error("Sum of output values overflows")]
    OutputValuesOverflow,

    #[error("Transaction spends more than its inputs provide")]
    InputsBelowOutputs,
}

/// Violations of the ancestor/descendant package limits, with the limit that
/// was hit.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainLimitsError {
    #[error("too many unconfirmed parents [limit: {0}]")]
    TooManyParents(usize),

    #[error("too many unconfirmed ancestors [limit: {0}]")]
    TooManyAncestors(usize),

    #[error("exceeds ancestor size limit [limit: {0}]")]
    AncestorSize(usize),

    #[error("too many descendants for tx {0} [limit: {1}]")]
    TooManyDescendants(Id<Transaction>, usize),

    #[error("exceeds descendant size limit for tx {0} [limit: {1}]")]
    DescendantSize(Id<Transaction>, usize),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MempoolConflictError {
    #[error("Transaction conflicts with an irreplaceable mempool transaction")]
    Irreplaceable,

    #[error("Replacement feerate is not higher than the feerate of conflict {conflict}")]
    ReplacementFeeRateTooLow { conflict: Id<Transaction> },

    #[error("Transaction would require too many replacements ({count} > {max})")]
    ReplacesTooMany { count: usize, max: usize },

    #[error("Replacement adds new unconfirmed input at index {input_index}")]
    SpendsNewUnconfirmed { input_index: usize },

    #[error("Replacement pays {replacement_fees}, less than the {conflict_fees} paid by the transactions it replaces")]
    FeesLowerThanConflicts {
        replacement_fees: Fee,
        conflict_fees: Fee,
    },

    #[error("Replacement does not pay for its own bandwidth ({additional_fees} < {required_fees})")]
    NotEnoughAdditionalFees {
        additional_fees: Fee,
        required_fees: Fee,
    },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TxValidationError {
    #[error("Transaction failed basic checks: {0}")]
    CheckTransactionFailed(String),

    #[error("Script verification failed: {reason}")]
    ScriptCheckFailed {
        reason: String,
        /// True when the failure disappears once witness rules are turned
        /// off, i.e. the witness may merely have been stripped in transit.
        corruption_possible: bool,
    },

    /// Scripts passed under standard flags but failed under the flags the
    /// next block will be validated with. Policy and consensus have drifted
    /// apart, which is a programming error, not a property of the
    /// transaction.
    #[error("BUG: scripts failed against tip flags but passed standard flags: {0}")]
    PolicyConsensusDivergence(String),

    #[error("Scripts failed mandatory flags under promiscuous mempool flags: {0}")]
    MandatoryFlagsFailed(String),
}
