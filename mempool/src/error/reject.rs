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

//! Classification of admission failures into the wire-level rejection
//! vocabulary that relay code reports to peers.

use super::{Error, MempoolConflictError, MempoolPolicyError, ReorgError, TxValidationError};

/// Broad rejection categories, used among other things to decide whether the
/// sending peer misbehaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectKind {
    Invalid,
    NonStandard,
    InsufficientFee,
    Duplicate,
    HighFee,
    CorruptionPossible,
}

/// Rejection metadata attached to every admission failure.
pub trait Rejection {
    fn kind(&self) -> RejectKind;

    /// Short stable tag identifying the rule that fired.
    fn reason(&self) -> &str;
}

impl Rejection for Error {
    fn kind(&self) -> RejectKind {
        match self {
            Error::Validity(e) => e.kind(),
            Error::Policy(e) => e.kind(),
            Error::Reorg(e) => e.kind(),
        }
    }

    fn reason(&self) -> &str {
        match self {
            Error::Validity(e) => e.reason(),
            Error::Policy(e) => e.reason(),
            Error::Reorg(e) => e.reason(),
        }
    }
}

impl Rejection for ReorgError {
    fn kind(&self) -> RejectKind {
        match self {
            ReorgError::SizeLimit(e) => e.kind(),
        }
    }

    fn reason(&self) -> &str {
        match self {
            ReorgError::SizeLimit(e) => e.reason(),
        }
    }
}

impl Rejection for TxValidationError {
    fn kind(&self) -> RejectKind {
        match self {
            TxValidationError::CheckTransactionFailed(_) => RejectKind::Invalid,
            TxValidationError::ScriptCheckFailed {
                corruption_possible,
                ..
            } => {
                if *corruption_possible {
                    RejectKind::CorruptionPossible
                } else {
                    RejectKind::Invalid
                }
            }
            TxValidationError::PolicyConsensusDivergence(_) => RejectKind::Invalid,
            TxValidationError::MandatoryFlagsFailed(_) => RejectKind::Invalid,
        }
    }

    fn reason(&self) -> &str {
        match self {
            TxValidationError::CheckTransactionFailed(reason) => reason,
            TxValidationError::ScriptCheckFailed { reason, .. } => reason,
            TxValidationError::PolicyConsensusDivergence(_) => "policy-consensus-divergence",
            TxValidationError::MandatoryFlagsFailed(_) => "mandatory-script-verify-flag-failed",
        }
    }
}

impl Rejection for MempoolPolicyError {
    fn kind(&self) -> RejectKind {
        use MempoolPolicyError as E;
        match self {
            E::Conflict(e) => e.kind(),
            E::Coinbase
            | E::SpendsConflictingTx { .. }
            | E::FeeOverflow
            | E::InputValuesOverflow
            | E::OutputValuesOverflow
            | E::InputsBelowOutputs => RejectKind::Invalid,
            E::PrematureWitness
            | E::NonStandardTx(_)
            | E::NonFinal
            | E::NonBIP68Final
            | E::NonStandardInputs
            | E::NonStandardWitness
            | E::TooManySigops { .. }
            | E::ChainLimits(_) => RejectKind::NonStandard,
            E::AlreadyInMempool | E::AlreadyKnown => RejectKind::Duplicate,
            E::RollingFeeThresholdNotMet { .. } | E::RelayFeeNotMet { .. } | E::MempoolFull => {
                RejectKind::InsufficientFee
            }
            E::AbsurdlyHighFee { .. } => RejectKind::HighFee,
        }
    }

    fn reason(&self) -> &str {
        use MempoolPolicyError as E;
        match self {
            E::Conflict(e) => e.reason(),
            E::Coinbase => "coinbase",
            E::PrematureWitness => "no-witness-yet",
            E::NonStandardTx(reason) => reason,
            E::NonFinal => "non-final",
            E::AlreadyInMempool => "txn-already-in-mempool",
            E::AlreadyKnown => "txn-already-known",
            E::NonBIP68Final => "non-BIP68-final",
            E::NonStandardInputs => "bad-txns-nonstandard-inputs",
            E::NonStandardWitness => "bad-witness-nonstandard",
            E::TooManySigops { .. } => "bad-txns-too-many-sigops",
            E::RollingFeeThresholdNotMet { .. } => "mempool min fee not met",
            E::RelayFeeNotMet { .. } => "min relay fee not met",
            E::AbsurdlyHighFee { .. } => "absurdly-high-fee",
            E::ChainLimits(_) => "too-long-mempool-chain",
            E::SpendsConflictingTx { .. } => "bad-txns-spends-conflicting-tx",
            E::MempoolFull => "mempool full",
            E::FeeOverflow => "fee-overflow",
            E::InputValuesOverflow => "bad-txns-inputvalues-outofrange",
            E::OutputValuesOverflow => "bad-txns-txouttotal-toolarge",
            E::InputsBelowOutputs => "bad-txns-in-belowout",
        }
    }
}

impl Rejection for MempoolConflictError {
    fn kind(&self) -> RejectKind {
        use MempoolConflictError as E;
        match self {
            E::Irreplaceable => RejectKind::Duplicate,
            E::ReplacesTooMany { .. } | E::SpendsNewUnconfirmed { .. } => RejectKind::NonStandard,
            E::ReplacementFeeRateTooLow { .. }
            | E::FeesLowerThanConflicts { .. }
            | E::NotEnoughAdditionalFees { .. } => RejectKind::InsufficientFee,
        }
    }

    fn reason(&self) -> &str {
        use MempoolConflictError as E;
        match self {
            E::Irreplaceable => "txn-mempool-conflict",
            E::ReplacesTooMany { .. } => "too many potential replacements",
            E::SpendsNewUnconfirmed { .. } => "replacement-adds-unconfirmed",
            E::ReplacementFeeRateTooLow { .. }
            | E::FeesLowerThanConflicts { .. }
            | E::NotEnoughAdditionalFees { .. } => "insufficient fee",
        }
    }
}
