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

use std::num::NonZeroUsize;

use common::primitives::{Amount, Rational};

use crate::error::MempoolPolicyError;
use crate::pool::fee::Fee;

/// The minimum extra feerate a replacement or a re-admission after eviction
/// has to pay on top of what it displaces. Rolling minimum feerates that
/// decay below half of this are snapped to zero.
pub const INCREMENTAL_RELAY_FEE_RATE: FeeRate = FeeRate::new(Amount::from_atoms(1000));

/// Fee per 1000 bytes of transaction size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FeeRate {
    atoms_per_kb: u128,
}

impl FeeRate {
    pub const fn new(atoms_per_kb: Amount) -> Self {
        Self {
            atoms_per_kb: atoms_per_kb.into_atoms(),
        }
    }

    /// The feerate implied by paying `total_tx_fee` for `tx_size` bytes,
    /// rounded up to the nearest atom per kilobyte.
    pub fn from_total_tx_fee(
        total_tx_fee: Fee,
        tx_size: NonZeroUsize,
    ) -> Result<Self, MempoolPolicyError> {
        let fee_kb = total_tx_fee
            .into_inner()
            .into_atoms()
            .checked_mul(1000)
            .ok_or(MempoolPolicyError::FeeOverflow)?;
        Ok(Self {
            atoms_per_kb: div_up(fee_kb, tx_size),
        })
    }

    /// The fee this feerate prescribes for a transaction of `size` bytes,
    /// rounded up.
    pub fn compute_fee(&self, size: usize) -> Result<Fee, MempoolPolicyError> {
        let size = size as u128;
        let fee = self
            .atoms_per_kb
            .checked_mul(size)
            .map(|f| (f + 999) / 1000)
            .ok_or(MempoolPolicyError::FeeOverflow)?;
        Ok(Fee::new(Amount::from_atoms(fee)))
    }

    pub fn atoms_per_kb(&self) -> u128 {
        self.atoms_per_kb
    }

    /// Exact comparison key for `fee / size` pairs, see [Rational].
    pub fn rational_of(fee: Fee, size: usize) -> Rational<u128> {
        Rational::new(fee.into_inner().into_atoms(), size as u128)
    }
}

fn div_up(dividend: u128, divisor: NonZeroUsize) -> u128 {
    let divisor = divisor.get() as u128;
    (dividend + divisor - 1) / divisor
}

impl std::ops::Add for FeeRate {
    type Output = Option<FeeRate>;

    fn add(self, other: Self) -> Self::Output {
        self.atoms_per_kb
            .checked_add(other.atoms_per_kb)
            .map(|atoms_per_kb| FeeRate { atoms_per_kb })
    }
}
