// Copyright (c) 2021-2023 RBB S.r.l
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

use serialization::{Decode, Encode};

use super::signed_amount::SignedAmount;

pub type UnsignedIntType = u128;

/// An unsigned token amount in indivisible units.
///
/// All arithmetic is checked; operators return `Option` so that overflow
/// handling is forced onto the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Encode, Decode)]
pub struct Amount {
    atoms: UnsignedIntType,
}

impl Amount {
    pub const MAX: Self = Self::from_atoms(UnsignedIntType::MAX);
    pub const ZERO: Self = Self::from_atoms(0);

    pub const fn from_atoms(atoms: UnsignedIntType) -> Self {
        Amount { atoms }
    }

    pub const fn into_atoms(&self) -> UnsignedIntType {
        self.atoms
    }

    pub fn into_signed(self) -> Option<SignedAmount> {
        i128::try_from(self.atoms).ok().map(SignedAmount::from_atoms)
    }

    pub fn from_signed(amount: SignedAmount) -> Option<Self> {
        u128::try_from(amount.into_atoms()).ok().map(Self::from_atoms)
    }

    /// Add a signed delta, failing on overflow in either direction.
    pub fn add_signed(self, delta: SignedAmount) -> Option<Self> {
        let atoms = delta.into_atoms();
        if atoms >= 0 {
            self.atoms.checked_add(atoms.unsigned_abs()).map(Self::from_atoms)
        } else {
            self.atoms.checked_sub(atoms.unsigned_abs()).map(Self::from_atoms)
        }
    }
}

impl std::ops::Add for Amount {
    type Output = Option<Self>;

    fn add(self, other: Self) -> Self::Output {
        self.atoms.checked_add(other.atoms).map(Self::from_atoms)
    }
}

impl std::ops::Sub for Amount {
    type Output = Option<Self>;

    fn sub(self, other: Self) -> Self::Output {
        self.atoms.checked_sub(other.atoms).map(Self::from_atoms)
    }
}

impl std::ops::Mul<UnsignedIntType> for Amount {
    type Output = Option<Self>;

    fn mul(self, other: UnsignedIntType) -> Self::Output {
        self.atoms.checked_mul(other).map(Self::from_atoms)
    }
}

impl std::ops::Div<UnsignedIntType> for Amount {
    type Output = Option<Self>;

    fn div(self, other: UnsignedIntType) -> Self::Output {
        self.atoms.checked_div(other).map(Self::from_atoms)
    }
}

impl std::iter::Sum<Amount> for Option<Amount> {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Some(Amount::ZERO), |acc, x| acc.and_then(|a| a + x))
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.atoms)
    }
}
