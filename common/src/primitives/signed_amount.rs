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

pub type SignedIntType = i128;

/// A signed amount, used where a fee delta may be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Encode, Decode)]
pub struct SignedAmount {
    atoms: SignedIntType,
}

impl SignedAmount {
    pub const ZERO: Self = Self::from_atoms(0);

    pub const fn from_atoms(atoms: SignedIntType) -> Self {
        SignedAmount { atoms }
    }

    pub const fn into_atoms(&self) -> SignedIntType {
        self.atoms
    }
}

impl std::ops::Add for SignedAmount {
    type Output = Option<Self>;

    fn add(self, other: Self) -> Self::Output {
        self.atoms.checked_add(other.atoms).map(Self::from_atoms)
    }
}

impl std::ops::Sub for SignedAmount {
    type Output = Option<Self>;

    fn sub(self, other: Self) -> Self::Output {
        self.atoms.checked_sub(other.atoms).map(Self::from_atoms)
    }
}

impl std::ops::Neg for SignedAmount {
    type Output = Option<Self>;

    fn neg(self) -> Self::Output {
        self.atoms.checked_neg().map(Self::from_atoms)
    }
}

impl std::fmt::Display for SignedAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.atoms)
    }
}
