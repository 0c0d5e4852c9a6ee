// Copyright (c) 2021-2022 RBB S.r.l
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

type HeightIntType = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Encode, Decode)]
pub struct BlockHeight(HeightIntType);

impl BlockHeight {
    pub const fn new(height: HeightIntType) -> Self {
        Self(height)
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn into_int(self) -> HeightIntType {
        self.0
    }

    pub fn next_height(self) -> Self {
        Self(self.0.checked_add(1).expect("height overflow"))
    }

    pub fn checked_add(self, rhs: HeightIntType) -> Option<Self> {
        self.0.checked_add(rhs).map(Self)
    }

    /// Number of blocks between `self` and an earlier height, if it is earlier.
    pub fn distance_since(self, earlier: Self) -> Option<HeightIntType> {
        self.0.checked_sub(earlier.0)
    }
}

impl From<HeightIntType> for BlockHeight {
    fn from(height: HeightIntType) -> Self {
        Self(height)
    }
}

impl std::fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
