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

use std::fmt::{Debug, Display};

use blake2::{digest::consts::U32, Blake2b, Digest};
use serialization::{Decode, Encode};

fixed_hash::construct_fixed_hash! {
    #[derive(Encode, Decode)]
    pub struct H256(32);
}

type Blake2b32 = Blake2b<U32>;

/// Hash the SCALE encoding of the given value.
pub fn hash_encoded<T: Encode>(value: &T) -> H256 {
    let mut hasher = Blake2b32::new();
    value.encode_to(&mut HashWriter(&mut hasher));
    H256(hasher.finalize().into())
}

struct HashWriter<'a>(&'a mut Blake2b32);

impl serialization::Output for HashWriter<'_> {
    fn write(&mut self, bytes: &[u8]) {
        self.0.update(bytes)
    }
}

/// A typed object identifier.
///
/// The phantom tag statically separates, say, a transaction id from a block
/// id even though both are 256-bit hashes underneath.
#[derive(Encode, Decode)]
pub struct Id<T> {
    hash: H256,
    _shadow: std::marker::PhantomData<fn() -> T>,
}

// Comparisons, like cloning, are implemented manually: a derive would put
// bounds on the tag type, which is never instantiated.
impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.hash.cmp(&other.hash)
    }
}

impl<T> Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Id{{{:x}}}", self.hash)
    }
}

impl<T> Display for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:x}", self.hash)
    }
}

impl<T> Id<T> {
    pub const fn new(hash: H256) -> Self {
        Self {
            hash,
            _shadow: std::marker::PhantomData,
        }
    }

    pub const fn to_hash(&self) -> H256 {
        self.hash
    }

    pub const fn zero() -> Self {
        Self::new(H256::zero())
    }
}

impl<T> From<H256> for Id<T> {
    fn from(hash: H256) -> Self {
        Self::new(hash)
    }
}

/// Objects that have a canonical id derived from their contents
pub trait Idable {
    type Tag;
    fn get_id(&self) -> Id<Self::Tag>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_encoded_is_stable_per_value() {
        let a = hash_encoded(&42u64);
        let b = hash_encoded(&42u64);
        let c = hash_encoded(&43u64);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn id_ordering_follows_hash_ordering() {
        struct Tag;
        let lo = Id::<Tag>::new(H256::from_low_u64_be(1));
        let hi = Id::<Tag>::new(H256::from_low_u64_be(2));
        assert!(lo < hi);
        assert_eq!(lo, Id::<Tag>::new(H256::from_low_u64_be(1)));
    }
}
