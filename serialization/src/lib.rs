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

//! Serialization for chain objects, a facade over the SCALE codec.

pub use parity_scale_codec::{Decode, DecodeAll, Encode, Error, Input, Output};

/// Decode a value from a byte slice, requiring the whole slice to be consumed.
pub fn decode_all<T: DecodeAll>(mut bytes: &[u8]) -> Result<T, Error> {
    T::decode_all(&mut bytes)
}
