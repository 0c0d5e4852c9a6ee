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

//! Single point of control over the source of randomness used in the node.

pub use rand::{rngs, CryptoRng, Rng, RngCore, SeedableRng};

/// Make an rng seeded from the operating system entropy source.
pub fn make_true_rng() -> impl Rng + CryptoRng {
    rngs::StdRng::from_entropy()
}

/// Make a deterministic rng from an explicit seed. Only for tests.
pub fn make_seedable_rng(seed: u64) -> impl Rng + CryptoRng {
    rngs::StdRng::seed_from_u64(seed)
}
