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

use common::chain::{Coin, OutPoint};

use crate::interface::CoinsView;

use super::store::MempoolStore;

/// Coin view layering unconfirmed outputs over the confirmed utxo set.
///
/// Pool outputs are served first: they can never conflict with the backing
/// view and, unlike it, always carry the full output.
pub struct MempoolCoinsView<'a, V> {
    base: &'a V,
    store: &'a MempoolStore,
}

impl<'a, V: CoinsView> MempoolCoinsView<'a, V> {
    pub fn new(base: &'a V, store: &'a MempoolStore) -> Self {
        Self { base, store }
    }
}

impl<V: CoinsView> CoinsView for MempoolCoinsView<'_, V> {
    fn lookup(&self, outpoint: &OutPoint) -> Option<Coin> {
        self.store.unconfirmed_coin(outpoint).or_else(|| self.base.lookup(outpoint))
    }

    fn have_in_cache(&self, outpoint: &OutPoint) -> bool {
        self.base.have_in_cache(outpoint)
    }

    fn uncache(&self, outpoint: &OutPoint) {
        self.base.uncache(outpoint)
    }
}
