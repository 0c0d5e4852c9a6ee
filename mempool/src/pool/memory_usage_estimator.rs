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

use mockall::automock;

use super::store::MempoolStore;

/// How the pool measures its own memory consumption against the budget.
/// Mockable so tests can exercise eviction without gigabytes of data.
#[automock]
pub trait MemoryUsageEstimator {
    fn estimate_memory_usage(&self, store: &MempoolStore) -> usize;
}

/// Production estimator: the store's own accounting.
#[derive(Debug, Default, Clone)]
pub struct StoreMemoryUsageEstimator;

impl MemoryUsageEstimator for StoreMemoryUsageEstimator {
    fn estimate_memory_usage(&self, store: &MempoolStore) -> usize {
        store.dynamic_memory_usage()
    }
}
