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

use std::time::Duration;

use common::primitives::BlockHeight;

use crate::feerate::{FeeRate, INCREMENTAL_RELAY_FEE_RATE};
use crate::interface::ScriptVerifyFlags;

pub type Time = Duration;

pub const ROLLING_FEE_BASE_HALFLIFE: Time = Duration::from_secs(60 * 60 * 12);
pub const ROLLING_FEE_DECAY_INTERVAL: Time = Duration::from_secs(10);

/// Upper bound on the total number of transactions a replacement may evict.
pub const MAX_BIP125_REPLACEMENT_CANDIDATES: usize = 100;

/// Sig-op cost above which a transaction is not accepted even though a block
/// could technically include it.
pub const MAX_STANDARD_TX_SIGOPS_COST: u64 = 80_000;

/// Conversion factor between sig-op cost and weight units when computing the
/// virtual transaction size.
pub const BYTES_PER_SIGOP: u64 = 20;

/// Blocks a coinbase output must wait before it can be spent.
pub const COINBASE_MATURITY: u64 = 100;

/// Virtual height given to unconfirmed outputs in the composed coin view.
pub const MEMPOOL_HEIGHT: BlockHeight = BlockHeight::new(0x7fff_ffff);

pub const DEFAULT_MAX_MEMPOOL_SIZE_BYTES: usize = 300_000_000;
pub const DEFAULT_MEMPOOL_EXPIRY: Duration = Duration::from_secs(336 * 60 * 60);

pub const DEFAULT_ANCESTOR_LIMIT: usize = 25;
pub const DEFAULT_ANCESTOR_SIZE_LIMIT_KB: usize = 101;
pub const DEFAULT_DESCENDANT_LIMIT: usize = 25;
pub const DEFAULT_DESCENDANT_SIZE_LIMIT_KB: usize = 101;

/// Memory budget for the pool contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MempoolMaxSize(usize);

impl MempoolMaxSize {
    pub const fn from_bytes(bytes: usize) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> usize {
        self.0
    }
}

impl Default for MempoolMaxSize {
    fn default() -> Self {
        Self(DEFAULT_MAX_MEMPOOL_SIZE_BYTES)
    }
}

/// Limits on the in-pool package an incoming transaction would join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainLimits {
    pub ancestor_count: usize,
    pub ancestor_size_bytes: usize,
    pub descendant_count: usize,
    pub descendant_size_bytes: usize,
}

impl ChainLimits {
    pub fn unlimited() -> Self {
        Self {
            ancestor_count: usize::MAX,
            ancestor_size_bytes: usize::MAX,
            descendant_count: usize::MAX,
            descendant_size_bytes: usize::MAX,
        }
    }
}

/// Operator-tunable mempool behavior.
#[derive(Debug, Clone)]
pub struct MempoolConfig {
    pub max_size: MempoolMaxSize,
    pub max_tx_age: Duration,
    pub limit_ancestor_count: usize,
    pub limit_ancestor_size: usize,
    pub limit_descendant_count: usize,
    pub limit_descendant_size: usize,
    pub accept_premature_witness: bool,
    pub require_standard: bool,
    pub promiscuous_mempool_flags: Option<ScriptVerifyFlags>,
    pub enable_replacement: bool,
    pub min_relay_fee_rate: FeeRate,
    pub incremental_relay_fee_rate: FeeRate,

    /// Probability of running the full consistency check after a mutation,
    /// as a fraction of `u32::MAX`. Zero disables the check.
    pub check_frequency: u32,
}

impl MempoolConfig {
    pub fn chain_limits(&self) -> ChainLimits {
        ChainLimits {
            ancestor_count: self.limit_ancestor_count,
            ancestor_size_bytes: self.limit_ancestor_size,
            descendant_count: self.limit_descendant_count,
            descendant_size_bytes: self.limit_descendant_size,
        }
    }
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_size: MempoolMaxSize::default(),
            max_tx_age: DEFAULT_MEMPOOL_EXPIRY,
            limit_ancestor_count: DEFAULT_ANCESTOR_LIMIT,
            limit_ancestor_size: DEFAULT_ANCESTOR_SIZE_LIMIT_KB * 1000,
            limit_descendant_count: DEFAULT_DESCENDANT_LIMIT,
            limit_descendant_size: DEFAULT_DESCENDANT_SIZE_LIMIT_KB * 1000,
            accept_premature_witness: false,
            require_standard: true,
            promiscuous_mempool_flags: None,
            enable_replacement: true,
            min_relay_fee_rate: INCREMENTAL_RELAY_FEE_RATE,
            incremental_relay_fee_rate: INCREMENTAL_RELAY_FEE_RATE,
            check_frequency: 0,
        }
    }
}
