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

use common::primitives::Amount;

use crate::config::Time;

/// Options specifying how a single submission should be handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOptions {
    limit_free: bool,
    bypass_limits: bool,
    absurd_fee: Option<Amount>,
    accept_time: Option<Time>,
}

impl TxOptions {
    /// Defaults for a transaction received from the network or RPC.
    pub const fn default_relay() -> Self {
        Self {
            limit_free: true,
            bypass_limits: false,
            absurd_fee: None,
            accept_time: None,
        }
    }

    /// Defaults for a transaction re-admitted from a disconnected block.
    /// Such transactions already paid for their bandwidth once, so the relay
    /// fee floor and the memory budget do not apply to them.
    pub const fn default_resurrected() -> Self {
        Self {
            limit_free: false,
            bypass_limits: true,
            absurd_fee: None,
            accept_time: None,
        }
    }

    pub fn with_absurd_fee(mut self, threshold: Amount) -> Self {
        self.absurd_fee = Some(threshold);
        self
    }

    pub fn with_limit_free(mut self, limit_free: bool) -> Self {
        self.limit_free = limit_free;
        self
    }

    pub fn with_accept_time(mut self, time: Time) -> Self {
        self.accept_time = Some(time);
        self
    }

    pub fn limit_free(&self) -> bool {
        self.limit_free
    }

    pub fn bypass_limits(&self) -> bool {
        self.bypass_limits
    }

    pub fn absurd_fee(&self) -> Option<Amount> {
        self.absurd_fee
    }

    pub fn accept_time(&self) -> Option<Time> {
        self.accept_time
    }
}

impl Default for TxOptions {
    fn default() -> Self {
        Self::default_relay()
    }
}
