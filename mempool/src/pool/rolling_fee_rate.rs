// Copyright (c) 2022 RBB S.r.l
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
use logging::log;

use crate::config::Time;
use crate::feerate::FeeRate;

/// The decaying feerate floor raised by evictions, so that transactions that
/// were just priced out cannot immediately churn back in.
#[derive(Clone, Copy, Debug)]
pub struct RollingFeeRate {
    block_since_last_rolling_fee_bump: bool,
    rolling_minimum_fee_rate: FeeRate,
    last_rolling_fee_update: Time,
}

impl RollingFeeRate {
    pub fn new(creation_time: Time) -> Self {
        Self {
            block_since_last_rolling_fee_bump: false,
            rolling_minimum_fee_rate: FeeRate::new(Amount::ZERO),
            last_rolling_fee_update: creation_time,
        }
    }

    /// Exponentially decay the floor with the given half-life.
    #[allow(clippy::float_arithmetic)]
    pub fn decay_fee(mut self, halflife: Time, current_time: Time) -> Self {
        let elapsed = current_time.saturating_sub(self.last_rolling_fee_update);
        let halvings = elapsed.as_secs_f64() / halflife.as_secs_f64();
        let decayed = (self.rolling_minimum_fee_rate.atoms_per_kb() as f64) / halvings.exp2();

        log::trace!(
            "rolling fee decay: {:?} -> {decayed} atoms/kb after {elapsed:?} (halflife {halflife:?})",
            self.rolling_minimum_fee_rate,
        );

        self.rolling_minimum_fee_rate = FeeRate::new(Amount::from_atoms(decayed as u128));
        self.last_rolling_fee_update = current_time;
        self
    }

    pub fn rolling_minimum_fee_rate(&self) -> FeeRate {
        self.rolling_minimum_fee_rate
    }

    pub fn set_rolling_minimum_fee_rate(&mut self, rate: FeeRate) {
        self.rolling_minimum_fee_rate = rate;
    }

    pub fn block_since_last_rolling_fee_bump(&self) -> bool {
        self.block_since_last_rolling_fee_bump
    }

    pub fn set_block_since_last_rolling_fee_bump(&mut self, flag: bool) {
        self.block_since_last_rolling_fee_bump = flag;
    }

    pub fn last_rolling_fee_update(&self) -> Time {
        self.last_rolling_fee_update
    }

    pub fn set_last_rolling_fee_update(&mut self, time: Time) {
        self.last_rolling_fee_update = time;
    }
}
