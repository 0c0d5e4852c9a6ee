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

use serialization::{Decode, Encode};

use super::transaction::TxOutput;
use crate::primitives::BlockHeight;

/// An unspent transaction output together with its provenance
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Coin {
    output: TxOutput,
    height: BlockHeight,
    is_coinbase: bool,
}

impl Coin {
    pub fn new(output: TxOutput, height: BlockHeight, is_coinbase: bool) -> Self {
        Self {
            output,
            height,
            is_coinbase,
        }
    }

    pub fn output(&self) -> &TxOutput {
        &self.output
    }

    pub fn height(&self) -> BlockHeight {
        self.height
    }

    pub fn is_coinbase(&self) -> bool {
        self.is_coinbase
    }
}
