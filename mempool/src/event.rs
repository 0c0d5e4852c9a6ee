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

use common::{
    chain::Transaction,
    primitives::{BlockHeight, Id, H256},
};

use crate::pool::MempoolRemovalReason;

/// Event triggered when a transaction has been committed to the pool
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TransactionAdded {
    tx_id: Id<Transaction>,
}

impl TransactionAdded {
    pub fn new(tx_id: Id<Transaction>) -> Self {
        Self { tx_id }
    }

    pub fn tx_id(&self) -> &Id<Transaction> {
        &self.tx_id
    }
}

/// Event triggered when a transaction has left the pool
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TransactionRemoved {
    tx_id: Id<Transaction>,
    reason: MempoolRemovalReason,
}

impl TransactionRemoved {
    pub fn new(tx_id: Id<Transaction>, reason: MempoolRemovalReason) -> Self {
        Self { tx_id, reason }
    }

    pub fn tx_id(&self) -> &Id<Transaction> {
        &self.tx_id
    }

    pub fn reason(&self) -> MempoolRemovalReason {
        self.reason
    }
}

/// Event triggered when a transaction has been evicted in favor of a
/// fee-bumping replacement. Emitted before the replacement's
/// [TransactionAdded].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TransactionReplaced {
    replaced_id: Id<Transaction>,
    replacement_id: Id<Transaction>,
}

impl TransactionReplaced {
    pub fn new(replaced_id: Id<Transaction>, replacement_id: Id<Transaction>) -> Self {
        Self {
            replaced_id,
            replacement_id,
        }
    }

    pub fn replaced_id(&self) -> &Id<Transaction> {
        &self.replaced_id
    }

    pub fn replacement_id(&self) -> &Id<Transaction> {
        &self.replacement_id
    }
}

/// Event triggered when the pool has processed a new chain tip
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NewTip {
    block_hash: H256,
    height: BlockHeight,
}

impl NewTip {
    pub fn new(block_hash: H256, height: BlockHeight) -> Self {
        Self { block_hash, height }
    }

    pub fn block_hash(&self) -> H256 {
        self.block_hash
    }

    pub fn block_height(&self) -> BlockHeight {
        self.height
    }
}

/// Events emitted by the mempool.
///
/// Handlers run synchronously under the pool's mutation path and must not
/// call back into the pool.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum MempoolEvent {
    TransactionAdded(TransactionAdded),
    TransactionRemoved(TransactionRemoved),
    TransactionReplaced(TransactionReplaced),
    NewTip(NewTip),
}

impl From<TransactionAdded> for MempoolEvent {
    fn from(event: TransactionAdded) -> Self {
        Self::TransactionAdded(event)
    }
}

impl From<TransactionRemoved> for MempoolEvent {
    fn from(event: TransactionRemoved) -> Self {
        Self::TransactionRemoved(event)
    }
}

impl From<TransactionReplaced> for MempoolEvent {
    fn from(event: TransactionReplaced) -> Self {
        Self::TransactionReplaced(event)
    }
}

impl From<NewTip> for MempoolEvent {
    fn from(event: NewTip) -> Self {
        Self::NewTip(event)
    }
}
