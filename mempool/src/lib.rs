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

//! The unconfirmed transaction memory pool.
//!
//! Validates candidate transactions against chain state and policy, tracks
//! the dependency graph of pending transactions with exact package
//! aggregates, arbitrates opt-in fee-bumping replacement, and evicts the
//! least valuable packages when over budget. Block production pulls from it
//! through [tx_accumulator::TransactionAccumulator], relay through the query
//! methods on [pool::Mempool].

pub mod config;
pub mod error;
pub mod event;
pub mod feerate;
pub mod interface;
pub mod pool;
pub mod tx_accumulator;
pub mod tx_options;

pub use config::{MempoolConfig, MempoolMaxSize};
pub use error::Error;
pub use event::MempoolEvent;
pub use feerate::FeeRate;
pub use pool::{Mempool, MempoolRemovalReason, TxMempoolInfo};
pub use tx_options::TxOptions;

pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of a submission that did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// The transaction is now in the pool.
    InMempool,

    /// Some inputs are unknown; nothing was committed. The caller may park
    /// the transaction as an orphan and retry once its parents show up.
    MissingInputs,
}

impl TxStatus {
    pub fn is_in_mempool(&self) -> bool {
        matches!(self, TxStatus::InMempool)
    }

    pub fn assert_in_mempool(&self) {
        assert!(self.is_in_mempool(), "expected transaction to be in mempool");
    }
}
