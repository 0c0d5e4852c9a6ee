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

use common::chain::Transaction;
use thiserror::Error;

use crate::pool::fee::Fee;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TxAccumulatorError {
    #[error("Accumulated fees overflow")]
    FeeAccumulationOverflow,
}

/// Accumulates transactions for block production.
///
/// [crate::pool::Mempool::collect_txs] feeds it entries best-feerate-first;
/// the accumulator decides when it has seen enough.
pub trait TransactionAccumulator {
    /// Offer a transaction. Implementations silently skip transactions that
    /// do not fit and flip to done when full.
    fn add_tx(&mut self, tx: Transaction, tx_fee: Fee) -> Result<(), TxAccumulatorError>;

    fn done(&self) -> bool;

    fn transactions(&self) -> &[Transaction];

    fn total_fees(&self) -> Fee;
}

/// Accumulator bounded by total serialized size.
pub struct DefaultTxAccumulator {
    transactions: Vec<Transaction>,
    total_size: usize,
    size_limit: usize,
    total_fees: Fee,
    done: bool,
}

impl DefaultTxAccumulator {
    pub fn new(size_limit: usize) -> Self {
        Self {
            transactions: Vec::new(),
            total_size: 0,
            size_limit,
            total_fees: Fee::ZERO,
            done: false,
        }
    }

    pub fn total_size(&self) -> usize {
        self.total_size
    }
}

impl TransactionAccumulator for DefaultTxAccumulator {
    fn add_tx(&mut self, tx: Transaction, tx_fee: Fee) -> Result<(), TxAccumulatorError> {
        let tx_size = tx.encoded_size();
        if self.total_size + tx_size > self.size_limit {
            self.done = true;
            return Ok(());
        }
        self.total_size += tx_size;
        self.total_fees =
            (self.total_fees + tx_fee).ok_or(TxAccumulatorError::FeeAccumulationOverflow)?;
        self.transactions.push(tx);
        Ok(())
    }

    fn done(&self) -> bool {
        self.done
    }

    fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    fn total_fees(&self) -> Fee {
        self.total_fees
    }
}
