// Copyright (c) 2021-2023 RBB S.r.l
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

use crate::primitives::{
    id::{hash_encoded, Idable},
    Amount, Id, H256,
};

/// Sequence number that disables both relative lock time and replaceability
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// Highest sequence number that still signals opt-in replaceability
pub const MAX_BIP125_RBF_SEQUENCE: u32 = 0xffff_fffd;

/// Witness data contributes to the total serialized size with a discount;
/// one non-witness byte weighs as much as this many witness bytes.
pub const WITNESS_SCALE_FACTOR: usize = 4;

/// Reference to a single output of a previous transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Encode, Decode)]
pub struct OutPoint {
    txid: Id<Transaction>,
    index: u32,
}

impl OutPoint {
    pub const fn new(txid: Id<Transaction>, index: u32) -> Self {
        Self { txid, index }
    }

    /// The out-of-band outpoint spent by coinbase transactions
    pub const fn null() -> Self {
        Self::new(Id::zero(), u32::MAX)
    }

    pub fn is_null(&self) -> bool {
        *self == Self::null()
    }

    pub const fn txid(&self) -> Id<Transaction> {
        self.txid
    }

    pub const fn index(&self) -> u32 {
        self.index
    }
}

impl std::fmt::Display for OutPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Encode, Decode)]
pub struct TxInput {
    outpoint: OutPoint,
    witness: Vec<Vec<u8>>,
    sequence: u32,
}

impl TxInput {
    pub fn new(outpoint: OutPoint, sequence: u32) -> Self {
        Self {
            outpoint,
            witness: Vec::new(),
            sequence,
        }
    }

    pub fn with_witness(mut self, witness: Vec<Vec<u8>>) -> Self {
        self.witness = witness;
        self
    }

    pub fn outpoint(&self) -> &OutPoint {
        &self.outpoint
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn witness(&self) -> &[Vec<u8>] {
        &self.witness
    }

    pub fn has_witness(&self) -> bool {
        !self.witness.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Encode, Decode)]
pub enum Destination {
    AnyoneCanSpend,
    ScriptHash(H256),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Encode, Decode)]
pub struct TxOutput {
    value: Amount,
    destination: Destination,
}

impl TxOutput {
    pub fn new(value: Amount, destination: Destination) -> Self {
        Self { value, destination }
    }

    pub fn value(&self) -> Amount {
        self.value
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Transaction {
    flags: u32,
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
    lock_time: u32,
}

impl Transaction {
    pub fn new(flags: u32, inputs: Vec<TxInput>, outputs: Vec<TxOutput>, lock_time: u32) -> Self {
        Self {
            flags,
            inputs,
            outputs,
            lock_time,
        }
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn inputs(&self) -> &[TxInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    pub fn lock_time(&self) -> u32 {
        self.lock_time
    }

    /// Coinbase transactions have exactly one input spending the null outpoint
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].outpoint().is_null()
    }

    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(TxInput::has_witness)
    }

    pub fn encoded_size(&self) -> usize {
        Encode::encoded_size(self)
    }

    /// Serialized size with all witness data stripped
    pub fn encoded_size_without_witness(&self) -> usize {
        Encode::encoded_size(&self.witness_stripped_form())
    }

    /// Transaction weight: non-witness bytes count `WITNESS_SCALE_FACTOR`
    /// times, witness bytes once.
    pub fn weight(&self) -> usize {
        self.encoded_size_without_witness() * (WITNESS_SCALE_FACTOR - 1) + self.encoded_size()
    }

    /// Hash of the full serialization, witness included
    pub fn witness_hash(&self) -> H256 {
        hash_encoded(self)
    }

    // The id must not change when the witness does, so it covers the
    // witness-stripped serialization only.
    fn witness_stripped_form(&self) -> (u32, Vec<(OutPoint, u32)>, &Vec<TxOutput>, u32) {
        let inputs = self.inputs.iter().map(|i| (*i.outpoint(), i.sequence())).collect();
        (self.flags, inputs, &self.outputs, self.lock_time)
    }
}

impl Idable for Transaction {
    type Tag = Transaction;

    fn get_id(&self) -> Id<Transaction> {
        hash_encoded(&self.witness_stripped_form()).into()
    }
}
