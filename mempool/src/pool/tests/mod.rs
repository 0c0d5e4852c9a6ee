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

mod accumulator;
mod reorg;
mod script_checks;
mod utils;

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use common::{
    chain::{Coin, Destination, OutPoint, Transaction, TxInput, TxOutput, SEQUENCE_FINAL},
    primitives::{Amount, BlockHeight, Id, Idable, SignedAmount},
};

use crate::config::MempoolMaxSize;
use crate::error::{
    ChainLimitsError, Error, MempoolConflictError, MempoolPolicyError, RejectKind, Rejection,
};
use crate::event::MempoolEvent;
use crate::pool::fee::Fee;
use crate::pool::MempoolRemovalReason;
use crate::tx_options::TxOptions;
use crate::TxStatus;

use self::utils::*;
