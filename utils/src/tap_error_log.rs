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

use std::fmt::Display;

/// Log the error contained in a `Result` while passing the value through.
pub trait LogError: Sized {
    /// Log the error, if any, at `error` level.
    fn log_err(self) -> Self;

    /// Log the error, if any, at `error` level with the given prefix.
    fn log_err_pfx(self, prefix: &str) -> Self;

    /// Log the error, if any, at `warn` level.
    fn log_warn_pfx(self, prefix: &str) -> Self;
}

impl<T, E: Display> LogError for Result<T, E> {
    fn log_err(self) -> Self {
        if let Err(e) = &self {
            log::error!("{e}");
        }
        self
    }

    fn log_err_pfx(self, prefix: &str) -> Self {
        if let Err(e) = &self {
            log::error!("{prefix}: {e}");
        }
        self
    }

    fn log_warn_pfx(self, prefix: &str) -> Self {
        if let Err(e) = &self {
            log::warn!("{prefix}: {e}");
        }
        self
    }
}
