// Copyright 2024, The Android Open Source Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use core::ffi::c_int;
use thiserror::Error;

/// Failures of the wrapper. None of them is retried: a missing module or
/// symbol does not appear by trying again.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("could not open the wrapped module '{path}': {reason}")]
    ModuleNotFound { path: String, reason: String },

    #[error("could not find the HAL module symbol in the wrapped module: {0}")]
    SymbolMissing(String),

    #[error("invalid wrapped module; expected '{expected}', but '{found}' was found")]
    IdentityMismatch { expected: String, found: String },

    #[error("wrapped module call failed: {0}")]
    ForeignCall(c_int),

    #[error("device is not open")]
    NotOpen,

    #[error("no GPS interface was got from the device")]
    NoSession,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Negative status code reported to the HAL caller.
    pub fn errno(&self) -> c_int {
        match self {
            Error::ForeignCall(status) => *status,
            Error::ModuleNotFound { .. }
            | Error::SymbolMissing(_)
            | Error::IdentityMismatch { .. }
            | Error::NotOpen
            | Error::NoSession => -libc::EINVAL,
        }
    }
}
