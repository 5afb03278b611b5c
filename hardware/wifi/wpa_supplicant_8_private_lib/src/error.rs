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
use nix::errno::Errno;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("{request} on {ifname} failed: {errno}")]
    Ioctl { request: &'static str, ifname: String, errno: Errno },

    #[error("{ifname} is not an Ethernet interface (hardware type {family})")]
    NotEthernet { ifname: String, family: u16 },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Status reported to wpa_supplicant, which only tells failures apart
    /// from success.
    pub fn status(&self) -> c_int {
        -1
    }
}
