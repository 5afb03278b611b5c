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

//! The parts of `linux/wireless.h` used to talk to the MT6628 driver.

use core::ffi::{c_char, c_void};

pub const IFNAMSIZ: usize = libc::IFNAMSIZ;

/// Sets private driver parameters.
pub const SIOCSIWPRIV: u32 = 0x8B0C;
/// First of the driver private ioctls.
pub const SIOCIWFIRSTPRIV: u32 = 0x8BE0;

/// `struct iw_point`: a buffer owned by the caller.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct IwPoint {
    pub pointer: *mut c_void,
    pub length: u16,
    pub flags: u16,
}

/// `union iwreq_data`. `words` spans the whole union.
#[repr(C)]
#[derive(Clone, Copy)]
pub union IwReqData {
    pub words: [u32; 4],
    pub data: IwPoint,
    pub addr: libc::sockaddr,
}

/// `struct iwreq`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct IwReq {
    pub ifr_name: [c_char; IFNAMSIZ],
    pub u: IwReqData,
}

impl IwReq {
    /// A zeroed request for the interface `ifname`.
    pub fn new(ifname: &str) -> Self {
        Self { ifr_name: ifname_to_c(ifname), u: IwReqData { words: [0; 4] } }
    }
}

/// `ifname` as a NUL terminated interface name, truncated to fit.
pub fn ifname_to_c(ifname: &str) -> [c_char; IFNAMSIZ] {
    let mut name = [0; IFNAMSIZ];
    for (dst, src) in name.iter_mut().zip(ifname.bytes().take(IFNAMSIZ - 1)) {
        *dst = src as c_char;
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::ffi::CStr;
    use core::mem::size_of;

    #[test]
    fn union_is_four_words() {
        assert_eq!(size_of::<IwReqData>(), 16);
        assert_eq!(size_of::<IwReq>(), IFNAMSIZ + 16);
    }

    #[test]
    fn names() {
        let name = ifname_to_c("wlan0");
        assert_eq!(unsafe { CStr::from_ptr(name.as_ptr()) }, c"wlan0");

        let long = ifname_to_c("a_very_long_interface_name");
        assert_eq!(unsafe { CStr::from_ptr(long.as_ptr()) }, c"a_very_long_int");
    }

    #[test]
    fn new_request_is_zeroed() {
        let request = IwReq::new("p2p0");
        assert_eq!(unsafe { request.u.words }, [0; 4]);
    }
}
