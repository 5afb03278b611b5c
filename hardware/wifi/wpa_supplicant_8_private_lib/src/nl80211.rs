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

//! Partial copies of the nl80211 driver structures of wpa_supplicant_8.
//!
//! wpa_supplicant has no header for them, so they are mirrored here from
//! `src/drivers/driver_nl80211.c`, only up to the last field used. They are
//! only ever accessed through pointers handed by the supplicant.

use core::ffi::{c_char, c_int, c_void};
use fp1_hw_common::wext::IFNAMSIZ;
use std::os::fd::RawFd;

#[repr(C)]
pub struct DlList {
    pub next: *mut DlList,
    pub prev: *mut DlList,
}

#[repr(C)]
pub struct Nl80211Global {
    pub interfaces: DlList,
    pub if_add_ifindex: c_int,
    pub netlink: *mut c_void,
    pub nl_cb: *mut c_void,
    pub nl: *mut c_void,
    pub nl80211_id: c_int,
    /// Socket for ioctl() use.
    pub ioctl_sock: c_int,
}

#[repr(C)]
pub struct I802Bss {
    pub drv: *mut WpaDriverNl80211Data,
    pub next: *mut I802Bss,
    pub ifindex: c_int,
    pub ifname: [c_char; IFNAMSIZ + 1],
}

#[repr(C)]
pub struct WpaDriverNl80211Data {
    pub global: *mut Nl80211Global,
    pub list: DlList,
    pub wiphy_list: DlList,
    pub phyname: [c_char; 32],
    pub ctx: *mut c_void,
}

/// What a driver command needs from the supplicant state.
#[derive(Debug)]
pub struct Interface {
    pub ifname: String,
    pub ioctl_sock: RawFd,
    /// Supplicant context events are reported to.
    pub ctx: *mut c_void,
}

impl Interface {
    /// Reads the interface of the BSS `bss`. Returns `None` if any of the
    /// structures on the way is missing.
    ///
    /// # Safety
    ///
    /// `bss` must be null or the `i802_bss` wpa_supplicant passes as `priv`.
    pub unsafe fn from_bss(bss: *const I802Bss) -> Option<Self> {
        // SAFETY: The caller guarantees the pointers are null or valid.
        let bss = unsafe { bss.as_ref()? };
        let drv = unsafe { bss.drv.as_ref()? };
        let global = unsafe { drv.global.as_ref()? };

        let ifname: Vec<u8> =
            bss.ifname.iter().take_while(|&&c| c != 0).map(|&c| c as u8).collect();
        Some(Self {
            ifname: String::from_utf8_lossy(&ifname).into_owned(),
            ioctl_sock: global.ioctl_sock,
            ctx: drv.ctx,
        })
    }
}
