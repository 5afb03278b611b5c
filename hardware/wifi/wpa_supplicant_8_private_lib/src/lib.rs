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

//! Android private driver commands of wpa_supplicant_8 for the MT6628.
//!
//! wpa_supplicant forwards `DRIVER <command>` requests of the Android
//! framework to `wpa_driver_nl80211_driver_cmd`, which each device provides.
//! Only the commands the framework needs for this chip are handled; the rest
//! are acknowledged and ignored.

pub mod backend;
pub mod error;
pub mod events;
pub mod nl80211;

use crate::backend::{DriverBackend, ETH_ALEN};
use crate::events::{SupplicantEvents, WPA_EVENT_DRIVER_STATE};
use crate::nl80211::{I802Bss, Interface};
use core::ffi::{c_char, c_int, c_void, CStr};

#[cfg(not(test))]
const LOG_TAG: &str = "wpa_supplicant";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverCommand<'a> {
    Start,
    Stop,
    MacAddr,
    /// `COUNTRY <code>`, passed as is to the driver.
    Country,
    Unsupported(&'a CStr),
}

impl<'a> DriverCommand<'a> {
    pub fn parse(cmd: &'a CStr) -> Self {
        let bytes = cmd.to_bytes();
        if bytes == b"START" {
            DriverCommand::Start
        } else if bytes == b"STOP" {
            DriverCommand::Stop
        } else if bytes.eq_ignore_ascii_case(b"MACADDR") {
            DriverCommand::MacAddr
        } else if bytes.starts_with(b"COUNTRY") {
            DriverCommand::Country
        } else {
            DriverCommand::Unsupported(cmd)
        }
    }
}

fn format_mac(addr: &[u8; ETH_ALEN]) -> String {
    addr.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(":")
}

/// Copies `text` to `buf` as `snprintf` would: truncated and NUL terminated
/// if `buf` is too short. Returns the length of the whole `text`.
fn write_reply(buf: &mut [u8], text: &str) -> c_int {
    if let Some(capacity) = buf.len().checked_sub(1) {
        let len = text.len().min(capacity);
        buf[..len].copy_from_slice(&text.as_bytes()[..len]);
        buf[len] = 0;
    }
    c_int::try_from(text.len()).unwrap_or(c_int::MAX)
}

/// Runs the private command `cmd` on `iface`, replying in `buf`.
///
/// Returns the length of the reply, 0 for commands without reply, or a
/// negative value on failure.
pub fn driver_cmd(
    iface: &Interface,
    cmd: &CStr,
    buf: &mut [u8],
    backend: &impl DriverBackend,
    events: &impl SupplicantEvents,
) -> c_int {
    match DriverCommand::parse(cmd) {
        command @ (DriverCommand::Start | DriverCommand::Stop) => {
            let up = command == DriverCommand::Start;
            let (direction, state) = if up { ("up", "STARTED") } else { ("down", "STOPPED") };
            // The driver state is reported whether or not the flags could be set.
            if let Err(e) = backend.set_iface_up(&iface.ifname, up) {
                log::warn!("Could not set {} {}: {}", iface.ifname, direction, e);
            }
            events.message(&format!("{}{}", WPA_EVENT_DRIVER_STATE, state));
            0
        }
        DriverCommand::MacAddr => match backend.hw_addr(&iface.ifname) {
            Ok(addr) => write_reply(buf, &format!("Macaddr = {}\n", format_mac(&addr))),
            Err(e) => {
                log::error!("Could not get the MAC address: {}", e);
                e.status()
            }
        },
        DriverCommand::Country => match backend.set_priv(&iface.ifname, cmd) {
            Ok(status) => {
                events.channel_list_changed();
                status
            }
            Err(e) => {
                log::error!("Failed to issue 'COUNTRY' private command: {}", e);
                e.status()
            }
        },
        DriverCommand::Unsupported(cmd) => {
            log::warn!("Unsupported private command: {}", cmd.to_string_lossy());
            0
        }
    }
}

/// Runs the C-side driver command request: `priv_` is the `i802_bss` of the
/// interface. `kernel` gives the backend and event sink for the interface.
///
/// # Safety
///
/// `priv_` must be null or the `i802_bss` of the interface, `cmd` null or a C
/// string, and `buf` null or writable for `buf_len` bytes.
unsafe fn driver_cmd_raw<B: DriverBackend, E: SupplicantEvents>(
    priv_: *mut c_void,
    cmd: *const c_char,
    buf: *mut c_char,
    buf_len: usize,
    kernel: impl FnOnce(&Interface) -> (B, E),
) -> c_int {
    // SAFETY: The caller passes null or its `i802_bss` as `priv_`.
    let Some(iface) = (unsafe { Interface::from_bss(priv_.cast::<I802Bss>()) }) else {
        log::error!("Driver command without a driver");
        return -1;
    };
    if cmd.is_null() {
        log::error!("Null driver command");
        return -1;
    }
    // SAFETY: Non-null, and a C string per the contract.
    let cmd = unsafe { CStr::from_ptr(cmd) };
    let buf: &mut [u8] = if buf.is_null() {
        &mut []
    } else {
        // SAFETY: Writable for `buf_len` bytes per the contract.
        unsafe { std::slice::from_raw_parts_mut(buf.cast::<u8>(), buf_len) }
    };

    let (backend, events) = kernel(&iface);
    driver_cmd(&iface, cmd, buf, &backend, &events)
}

/// Entry point called by wpa_supplicant for `DRIVER` commands.
///
/// # Safety
///
/// `priv_` must be the `i802_bss` of the interface, `cmd` a C string, and
/// `buf` null or writable for `buf_len` bytes.
#[cfg(not(test))]
#[no_mangle]
pub unsafe extern "C" fn wpa_driver_nl80211_driver_cmd(
    priv_: *mut c_void,
    cmd: *mut c_char,
    buf: *mut c_char,
    buf_len: usize,
) -> c_int {
    use crate::backend::IoctlBackend;
    use crate::events::Supplicant;

    fp1_hw_common::init_logging(LOG_TAG);

    // SAFETY: Same contract.
    unsafe {
        driver_cmd_raw(priv_, cmd, buf, buf_len, |iface| {
            (IoctlBackend::new(iface.ioctl_sock), Supplicant::new(iface.ctx))
        })
    }
}
