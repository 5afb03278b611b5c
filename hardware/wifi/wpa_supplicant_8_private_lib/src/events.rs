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

//! Notifications to wpa_supplicant.

use core::ffi::c_int;

/// Prefix of the driver state events of the control interface.
pub const WPA_EVENT_DRIVER_STATE: &str = "CTRL-EVENT-DRIVER-STATE ";

/// `MSG_INFO` of `enum wpa_msg_level`.
pub const MSG_INFO: c_int = 3;

/// `EVENT_CHANNEL_LIST_CHANGED` of `enum wpa_event_type`, as numbered in the
/// wpa_supplicant_8 tree of Android 4.2. It has to match the supplicant this
/// library is linked into.
pub const EVENT_CHANNEL_LIST_CHANGED: c_int = 31;

pub trait SupplicantEvents {
    /// Sends `text` to the control interface monitors, as an info message.
    fn message(&self, text: &str);

    /// Tells the supplicant the allowed channels changed.
    fn channel_list_changed(&self);
}

#[cfg(not(test))]
pub use self::supplicant::Supplicant;

// The supplicant symbols only exist once linked into wpa_supplicant.
#[cfg(not(test))]
mod supplicant {
    use super::{SupplicantEvents, EVENT_CHANNEL_LIST_CHANGED, MSG_INFO};
    use core::ffi::{c_char, c_int, c_void};
    use std::ffi::CString;
    use std::ptr;

    extern "C" {
        fn wpa_msg(ctx: *mut c_void, level: c_int, fmt: *const c_char, ...);
        fn wpa_supplicant_event(ctx: *mut c_void, event: c_int, data: *mut c_void);
    }

    /// The running wpa_supplicant, through the context of the interface.
    pub struct Supplicant {
        ctx: *mut c_void,
    }

    impl Supplicant {
        pub fn new(ctx: *mut c_void) -> Self {
            Self { ctx }
        }
    }

    impl SupplicantEvents for Supplicant {
        fn message(&self, text: &str) {
            let Ok(text) = CString::new(text) else {
                log::error!("Message with a NUL byte not sent: {:?}", text);
                return;
            };
            // SAFETY: `ctx` is the context the supplicant gave with the
            //         interface; the message is passed as an argument, never
            //         as the format.
            unsafe { wpa_msg(self.ctx, MSG_INFO, c"%s".as_ptr(), text.as_ptr()) };
        }

        fn channel_list_changed(&self) {
            // SAFETY: As above; this event has no data.
            unsafe { wpa_supplicant_event(self.ctx, EVENT_CHANNEL_LIST_CHANGED, ptr::null_mut()) };
        }
    }
}
