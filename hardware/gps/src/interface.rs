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

//! The `GpsInterface` handed to the caller.
//!
//! Every operation but `init` is the vendor's own function pointer. `init`
//! translates the caller callbacks before passing them on.

use crate::adapter::translate_callbacks;
use crate::error::{Error, Result};
use crate::hal::{GpsCallbacks, GpsInterface};
use crate::layout::{ForeignCallbackTable, ForeignGpsDevice, LayoutHypothesis};
use crate::session::{AdapterSession, ForeignInterfaceRef, SESSIONS};
use core::ffi::c_int;
use std::ptr;

/// Gets the vendor interface of `foreign_device` and wraps it in a new session.
///
/// Returns null if the vendor has no interface to give.
///
/// # Safety
///
/// `foreign_device` must be a device opened by the vendor module, not yet closed.
pub(crate) unsafe fn wrap_interface(
    foreign_device: *mut ForeignGpsDevice,
    layout: &'static LayoutHypothesis,
) -> *const GpsInterface {
    // SAFETY: The caller guarantees `foreign_device` is a live vendor device.
    let Some(get_gps_interface) = (unsafe { (*foreign_device).get_gps_interface }) else {
        log::error!("Wrapped device has no get_gps_interface");
        return ptr::null();
    };

    // SAFETY: As above; this is the vendor's own function for its own device.
    let foreign = unsafe { get_gps_interface(foreign_device) };
    let Some(foreign) = ForeignInterfaceRef::new(foreign) else {
        log::error!("Wrapped device returned no GPS interface");
        return ptr::null();
    };

    let session =
        AdapterSession::new(layout, foreign, foreign.get().pass_through(gps_interface_init));
    let interface: *const GpsInterface = &*session.interface;
    SESSIONS.register(session);
    interface
}

/// `GpsInterface::init` of the wrapped interface.
unsafe extern "C" fn gps_interface_init(callbacks: *mut GpsCallbacks) -> c_int {
    log::trace!("Initing wrapped GPS interface");

    if callbacks.is_null() {
        log::error!("init called without callbacks");
        return -libc::EINVAL;
    }
    // SAFETY: Non-null, and the caller hands a `GpsCallbacks` starting with its size.
    let callbacks = unsafe { GpsCallbacks::read_sized(callbacks) };

    init(callbacks).unwrap_or_else(|e| {
        log::error!("Could not init the wrapped GPS interface: {}", e);
        e.errno()
    })
}

/// Installs `callbacks` in the current session and inits the vendor interface
/// with their translation. The vendor status is returned as is.
pub(crate) fn init(callbacks: GpsCallbacks) -> Result<c_int> {
    let (foreign_init, table) = SESSIONS
        .with_current_mut(|session| {
            if session.callbacks.is_some() {
                log::warn!("init called again; the previous callbacks are now invalid!");
            }
            session.callbacks = Some(callbacks);
            *session.translated = translate_callbacks(session.layout, &callbacks);
            (session.foreign.get().init, &mut *session.translated as *mut ForeignCallbackTable)
        })
        .ok_or(Error::NoSession)?;

    let foreign_init = foreign_init.ok_or_else(|| Error::SymbolMissing("init".into()))?;

    // The vendor may call back right away, which takes the session lock: it
    // must not be held here.
    // SAFETY: `table` is boxed in a session that is never dropped, and filled
    //         for the layout the vendor was built with.
    let status = unsafe { foreign_init(table) };
    if status != 0 {
        log::warn!("Wrapped init returned {}", status);
    }
    Ok(status)
}
