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

//! Open and close of the wrapper `gps_device_t`.

use crate::error::{Error, Result};
use crate::hal::{GpsDevice, GpsInterface, HwDevice, HwModule};
use crate::interface::wrap_interface;
use crate::layout::{ForeignGpsDevice, LayoutHypothesis};
use crate::loader::{self, Library};
use crate::session::SESSIONS;
use crate::HalConfig;
use core::ffi::{c_char, c_int};
use std::collections::BTreeMap;
use std::ptr;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Device handed to the caller. `device` comes first, so a pointer to the
/// wrapper is a pointer to its `gps_device_t` and `hw_device_t`.
#[repr(C)]
struct GpsDeviceWrapper {
    device: GpsDevice,
    foreign_device: *mut ForeignGpsDevice,
    layout: &'static LayoutHypothesis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceState {
    Opening,
    Open,
    Closing,
    Closed,
}

/// Wrapper devices by address. A device missing here is not ours.
///
/// Closed wrappers stay allocated, so no later device gets their address and
/// a stale pointer still reads as `Closed`. This costs one small allocation
/// per device ever opened; the HAL caller opens the device once per boot.
static DEVICES: Mutex<BTreeMap<usize, DeviceState>> = Mutex::new(BTreeMap::new());

fn devices() -> MutexGuard<'static, BTreeMap<usize, DeviceState>> {
    DEVICES.lock().unwrap_or_else(PoisonError::into_inner)
}

fn is_open(device: *const GpsDeviceWrapper) -> bool {
    devices().get(&(device as usize)) == Some(&DeviceState::Open)
}

/// Loads the vendor module described by `config`, opens its device and wraps it.
///
/// The returned device belongs to `module`. On failure, everything acquired
/// so far is released.
///
/// # Safety
///
/// `module` must be the wrapper's own `HMI`, and `id` a C string or null.
pub(crate) unsafe fn open_device<L: Library>(
    module: *const HwModule,
    id: *const c_char,
    config: &HalConfig,
) -> Result<*mut HwDevice> {
    let foreign = loader::load::<L>(&config.module_path)?;

    // Declared after `foreign`, so dropped before it on failure.
    let mut wrapper = Box::new(GpsDeviceWrapper {
        device: GpsDevice {
            common: HwDevice::new(module.cast_mut(), gps_device_close),
            get_gps_interface: Some(get_gps_interface),
        },
        foreign_device: ptr::null_mut(),
        layout: config.layout,
    });
    let key = &*wrapper as *const GpsDeviceWrapper as usize;
    devices().insert(key, DeviceState::Opening);

    // SAFETY: `foreign` passed the identity check and is loaded.
    match unsafe { open_foreign(foreign.module(), id) } {
        Ok(foreign_device) => wrapper.foreign_device = foreign_device,
        Err(e) => {
            devices().remove(&key);
            log::error!("Could not open the wrapped GPS device: {}", e);
            return Err(e);
        }
    }

    foreign.make_resident();
    devices().insert(key, DeviceState::Open);
    log::info!("Opened GPS device wrapper with layout {}", config.layout.name);
    Ok(Box::into_raw(wrapper).cast::<HwDevice>())
}

/// Runs the vendor `open`.
///
/// # Safety
///
/// `module` must be a vendor module that passed the identity check.
unsafe fn open_foreign(
    module: *const HwModule,
    id: *const c_char,
) -> Result<*mut ForeignGpsDevice> {
    // SAFETY: The module is checked and loaded.
    let methods = unsafe { (*module).methods };
    // SAFETY: A non-null `methods` points to the vendor's static method table.
    let open = (!methods.is_null()).then(|| unsafe { (*methods).open }).flatten();
    let open = open.ok_or_else(|| Error::SymbolMissing("methods->open".into()))?;

    let mut foreign_device: *mut HwDevice = ptr::null_mut();
    // SAFETY: The vendor's own open on its own module.
    let status = unsafe { open(module, id, &mut foreign_device) };
    if status != 0 {
        return Err(Error::ForeignCall(status));
    }
    if foreign_device.is_null() {
        log::error!("Wrapped open succeeded without a device");
        return Err(Error::ForeignCall(-libc::EINVAL));
    }
    Ok(foreign_device.cast::<ForeignGpsDevice>())
}

/// `gps_device_t::get_gps_interface` of the wrapper device.
unsafe extern "C" fn get_gps_interface(device: *mut GpsDevice) -> *const GpsInterface {
    log::trace!("Getting wrapped GPS interface");

    let wrapper = device.cast::<GpsDeviceWrapper>();
    if !is_open(wrapper) {
        log::error!("get_gps_interface called on a device that is not open");
        return ptr::null();
    }
    // SAFETY: Open devices are live wrappers allocated by `open_device`.
    let (foreign_device, layout) = unsafe { ((*wrapper).foreign_device, (*wrapper).layout) };
    // SAFETY: The vendor device of an open wrapper is open.
    unsafe { wrap_interface(foreign_device, layout) }
}

/// `hw_device_t::close` of the wrapper device.
unsafe extern "C" fn gps_device_close(device: *mut HwDevice) -> c_int {
    log::trace!("Closing GPS device wrapper");

    close(device).unwrap_or_else(|e| {
        log::error!("Could not close the GPS device wrapper: {}", e);
        e.errno()
    })
}

/// Closes the vendor device and ends the session. The vendor close status is
/// returned as is.
fn close(device: *mut HwDevice) -> Result<c_int> {
    let key = device as usize;
    {
        let mut devices = devices();
        match devices.get(&key).copied() {
            Some(DeviceState::Open) => {
                devices.insert(key, DeviceState::Closing);
            }
            state => {
                log::warn!("close called on a device that is not open ({:?})", state);
                return Err(Error::NotOpen);
            }
        }
    }

    let wrapper = device.cast::<GpsDeviceWrapper>();
    // SAFETY: Devices in the table are live wrappers leaked by `open_device`.
    let foreign = unsafe { (*wrapper).foreign_device }.cast::<HwDevice>();

    // SAFETY: The vendor device is open until its own close returns.
    let status = match unsafe { (*foreign).close } {
        Some(foreign_close) => unsafe { foreign_close(foreign) },
        None => {
            log::warn!("Wrapped device has no close");
            0
        }
    };

    SESSIONS.retire();
    devices().insert(key, DeviceState::Closed);
    Ok(status)
}
