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

//! GPS HAL module wrapping the proprietary MediaTek GPS HAL of the Fairphone 1.
//!
//! The vendor module was built against a `hardware/gps.h` that differs from
//! the AOSP 4.2 one: its `GpsCallbacks` has one more callback, and its
//! `GpsSvStatus` is much larger. This module loads it, and exposes it as a
//! standard GPS HAL, translating the structures that differ.
//!
//! ```text
//! framework --HMI.open--> gps_fp1 --dlopen/HMI.open--> vendor module
//!           <--GpsCallbacks--     <--vendor callbacks--
//! ```

mod adapter;
mod device;
pub mod error;
pub mod hal;
mod interface;
pub mod layout;
pub mod loader;
mod session;

#[cfg(test)]
mod testing;

use crate::hal::{
    HwDevice, HwModule, HwModuleMethods, GPS_HARDWARE_MODULE_ID, HARDWARE_HAL_API_VERSION,
    HARDWARE_MODULE_API_VERSION_1_0, HARDWARE_MODULE_TAG,
};
use crate::layout::{LayoutHypothesis, FP1_MEDIATEK};
use crate::loader::DlLibrary;
use core::cell::UnsafeCell;
use core::ffi::{c_char, c_int};
use std::ptr;

const LOG_TAG: &str = "gps.fp1";

const DEFAULT_WRAPPED_MODULE_PATH: &str = "/system/lib/hw/gps.mt6589.so";

/// Where the vendor module is, and how it is laid out.
#[derive(Debug, Clone)]
pub struct HalConfig {
    pub module_path: String,
    pub layout: &'static LayoutHypothesis,
}

/// Layout named by `GPS_LAYOUT_HYPOTHESIS` at build time. An unknown name
/// fails the build.
const BUILD_LAYOUT: &LayoutHypothesis = match option_env!("GPS_LAYOUT_HYPOTHESIS") {
    None => &FP1_MEDIATEK,
    Some(name) => match LayoutHypothesis::by_name(name) {
        Some(layout) => layout,
        None => panic!("GPS_LAYOUT_HYPOTHESIS names no known layout hypothesis"),
    },
};

impl Default for HalConfig {
    /// Build-time configuration, from the `GPS_WRAPPED_MODULE_PATH` and
    /// `GPS_LAYOUT_HYPOTHESIS` environment variables.
    fn default() -> Self {
        let module_path =
            option_env!("GPS_WRAPPED_MODULE_PATH").unwrap_or(DEFAULT_WRAPPED_MODULE_PATH);
        Self { module_path: module_path.to_owned(), layout: BUILD_LAYOUT }
    }
}

/// `hw_module_t` exported as `HMI`.
///
/// The platform loader writes `dso` after loading, so the module must live in
/// writable memory.
#[repr(transparent)]
pub struct HalModuleInfo(UnsafeCell<HwModule>);

// SAFETY: Only the platform loader writes to the module, once, before any
//         other use. Every pointer in it targets a static.
unsafe impl Sync for HalModuleInfo {}

impl HalModuleInfo {
    pub fn as_ptr(&self) -> *const HwModule {
        self.0.get()
    }
}

static GPS_MODULE_METHODS: HwModuleMethods = HwModuleMethods { open: Some(gps_module_open) };

#[no_mangle]
pub static HMI: HalModuleInfo = HalModuleInfo(UnsafeCell::new(HwModule {
    tag: HARDWARE_MODULE_TAG,
    module_api_version: HARDWARE_MODULE_API_VERSION_1_0,
    hal_api_version: HARDWARE_HAL_API_VERSION,
    id: GPS_HARDWARE_MODULE_ID.as_ptr(),
    name: c"fp1 MediaTek GPS wrapper HAL module".as_ptr(),
    author: c"Daniel Calviño Sánchez".as_ptr(),
    methods: &GPS_MODULE_METHODS as *const HwModuleMethods as *mut HwModuleMethods,
    dso: ptr::null_mut(),
    reserved: [0; 25],
}));

/// `hw_module_methods_t::open` of the wrapper module.
unsafe extern "C" fn gps_module_open(
    module: *const HwModule,
    id: *const c_char,
    device: *mut *mut HwDevice,
) -> c_int {
    fp1_hw_common::init_logging(LOG_TAG);

    if device.is_null() {
        log::error!("open called without a device to return");
        return -libc::EINVAL;
    }

    // SAFETY: `module` is `HMI`, passed back by the platform loader.
    match unsafe { device::open_device::<DlLibrary>(module, id, &HalConfig::default()) } {
        Ok(opened) => {
            // SAFETY: Checked non-null above; the caller provides the slot.
            unsafe { *device = opened };
            0
        }
        Err(e) => e.errno(),
    }
}
