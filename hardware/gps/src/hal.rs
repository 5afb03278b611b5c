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

//! Mirrors of `hardware/hardware.h` and `hardware/gps.h`, as found in AOSP 4.2.
//!
//! These are the caller-facing (canonical) shapes. Anything the vendor module
//! does differently lives in [`crate::layout`].

use core::ffi::{c_char, c_int, c_void};
use core::mem::size_of;
use core::ptr;

const fn make_tag_constant(a: u8, b: u8, c: u8, d: u8) -> u32 {
    (a as u32) << 24 | (b as u32) << 16 | (c as u32) << 8 | d as u32
}

const fn make_api_version(major: u16, minor: u16) -> u16 {
    (major & 0xff) << 8 | (minor & 0xff)
}

pub const HARDWARE_MODULE_TAG: u32 = make_tag_constant(b'H', b'W', b'M', b'T');
pub const HARDWARE_DEVICE_TAG: u32 = make_tag_constant(b'H', b'W', b'D', b'T');

pub const HARDWARE_MODULE_API_VERSION_1_0: u16 = make_api_version(1, 0);
pub const HARDWARE_DEVICE_API_VERSION_1_0: u32 = make_api_version(1, 0) as u32;
pub const HARDWARE_HAL_API_VERSION: u16 = make_api_version(1, 0);

/// Name of the symbol every HAL module exports.
pub const HAL_MODULE_INFO_SYM_AS_STR: &core::ffi::CStr = c"HMI";

pub const GPS_HARDWARE_MODULE_ID: &core::ffi::CStr = c"gps";

/// Maximum number of SVs for `GpsSvStatus`.
pub const GPS_MAX_SVS: usize = 32;

pub type GpsUtcTime = i64;
pub type GpsPositionMode = u32;
pub type GpsPositionRecurrence = u32;
pub type GpsStatusValue = u16;
pub type GpsLocationFlags = u16;
pub type GpsAidingData = u16;

#[repr(C)]
pub struct HwModuleMethods {
    pub open: Option<
        unsafe extern "C" fn(
            module: *const HwModule,
            id: *const c_char,
            device: *mut *mut HwDevice,
        ) -> c_int,
    >,
}

#[repr(C)]
pub struct HwModule {
    pub tag: u32,
    pub module_api_version: u16,
    pub hal_api_version: u16,
    pub id: *const c_char,
    pub name: *const c_char,
    pub author: *const c_char,
    pub methods: *mut HwModuleMethods,
    pub dso: *mut c_void,
    pub reserved: [u32; 32 - 7],
}

#[repr(C)]
pub struct HwDevice {
    pub tag: u32,
    pub version: u32,
    pub module: *mut HwModule,
    pub reserved: [u32; 12],
    pub close: Option<unsafe extern "C" fn(device: *mut HwDevice) -> c_int>,
}

impl HwDevice {
    pub(crate) fn new(
        module: *mut HwModule,
        close: unsafe extern "C" fn(*mut HwDevice) -> c_int,
    ) -> Self {
        Self {
            tag: HARDWARE_DEVICE_TAG,
            version: HARDWARE_DEVICE_API_VERSION_1_0,
            module,
            reserved: [0; 12],
            close: Some(close),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpsLocation {
    pub size: usize,
    pub flags: GpsLocationFlags,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub speed: f32,
    pub bearing: f32,
    pub accuracy: f32,
    pub timestamp: GpsUtcTime,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpsStatus {
    pub size: usize,
    pub status: GpsStatusValue,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpsSvInfo {
    pub size: usize,
    pub prn: c_int,
    pub snr: f32,
    pub elevation: f32,
    pub azimuth: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpsSvStatus {
    pub size: usize,
    pub num_svs: c_int,
    pub sv_list: [GpsSvInfo; GPS_MAX_SVS],
    pub ephemeris_mask: u32,
    pub almanac_mask: u32,
    pub used_in_fix_mask: u32,
}

pub type GpsLocationCallback = unsafe extern "C" fn(location: *mut GpsLocation);
pub type GpsStatusCallback = unsafe extern "C" fn(status: *mut GpsStatus);
pub type GpsSvStatusCallback = unsafe extern "C" fn(sv_info: *mut GpsSvStatus);
pub type GpsNmeaCallback =
    unsafe extern "C" fn(timestamp: GpsUtcTime, nmea: *const c_char, length: c_int);
pub type GpsSetCapabilities = unsafe extern "C" fn(capabilities: u32);
pub type GpsAcquireWakelock = unsafe extern "C" fn();
pub type GpsReleaseWakelock = unsafe extern "C" fn();
pub type GpsRequestUtcTime = unsafe extern "C" fn();
pub type GpsCreateThread = unsafe extern "C" fn(
    name: *const c_char,
    start: Option<unsafe extern "C" fn(arg: *mut c_void)>,
    arg: *mut c_void,
) -> libc::pthread_t;

/// Callback table the framework hands to `GpsInterface::init`.
#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct GpsCallbacks {
    pub size: usize,
    pub location_cb: Option<GpsLocationCallback>,
    pub status_cb: Option<GpsStatusCallback>,
    pub sv_status_cb: Option<GpsSvStatusCallback>,
    pub nmea_cb: Option<GpsNmeaCallback>,
    pub set_capabilities_cb: Option<GpsSetCapabilities>,
    pub acquire_wakelock_cb: Option<GpsAcquireWakelock>,
    pub release_wakelock_cb: Option<GpsReleaseWakelock>,
    pub create_thread_cb: Option<GpsCreateThread>,
    pub request_utc_time_cb: Option<GpsRequestUtcTime>,
}

impl GpsCallbacks {
    /// Copies a caller callback table, honouring the size the caller declared.
    ///
    /// Slots beyond a shorter declared size are left empty; a larger declared
    /// size is truncated to the fields known here.
    ///
    /// # Safety
    ///
    /// `callbacks` must point to a readable struct starting with its `size`
    /// field, at least `size` bytes long.
    pub unsafe fn read_sized(callbacks: *const GpsCallbacks) -> GpsCallbacks {
        // SAFETY: The caller guarantees `callbacks` points to a struct whose first
        //         field is a `size_t`.
        let declared = unsafe { callbacks.cast::<usize>().read() };
        if declared < size_of::<GpsCallbacks>() {
            log::warn!(
                "Caller declared a {} bytes GpsCallbacks, {} expected; missing callbacks are left unset",
                declared,
                size_of::<GpsCallbacks>()
            );
        }

        // Never copy a partial function pointer.
        let len = declared.min(size_of::<GpsCallbacks>());
        let len = len - len % size_of::<usize>();

        let mut copy = GpsCallbacks::default();
        // SAFETY: `len` is within both the caller struct (`declared` bytes) and
        //         `copy`, and ends on a field boundary.
        unsafe {
            ptr::copy_nonoverlapping(
                callbacks.cast::<u8>(),
                (&mut copy as *mut GpsCallbacks).cast::<u8>(),
                len,
            );
        }
        copy.size = declared;
        copy
    }
}

pub type GpsInit = unsafe extern "C" fn(callbacks: *mut GpsCallbacks) -> c_int;
pub type GpsStart = unsafe extern "C" fn() -> c_int;
pub type GpsStop = unsafe extern "C" fn() -> c_int;
pub type GpsCleanup = unsafe extern "C" fn();
pub type GpsInjectTime =
    unsafe extern "C" fn(time: GpsUtcTime, time_reference: i64, uncertainty: c_int) -> c_int;
pub type GpsInjectLocation =
    unsafe extern "C" fn(latitude: f64, longitude: f64, accuracy: f32) -> c_int;
pub type GpsDeleteAidingData = unsafe extern "C" fn(flags: GpsAidingData);
pub type GpsSetPositionMode = unsafe extern "C" fn(
    mode: GpsPositionMode,
    recurrence: GpsPositionRecurrence,
    min_interval: u32,
    preferred_accuracy: u32,
    preferred_time: u32,
) -> c_int;
pub type GpsGetExtension = unsafe extern "C" fn(name: *const c_char) -> *const c_void;

/// Standard GPS interface.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct GpsInterface {
    pub size: usize,
    pub init: Option<GpsInit>,
    pub start: Option<GpsStart>,
    pub stop: Option<GpsStop>,
    pub cleanup: Option<GpsCleanup>,
    pub inject_time: Option<GpsInjectTime>,
    pub inject_location: Option<GpsInjectLocation>,
    pub delete_aiding_data: Option<GpsDeleteAidingData>,
    pub set_position_mode: Option<GpsSetPositionMode>,
    pub get_extension: Option<GpsGetExtension>,
}

#[repr(C)]
pub struct GpsDevice {
    pub common: HwDevice,
    pub get_gps_interface: Option<unsafe extern "C" fn(dev: *mut GpsDevice) -> *const GpsInterface>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_and_versions() {
        assert_eq!(HARDWARE_MODULE_TAG, 0x48574d54);
        assert_eq!(HARDWARE_DEVICE_TAG, 0x48574454);
        assert_eq!(HARDWARE_MODULE_API_VERSION_1_0, 0x0100);
        assert_eq!(HARDWARE_HAL_API_VERSION, 0x0100);
    }

    #[test]
    fn read_sized_full() {
        unsafe extern "C" fn status(_: *mut GpsStatus) {}

        let callbacks = GpsCallbacks {
            size: size_of::<GpsCallbacks>(),
            status_cb: Some(status),
            ..Default::default()
        };
        let copy = unsafe { GpsCallbacks::read_sized(&callbacks) };
        assert_eq!(copy.size, size_of::<GpsCallbacks>());
        assert_eq!(copy.status_cb.map(|f| f as usize), Some(status as usize));
    }

    #[test]
    fn read_sized_short() {
        unsafe extern "C" fn status(_: *mut GpsStatus) {}
        unsafe extern "C" fn utc() {}

        // An older caller that stops after `status_cb`.
        let callbacks = GpsCallbacks {
            size: 3 * size_of::<usize>(),
            status_cb: Some(status),
            request_utc_time_cb: Some(utc),
            ..Default::default()
        };
        let copy = unsafe { GpsCallbacks::read_sized(&callbacks) };
        assert!(copy.status_cb.is_some());
        assert!(copy.sv_status_cb.is_none());
        assert!(copy.request_utc_time_cb.is_none());
    }
}
