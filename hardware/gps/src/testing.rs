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

//! Test doubles: a fake dynamic linker, a fake MediaTek module and a logger
//! recording what it is given.

use crate::error::{Error, Result};
use crate::hal::HAL_MODULE_INFO_SYM_AS_STR;
use crate::loader::Library;
use core::ffi::{c_void, CStr};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, Once, PoisonError};

/// Serializes tests touching process-wide state: the session registry, the
/// device table and the fake vendor.
pub(crate) fn serial() -> MutexGuard<'static, ()> {
    static SERIAL: Mutex<()> = Mutex::new(());
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct CapturedLogs {
    records: Mutex<Vec<(Level, String)>>,
}

impl CapturedLogs {
    pub(crate) fn contains(&self, level: Level, text: &str) -> bool {
        self.lock().iter().any(|(l, message)| *l == level && message.contains(text))
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(Level, String)>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Log for CapturedLogs {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.lock().push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

static LOGS: CapturedLogs = CapturedLogs { records: Mutex::new(Vec::new()) };

/// The process logger, capturing everything logged from now on.
pub(crate) fn logs() -> &'static CapturedLogs {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        // Fails if a test inited the production logger first; captures are then empty.
        let _ = log::set_logger(&LOGS);
        log::set_max_level(LevelFilter::Trace);
    });
    &LOGS
}

pub(crate) const VENDOR_PATH: &str = "/system/lib/hw/gps.mt6589.so";
pub(crate) const LIGHTS_PATH: &str = "/system/lib/hw/lights.mt6589.so";
pub(crate) const MISSING_SYMBOL_PATH: &str = "/system/lib/libmnl.so";

static LIVE: AtomicUsize = AtomicUsize::new(0);
static OPENED: AtomicUsize = AtomicUsize::new(0);

/// [`Library`] resolving `HMI` to the modules of [`vendor`].
pub(crate) struct FakeLibrary {
    hmi: Option<NonNull<c_void>>,
}

impl FakeLibrary {
    /// Libraries opened and neither dropped nor made resident.
    pub(crate) fn live() -> usize {
        LIVE.load(Ordering::SeqCst)
    }

    pub(crate) fn opened() -> usize {
        OPENED.load(Ordering::SeqCst)
    }
}

impl Library for FakeLibrary {
    fn open(path: &str) -> Result<Self> {
        let hmi = match path {
            VENDOR_PATH => Some(NonNull::from(&vendor::MODULE).cast()),
            LIGHTS_PATH => Some(NonNull::from(&vendor::LIGHTS_MODULE).cast()),
            MISSING_SYMBOL_PATH => None,
            _ => {
                return Err(Error::ModuleNotFound {
                    path: path.to_owned(),
                    reason: "No such file or directory".to_owned(),
                })
            }
        };
        LIVE.fetch_add(1, Ordering::SeqCst);
        OPENED.fetch_add(1, Ordering::SeqCst);
        Ok(Self { hmi })
    }

    fn symbol(&self, name: &CStr) -> Result<NonNull<c_void>> {
        match self.hmi {
            Some(hmi) if name == HAL_MODULE_INFO_SYM_AS_STR => Ok(hmi),
            _ => Err(Error::SymbolMissing(format!("undefined symbol: {}", name.to_string_lossy()))),
        }
    }

    fn make_resident(self) {
        LIVE.fetch_sub(1, Ordering::SeqCst);
        std::mem::forget(self);
    }
}

impl Drop for FakeLibrary {
    fn drop(&mut self) {
        LIVE.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A vendor module built against the MediaTek `gps.h`, as far as it is known.
pub(crate) mod vendor {
    use crate::hal::{
        GpsAcquireWakelock, GpsCleanup, GpsCreateThread, GpsDeleteAidingData, GpsGetExtension,
        GpsInjectLocation, GpsInjectTime, GpsLocationCallback, GpsNmeaCallback,
        GpsReleaseWakelock, GpsRequestUtcTime, GpsSetCapabilities, GpsSetPositionMode, GpsStart,
        GpsStatusCallback, GpsStop, GpsSvInfo, GpsUtcTime, HwDevice, HwModule, HwModuleMethods,
        HARDWARE_HAL_API_VERSION, HARDWARE_MODULE_API_VERSION_1_0, HARDWARE_MODULE_TAG,
    };
    use crate::layout::{ForeignGpsDevice, ForeignGpsInterface};
    use core::ffi::{c_char, c_int, c_void};
    use core::mem::size_of;
    use std::ptr;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    pub(crate) type SvStatusCallback = unsafe extern "C" fn(status: *mut MediatekSvStatus);

    #[repr(C)]
    pub(crate) struct MediatekCallbacks {
        pub size: usize,
        pub location_cb: Option<GpsLocationCallback>,
        pub status_cb: Option<GpsStatusCallback>,
        pub sv_status_cb: Option<SvStatusCallback>,
        pub nmea_cb: Option<GpsNmeaCallback>,
        pub unknown_padding_cb: Option<unsafe extern "C" fn(raw: u32)>,
        pub set_capabilities_cb: Option<GpsSetCapabilities>,
        pub acquire_wakelock_cb: Option<GpsAcquireWakelock>,
        pub release_wakelock_cb: Option<GpsReleaseWakelock>,
        pub create_thread_cb: Option<GpsCreateThread>,
        pub request_utc_time_cb: Option<GpsRequestUtcTime>,
    }

    #[repr(C)]
    pub(crate) struct MediatekSvStatus {
        pub size: usize,
        pub num_svs: c_int,
        pub sv_list: [GpsSvInfo; 256],
        pub ephemeris_mask: [u32; 8],
        pub almanac_mask: [u32; 8],
        pub used_in_fix_mask: [u32; 8],
    }

    impl MediatekSvStatus {
        /// A status reporting `count` SVs numbered from 1, with the first two
        /// words of every mask set to `masks`.
        pub(crate) fn synthetic(count: usize, masks: [u32; 2]) -> Box<Self> {
            let mut status = Box::new(Self {
                size: size_of::<Self>(),
                num_svs: count as c_int,
                sv_list: [GpsSvInfo::default(); 256],
                ephemeris_mask: [0; 8],
                almanac_mask: [0; 8],
                used_in_fix_mask: [0; 8],
            });
            for (i, sv) in status.sv_list.iter_mut().take(count).enumerate() {
                *sv = GpsSvInfo {
                    size: size_of::<GpsSvInfo>(),
                    prn: i as c_int + 1,
                    snr: 20.0 + i as f32,
                    elevation: 45.0,
                    azimuth: i as f32,
                };
            }
            for mask in
                [&mut status.ephemeris_mask, &mut status.almanac_mask, &mut status.used_in_fix_mask]
            {
                mask[..2].copy_from_slice(&masks);
            }
            status
        }
    }

    /// What the vendor module was asked to do.
    pub(crate) struct Calls {
        pub open_status: c_int,
        pub opened: usize,
        pub closed: usize,
        pub inits: usize,
        pub started: usize,
        pub callbacks: usize,
        pub position_mode: Option<(u32, u32, u32, u32, u32)>,
    }

    static CALLS: Mutex<Calls> = Mutex::new(Calls {
        open_status: 0,
        opened: 0,
        closed: 0,
        inits: 0,
        started: 0,
        callbacks: 0,
        position_mode: None,
    });

    pub(crate) fn calls() -> MutexGuard<'static, Calls> {
        CALLS.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn reset() {
        let mut calls = calls();
        calls.open_status = 0;
        calls.inits = 0;
        calls.started = 0;
        calls.callbacks = 0;
        calls.position_mode = None;
    }

    /// The callback table the vendor was inited with.
    ///
    /// # Safety
    ///
    /// The vendor must have been inited, and the table not replaced since.
    pub(crate) unsafe fn installed_callbacks() -> &'static MediatekCallbacks {
        let callbacks = calls().callbacks as *const MediatekCallbacks;
        assert!(!callbacks.is_null(), "vendor module not inited");
        // SAFETY: Tables handed to the vendor are kept alive by the session registry.
        unsafe { &*callbacks }
    }

    /// Reports `status` the way the vendor location thread does.
    pub(crate) fn emit_sv_status(status: &mut MediatekSvStatus) {
        // SAFETY: Only called by tests after init.
        let callbacks = unsafe { installed_callbacks() };
        let sv_status_cb = callbacks.sv_status_cb.expect("sv_status_cb installed");
        // SAFETY: The installed callback takes a MediaTek status.
        unsafe { sv_status_cb(status) };
    }

    pub(crate) fn emit_unknown(raw: u32) {
        // SAFETY: Only called by tests after init.
        let callbacks = unsafe { installed_callbacks() };
        let unknown = callbacks.unknown_padding_cb.expect("unknown slot installed");
        // SAFETY: The installed observer takes a u32.
        unsafe { unknown(raw) };
    }

    pub(crate) fn emit_nmea(timestamp: GpsUtcTime, sentence: &core::ffi::CStr) {
        // SAFETY: Only called by tests after init.
        let callbacks = unsafe { installed_callbacks() };
        let nmea_cb = callbacks.nmea_cb.expect("nmea_cb installed");
        let length = sentence.to_bytes().len() as c_int;
        // SAFETY: Forwarded from the caller, with a valid sentence.
        unsafe { nmea_cb(timestamp, sentence.as_ptr(), length) };
    }

    #[repr(C)]
    struct MediatekInterface {
        size: usize,
        init: Option<unsafe extern "C" fn(callbacks: *mut MediatekCallbacks) -> c_int>,
        start: Option<GpsStart>,
        stop: Option<GpsStop>,
        cleanup: Option<GpsCleanup>,
        inject_time: Option<GpsInjectTime>,
        inject_location: Option<GpsInjectLocation>,
        delete_aiding_data: Option<GpsDeleteAidingData>,
        set_position_mode: Option<GpsSetPositionMode>,
        get_extension: Option<GpsGetExtension>,
    }

    unsafe extern "C" fn init(callbacks: *mut MediatekCallbacks) -> c_int {
        let mut calls = calls();
        calls.inits += 1;
        calls.callbacks = callbacks as usize;
        0
    }

    pub(crate) unsafe extern "C" fn start() -> c_int {
        calls().started += 1;
        0
    }

    pub(crate) unsafe extern "C" fn stop() -> c_int {
        0
    }

    pub(crate) unsafe extern "C" fn cleanup() {}

    pub(crate) unsafe extern "C" fn inject_time(_: GpsUtcTime, _: i64, _: c_int) -> c_int {
        0
    }

    pub(crate) unsafe extern "C" fn inject_location(_: f64, _: f64, _: f32) -> c_int {
        0
    }

    pub(crate) unsafe extern "C" fn delete_aiding_data(_: u16) {}

    pub(crate) unsafe extern "C" fn set_position_mode(
        mode: u32,
        recurrence: u32,
        min_interval: u32,
        preferred_accuracy: u32,
        preferred_time: u32,
    ) -> c_int {
        calls().position_mode =
            Some((mode, recurrence, min_interval, preferred_accuracy, preferred_time));
        0
    }

    pub(crate) unsafe extern "C" fn get_extension(_: *const c_char) -> *const c_void {
        ptr::null()
    }

    static INTERFACE: MediatekInterface = MediatekInterface {
        size: size_of::<MediatekInterface>(),
        init: Some(init),
        start: Some(start),
        stop: Some(stop),
        cleanup: Some(cleanup),
        inject_time: Some(inject_time),
        inject_location: Some(inject_location),
        delete_aiding_data: Some(delete_aiding_data),
        set_position_mode: Some(set_position_mode),
        get_extension: Some(get_extension),
    };

    unsafe extern "C" fn get_gps_interface(_: *mut ForeignGpsDevice) -> *const ForeignGpsInterface {
        (&INTERFACE as *const MediatekInterface).cast()
    }

    unsafe extern "C" fn close(device: *mut HwDevice) -> c_int {
        // SAFETY: Devices are boxed by `open`.
        drop(unsafe { Box::from_raw(device.cast::<ForeignGpsDevice>()) });
        calls().closed += 1;
        0
    }

    unsafe extern "C" fn open(
        module: *const HwModule,
        _: *const c_char,
        device: *mut *mut HwDevice,
    ) -> c_int {
        let mut calls = calls();
        if calls.open_status != 0 {
            return calls.open_status;
        }
        calls.opened += 1;

        let opened = Box::new(ForeignGpsDevice {
            common: HwDevice::new(module.cast_mut(), close),
            get_gps_interface: Some(get_gps_interface),
        });
        // SAFETY: The wrapper always passes a device slot.
        unsafe { *device = Box::into_raw(opened).cast() };
        0
    }

    static METHODS: HwModuleMethods = HwModuleMethods { open: Some(open) };

    #[repr(transparent)]
    pub(crate) struct Module(HwModule);

    // SAFETY: Never written; every pointer targets a static.
    unsafe impl Sync for Module {}

    macro_rules! module {
        ($id:expr) => {
            Module(HwModule {
                tag: HARDWARE_MODULE_TAG,
                module_api_version: HARDWARE_MODULE_API_VERSION_1_0,
                hal_api_version: HARDWARE_HAL_API_VERSION,
                id: $id.as_ptr(),
                name: c"MediaTek GPS module".as_ptr(),
                author: c"MediaTek".as_ptr(),
                methods: &METHODS as *const HwModuleMethods as *mut HwModuleMethods,
                dso: ptr::null_mut(),
                reserved: [0; 25],
            })
        };
    }

    pub(crate) static MODULE: Module = module!(c"gps");
    pub(crate) static LIGHTS_MODULE: Module = module!(c"lights");
}
