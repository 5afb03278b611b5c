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

//! Hypothesized layouts of the vendor GPS HAL structures.
//!
//! The proprietary module was built against an unknown `hardware/gps.h`. What
//! is known is that its `GpsCallbacks` holds one extra callback somewhere
//! between `nmea_cb` and `create_thread_cb`, and that its `GpsSvStatus` tracks
//! up to 256 SVs with 8-word masks. Where exactly the extra callback sits is
//! not known: `set_capabilities`, `acquire_wakelock` and `release_wakelock`
//! were never seen called, so they cannot be used as landmarks.
//!
//! A [`LayoutHypothesis`] writes such a guess down as data. Correcting it for
//! another vendor build means editing (or adding) a hypothesis, not touching
//! the translation code in [`crate::adapter`].
//!
//! Nothing here can be checked at runtime. A wrong hypothesis is silent
//! memory corruption: the vendor calls whatever sits at the offset it expects.
//! Slots whose purpose is unverified are therefore bound to observers that
//! only log, see [`Binding::Observe`].

use crate::hal::{
    GpsCleanup, GpsDeleteAidingData, GpsGetExtension, GpsInit, GpsInjectLocation, GpsInjectTime,
    GpsInterface, GpsSetPositionMode, GpsStart, GpsStop, GpsSvInfo, HwDevice, GPS_MAX_SVS,
};
use core::ffi::c_int;
use core::mem::{align_of, size_of};

/// Upper bound of callback slots a hypothesis may describe.
pub const MAX_CALLBACK_SLOTS: usize = 16;

/// What a callback slot is believed to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackSlot {
    Location,
    Status,
    SvStatus,
    Nmea,
    SetCapabilities,
    AcquireWakelock,
    ReleaseWakelock,
    CreateThread,
    RequestUtcTime,
    /// A slot presumed to exist, with no known meaning.
    Unknown(&'static str),
}

impl CallbackSlot {
    pub fn name(&self) -> &'static str {
        match self {
            CallbackSlot::Location => "location_cb",
            CallbackSlot::Status => "status_cb",
            CallbackSlot::SvStatus => "sv_status_cb",
            CallbackSlot::Nmea => "nmea_cb",
            CallbackSlot::SetCapabilities => "set_capabilities_cb",
            CallbackSlot::AcquireWakelock => "acquire_wakelock_cb",
            CallbackSlot::ReleaseWakelock => "release_wakelock_cb",
            CallbackSlot::CreateThread => "create_thread_cb",
            CallbackSlot::RequestUtcTime => "request_utc_time_cb",
            CallbackSlot::Unknown(label) => *label,
        }
    }
}

/// Argument an observed slot is expected to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    None,
    U32,
}

/// How the adapter fills a slot of the vendor callback table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// The caller's callback, copied as is.
    Forward,
    /// The adapter's sv_status translation, calling the caller's `sv_status_cb`.
    NarrowSvStatus,
    /// A stub that only logs that the slot was called.
    Observe(ArgKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackSpec {
    pub slot: CallbackSlot,
    pub binding: Binding,
}

impl CallbackSpec {
    pub const fn forward(slot: CallbackSlot) -> Self {
        Self { slot, binding: Binding::Forward }
    }

    pub const fn observe(slot: CallbackSlot, arg: ArgKind) -> Self {
        Self { slot, binding: Binding::Observe(arg) }
    }

    pub const fn narrow_sv_status() -> Self {
        Self { slot: CallbackSlot::SvStatus, binding: Binding::NarrowSvStatus }
    }
}

/// Shape of a `GpsSvStatus` with `max_svs` entries and masks of `mask_words`
/// 32 bits words:
///
/// ```text
/// size_t    size;
/// int       num_svs;
/// GpsSvInfo sv_list[max_svs];
/// uint32_t  ephemeris_mask[mask_words];
/// uint32_t  almanac_mask[mask_words];
/// uint32_t  used_in_fix_mask[mask_words];
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvStatusShape {
    pub max_svs: usize,
    pub mask_words: usize,
}

/// Byte offsets of the fields of a [`SvStatusShape`], following C layout rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvStatusOffsets {
    pub num_svs: usize,
    pub sv_list: usize,
    pub ephemeris_mask: usize,
    pub almanac_mask: usize,
    pub used_in_fix_mask: usize,
    pub size: usize,
}

const fn align_up(offset: usize, align: usize) -> usize {
    offset.div_ceil(align) * align
}

const fn max(a: usize, b: usize) -> usize {
    if a > b {
        a
    } else {
        b
    }
}

impl SvStatusShape {
    pub const fn offsets(&self) -> SvStatusOffsets {
        let num_svs = size_of::<usize>();
        let sv_list = align_up(num_svs + size_of::<c_int>(), align_of::<GpsSvInfo>());
        let ephemeris_mask =
            align_up(sv_list + self.max_svs * size_of::<GpsSvInfo>(), align_of::<u32>());
        let mask_len = self.mask_words * size_of::<u32>();
        let almanac_mask = ephemeris_mask + mask_len;
        let used_in_fix_mask = almanac_mask + mask_len;

        let align = max(max(align_of::<usize>(), align_of::<GpsSvInfo>()), align_of::<c_int>());
        let size = align_up(used_in_fix_mask + mask_len, align);

        SvStatusOffsets { num_svs, sv_list, ephemeris_mask, almanac_mask, used_in_fix_mask, size }
    }
}

/// A guess of the vendor structure layouts, for one vendor build.
#[derive(Debug)]
pub struct LayoutHypothesis {
    pub name: &'static str,
    /// Callback slots, in the order they follow the leading `size` field.
    pub callbacks: &'static [CallbackSpec],
    pub sv_status: SvStatusShape,
}

impl LayoutHypothesis {
    /// `size` the vendor is told its callback table has: one `size_t` and one
    /// function pointer per slot.
    pub const fn callback_table_size(&self) -> usize {
        size_of::<usize>() + self.callbacks.len() * size_of::<usize>()
    }

    /// Index of the first slot holding `slot`.
    pub fn position(&self, slot: CallbackSlot) -> Option<usize> {
        self.callbacks.iter().position(|spec| spec.slot == slot)
    }

    /// Built-in hypothesis called `name`. Usable in constants, so a name
    /// given at build time is checked at build time.
    pub const fn by_name(name: &str) -> Option<&'static LayoutHypothesis> {
        let mut i = 0;
        while i < HYPOTHESES.len() {
            if bytes_eq(HYPOTHESES[i].name.as_bytes(), name.as_bytes()) {
                return Some(HYPOTHESES[i]);
            }
            i += 1;
        }
        None
    }

    /// Rejects hypotheses the adapter cannot honour, at compile time for the
    /// built-in ones.
    const fn validate(&self) {
        assert!(self.callbacks.len() <= MAX_CALLBACK_SLOTS, "too many callback slots");
        let mut i = 0;
        while i < self.callbacks.len() {
            let spec = self.callbacks[i];
            if matches!(spec.binding, Binding::NarrowSvStatus) {
                assert!(
                    matches!(spec.slot, CallbackSlot::SvStatus),
                    "only sv_status_cb can be narrowed"
                );
            }
            if matches!(spec.binding, Binding::Forward) {
                assert!(
                    !matches!(spec.slot, CallbackSlot::Unknown(_)),
                    "an unknown slot has nothing to forward"
                );
            }
            i += 1;
        }
        assert!(self.sv_status.max_svs >= GPS_MAX_SVS, "vendor SV list smaller than the standard");
    }
}

/// The standard AOSP 4.2 layout; translating with it changes nothing.
pub const AOSP_4_2: LayoutHypothesis = LayoutHypothesis {
    name: "aosp-4.2",
    callbacks: &[
        CallbackSpec::forward(CallbackSlot::Location),
        CallbackSpec::forward(CallbackSlot::Status),
        CallbackSpec::forward(CallbackSlot::SvStatus),
        CallbackSpec::forward(CallbackSlot::Nmea),
        CallbackSpec::forward(CallbackSlot::SetCapabilities),
        CallbackSpec::forward(CallbackSlot::AcquireWakelock),
        CallbackSpec::forward(CallbackSlot::ReleaseWakelock),
        CallbackSpec::forward(CallbackSlot::CreateThread),
        CallbackSpec::forward(CallbackSlot::RequestUtcTime),
    ],
    sv_status: SvStatusShape { max_svs: GPS_MAX_SVS, mask_words: 1 },
};

/// Proprietary MediaTek module of the official Fairphone 1 Android 4.2 release.
///
/// `create_thread_cb` sits where the standard `request_utc_time_cb` is, and
/// everything up to `nmea_cb` matches, so exactly one slot was inserted in
/// between. It is placed right after `nmea_cb` here; this is a guess. The
/// three standard callbacks around it are observed rather than forwarded
/// until the real order is known.
pub const FP1_MEDIATEK: LayoutHypothesis = LayoutHypothesis {
    name: "fp1-mediatek",
    callbacks: &[
        CallbackSpec::forward(CallbackSlot::Location),
        CallbackSpec::forward(CallbackSlot::Status),
        CallbackSpec::narrow_sv_status(),
        CallbackSpec::forward(CallbackSlot::Nmea),
        CallbackSpec::observe(CallbackSlot::Unknown("unknown_padding_cb"), ArgKind::U32),
        CallbackSpec::observe(CallbackSlot::SetCapabilities, ArgKind::U32),
        CallbackSpec::observe(CallbackSlot::AcquireWakelock, ArgKind::None),
        CallbackSpec::observe(CallbackSlot::ReleaseWakelock, ArgKind::None),
        CallbackSpec::forward(CallbackSlot::CreateThread),
        CallbackSpec::forward(CallbackSlot::RequestUtcTime),
    ],
    sv_status: SvStatusShape { max_svs: 256, mask_words: 256 / 32 },
};

const _: () = AOSP_4_2.validate();
const _: () = FP1_MEDIATEK.validate();

const HYPOTHESES: [&LayoutHypothesis; 2] = [&AOSP_4_2, &FP1_MEDIATEK];

const fn bytes_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

/// Callback table handed to the vendor `init`.
///
/// Only the first `LayoutHypothesis::callbacks.len()` slots are meaningful;
/// the vendor never reads past the size it was built with.
#[repr(C)]
pub struct ForeignCallbackTable {
    pub size: usize,
    pub slots: [Option<RawCallback>; MAX_CALLBACK_SLOTS],
}

/// Type-erased callback pointer, as stored in a [`ForeignCallbackTable`].
pub type RawCallback = unsafe extern "C" fn();

impl Default for ForeignCallbackTable {
    fn default() -> Self {
        Self { size: 0, slots: [None; MAX_CALLBACK_SLOTS] }
    }
}

/// Vendor `GpsInterface`. Identical to the standard one as far as it has been
/// exercised, except that `init` takes the vendor callback table.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ForeignGpsInterface {
    pub size: usize,
    pub init: Option<unsafe extern "C" fn(callbacks: *mut ForeignCallbackTable) -> c_int>,
    pub start: Option<GpsStart>,
    pub stop: Option<GpsStop>,
    pub cleanup: Option<GpsCleanup>,
    pub inject_time: Option<GpsInjectTime>,
    pub inject_location: Option<GpsInjectLocation>,
    pub delete_aiding_data: Option<GpsDeleteAidingData>,
    pub set_position_mode: Option<GpsSetPositionMode>,
    pub get_extension: Option<GpsGetExtension>,
}

impl ForeignGpsInterface {
    /// Standard interface passing every call straight to the vendor, with
    /// `init` replaced.
    pub fn pass_through(&self, init: GpsInit) -> GpsInterface {
        GpsInterface {
            size: size_of::<GpsInterface>(),
            init: Some(init),
            start: self.start,
            stop: self.stop,
            cleanup: self.cleanup,
            inject_time: self.inject_time,
            inject_location: self.inject_location,
            delete_aiding_data: self.delete_aiding_data,
            set_position_mode: self.set_position_mode,
            get_extension: self.get_extension,
        }
    }
}

/// Vendor `gps_device_t`.
#[repr(C)]
pub struct ForeignGpsDevice {
    pub common: HwDevice,
    pub get_gps_interface:
        Option<unsafe extern "C" fn(dev: *mut ForeignGpsDevice) -> *const ForeignGpsInterface>,
}
