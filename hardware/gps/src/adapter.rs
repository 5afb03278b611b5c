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

//! Translation between the standard structures and a [`LayoutHypothesis`].
//!
//! Outbound, the caller `GpsCallbacks` become a vendor callback table.
//! Inbound, a vendor sv_status report becomes a standard `GpsSvStatus`.
//! Neither direction can fail: a wrong hypothesis shows up as wrong behavior
//! only, which is why unverified slots are bound to observers that log.

use crate::hal::{GpsCallbacks, GpsSvInfo, GpsSvStatus, GPS_MAX_SVS};
use crate::layout::{
    ArgKind, Binding, CallbackSlot, CallbackSpec, ForeignCallbackTable, LayoutHypothesis,
    RawCallback, SvStatusShape, MAX_CALLBACK_SLOTS,
};
use crate::session::SESSIONS;
use core::ffi::{c_int, c_void};
use core::mem::size_of;

macro_rules! erase {
    ($f:expr) => {
        // SAFETY: Only the address is kept. Whoever reads it back from the
        //         table calls it with the signature of the slot it sits in.
        unsafe { core::mem::transmute::<*const (), RawCallback>($f as *const ()) }
    };
}

/// Access to callbacks by slot, whatever the table shape.
pub trait CallbackTable {
    fn callback(&self, slot: CallbackSlot) -> Option<RawCallback>;
}

impl CallbackTable for GpsCallbacks {
    fn callback(&self, slot: CallbackSlot) -> Option<RawCallback> {
        match slot {
            CallbackSlot::Location => self.location_cb.map(|f| erase!(f)),
            CallbackSlot::Status => self.status_cb.map(|f| erase!(f)),
            CallbackSlot::SvStatus => self.sv_status_cb.map(|f| erase!(f)),
            CallbackSlot::Nmea => self.nmea_cb.map(|f| erase!(f)),
            CallbackSlot::SetCapabilities => self.set_capabilities_cb.map(|f| erase!(f)),
            CallbackSlot::AcquireWakelock => self.acquire_wakelock_cb.map(|f| erase!(f)),
            CallbackSlot::ReleaseWakelock => self.release_wakelock_cb.map(|f| erase!(f)),
            CallbackSlot::CreateThread => self.create_thread_cb.map(|f| erase!(f)),
            CallbackSlot::RequestUtcTime => self.request_utc_time_cb.map(|f| erase!(f)),
            CallbackSlot::Unknown(_) => None,
        }
    }
}

/// Builds the vendor callback table for `callbacks`, slot by slot.
pub fn translate_callbacks(
    layout: &LayoutHypothesis,
    callbacks: &GpsCallbacks,
) -> ForeignCallbackTable {
    let mut table =
        ForeignCallbackTable { size: layout.callback_table_size(), ..Default::default() };

    for (index, spec) in layout.callbacks.iter().enumerate() {
        table.slots[index] = match spec.binding {
            Binding::Forward => callbacks.callback(spec.slot),
            Binding::NarrowSvStatus => Some(erase!(sv_status_callback as SvStatusTrampoline)),
            Binding::Observe(_) => Some(erase!(OBSERVERS[index])),
        };
    }
    table
}

type SvStatusTrampoline = unsafe extern "C" fn(status: *const c_void);

/// Vendor sv_status callback: reports the narrowed status to the caller.
unsafe extern "C" fn sv_status_callback(status: *const c_void) {
    log::trace!("Calling sv_status_callback wrapper");

    let Some((shape, sv_status_cb)) = SESSIONS.with_current(|session| {
        (session.layout.sv_status, session.callbacks.and_then(|c| c.sv_status_cb))
    }) else {
        log::warn!("SV status reported without a GPS interface; dropped");
        return;
    };
    let Some(sv_status_cb) = sv_status_cb else {
        log::debug!("SV status reported before init or without sv_status_cb; dropped");
        return;
    };
    if status.is_null() {
        log::warn!("Null SV status reported; dropped");
        return;
    }

    // The standard status is not used past the callback, so it lives on the stack.
    // SAFETY: The vendor passes a status of the hypothesized shape, valid for
    //         the duration of this call.
    let mut narrowed = unsafe { narrow_sv_status(&shape, status) };

    // SAFETY: `sv_status_cb` is the caller's callback, which takes a standard status.
    unsafe { sv_status_cb(&mut narrowed) };
}

/// Reads a vendor status of shape `shape` into a standard `GpsSvStatus`.
///
/// Only the first `GPS_MAX_SVS` SVs are kept, and only the first word of each
/// mask, since that is what the standard status can hold. The rest is
/// dropped silently.
///
/// # Safety
///
/// `status` must point to a readable, aligned status of shape `shape`.
pub unsafe fn narrow_sv_status(shape: &SvStatusShape, status: *const c_void) -> GpsSvStatus {
    let offsets = shape.offsets();
    let base = status.cast::<u8>();

    // SAFETY: All offsets are within a status of shape `shape`, and aligned for
    //         the field type, see `SvStatusShape::offsets()`.
    let read_u32 = |offset: usize| unsafe { base.add(offset).cast::<u32>().read() };
    // SAFETY: As above.
    let num_svs = unsafe { base.add(offsets.num_svs).cast::<c_int>().read() };

    let count = usize::try_from(num_svs).unwrap_or(0).min(shape.max_svs);
    let kept = count.min(GPS_MAX_SVS);
    if kept < count {
        log::trace!("Dropping {} SVs not fitting in GpsSvStatus", count - kept);
    }

    let mut narrowed = GpsSvStatus {
        size: size_of::<GpsSvStatus>(),
        num_svs: kept as c_int,
        ..Default::default()
    };

    // SAFETY: As above.
    let sv_list = unsafe { base.add(offsets.sv_list).cast::<GpsSvInfo>() };
    for (i, sv) in narrowed.sv_list.iter_mut().take(kept).enumerate() {
        // SAFETY: `i < kept <= shape.max_svs`, within the vendor list.
        *sv = unsafe { sv_list.add(i).read() };
    }

    if shape.mask_words > 0 {
        narrowed.ephemeris_mask = read_u32(offsets.ephemeris_mask);
        narrowed.almanac_mask = read_u32(offsets.almanac_mask);
        narrowed.used_in_fix_mask = read_u32(offsets.used_in_fix_mask);
    }
    narrowed
}

type Observer = extern "C" fn(raw: u32);

/// One observer per slot index, so a log line tells which slot was called.
///
/// Observers are declared with a `u32` argument. A slot called without
/// arguments makes the logged value meaningless, which is why it is only
/// logged for slots whose hypothesized argument is a `u32`.
static OBSERVERS: [Observer; MAX_CALLBACK_SLOTS] = [
    observe::<0>,
    observe::<1>,
    observe::<2>,
    observe::<3>,
    observe::<4>,
    observe::<5>,
    observe::<6>,
    observe::<7>,
    observe::<8>,
    observe::<9>,
    observe::<10>,
    observe::<11>,
    observe::<12>,
    observe::<13>,
    observe::<14>,
    observe::<15>,
];

extern "C" fn observe<const INDEX: usize>(raw: u32) {
    report_observed(INDEX, raw);
}

fn report_observed(index: usize, raw: u32) {
    let spec = SESSIONS
        .with_current(|session| session.layout.callbacks.get(index).copied())
        .flatten();

    match spec {
        Some(CallbackSpec { slot, binding: Binding::Observe(ArgKind::U32) }) => log::warn!(
            "Unverified callback slot {} (hypothesized {}) called with {:#010x}; \
             check what it is and fix the layout hypothesis",
            index,
            slot.name(),
            raw
        ),
        Some(CallbackSpec { slot, .. }) => log::warn!(
            "Unverified callback slot {} (hypothesized {}) called; \
             check what it is and fix the layout hypothesis",
            index,
            slot.name()
        ),
        None => log::warn!("Unverified callback slot {} called without a GPS interface", index),
    }
}
