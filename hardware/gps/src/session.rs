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

//! Process-wide session state.
//!
//! Neither `GpsInterface` functions nor `GpsCallbacks` functions receive the
//! structure they belong to, so the wrapper cannot tell two sessions apart.
//! A single `GpsInterface`, inited with a single set of `GpsCallbacks`, is
//! assumed to be in use at a time. Registering a second session is logged and
//! makes the previous one invalid; it is not refused, as there is no way to
//! know which one is right.
//!
//! Precondition: the HAL caller serializes `get_gps_interface`, `init` and
//! `close`. After `init` the session is only read, from the vendor threads
//! delivering callbacks. The lock below makes publishing the session sound;
//! it does not make concurrent sessions work.

use crate::hal::{GpsCallbacks, GpsInterface};
use crate::layout::{ForeignCallbackTable, ForeignGpsInterface, LayoutHypothesis};
use std::ptr::NonNull;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Holder of the single live session of type `S`.
///
/// Sessions that are replaced or retired are kept, not dropped: the caller or
/// the vendor module may still hold pointers into them. Memory grows by one
/// session per `register`, which the HAL caller does once per device open.
pub struct SessionRegistry<S> {
    label: &'static str,
    state: RwLock<State<S>>,
}

struct State<S> {
    current: Option<S>,
    retired: Vec<S>,
}

impl<S> SessionRegistry<S> {
    pub const fn new(label: &'static str) -> Self {
        Self { label, state: RwLock::new(State { current: None, retired: Vec::new() }) }
    }

    /// Makes `session` the current one. An already registered session is
    /// invalidated, with a warning.
    pub fn register(&self, session: S) {
        let mut state = self.write();
        if let Some(previous) = state.current.replace(session) {
            log::warn!("{} registered again; the previous one is now invalid!", self.label);
            state.retired.push(previous);
        }
    }

    pub fn with_current<R>(&self, f: impl FnOnce(&S) -> R) -> Option<R> {
        self.read().current.as_ref().map(f)
    }

    pub fn with_current_mut<R>(&self, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        self.write().current.as_mut().map(f)
    }

    /// Ends the current session, if any. Returns whether there was one.
    pub fn retire(&self) -> bool {
        let mut state = self.write();
        match state.current.take() {
            Some(session) => {
                state.retired.push(session);
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    fn retired_len(&self) -> usize {
        self.read().retired.len()
    }

    // Callbacks run on vendor threads through `extern "C"` functions, where
    // unwinding is not an option; a poisoned lock still holds usable state.
    fn read(&self) -> RwLockReadGuard<'_, State<S>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State<S>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Vendor interface pointer, valid for the life of the process.
#[derive(Clone, Copy)]
pub(crate) struct ForeignInterfaceRef(NonNull<ForeignGpsInterface>);

// SAFETY: The pointer targets the vendor module's static interface table,
//         which is never written after `get_gps_interface` and lives as long
//         as the module, which is never unloaded.
unsafe impl Send for ForeignInterfaceRef {}
// SAFETY: See above; the table is only read.
unsafe impl Sync for ForeignInterfaceRef {}

impl ForeignInterfaceRef {
    pub(crate) fn new(interface: *const ForeignGpsInterface) -> Option<Self> {
        NonNull::new(interface.cast_mut()).map(Self)
    }

    pub(crate) fn get(&self) -> &ForeignGpsInterface {
        // SAFETY: See the `Send` implementation.
        unsafe { self.0.as_ref() }
    }
}

/// State of one wrapped `GpsInterface`, from `get_gps_interface` onward.
pub(crate) struct AdapterSession {
    pub(crate) layout: &'static LayoutHypothesis,
    pub(crate) foreign: ForeignInterfaceRef,
    /// Standard interface returned to the caller. Boxed, its address is stable.
    pub(crate) interface: Box<GpsInterface>,
    /// Caller callbacks, once inited.
    pub(crate) callbacks: Option<GpsCallbacks>,
    /// Vendor-shaped callbacks installed by `init`. Boxed, its address is
    /// stable and may be kept by the vendor.
    pub(crate) translated: Box<ForeignCallbackTable>,
}

impl AdapterSession {
    pub(crate) fn new(
        layout: &'static LayoutHypothesis,
        foreign: ForeignInterfaceRef,
        interface: GpsInterface,
    ) -> Self {
        Self {
            layout,
            foreign,
            interface: Box::new(interface),
            callbacks: None,
            translated: Box::default(),
        }
    }
}

pub(crate) static SESSIONS: SessionRegistry<AdapterSession> =
    SessionRegistry::new("GPS interface");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use log::Level;

    #[test]
    fn register_and_read() {
        let registry = SessionRegistry::<u32>::new("test session");
        assert!(registry.with_current(|_| ()).is_none());
        assert_eq!(registry.with_current(|s| *s), None);

        registry.register(7u32);
        assert!(registry.with_current(|_| ()).is_some());
        assert_eq!(registry.with_current(|s| *s), Some(7));

        registry.with_current_mut(|s| *s += 1);
        assert_eq!(registry.with_current(|s| *s), Some(8));
    }

    #[test]
    fn second_registration_warns_and_replaces() {
        let logs = testing::logs();
        let registry = SessionRegistry::new("double session");

        registry.register(Box::new(1u32));
        let first = registry.with_current(|s| &**s as *const u32).unwrap();

        registry.register(Box::new(2u32));
        assert_eq!(registry.with_current(|s| **s), Some(2));
        assert!(logs.contains(Level::Warn, "double session registered again"));

        // The replaced session is kept alive.
        assert_eq!(unsafe { *first }, 1);
    }

    #[test]
    fn retire() {
        let registry = SessionRegistry::<u8>::new("retired session");
        assert!(!registry.retire());
        registry.register(3u8);
        assert!(registry.retire());
        assert!(registry.with_current(|_| ()).is_none());
        assert!(!registry.retire());
    }

    #[test]
    fn one_session_kept_per_registration() {
        let registry = SessionRegistry::<u8>::new("counted session");
        for i in 0..4 {
            registry.register(i);
        }
        assert_eq!(registry.retired_len(), 3);

        registry.retire();
        registry.retire();
        assert_eq!(registry.retired_len(), 4);
    }
}
