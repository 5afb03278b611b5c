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

//! Loading of the wrapped vendor HAL module.

use crate::error::{Error, Result};
use crate::hal::{HwModule, GPS_HARDWARE_MODULE_ID, HAL_MODULE_INFO_SYM_AS_STR, HARDWARE_MODULE_TAG};
use core::ffi::{c_void, CStr};
use libloading::os::unix;
use std::ptr::NonNull;

/// A dynamically loaded library. Dropping it unloads the library.
pub trait Library: Sized {
    fn open(path: &str) -> Result<Self>;

    /// Address of the symbol `name`.
    fn symbol(&self, name: &CStr) -> Result<NonNull<c_void>>;

    /// Keeps the library loaded for the rest of the process.
    fn make_resident(self);
}

/// [`Library`] backed by the platform dynamic linker.
pub struct DlLibrary {
    library: unix::Library,
}

impl Library for DlLibrary {
    fn open(path: &str) -> Result<Self> {
        // SAFETY: The vendor HAL runs no initializers that depend on the caller.
        let library = unsafe { unix::Library::open(Some(path), unix::RTLD_NOW) }
            .map_err(|e| Error::ModuleNotFound { path: path.to_owned(), reason: e.to_string() })?;
        Ok(Self { library })
    }

    fn symbol(&self, name: &CStr) -> Result<NonNull<c_void>> {
        // SAFETY: Only the address of the symbol is read here.
        let symbol = unsafe { self.library.get::<*mut c_void>(name.to_bytes_with_nul()) }
            .map_err(|e| Error::SymbolMissing(e.to_string()))?;
        NonNull::new(*symbol)
            .ok_or_else(|| Error::SymbolMissing(format!("{} is null", name.to_string_lossy())))
    }

    fn make_resident(self) {
        // The handle is dropped without dlclose.
        let _ = self.library.into_raw();
    }
}

/// A loaded vendor module whose identity was checked.
///
/// Dropping it releases the library.
pub struct ForeignModule<L: Library> {
    library: L,
    module: NonNull<HwModule>,
}

impl<L: Library> ForeignModule<L> {
    pub fn module(&self) -> *const HwModule {
        self.module.as_ptr()
    }

    /// Keeps the module loaded for the rest of the process: vendor threads
    /// and function pointers handed out outlive any device.
    pub fn make_resident(self) -> *const HwModule {
        let module = self.module.as_ptr();
        self.library.make_resident();
        module
    }
}

/// Opens the vendor HAL module at `path` and checks it is a GPS module.
///
/// On any failure the library is released before returning.
pub fn load<L: Library>(path: &str) -> Result<ForeignModule<L>> {
    log::info!("Opening wrapped GPS HAL module '{}'", path);

    let result = open_and_check(path);
    match &result {
        Ok(_) => log::info!("Wrapped GPS HAL module '{}' loaded", path),
        Err(e) => log::error!("Could not load wrapped GPS HAL module: {}", e),
    }
    result
}

fn open_and_check<L: Library>(path: &str) -> Result<ForeignModule<L>> {
    let library = L::open(path)?;
    let module = library.symbol(HAL_MODULE_INFO_SYM_AS_STR)?.cast::<HwModule>();

    // SAFETY: `HMI` of a HAL module is a `hw_module_t`, alive while the library is.
    check_identity(unsafe { module.as_ref() })?;

    Ok(ForeignModule { library, module })
}

fn check_identity(module: &HwModule) -> Result<()> {
    if module.tag != HARDWARE_MODULE_TAG {
        return Err(Error::IdentityMismatch {
            expected: format!("tag {:#010x}", HARDWARE_MODULE_TAG),
            found: format!("tag {:#010x}", module.tag),
        });
    }

    let found = if module.id.is_null() {
        "(null)".to_owned()
    } else {
        // SAFETY: A non-null module id is a C string with the module lifetime.
        unsafe { CStr::from_ptr(module.id) }.to_string_lossy().into_owned()
    };
    if found.as_bytes() != GPS_HARDWARE_MODULE_ID.to_bytes() {
        return Err(Error::IdentityMismatch {
            expected: GPS_HARDWARE_MODULE_ID.to_string_lossy().into_owned(),
            found,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, FakeLibrary, LIGHTS_PATH, MISSING_SYMBOL_PATH, VENDOR_PATH};

    #[test]
    fn load_vendor_module() {
        let _serial = testing::serial();
        let live = FakeLibrary::live();

        let module = load::<FakeLibrary>(VENDOR_PATH).expect("loading the vendor module");
        assert!(!module.module().is_null());
        assert_eq!(FakeLibrary::live(), live + 1);

        drop(module);
        assert_eq!(FakeLibrary::live(), live);
    }

    #[test]
    fn missing_module() {
        let _serial = testing::serial();
        let live = FakeLibrary::live();

        let err = load::<FakeLibrary>("/vendor/lib/hw/none.so").err().unwrap();
        assert!(matches!(err, Error::ModuleNotFound { .. }));
        assert_eq!(err.errno(), -libc::EINVAL);
        assert_eq!(FakeLibrary::live(), live);
    }

    #[test]
    fn missing_symbol_releases_library() {
        let _serial = testing::serial();
        let live = FakeLibrary::live();

        let err = load::<FakeLibrary>(MISSING_SYMBOL_PATH).err().unwrap();
        assert!(matches!(err, Error::SymbolMissing(_)));
        assert_eq!(FakeLibrary::live(), live);
    }

    #[test]
    fn wrong_identity_releases_library() {
        let _serial = testing::serial();
        let live = FakeLibrary::live();
        let opened = FakeLibrary::opened();

        let err = load::<FakeLibrary>(LIGHTS_PATH).err().unwrap();
        assert_eq!(
            err,
            Error::IdentityMismatch { expected: "gps".to_owned(), found: "lights".to_owned() }
        );
        assert_eq!(FakeLibrary::opened(), opened + 1);
        assert_eq!(FakeLibrary::live(), live);
    }

    #[test]
    fn dlopen_missing_file() {
        let err = DlLibrary::open("/nonexistent/gps.so").err().unwrap();
        assert!(matches!(err, Error::ModuleNotFound { .. }));
        assert_eq!(err.errno(), -libc::EINVAL);
    }

    #[test]
    fn dlopen_library_without_hmi() {
        let library = DlLibrary::open("libc.so.6").expect("loading the host libc");
        assert!(library.symbol(c"getpid").is_ok());

        let err = library.symbol(HAL_MODULE_INFO_SYM_AS_STR).err().unwrap();
        assert!(matches!(err, Error::SymbolMissing(_)));

        library.make_resident();
    }

    #[test]
    fn dlopen_checks_identity() {
        let err = load::<DlLibrary>("libc.so.6").err().unwrap();
        assert!(matches!(err, Error::SymbolMissing(_)));
    }
}
