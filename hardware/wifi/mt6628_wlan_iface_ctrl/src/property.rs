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

//! System properties the result is stored in.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PropertyError {
    #[error("invalid property '{0}'")]
    Invalid(String),

    #[cfg_attr(not(target_os = "android"), allow(dead_code))]
    #[error("could not set property '{name}': {status}")]
    SetFailed { name: String, status: i32 },
}

pub trait PropertyStore {
    fn set(&self, name: &str, value: &str) -> Result<(), PropertyError>;
}

/// The Android property service.
pub struct SystemProperties;

#[cfg(target_os = "android")]
extern "C" {
    fn __system_property_set(
        key: *const core::ffi::c_char,
        value: *const core::ffi::c_char,
    ) -> core::ffi::c_int;
}

#[cfg(target_os = "android")]
impl PropertyStore for SystemProperties {
    fn set(&self, name: &str, value: &str) -> Result<(), PropertyError> {
        use std::ffi::CString;

        let key = CString::new(name).map_err(|_| PropertyError::Invalid(name.to_owned()))?;
        let value = CString::new(value).map_err(|_| PropertyError::Invalid(name.to_owned()))?;
        // SAFETY: Both are valid C strings, only read during the call.
        let status = unsafe { __system_property_set(key.as_ptr(), value.as_ptr()) };
        if status < 0 {
            return Err(PropertyError::SetFailed { name: name.to_owned(), status });
        }
        Ok(())
    }
}

/// There is no property service on host; the value is only logged.
#[cfg(not(target_os = "android"))]
impl PropertyStore for SystemProperties {
    fn set(&self, name: &str, value: &str) -> Result<(), PropertyError> {
        if name.is_empty() || name.contains('\0') {
            return Err(PropertyError::Invalid(name.to_owned()));
        }
        log::info!("Property {} set to {}", name, value);
        Ok(())
    }
}
