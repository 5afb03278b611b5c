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

//! Pieces shared by the device shims.

pub mod wext;

/// Inits logging for Android, with `tag` as the logcat tag.
///
/// Safe to call more than once; only the first call has an effect.
#[cfg(target_os = "android")]
pub fn init_logging(tag: &str) {
    android_logger::init_once(
        android_logger::Config::default().with_tag(tag).with_max_level(log::LevelFilter::Trace),
    );
}

/// Inits logging for host
#[cfg(not(target_os = "android"))]
pub fn init_logging(_tag: &str) {
    env_logger::Builder::new().parse_default_env().try_init().ok();
}
