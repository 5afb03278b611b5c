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

//! Helper command adding and removing the wlan0 and p2p0 net interfaces of
//! the MT6628 combo chip.
//!
//! The interfaces are added and removed by the kernel; this only sends it the
//! orders to do so. It is meant to run as a oneshot init service: output goes
//! to the Android log, and the result ("ok" or "failed") can be stored in a
//! system property to be checked once the service finished.

mod iface;
mod property;

use crate::iface::{Cmd, IfaceCtrl, IfaceCtrlConfig};
use crate::property::{PropertyStore, SystemProperties};
use clap::Parser;
use std::process::ExitCode;

const LOG_TAG: &str = "mt6628_wlan_iface_ctrl";

#[derive(Parser, Debug)]
#[command(name = "mt6628_wlan_iface_ctrl", disable_help_flag = true)]
struct Args {
    #[arg(value_enum)]
    cmd: Cmd,

    /// System property to store the result in.
    property: Option<String>,
}

/// Runs `args.cmd`, storing its result in the property, if any.
fn run(
    args: &Args,
    config: &IfaceCtrlConfig,
    properties: &impl PropertyStore,
) -> iface::Result<()> {
    let result = IfaceCtrl::new(config).run(args.cmd);

    if let Some(name) = &args.property {
        let value = if result.is_ok() { "ok" } else { "failed" };
        if let Err(e) = properties.set(name, value) {
            log::error!("{}", e);
        }
    }
    result
}

fn main() -> ExitCode {
    fp1_hw_common::init_logging(LOG_TAG);

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            log::error!("Usage: {} add|remove [property name for result]", LOG_TAG);
            log::error!("{}", e);
            return ExitCode::from(1);
        }
    };

    match run(&args, &IfaceCtrlConfig::default(), &SystemProperties) {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::from(1),
    }
}
