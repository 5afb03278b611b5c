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

//! Orders to the MT6628 kernel driver adding or removing its net interfaces.
//!
//! wlan0 is controlled through the `/dev/wmtWifi` device (from
//! `mtk_wmt_wifi.ko`, created with `mknod /dev/wmtWifi c 153 0`), p2p0 through
//! a private ioctl on wlan0. Both end up in `wlan_mt6628.ko`, which must be
//! loaded already.

use fp1_hw_common::wext::{IwReq, SIOCIWFIRSTPRIV};
use nix::errno::Errno;
use nix::sys::socket::{socket, AddressFamily, SockFlag, SockType};
use std::fs::OpenOptions;
use std::io::Write;
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use thiserror::Error;

/// `IOCTL_SET_INT` of the driver private ioctls (`SIOCIWFIRSTPRIV + 0`).
const IOCTL_SET_INT: u32 = SIOCIWFIRSTPRIV;
/// Driver command switching the P2P mode, see `priv_set_int` in the driver.
const PRIV_CMD_P2P_MODE: u32 = 28;

nix::ioctl_write_ptr_bad!(ioctl_set_int, IOCTL_SET_INT, IwReq);

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Cmd {
    Add,
    Remove,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not open {path} to control the wlan0 interface: {source}")]
    OpenDevice { path: PathBuf, source: std::io::Error },

    #[error("could not write to {path} to control the wlan0 interface: {source}")]
    WriteDevice { path: PathBuf, source: std::io::Error },

    #[error("could not create socket to control the p2p0 interface: {0}")]
    Socket(Errno),

    #[error("could not send ioctl to control the p2p0 interface: {0}")]
    Ioctl(Errno),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Where the driver and the kernel are reached.
#[derive(Debug, Clone)]
pub struct IfaceCtrlConfig {
    /// Directory with one entry per existing net interface.
    pub sysfs_net: PathBuf,
    /// Device adding and removing wlan0.
    pub wmt_wifi: PathBuf,
    /// Interface the p2p0 ioctl is sent to.
    pub control_iface: String,
}

impl Default for IfaceCtrlConfig {
    fn default() -> Self {
        Self {
            sysfs_net: PathBuf::from("/sys/class/net"),
            wmt_wifi: PathBuf::from("/dev/wmtWifi"),
            control_iface: "wlan0".to_owned(),
        }
    }
}

pub struct IfaceCtrl<'a> {
    config: &'a IfaceCtrlConfig,
}

impl<'a> IfaceCtrl<'a> {
    pub fn new(config: &'a IfaceCtrlConfig) -> Self {
        Self { config }
    }

    /// Whether `iface` is not in the state `cmd` leads to already.
    fn is_cmd_needed(&self, cmd: Cmd, iface: &str) -> bool {
        let exists = self.config.sysfs_net.join(iface).exists();
        match (cmd, exists) {
            (Cmd::Add, true) => {
                log::info!("Interface {} has been added already", iface);
                false
            }
            (Cmd::Remove, false) => {
                log::info!("Interface {} has been removed already", iface);
                false
            }
            _ => true,
        }
    }

    pub fn ctrl_wlan0(&self, cmd: Cmd) -> Result<()> {
        if !self.is_cmd_needed(cmd, "wlan0") {
            return Ok(());
        }

        let path = &self.config.wmt_wifi;
        let mut device = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|source| Error::OpenDevice { path: path.clone(), source })?;

        // The driver reads a NUL terminated string.
        let order: &[u8] = match cmd {
            Cmd::Add => b"1\0",
            Cmd::Remove => b"0\0",
        };
        device.write_all(order).map_err(|source| Error::WriteDevice { path: path.clone(), source })
    }

    pub fn ctrl_p2p0(&self, cmd: Cmd) -> Result<()> {
        if !self.is_cmd_needed(cmd, "p2p0") {
            return Ok(());
        }

        let socket = socket(AddressFamily::Inet, SockType::Datagram, SockFlag::empty(), None)
            .map_err(Error::Socket)?;
        let request = p2p_mode_request(&self.config.control_iface, cmd);

        // SAFETY: `request` is a valid `iwreq` that outlives the call; the
        //         driver only reads the first three words of its data.
        unsafe { ioctl_set_int(socket.as_raw_fd(), &request) }.map_err(Error::Ioctl)?;
        Ok(())
    }

    /// Adds wlan0, then p2p0, which depends on it. Stops at the first failure.
    pub fn add_interfaces(&self) -> Result<()> {
        self.ctrl_wlan0(Cmd::Add).inspect_err(|e| {
            log::error!("Could not add the wlan0 interface: {}", e);
        })?;
        self.ctrl_p2p0(Cmd::Add).inspect_err(|e| {
            log::error!("Could not add the p2p0 interface: {}", e);
        })
    }

    /// Removes p2p0, then wlan0. Both are tried even if the first one fails.
    pub fn remove_interfaces(&self) -> Result<()> {
        let p2p0 = self.ctrl_p2p0(Cmd::Remove).inspect_err(|e| {
            log::error!("Could not remove the p2p0 interface: {}", e);
        });
        let wlan0 = self.ctrl_wlan0(Cmd::Remove).inspect_err(|e| {
            log::error!("Could not remove the wlan0 interface: {}", e);
        });
        p2p0.and(wlan0)
    }

    pub fn run(&self, cmd: Cmd) -> Result<()> {
        match cmd {
            Cmd::Add => self.add_interfaces(),
            Cmd::Remove => self.remove_interfaces(),
        }
    }
}

/// `IOCTL_SET_INT` request setting the P2P mode: the command, then the mode
/// and, when enabling, the P2P role (0).
fn p2p_mode_request(control_iface: &str, cmd: Cmd) -> IwReq {
    let mut request = IwReq::new(control_iface);
    request.u.words = match cmd {
        Cmd::Add => [PRIV_CMD_P2P_MODE, 1, 0, 0],
        Cmd::Remove => [PRIV_CMD_P2P_MODE, 0, 0, 0],
    };
    request
}
