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

//! Kernel side of the driver commands.

use crate::error::{Error, Result};
use core::ffi::{c_char, c_int, c_short, c_ulong, CStr};
use fp1_hw_common::wext::{ifname_to_c, IwPoint, IwReq, IFNAMSIZ};
use std::mem;
use std::os::fd::RawFd;

pub const ETH_ALEN: usize = 6;

/// What the driver commands need from the kernel.
pub trait DriverBackend {
    /// Brings `ifname` up or down.
    fn set_iface_up(&self, ifname: &str, up: bool) -> Result<()>;

    fn hw_addr(&self, ifname: &str) -> Result<[u8; ETH_ALEN]>;

    /// Passes `cmd` to the driver of `ifname` as a private command string.
    fn set_priv(&self, ifname: &str, cmd: &CStr) -> Result<c_int>;
}

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) union IfReqData {
    flags: c_short,
    hwaddr: libc::sockaddr,
    // Gives the union the size of the kernel one, whose largest member is `struct ifmap`.
    #[allow(dead_code)]
    map: [c_ulong; 3],
}

/// `struct ifreq`, with the members used here.
#[repr(C)]
pub(crate) struct IfReq {
    ifr_name: [c_char; IFNAMSIZ],
    ifr_ifru: IfReqData,
}

impl IfReq {
    fn new(ifname: &str) -> Self {
        // SAFETY: All zeroes is a valid `ifreq`.
        let mut request: Self = unsafe { mem::zeroed() };
        request.ifr_name = ifname_to_c(ifname);
        request
    }
}

mod ioctl {
    use super::IfReq;
    use fp1_hw_common::wext::{IwReq, SIOCSIWPRIV};

    nix::ioctl_read_bad!(get_flags, libc::SIOCGIFFLAGS, IfReq);
    nix::ioctl_write_ptr_bad!(set_flags, libc::SIOCSIFFLAGS, IfReq);
    nix::ioctl_read_bad!(get_hwaddr, libc::SIOCGIFHWADDR, IfReq);
    nix::ioctl_write_ptr_bad!(set_priv, SIOCSIWPRIV, IwReq);
}

/// [`DriverBackend`] sending ioctls through the supplicant's ioctl socket.
pub struct IoctlBackend {
    sock: RawFd,
}

impl IoctlBackend {
    /// `sock` stays owned by the supplicant.
    pub fn new(sock: RawFd) -> Self {
        Self { sock }
    }

    fn failed(request: &'static str, ifname: &str) -> impl FnOnce(nix::errno::Errno) -> Error {
        let ifname = ifname.to_owned();
        move |errno| Error::Ioctl { request, ifname, errno }
    }
}

impl DriverBackend for IoctlBackend {
    fn set_iface_up(&self, ifname: &str, up: bool) -> Result<()> {
        let mut request = IfReq::new(ifname);
        // SAFETY: `request` is a valid `ifreq`, alive during the call.
        unsafe { ioctl::get_flags(self.sock, &mut request) }
            .map_err(Self::failed("SIOCGIFFLAGS", ifname))?;

        // SAFETY: Filled by SIOCGIFFLAGS.
        let flags = unsafe { request.ifr_ifru.flags };
        let iff_up = libc::IFF_UP as c_short;
        let wanted = if up { flags | iff_up } else { flags & !iff_up };
        if wanted == flags {
            return Ok(());
        }

        request.ifr_ifru.flags = wanted;
        // SAFETY: As above.
        unsafe { ioctl::set_flags(self.sock, &request) }
            .map_err(Self::failed("SIOCSIFFLAGS", ifname))?;
        Ok(())
    }

    fn hw_addr(&self, ifname: &str) -> Result<[u8; ETH_ALEN]> {
        let mut request = IfReq::new(ifname);
        // SAFETY: `request` is a valid `ifreq`, alive during the call.
        unsafe { ioctl::get_hwaddr(self.sock, &mut request) }
            .map_err(Self::failed("SIOCGIFHWADDR", ifname))?;

        // SAFETY: Filled by SIOCGIFHWADDR.
        let hwaddr = unsafe { request.ifr_ifru.hwaddr };
        if hwaddr.sa_family != libc::ARPHRD_ETHER {
            return Err(Error::NotEthernet { ifname: ifname.to_owned(), family: hwaddr.sa_family });
        }

        let mut addr = [0; ETH_ALEN];
        for (dst, src) in addr.iter_mut().zip(hwaddr.sa_data) {
            *dst = src as u8;
        }
        Ok(addr)
    }

    fn set_priv(&self, ifname: &str, cmd: &CStr) -> Result<c_int> {
        let mut request = IwReq::new(ifname);
        request.u.data = IwPoint {
            pointer: cmd.as_ptr().cast_mut().cast(),
            length: u16::try_from(cmd.to_bytes_with_nul().len()).unwrap_or(u16::MAX),
            flags: 0,
        };
        // SAFETY: `request` points to `cmd`, both alive during the call. The
        //         driver only reads the command.
        unsafe { ioctl::set_priv(self.sock, &request) }.map_err(Self::failed("SIOCSIWPRIV", ifname))
    }
}
