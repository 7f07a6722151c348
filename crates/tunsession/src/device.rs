//! Opened TUN device.
//!
//! A [`TunDevice`] owns the descriptor of a `/dev/net/tun` queue bound to an
//! interface name. The descriptor is non-blocking and close-on-exec, and is
//! closed when the device is dropped.

use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;

use crate::error::{Error, Result};
use crate::util::ifname::{self, IFNAMSIZ};

/// Path to the TUN clone device.
pub const TUN_DEVICE_PATH: &str = "/dev/net/tun";

// TUN ioctl constants
const TUNSETIFF: libc::c_ulong = 0x400454ca;
const TUNSETPERSIST: libc::c_ulong = 0x400454cb;

// TUN flags
const IFF_TUN: libc::c_short = 0x0001;
const IFF_NO_PI: libc::c_short = 0x1000;

/// An opened TUN device queue.
#[derive(Debug)]
pub struct TunDevice {
    fd: OwnedFd,
    name: String,
}

impl TunDevice {
    /// Open `/dev/net/tun` and bind it to `name` as a TUN device without
    /// packet information headers.
    ///
    /// Requires `CAP_NET_ADMIN`.
    pub fn open(name: &str) -> Result<Self> {
        ifname::validate(name).map_err(|e| Error::InvalidConfig(e.to_string()))?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_CLOEXEC)
            .open(TUN_DEVICE_PATH)
            .map_err(|source| Error::NoDevice {
                path: TUN_DEVICE_PATH,
                source,
            })?;
        let fd = OwnedFd::from(file);

        // SAFETY: ifreq is plain old data; all-zero is a valid value.
        let mut ifr: libc::ifreq = unsafe { std::mem::zeroed() };
        ifr.ifr_ifru.ifru_flags = IFF_TUN | IFF_NO_PI;
        for (dst, src) in ifr.ifr_name.iter_mut().zip(name.bytes()) {
            *dst = src as libc::c_char;
        }

        // SAFETY: fd is open and ifr outlives the call.
        let ret = unsafe { libc::ioctl(fd.as_raw_fd(), TUNSETIFF, &ifr) };
        if ret < 0 {
            return Err(Error::last_os_error(format!("TUNSETIFF({})", name)));
        }

        // The kernel may rewrite the name (e.g. a `tun%d` template)
        let bound: Vec<u8> = ifr
            .ifr_name
            .iter()
            .take(IFNAMSIZ)
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8)
            .collect();
        let name = String::from_utf8_lossy(&bound).into_owned();

        tracing::debug!(name = %name, fd = fd.as_raw_fd(), "TUN device opened");
        Ok(Self { fd, name })
    }

    /// Wrap an already opened descriptor.
    ///
    /// The descriptor should be non-blocking; packet I/O reports
    /// [`Error::WouldBlock`] only in that mode.
    pub fn from_owned_fd(fd: OwnedFd, name: impl Into<String>) -> Self {
        Self {
            fd,
            name: name.into(),
        }
    }

    /// Interface name the device is bound to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Toggle TUNSETPERSIST: a persistent device outlives its descriptor.
    pub fn set_persistent(&self, on: bool) -> Result<()> {
        // SAFETY: fd is open; TUNSETPERSIST takes its argument by value.
        let ret = unsafe {
            libc::ioctl(
                self.fd.as_raw_fd(),
                TUNSETPERSIST,
                libc::c_ulong::from(on),
            )
        };
        if ret < 0 {
            return Err(Error::last_os_error(format!("TUNSETPERSIST({})", self.name)));
        }
        Ok(())
    }

    /// Duplicate the descriptor (for readiness registration).
    pub fn try_clone_fd(&self) -> Result<OwnedFd> {
        self.fd.try_clone().map_err(|source| Error::Sys {
            operation: format!("dup({})", self.name),
            source,
        })
    }

    /// Read one packet. Maps directly onto `read(2)`.
    pub(crate) fn read_raw(&self, buf: &mut [u8]) -> io::Result<usize> {
        // SAFETY: buf is valid for writes of buf.len() bytes.
        let n = unsafe { libc::read(self.fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }

    /// Write one packet. Maps directly onto `write(2)`.
    pub(crate) fn write_raw(&self, buf: &[u8]) -> io::Result<usize> {
        // SAFETY: buf is valid for reads of buf.len() bytes.
        let n = unsafe { libc::write(self.fd.as_raw_fd(), buf.as_ptr().cast(), buf.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }
}

impl AsFd for TunDevice {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsRawFd for TunDevice {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixDatagram;

    fn pair() -> (TunDevice, UnixDatagram) {
        let (ours, peer) = UnixDatagram::pair().unwrap();
        ours.set_nonblocking(true).unwrap();
        (TunDevice::from_owned_fd(OwnedFd::from(ours), "mock0"), peer)
    }

    #[test]
    fn test_from_owned_fd() {
        let (device, _peer) = pair();
        assert_eq!(device.name(), "mock0");
        assert!(device.as_raw_fd() >= 0);
    }

    #[test]
    fn test_raw_read_write() {
        let (device, peer) = pair();

        peer.send(&[0x45, 0, 0, 20]).unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(device.read_raw(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], &[0x45, 0, 0, 20]);

        assert_eq!(device.write_raw(&[1, 2, 3]).unwrap(), 3);
        let n = peer.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3]);
    }

    #[test]
    fn test_empty_read_would_block() {
        let (device, _peer) = pair();
        let mut buf = [0u8; 16];
        let err = device.read_raw(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_clone_fd_is_distinct() {
        let (device, _peer) = pair();
        let dup = device.try_clone_fd().unwrap();
        assert_ne!(dup.as_raw_fd(), device.as_raw_fd());
    }

    #[test]
    fn test_open_rejects_bad_name() {
        let err = TunDevice::open("bad/name").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidConfig);
    }
}
