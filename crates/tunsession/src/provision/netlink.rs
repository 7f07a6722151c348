//! Provisioner backed by the TUN ioctls and rtnetlink.

use std::io;
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};

use super::Provisioner;
use crate::config::TunConfig;
use crate::device::TunDevice;
use crate::error::{Error, Result};
use crate::netlink::Connection;
use crate::util::ifname::{self, IfError};

/// Default provisioner: opens `/dev/net/tun` and configures the link over
/// a routing netlink socket.
///
/// The socket is opened on first use and reused afterwards.
#[derive(Default)]
pub struct NetlinkProvisioner {
    conn: Mutex<Option<Connection>>,
}

impl NetlinkProvisioner {
    /// Create a provisioner. No socket is opened until needed.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            *guard = Some(Connection::new()?);
        }
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(Error::Internal("netlink connection missing".to_string())),
        }
    }
}

impl std::fmt::Debug for NetlinkProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetlinkProvisioner").finish_non_exhaustive()
    }
}

/// Resolve the interface index of an opened device.
fn ifindex(device: &TunDevice) -> Result<u32> {
    ifname::name_to_index(device.name()).map_err(|e| match e {
        IfError::NotFound(name) => Error::Sys {
            operation: format!("if_nametoindex({})", name),
            source: io::Error::from_raw_os_error(libc::ENODEV),
        },
        IfError::InvalidName(msg) => Error::InvalidArgument(msg),
    })
}

impl Provisioner for NetlinkProvisioner {
    fn open(&self, config: &TunConfig) -> Result<TunDevice> {
        TunDevice::open(config.name())
    }

    fn set_persistent(&self, device: &TunDevice, on: bool) -> Result<()> {
        device.set_persistent(on)
    }

    fn set_mtu(&self, device: &TunDevice, mtu: u32) -> Result<()> {
        let index = ifindex(device)?;
        self.with_connection(|conn| conn.set_link_mtu(index, mtu))
    }

    fn add_address(&self, device: &TunDevice, addr: IpAddr, prefix: u8) -> Result<()> {
        let index = ifindex(device)?;
        self.with_connection(|conn| conn.add_address(index, addr, prefix))
    }

    fn set_link_up(&self, device: &TunDevice) -> Result<()> {
        let index = ifindex(device)?;
        self.with_connection(|conn| conn.set_link_state(index, true))
    }

    fn set_link_down(&self, device: &TunDevice) -> Result<()> {
        let index = ifindex(device)?;
        self.with_connection(|conn| conn.set_link_state(index, false))
    }
}
