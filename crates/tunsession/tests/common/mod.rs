//! Common test utilities for integration tests.
//!
//! Provides `MockProvisioner`, a socketpair-backed stand-in for the kernel
//! side, and helper macros for conditional test execution.

#![allow(dead_code)]

use std::collections::HashSet;
use std::io;
use std::net::IpAddr;
use std::os::fd::OwnedFd;
use std::os::unix::net::UnixDatagram;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tunsession::{Error, Provisioner, Result, TunConfig, TunDevice};

/// Global counter for unique interface names.
static IFNAME_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Generate a unique interface name for this test.
pub fn unique_ifname(prefix: &str) -> String {
    let id = IFNAME_COUNTER.fetch_add(1, Ordering::SeqCst);
    let pid = std::process::id() % 100_000;
    format!("{}{}_{}", prefix, pid, id)
}

/// Configuration used by most lifecycle tests.
pub fn test_config() -> TunConfig {
    TunConfig::new("mock0", "10.8.0.1/24").ipv6("fd00::1/64")
}

/// Provisioner that hands out one end of a datagram socketpair per `open`
/// and records every call.
#[derive(Default)]
pub struct MockProvisioner {
    opens: AtomicUsize,
    releases: AtomicUsize,
    link_ups: AtomicUsize,
    link_downs: AtomicUsize,
    mtus: Mutex<Vec<u32>>,
    addresses: Mutex<Vec<(IpAddr, u8)>>,
    failing: Mutex<HashSet<&'static str>>,
    open_delay: Mutex<Option<Duration>>,
    peers: Mutex<Vec<UnixDatagram>>,
}

impl MockProvisioner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the named step fail: `open`, `persist`, `mtu`, `address`,
    /// `link-up` or `link-down`.
    pub fn fail(&self, step: &'static str) {
        self.failing.lock().unwrap().insert(step);
    }

    /// Slow down `open` to widen race windows.
    pub fn delay_open(&self, delay: Duration) {
        *self.open_delay.lock().unwrap() = Some(delay);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn link_ups(&self) -> usize {
        self.link_ups.load(Ordering::SeqCst)
    }

    pub fn link_downs(&self) -> usize {
        self.link_downs.load(Ordering::SeqCst)
    }

    pub fn mtus(&self) -> Vec<u32> {
        self.mtus.lock().unwrap().clone()
    }

    pub fn addresses(&self) -> Vec<(IpAddr, u8)> {
        self.addresses.lock().unwrap().clone()
    }

    /// Kernel-side end of the most recently opened device.
    pub fn peer(&self) -> UnixDatagram {
        self.peers
            .lock()
            .unwrap()
            .last()
            .expect("no device opened")
            .try_clone()
            .unwrap()
    }

    fn check(&self, step: &'static str) -> Result<()> {
        if self.failing.lock().unwrap().contains(step) {
            return Err(Error::Sys {
                operation: format!("mock {}", step),
                source: io::Error::from_raw_os_error(libc::EPERM),
            });
        }
        Ok(())
    }
}

impl Provisioner for MockProvisioner {
    fn open(&self, config: &TunConfig) -> Result<TunDevice> {
        if let Some(delay) = *self.open_delay.lock().unwrap() {
            std::thread::sleep(delay);
        }
        if self.failing.lock().unwrap().contains("open") {
            return Err(Error::NoDevice {
                path: "/dev/net/tun",
                source: io::Error::from_raw_os_error(libc::ENOENT),
            });
        }

        let (ours, peer) = UnixDatagram::pair()?;
        ours.set_nonblocking(true)?;
        self.peers.lock().unwrap().push(peer);
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(TunDevice::from_owned_fd(OwnedFd::from(ours), config.name()))
    }

    fn set_persistent(&self, _device: &TunDevice, _on: bool) -> Result<()> {
        self.check("persist")
    }

    fn set_mtu(&self, _device: &TunDevice, mtu: u32) -> Result<()> {
        self.check("mtu")?;
        self.mtus.lock().unwrap().push(mtu);
        Ok(())
    }

    fn add_address(&self, _device: &TunDevice, addr: IpAddr, prefix: u8) -> Result<()> {
        self.check("address")?;
        self.addresses.lock().unwrap().push((addr, prefix));
        Ok(())
    }

    fn set_link_up(&self, _device: &TunDevice) -> Result<()> {
        self.check("link-up")?;
        self.link_ups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_link_down(&self, _device: &TunDevice) -> Result<()> {
        self.link_downs.fetch_add(1, Ordering::SeqCst);
        self.check("link-down")
    }

    fn release(&self, device: Arc<TunDevice>) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        drop(device);
    }
}

/// Check if running as root.
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Check if the TUN clone device exists.
pub fn has_tun() -> bool {
    std::path::Path::new("/dev/net/tun").exists()
}

/// Skip the test if not running as root or TUN is unavailable.
#[macro_export]
macro_rules! require_root {
    () => {
        if !crate::common::is_root() || !crate::common::has_tun() {
            eprintln!("Skipping test: requires root and /dev/net/tun");
            return Ok(());
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_ifname() {
        let name1 = unique_ifname("tsn");
        let name2 = unique_ifname("tsn");
        assert_ne!(name1, name2);
        assert!(name1.starts_with("tsn"));
    }
}
