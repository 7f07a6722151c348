//! Device lifecycle state machine.
//!
//! [`TunSession`] owns one tunnel device for its whole life:
//!
//! ```text
//!                 init            start
//! Uninitialized ───────► Initialized ───────► Running
//!       ▲                                    │    ▲
//!       │ cleanup (from any state)      stop │    │ start
//!       │                                    ▼    │
//!       └──────────────────────────────── Stopped ┘
//!                                  init: Stopped ► Initialized
//! ```
//!
//! All shared state sits behind one mutex that is never held across
//! provisioning or packet syscalls. A transition that releases the lock
//! marks the session busy; concurrent lifecycle calls are rejected with
//! [`Error::InvalidState`] until it commits, except `cleanup`, which waits.

use std::os::fd::{AsRawFd, RawFd};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use crate::config::TunConfig;
use crate::device::TunDevice;
use crate::error::{Error, Result};
use crate::io;
use crate::provision::{self, NetlinkProvisioner, Provisioner, StepWarning};
use crate::state::{LifecycleState, Operation};

/// Shared state guarded by the session mutex.
#[derive(Debug, Default)]
struct Inner {
    state: LifecycleState,
    config: Option<TunConfig>,
    /// Present only while `Running`.
    device: Option<Arc<TunDevice>>,
    /// Transition in flight with the lock released.
    busy: Option<Operation>,
    warnings: Vec<StepWarning>,
}

impl Inner {
    fn reject(&self, operation: Operation) -> Error {
        debug!(%operation, state = %self.state, "operation rejected");
        Error::InvalidState {
            operation,
            state: self.state,
        }
    }

    /// Reject `operation` if a transition is in flight or the state forbids it.
    fn precheck(&self, operation: Operation) -> Result<()> {
        if self.busy.is_some() || !self.state.permits(operation) {
            return Err(self.reject(operation));
        }
        Ok(())
    }
}

/// Lifecycle manager for a single TUN device.
///
/// `TunSession` is `Send + Sync`; share it through an `Arc` to call it from
/// several threads.
///
/// # Example
///
/// ```ignore
/// use tunsession::{TunConfig, TunSession};
///
/// let session = TunSession::new();
/// session.init(&TunConfig::new("tun0", "10.8.0.1/24"))?;
/// session.start()?;
///
/// let mut buf = [0u8; 1500];
/// match session.read(&mut buf) {
///     Ok(n) => println!("{} byte packet", n),
///     Err(e) if e.is_would_block() => {}
///     Err(e) => return Err(e),
/// }
///
/// session.cleanup()?;
/// ```
pub struct TunSession {
    provisioner: Arc<dyn Provisioner>,
    inner: Mutex<Inner>,
    /// Signalled whenever a busy transition commits.
    settled: Condvar,
    #[cfg(feature = "async")]
    wake: tokio::sync::Notify,
}

impl Default for TunSession {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TunSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("TunSession")
            .field("state", &inner.state)
            .field("config", &inner.config)
            .field("device", &inner.device)
            .finish_non_exhaustive()
    }
}

impl TunSession {
    /// Create a session using the netlink provisioner.
    pub fn new() -> Self {
        Self::with_provisioner(Arc::new(NetlinkProvisioner::new()))
    }

    /// Create a session using a custom provisioner.
    pub fn with_provisioner(provisioner: Arc<dyn Provisioner>) -> Self {
        Self {
            provisioner,
            inner: Mutex::new(Inner::default()),
            settled: Condvar::new(),
            #[cfg(feature = "async")]
            wake: tokio::sync::Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `config` and move to `Initialized`.
    ///
    /// Legal from `Uninitialized` and `Stopped`. The stored copy has its MTU
    /// clamped into range.
    pub fn init(&self, config: &TunConfig) -> Result<()> {
        let mut inner = self.lock();
        inner.precheck(Operation::Init)?;

        let config = config.normalized();
        info!(
            name = config.name(),
            ipv4 = config.ipv4_cidr(),
            ipv6 = config.ipv6_cidr().unwrap_or("none"),
            mtu = config.mtu_value(),
            persist = config.is_persistent(),
            "session initialized"
        );
        inner.config = Some(config);
        inner.warnings.clear();
        inner.state = LifecycleState::Initialized;
        Ok(())
    }

    /// Create, configure and activate the device.
    ///
    /// Legal from `Initialized` and `Stopped`. Fails with
    /// [`Error::InvalidConfig`] when no configuration is stored. On failure
    /// the state is unchanged.
    pub fn start(&self) -> Result<()> {
        let config = {
            let mut inner = self.lock();
            let Some(config) = inner.config.clone() else {
                debug!(state = %inner.state, "start without configuration");
                return Err(Error::InvalidConfig(
                    "no configuration stored, call init first".to_string(),
                ));
            };
            inner.precheck(Operation::Start)?;
            inner.busy = Some(Operation::Start);
            config
        };

        let result = provision::bring_up(&*self.provisioner, &config);

        let mut inner = self.lock();
        inner.busy = None;
        let outcome = match result {
            Ok((device, warnings)) => {
                info!(
                    name = device.name(),
                    fd = device.as_raw_fd(),
                    warnings = warnings.len(),
                    "device running"
                );
                inner.device = Some(device);
                inner.warnings = warnings;
                inner.state = LifecycleState::Running;
                Ok(())
            }
            Err(e) => {
                error!(name = config.name(), error = %e, "failed to start device");
                Err(e)
            }
        };
        drop(inner);
        self.settled.notify_all();
        outcome
    }

    /// Deactivate and close the device, keeping the configuration.
    ///
    /// Legal only from `Running`. Once past the state check it always ends
    /// in `Stopped`.
    pub fn stop(&self) -> Result<()> {
        let device = {
            let mut inner = self.lock();
            inner.precheck(Operation::Stop)?;
            let Some(device) = inner.device.clone() else {
                return Err(Error::Internal("running without a device".to_string()));
            };
            inner.busy = Some(Operation::Stop);
            device
        };

        self.link_down(device);
        self.finish_stop();
        Ok(())
    }

    /// `stop` followed by `start`.
    ///
    /// A failing `stop` is returned without attempting `start`.
    pub fn restart(&self) -> Result<()> {
        self.stop()?;
        info!("restarting device");
        self.start()
    }

    /// Tear everything down and return to `Uninitialized`.
    ///
    /// Legal from any state and idempotent. Waits for an in-flight
    /// transition to commit first.
    pub fn cleanup(&self) -> Result<()> {
        let mut inner = self.lock();
        while inner.busy.is_some() {
            inner = self
                .settled
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }

        if inner.state == LifecycleState::Running
            && let Some(device) = inner.device.clone()
        {
            inner.busy = Some(Operation::Cleanup);
            drop(inner);
            self.link_down(device);
            inner = self.lock();
        }

        let previous = inner.state;
        let released = inner.device.take();
        inner.config = None;
        inner.warnings.clear();
        inner.busy = None;
        inner.state = LifecycleState::Uninitialized;
        drop(inner);

        self.settle(released);
        if previous != LifecycleState::Uninitialized {
            info!(from = %previous, "session cleaned up");
        }
        Ok(())
    }

    /// Deactivate the link of a device being stopped. Never fails.
    fn link_down(&self, device: Arc<TunDevice>) {
        for warning in provision::bring_down(&*self.provisioner, &device) {
            warn!(name = device.name(), %warning, "link down failed");
        }
    }

    /// Commit the stop sequence: the device leaves the session, then is
    /// released outside the lock.
    fn finish_stop(&self) {
        let mut inner = self.lock();
        let released = inner.device.take();
        inner.state = LifecycleState::Stopped;
        inner.busy = None;
        drop(inner);

        if let Some(device) = &released {
            info!(name = device.name(), "device stopped");
        }
        self.settle(released);
    }

    /// Release a removed device and wake everything waiting on a transition.
    fn settle(&self, released: Option<Arc<TunDevice>>) {
        if let Some(device) = released {
            self.provisioner.release(device);
        }
        self.wake_waiters();
        self.settled.notify_all();
    }

    fn wake_waiters(&self) {
        #[cfg(feature = "async")]
        self.wake.notify_waiters();
    }

    /// Snapshot the device for one I/O call.
    fn active_device(&self, operation: Operation) -> Result<Arc<TunDevice>> {
        let inner = self.lock();
        match (&inner.device, inner.state.permits(operation)) {
            (Some(device), true) => Ok(Arc::clone(device)),
            _ => {
                debug!(%operation, state = %inner.state, "I/O while not running");
                Err(Error::NotRunning { state: inner.state })
            }
        }
    }

    /// Read one packet without blocking.
    ///
    /// Returns [`Error::WouldBlock`] when no packet is queued.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let device = self.active_device(Operation::Read)?;
        io::read_packet(&device, buf)
    }

    /// Write one packet without blocking.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let device = self.active_device(Operation::Write)?;
        io::write_packet(&device, buf)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.lock().state
    }

    /// Copy of the stored configuration.
    pub fn config(&self) -> Option<TunConfig> {
        self.lock().config.clone()
    }

    /// Configured interface name.
    pub fn name(&self) -> Option<String> {
        self.lock().config.as_ref().map(|c| c.name().to_string())
    }

    /// Configured MTU (after clamping).
    pub fn mtu(&self) -> Option<u32> {
        self.lock().config.as_ref().map(TunConfig::mtu_value)
    }

    /// Configured IPv4 address in CIDR notation.
    pub fn ipv4(&self) -> Option<String> {
        self.lock()
            .config
            .as_ref()
            .map(|c| c.ipv4_cidr().to_string())
    }

    /// Configured IPv6 address in CIDR notation, if any.
    pub fn ipv6(&self) -> Option<String> {
        self.lock()
            .config
            .as_ref()
            .and_then(|c| c.ipv6_cidr().map(str::to_string))
    }

    /// Descriptor of the running device, for readiness polling.
    ///
    /// The descriptor stays owned by the session; do not close it.
    pub fn raw_fd(&self) -> Option<RawFd> {
        let inner = self.lock();
        match inner.state {
            LifecycleState::Running => inner.device.as_ref().map(|d| d.as_raw_fd()),
            _ => None,
        }
    }

    /// Best-effort steps that failed during the last successful `start`.
    pub fn warnings(&self) -> Vec<StepWarning> {
        self.lock().warnings.clone()
    }
}

#[cfg(feature = "async")]
impl TunSession {
    /// Receive one packet, waiting for the device to become readable.
    ///
    /// Returns [`Error::NotRunning`] if the session stops while waiting.
    pub async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        loop {
            let notified = self.wake.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let device = self.active_device(Operation::Read)?;
            match io::read_packet(&device, buf) {
                Err(Error::WouldBlock) => {}
                other => return other,
            }
            self.wait_ready(device, tokio::io::Interest::READABLE, notified)
                .await?;
        }
    }

    /// Send one packet, waiting for the device to become writable.
    pub async fn send(&self, buf: &[u8]) -> Result<usize> {
        loop {
            let notified = self.wake.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let device = self.active_device(Operation::Write)?;
            match io::write_packet(&device, buf) {
                Err(Error::WouldBlock) => {}
                other => return other,
            }
            self.wait_ready(device, tokio::io::Interest::WRITABLE, notified)
                .await?;
        }
    }

    /// Wait until `device` is ready for `interest` or the session stops.
    async fn wait_ready(
        &self,
        device: Arc<TunDevice>,
        interest: tokio::io::Interest,
        notified: std::pin::Pin<&mut tokio::sync::futures::Notified<'_>>,
    ) -> Result<()> {
        use tokio::io::unix::AsyncFd;

        // Register a duplicate so the session's own descriptor is never
        // handed to the reactor.
        let fd = AsyncFd::with_interest(device.try_clone_fd()?, interest)?;
        drop(device);

        tokio::select! {
            _ = notified => {}
            ready = fd.ready(interest) => {
                ready?.clear_ready();
            }
        }
        Ok(())
    }
}

impl Drop for TunSession {
    fn drop(&mut self) {
        let running = self.lock().state == LifecycleState::Running;
        if running {
            debug!("session dropped while running");
            let _ = self.cleanup();
        }
    }
}
