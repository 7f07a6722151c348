//! Interface provisioning.
//!
//! A [`Provisioner`] performs the individual OS operations; [`bring_up`]
//! runs them as an ordered plan:
//!
//! | Step      | Kind        | When                     |
//! |-----------|-------------|--------------------------|
//! | `open`    | required    | always                   |
//! | `persist` | best effort | `persist` requested      |
//! | `mtu`     | best effort | always                   |
//! | `ipv4`    | best effort | always                   |
//! | `ipv6`    | best effort | an IPv6 address is set   |
//! | `link-up` | best effort | always                   |
//!
//! A failed required step aborts the plan. A failed best-effort step is
//! logged and returned as a [`StepWarning`].

mod netlink;

pub use netlink::NetlinkProvisioner;

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::TunConfig;
use crate::device::TunDevice;
use crate::error::{Error, ErrorKind, Result};
use crate::util::addr::parse_prefix;

/// OS operations needed to bring a tunnel device up and down.
///
/// Implementations must be shareable across threads; the session calls
/// them with its lock released.
pub trait Provisioner: Send + Sync {
    /// Open the device node and bind it to `config.name`.
    fn open(&self, config: &TunConfig) -> Result<TunDevice>;

    /// Mark the device persistent (or not).
    fn set_persistent(&self, device: &TunDevice, on: bool) -> Result<()>;

    /// Set the link MTU.
    fn set_mtu(&self, device: &TunDevice, mtu: u32) -> Result<()>;

    /// Assign an address with the given prefix length.
    fn add_address(&self, device: &TunDevice, addr: IpAddr, prefix: u8) -> Result<()>;

    /// Bring the link administratively up.
    fn set_link_up(&self, device: &TunDevice) -> Result<()>;

    /// Bring the link administratively down.
    fn set_link_down(&self, device: &TunDevice) -> Result<()>;

    /// Give up the session's reference to the device.
    ///
    /// The descriptor closes once the last in-flight I/O drops its
    /// reference.
    fn release(&self, device: Arc<TunDevice>) {
        debug!(name = device.name(), "releasing device");
        drop(device);
    }
}

/// Whether a failing step aborts the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Failure aborts the plan and is returned to the caller.
    Required,
    /// Failure is logged and recorded as a warning.
    BestEffort,
}

/// One named action of a provisioning plan.
pub struct Step<'a, T: ?Sized> {
    name: &'static str,
    kind: StepKind,
    action: Box<dyn FnOnce(&T) -> Result<()> + 'a>,
}

impl<'a, T: ?Sized> Step<'a, T> {
    /// A step whose failure aborts the plan.
    pub fn required(name: &'static str, action: impl FnOnce(&T) -> Result<()> + 'a) -> Self {
        Self {
            name,
            kind: StepKind::Required,
            action: Box::new(action),
        }
    }

    /// A step whose failure only produces a warning.
    pub fn best_effort(name: &'static str, action: impl FnOnce(&T) -> Result<()> + 'a) -> Self {
        Self {
            name,
            kind: StepKind::BestEffort,
            action: Box::new(action),
        }
    }

    /// Step name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Step kind.
    pub fn kind(&self) -> StepKind {
        self.kind
    }
}

impl<T: ?Sized> fmt::Debug for Step<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// A best-effort step that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StepWarning {
    /// Name of the failed step.
    pub step: &'static str,
    /// Classification of the failure.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub kind: ErrorKind,
    /// Failure message.
    pub error: String,
}

impl fmt::Display for StepWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step, self.error)
    }
}

/// Run `steps` in order against `target`.
///
/// Stops at the first failing required step and returns its error.
/// Otherwise returns the warnings of every failed best-effort step.
pub fn run_steps<T: ?Sized>(target: &T, steps: Vec<Step<'_, T>>) -> Result<Vec<StepWarning>> {
    let mut warnings = Vec::new();

    for step in steps {
        let Step { name, kind, action } = step;
        debug!(step = name, "running provisioning step");

        match (action(target), kind) {
            (Ok(()), _) => {}
            (Err(e), StepKind::Required) => {
                tracing::error!(step = name, error = %e, "required provisioning step failed");
                return Err(e);
            }
            (Err(e), StepKind::BestEffort) => {
                warn!(step = name, error = %e, "provisioning step failed, continuing");
                warnings.push(StepWarning {
                    step: name,
                    kind: e.kind(),
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(warnings)
}

/// Parse a CIDR string for the `family` field ("ipv4" or "ipv6").
fn parse_cidr(cidr: &str, family: &'static str) -> Result<(IpAddr, u8)> {
    let (addr, prefix) =
        parse_prefix(cidr).map_err(|e| Error::InvalidConfig(format!("{}: {}", family, e)))?;
    let matches = match family {
        "ipv6" => addr.is_ipv6(),
        _ => addr.is_ipv4(),
    };
    if !matches {
        return Err(Error::InvalidConfig(format!(
            "{}: {} is not an {} address",
            family, addr, family
        )));
    }
    Ok((addr, prefix))
}

/// Steps that configure an opened device.
fn configure_steps<'a>(
    provisioner: &'a dyn Provisioner,
    config: &'a TunConfig,
) -> Vec<Step<'a, TunDevice>> {
    let mut steps = Vec::with_capacity(5);

    if config.is_persistent() {
        steps.push(Step::best_effort("persist", move |dev: &TunDevice| {
            provisioner.set_persistent(dev, true)
        }));
    }

    steps.push(Step::best_effort("mtu", move |dev: &TunDevice| {
        provisioner.set_mtu(dev, config.mtu_value())
    }));

    steps.push(Step::best_effort("ipv4", move |dev: &TunDevice| {
        let (addr, prefix) = parse_cidr(config.ipv4_cidr(), "ipv4")?;
        provisioner.add_address(dev, addr, prefix)
    }));

    if let Some(ipv6) = config.ipv6_cidr() {
        steps.push(Step::best_effort("ipv6", move |dev: &TunDevice| {
            let (addr, prefix) = parse_cidr(ipv6, "ipv6")?;
            provisioner.add_address(dev, addr, prefix)
        }));
    }

    steps.push(Step::best_effort("link-up", move |dev: &TunDevice| {
        provisioner.set_link_up(dev)
    }));

    steps
}

/// Run the full provisioning plan for `config`.
///
/// On success returns the opened device and the warnings of failed
/// best-effort steps. A required failure after the device was opened
/// releases it before returning.
pub fn bring_up(
    provisioner: &dyn Provisioner,
    config: &TunConfig,
) -> Result<(Arc<TunDevice>, Vec<StepWarning>)> {
    let device = Arc::new(run_open(provisioner, config)?);

    match run_steps(&*device, configure_steps(provisioner, config)) {
        Ok(warnings) => Ok((device, warnings)),
        Err(e) => {
            provisioner.release(device);
            Err(e)
        }
    }
}

fn run_open(provisioner: &dyn Provisioner, config: &TunConfig) -> Result<TunDevice> {
    let mut opened = None;
    run_steps(
        config,
        vec![Step::required("open", |config: &TunConfig| {
            opened = Some(provisioner.open(config)?);
            Ok(())
        })],
    )?;
    opened.ok_or_else(|| Error::Internal("open step produced no device".to_string()))
}

/// Deactivate the link. Failure is only a warning.
pub fn bring_down(provisioner: &dyn Provisioner, device: &TunDevice) -> Vec<StepWarning> {
    let steps = vec![Step::best_effort("link-down", |dev: &TunDevice| {
        provisioner.set_link_down(dev)
    })];
    run_steps(device, steps).unwrap_or_default()
}
