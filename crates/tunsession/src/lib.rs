//! Lifecycle manager for a single Linux TUN device.
//!
//! This crate owns the OS resources of one virtual point-to-point interface:
//! it opens `/dev/net/tun`, binds it to a name, applies MTU and addresses over
//! rtnetlink, brings the link up and down, moves packets, and tears it all
//! down again. Every operation goes through one state machine, so callers
//! from several threads never race on the descriptor.
//!
//! # Features
//!
//! - `async` - `recv`/`send` awaiting descriptor readiness (tokio)
//! - `serde` - Serialize/Deserialize for configuration and state
//! - `full` - All features enabled
//!
//! # Example
//!
//! ```ignore
//! use tunsession::{LifecycleState, TunConfig, TunSession};
//!
//! let config = TunConfig::load("/etc/tunsession.ini")?;
//! let session = TunSession::new();
//!
//! session.init(&config)?;
//! session.start()?;
//! assert_eq!(session.state(), LifecycleState::Running);
//!
//! for warning in session.warnings() {
//!     eprintln!("degraded: {}", warning);
//! }
//!
//! session.stop()?;
//! session.cleanup()?;
//! ```
//!
//! # Custom provisioning
//!
//! The OS side is behind the [`Provisioner`] trait; the default is
//! [`NetlinkProvisioner`]. Substitute another with
//! [`TunSession::with_provisioner`].

pub mod config;
pub mod device;
pub mod error;
pub mod io;
pub mod netlink;
pub mod provision;
pub mod session;
pub mod state;
pub mod util;

pub use config::TunConfig;
pub use device::TunDevice;
pub use error::{Error, ErrorKind, Result};
pub use provision::{NetlinkProvisioner, Provisioner, StepKind, StepWarning};
pub use session::TunSession;
pub use state::{LifecycleState, Operation};
