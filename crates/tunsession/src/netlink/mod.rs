//! Minimal blocking rtnetlink client.
//!
//! Only what provisioning a tunnel device needs: `RTM_SETLINK` for MTU and
//! administrative state, and `RTM_NEWADDR` for addresses, each sent as a
//! request that waits for the kernel ACK.
//!
//! ```ignore
//! use tunsession::netlink::Connection;
//!
//! let conn = Connection::new()?;
//! conn.set_link_mtu(ifindex, 1400)?;
//! conn.add_address(ifindex, "10.8.0.1".parse()?, 24)?;
//! conn.set_link_state(ifindex, true)?;
//! ```

pub mod attr;
mod builder;
mod connection;
pub mod message;
mod socket;
pub mod types;

pub use attr::{AttrIter, NlAttr};
pub use builder::MessageBuilder;
pub use connection::{Connection, ack_request};
pub use message::{MessageIter, NLMSG_HDRLEN, NlMsgHdr, NlMsgType};
pub use socket::NetlinkSocket;
