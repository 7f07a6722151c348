//! Request/ACK handling and the link/address requests the provisioner needs.

use std::net::IpAddr;

use super::builder::MessageBuilder;
use super::message::{
    MessageIter, NLM_F_ACK, NLM_F_CREATE, NLM_F_REPLACE, NLM_F_REQUEST, NlMsgError, NlMsgType,
};
use super::socket::NetlinkSocket;
use super::types::{IfAddrMsg, IfInfoMsg, ifa, ifla, iff};
use crate::error::{Error, Result};

/// Routing netlink connection.
pub struct Connection {
    socket: NetlinkSocket,
}

impl Connection {
    /// Open a new routing connection.
    pub fn new() -> Result<Self> {
        Ok(Self {
            socket: NetlinkSocket::new()?,
        })
    }

    /// Send a request that expects an ACK only (no data response).
    ///
    /// `operation` names the request in the returned kernel error.
    pub fn request_ack(&self, mut builder: MessageBuilder, operation: &str) -> Result<()> {
        let seq = self.socket.next_seq();
        builder.set_seq(seq);
        builder.set_pid(self.socket.pid());

        let msg = builder.finish();
        self.socket.send(&msg)?;

        // Stray replies for other sequence numbers are skipped
        loop {
            let response = self.socket.recv_msg()?;
            if let Some(result) = process_ack(&response, seq, operation)? {
                return result;
            }
        }
    }

    /// Bring a link up or down by index.
    pub fn set_link_state(&self, ifindex: u32, up: bool) -> Result<()> {
        let mut ifinfo = IfInfoMsg::new().with_index(ifindex as i32);
        ifinfo.ifi_flags = if up { iff::UP } else { 0 };
        ifinfo.ifi_change = iff::UP;

        let mut builder = ack_request(NlMsgType::RTM_SETLINK);
        builder.append(&ifinfo);

        let state = if up { "up" } else { "down" };
        self.request_ack(builder, &format!("setting link {} on ifindex {}", state, ifindex))
    }

    /// Set the MTU of a link by index.
    pub fn set_link_mtu(&self, ifindex: u32, mtu: u32) -> Result<()> {
        let ifinfo = IfInfoMsg::new().with_index(ifindex as i32);

        let mut builder = ack_request(NlMsgType::RTM_SETLINK);
        builder.append(&ifinfo);
        builder.append_attr_u32(ifla::MTU, mtu);

        self.request_ack(builder, &format!("setting mtu {} on ifindex {}", mtu, ifindex))
    }

    /// Add (or replace) an address on a link by index.
    pub fn add_address(&self, ifindex: u32, address: IpAddr, prefix_len: u8) -> Result<()> {
        let (family, octets) = match address {
            IpAddr::V4(v4) => (libc::AF_INET as u8, v4.octets().to_vec()),
            IpAddr::V6(v6) => (libc::AF_INET6 as u8, v6.octets().to_vec()),
        };

        let ifaddr = IfAddrMsg::new()
            .with_family(family)
            .with_prefixlen(prefix_len)
            .with_index(ifindex);

        let mut builder = MessageBuilder::new(
            NlMsgType::RTM_NEWADDR,
            NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_REPLACE,
        );
        builder.append(&ifaddr);
        builder.append_attr(ifa::LOCAL, &octets);
        builder.append_attr(ifa::ADDRESS, &octets);

        self.request_ack(
            builder,
            &format!("adding {}/{} on ifindex {}", address, prefix_len, ifindex),
        )
    }
}

/// Helper to build a request expecting ACK.
pub fn ack_request(msg_type: u16) -> MessageBuilder {
    MessageBuilder::new(msg_type, NLM_F_REQUEST | NLM_F_ACK)
}

/// Look for the ACK matching `seq` in one received datagram.
///
/// Returns `Ok(None)` when the datagram holds no reply for `seq`.
fn process_ack(data: &[u8], seq: u32, operation: &str) -> Result<Option<Result<()>>> {
    for result in MessageIter::new(data) {
        let (header, payload) = result?;

        if header.nlmsg_seq != seq || !header.is_error() {
            continue;
        }

        let err = NlMsgError::from_bytes(payload)?;
        if err.is_ack() {
            return Ok(Some(Ok(())));
        }

        let mut error = Error::from_errno_with_context(err.error, operation);
        if let (Error::Kernel { message, .. }, Some(ext)) = (
            &mut error,
            err.ext_ack_message(header.nlmsg_flags, payload),
        ) {
            message.push_str(": ");
            message.push_str(ext);
        }
        return Ok(Some(Err(error)));
    }

    Ok(None)
}
