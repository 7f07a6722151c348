//! Blocking rtnetlink socket.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};

use bytes::BytesMut;
use netlink_sys::{Socket, SocketAddr, protocols};

use crate::error::{Error, Result};

/// Receive buffer size; large enough for any ACK with extended TLVs.
const RECV_BUF_SIZE: usize = 32768;

/// Blocking NETLINK_ROUTE socket.
pub struct NetlinkSocket {
    socket: Socket,
    /// Sequence number counter.
    seq: AtomicU32,
    /// Local port ID (assigned by kernel).
    pid: u32,
}

impl NetlinkSocket {
    /// Open and bind a new routing socket.
    pub fn new() -> Result<Self> {
        let mut socket = Socket::new(protocols::NETLINK_ROUTE).map_err(sys("socket(NETLINK_ROUTE)"))?;

        // Bind to get a port ID
        let mut addr = SocketAddr::new(0, 0);
        socket.bind(&addr).map_err(sys("bind(NETLINK_ROUTE)"))?;
        socket
            .get_address(&mut addr)
            .map_err(sys("getsockname(NETLINK_ROUTE)"))?;
        let pid = addr.port_number();

        // Extended ACK gives readable kernel messages; older kernels lack it
        socket.set_ext_ack(true).ok();

        Ok(Self {
            socket,
            seq: AtomicU32::new(1),
            pid,
        })
    }

    /// Get the next sequence number.
    pub fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Get the local port ID.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Send a message.
    pub fn send(&self, msg: &[u8]) -> Result<()> {
        loop {
            match self.socket.send(msg, 0) {
                Ok(_) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(sys("sendto(NETLINK_ROUTE)")(e)),
            }
        }
    }

    /// Receive one datagram, allocating a buffer.
    pub fn recv_msg(&self) -> Result<Vec<u8>> {
        loop {
            let mut buf = BytesMut::with_capacity(RECV_BUF_SIZE);
            match self.socket.recv(&mut buf, 0) {
                // buf has been advanced by recv, so buf[..] contains the data
                Ok(_) => return Ok(buf.to_vec()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(sys("recvfrom(NETLINK_ROUTE)")(e)),
            }
        }
    }
}

fn sys(operation: &'static str) -> impl Fn(io::Error) -> Error {
    move |source| Error::Sys {
        operation: operation.to_string(),
        source,
    }
}
