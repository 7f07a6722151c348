//! Packet I/O against an opened device.
//!
//! One call moves one packet. `EINTR` is retried; `EAGAIN` surfaces as
//! [`Error::WouldBlock`] so hosts can poll the descriptor and try again.

use std::io;

use crate::device::TunDevice;
use crate::error::{Error, Result};

/// Read one packet into `buf`.
pub fn read_packet(device: &TunDevice, buf: &mut [u8]) -> Result<usize> {
    if buf.is_empty() {
        return Err(Error::InvalidArgument("read buffer is empty".to_string()));
    }
    retry(|| device.read_raw(buf))
}

/// Write one packet from `buf`.
pub fn write_packet(device: &TunDevice, buf: &[u8]) -> Result<usize> {
    if buf.is_empty() {
        return Err(Error::InvalidArgument("write buffer is empty".to_string()));
    }
    retry(|| device.write_raw(buf))
}

fn retry(mut op: impl FnMut() -> io::Result<usize>) -> Result<usize> {
    loop {
        match op() {
            Ok(n) => return Ok(n),
            Err(e) => match classify(e) {
                Some(err) => return Err(err),
                None => continue,
            },
        }
    }
}

/// Map an I/O failure onto the error taxonomy. `None` means retry.
fn classify(e: io::Error) -> Option<Error> {
    match e.kind() {
        io::ErrorKind::Interrupted => None,
        io::ErrorKind::WouldBlock => Some(Error::WouldBlock),
        _ => Some(Error::Io(e)),
    }
}
