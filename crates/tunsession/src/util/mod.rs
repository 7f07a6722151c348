//! Shared utilities for address and interface-name handling.

pub mod addr;
pub mod ifname;

pub use addr::{AddrError, parse_addr, parse_prefix};
pub use ifname::{IFNAMSIZ, IfError, name_to_index, validate};
