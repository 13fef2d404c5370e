//! Address types shared by the guest-announcer crates.
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`IpCidr`]: an address together with its prefix length (CIDR notation)
//! - [`IpFamily`]: the closed set of address families a primitive can carry

mod ip;
mod mac;

pub use ip::{IpCidr, IpFamily};
pub use mac::MacAddress;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid CIDR format: {0}")]
    InvalidCidr(String),

    #[error("unknown address family: {0}")]
    UnknownFamily(String),
}
