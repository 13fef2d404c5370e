//! EUI-64 link-local address derivation
//!
//! The host reaches IPv6 guest addresses through the link-local address the
//! guest derives from its own MAC, so the same expansion is computed here.

use crate::error::{AnnounceError, Result};
use announcer_types::MacAddress;
use std::net::Ipv6Addr;

/// `fe80::/64`, the upper half of every derived address
const LINK_LOCAL_PREFIX: [u8; 8] = [0xfe, 0x80, 0, 0, 0, 0, 0, 0];

/// Derive the `fe80::/64` link-local address for `mac`.
///
/// The interface identifier flips the universal/local bit of the first
/// octet and inserts `ff:fe` between the third and fourth octets.
pub fn derive(mac: &MacAddress) -> Ipv6Addr {
    let m = mac.as_bytes();
    let mut octets = [0u8; 16];
    octets[..8].copy_from_slice(&LINK_LOCAL_PREFIX);
    octets[8..].copy_from_slice(&[
        m[0] ^ MacAddress::LOCAL_BIT,
        m[1],
        m[2],
        0xff,
        0xfe,
        m[3],
        m[4],
        m[5],
    ]);
    Ipv6Addr::from(octets)
}

/// Parse `mac` and derive its link-local address
pub fn derive_str(mac: &str) -> Result<Ipv6Addr> {
    let mac: MacAddress = mac.parse().map_err(AnnounceError::InvalidMac)?;
    Ok(derive(&mac))
}
