//! Address family and CIDR types with safe parsing.

use crate::ParseError;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Address family of a routing object.
///
/// Parses from the configuration tokens `ipv4` and `ipv6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    /// Returns the family of an address.
    pub const fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => IpFamily::V4,
            IpAddr::V6(_) => IpFamily::V6,
        }
    }

    /// Maximum prefix length for this family.
    pub const fn max_prefix_len(&self) -> u8 {
        match self {
            IpFamily::V4 => 32,
            IpFamily::V6 => 128,
        }
    }

    /// The configuration token for this family.
    pub const fn as_str(&self) -> &'static str {
        match self {
            IpFamily::V4 => "ipv4",
            IpFamily::V6 => "ipv6",
        }
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IpFamily {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ipv4" => Ok(IpFamily::V4),
            "ipv6" => Ok(IpFamily::V6),
            other => Err(ParseError::UnknownFamily(other.to_string())),
        }
    }
}

/// An address with a prefix length, e.g. `10.0.0.5/24` or `2001:db8::/64`.
///
/// The address is kept as written. [`IpCidr::network`] yields the masked
/// form used for rule and route selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpCidr {
    address: IpAddr,
    prefix_len: u8,
}

impl IpCidr {
    /// Creates a new CIDR.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix length exceeds the maximum for the
    /// address family (32 for IPv4, 128 for IPv6).
    pub fn new(address: IpAddr, prefix_len: u8) -> Result<Self, ParseError> {
        let max_len = IpFamily::of(&address).max_prefix_len();
        if prefix_len > max_len {
            return Err(ParseError::InvalidCidr(format!(
                "prefix length {} exceeds maximum {} for {}",
                prefix_len, max_len, address
            )));
        }

        Ok(IpCidr {
            address,
            prefix_len,
        })
    }

    /// Returns the address as written.
    pub const fn address(&self) -> IpAddr {
        self.address
    }

    /// Returns the prefix length in bits.
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Returns the address family.
    pub const fn family(&self) -> IpFamily {
        IpFamily::of(&self.address)
    }

    /// Returns the network this CIDR belongs to, host bits cleared.
    pub fn network(&self) -> IpCidr {
        let address = match self.address {
            IpAddr::V4(v4) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(self.prefix_len)).unwrap_or(0);
                IpAddr::V4(Ipv4Addr::from(u32::from(v4) & mask))
            }
            IpAddr::V6(v6) => {
                let mask = u128::MAX
                    .checked_shl(128 - u32::from(self.prefix_len))
                    .unwrap_or(0);
                IpAddr::V6(Ipv6Addr::from(u128::from(v6) & mask))
            }
        };
        IpCidr {
            address,
            prefix_len: self.prefix_len,
        }
    }
}

impl fmt::Display for IpCidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for IpCidr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, len_str) = s
            .rsplit_once('/')
            .ok_or_else(|| ParseError::InvalidCidr(s.to_string()))?;

        let address: IpAddr = addr_str
            .parse()
            .map_err(|_| ParseError::InvalidIpAddress(addr_str.to_string()))?;
        if len_str.is_empty() || !len_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::InvalidCidr(s.to_string()));
        }
        let prefix_len: u8 = len_str
            .parse()
            .map_err(|_| ParseError::InvalidCidr(s.to_string()))?;

        IpCidr::new(address, prefix_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_family_tokens() {
        assert_eq!("ipv4".parse::<IpFamily>().unwrap(), IpFamily::V4);
        assert_eq!("ipv6".parse::<IpFamily>().unwrap(), IpFamily::V6);
        assert_eq!(
            "inet".parse::<IpFamily>(),
            Err(ParseError::UnknownFamily("inet".to_string()))
        );
        assert_eq!(IpFamily::V6.to_string(), "ipv6");
    }

    #[test]
    fn test_cidr_parse() {
        let v4: IpCidr = "10.0.0.5/32".parse().unwrap();
        assert_eq!(v4.family(), IpFamily::V4);
        assert_eq!(v4.prefix_len(), 32);

        let v6: IpCidr = "2001:db8::/64".parse().unwrap();
        assert_eq!(v6.family(), IpFamily::V6);
        assert_eq!(v6.prefix_len(), 64);
    }

    #[test]
    fn test_network_masks_host_bits() {
        let cidr: IpCidr = "10.0.0.5/24".parse().unwrap();
        assert_eq!(cidr.network().to_string(), "10.0.0.0/24");
        assert_eq!(cidr.address().to_string(), "10.0.0.5");

        let v6: IpCidr = "2001:db8::1234/64".parse().unwrap();
        assert_eq!(v6.network().to_string(), "2001:db8::/64");
    }

    #[test]
    fn test_network_edge_lengths() {
        let host: IpCidr = "10.0.0.5/32".parse().unwrap();
        assert_eq!(host.network(), host);

        let all: IpCidr = "10.0.0.5/0".parse().unwrap();
        assert_eq!(all.network().to_string(), "0.0.0.0/0");

        let all_v6: IpCidr = "2001:db8::1/0".parse().unwrap();
        assert_eq!(all_v6.network().to_string(), "::/0");
    }

    #[test]
    fn test_invalid_cidr() {
        assert!("10.0.0.5".parse::<IpCidr>().is_err());
        assert!("10.0.0.5/33".parse::<IpCidr>().is_err());
        assert!("10.0.0.5/".parse::<IpCidr>().is_err());
        assert!("10.0.0.5/+8".parse::<IpCidr>().is_err());
        assert!("2001:db8::/129".parse::<IpCidr>().is_err());
        assert!("not-an-ip/24".parse::<IpCidr>().is_err());
    }
}
