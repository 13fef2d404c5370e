//! MAC address type with strict parsing and formatting.

use crate::ParseError;
use std::fmt;
use std::str::FromStr;

/// A 48-bit (EUI-48) Ethernet MAC address.
///
/// # Examples
///
/// ```
/// use announcer_types::MacAddress;
///
/// let mac: MacAddress = "52:54:00:aa:bb:cc".parse().unwrap();
/// assert_eq!(mac.to_string(), "52:54:00:aa:bb:cc");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Bit of the first octet that marks a locally administered address.
    pub const LOCAL_BIT: u8 = 0x02;

    /// Returns the raw bytes of the MAC address.
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = ParseError;

    /// Accepts colon or hyphen separated groups of exactly two hex digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let separator = if s.contains(':') { ':' } else { '-' };

        let parts: Vec<&str> = s.split(separator).collect();
        if parts.len() != 6 {
            return Err(ParseError::InvalidMacAddress(s.to_string()));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ParseError::InvalidMacAddress(s.to_string()));
            }
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| ParseError::InvalidMacAddress(s.to_string()))?;
        }

        Ok(MacAddress(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_colon_format() {
        let mac: MacAddress = "52:54:00:aa:bb:cc".parse().unwrap();
        assert_eq!(mac.as_bytes(), &[0x52, 0x54, 0x00, 0xaa, 0xbb, 0xcc]);
    }

    #[test]
    fn test_parse_hyphen_and_uppercase() {
        let mac: MacAddress = "52-54-00-AA-BB-CC".parse().unwrap();
        assert_eq!(mac.to_string(), "52:54:00:aa:bb:cc");
    }

    #[test]
    fn test_local_bit() {
        let qemu: MacAddress = "52:54:00:00:00:01".parse().unwrap();
        assert_ne!(qemu.as_bytes()[0] & MacAddress::LOCAL_BIT, 0);

        let vendor: MacAddress = "00:11:22:33:44:55".parse().unwrap();
        assert_eq!(vendor.as_bytes()[0] & MacAddress::LOCAL_BIT, 0);
    }

    #[test]
    fn test_invalid_format() {
        assert!("invalid".parse::<MacAddress>().is_err());
        assert!("".parse::<MacAddress>().is_err());
        assert!("52:54:00:aa:bb".parse::<MacAddress>().is_err());
        assert!("52:54:00:aa:bb:cc:dd".parse::<MacAddress>().is_err());
        assert!("gg:54:00:aa:bb:cc".parse::<MacAddress>().is_err());
        assert!("5:54:00:aa:bb:cc".parse::<MacAddress>().is_err());
        assert!("+5:54:00:aa:bb:cc".parse::<MacAddress>().is_err());
    }
}
