//! Validated domain network configuration.
//!
//! A [`DomainConfig`] is produced once per invocation by
//! [`crate::config::DomainDocument::validate`] and is never mutated.

use announcer_types::{IpCidr, IpFamily, MacAddress};
use std::fmt;
use std::net::IpAddr;

/// Address family as declared in the configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredFamily {
    Known(IpFamily),
    Unknown(String),
}

impl DeclaredFamily {
    pub fn parse(token: &str) -> Self {
        match token.parse::<IpFamily>() {
            Ok(family) => DeclaredFamily::Known(family),
            Err(_) => DeclaredFamily::Unknown(token.to_string()),
        }
    }

    /// Resolves the family every primitive of an entry carries.
    ///
    /// The parsed CIDR decides; the declaration only produces a warning
    /// when it is unknown or disagrees.
    pub fn resolve(&self, cidr: &IpCidr) -> (IpFamily, Option<ConfigWarning>) {
        let actual = cidr.family();
        let warning = match self {
            DeclaredFamily::Known(declared) if *declared == actual => None,
            DeclaredFamily::Known(declared) => Some(ConfigWarning::FamilyMismatch {
                cidr: *cidr,
                declared: *declared,
            }),
            DeclaredFamily::Unknown(token) => Some(ConfigWarning::UnknownFamily {
                cidr: *cidr,
                token: token.clone(),
            }),
        };
        (actual, warning)
    }
}

impl fmt::Display for DeclaredFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclaredFamily::Known(family) => family.fmt(f),
            DeclaredFamily::Unknown(token) => write!(f, "{:?}", token),
        }
    }
}

/// A single guest-owned address announced on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressEntry {
    pub family: DeclaredFamily,
    pub cidr: IpCidr,
}

/// A guest-reachable subnet routed through the domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetEntry {
    pub family: DeclaredFamily,
    pub cidr: IpCidr,
    pub next_hop: Option<IpAddr>,
}

/// Network configuration of one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainConfig {
    pub domain_id: u64,
    pub interface: String,
    pub mac_address: MacAddress,
    /// `None` selects the kernel main table.
    pub table: Option<u32>,
    /// Preference of every policy rule installed for the domain.
    pub rule_priority: u32,
    pub addresses: Vec<AddressEntry>,
    pub subnets: Vec<SubnetEntry>,
}

impl DomainConfig {
    /// Number of configured entries (addresses plus subnets).
    pub fn entry_count(&self) -> usize {
        self.addresses.len() + self.subnets.len()
    }
}

/// Recoverable configuration problem found while building primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// Declared family is neither `ipv4` nor `ipv6`.
    UnknownFamily { cidr: IpCidr, token: String },
    /// Declared family does not match the address.
    FamilyMismatch { cidr: IpCidr, declared: IpFamily },
    /// IPv4 subnet routed on-link without a next hop.
    MissingNextHop { cidr: IpCidr },
    /// Next hop belongs to the other address family and was ignored.
    NextHopFamilyMismatch { cidr: IpCidr, next_hop: IpAddr },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::UnknownFamily { cidr, token } => write!(
                f,
                "no family defined for {} (got {:?}), using {}",
                cidr,
                token,
                cidr.family()
            ),
            ConfigWarning::FamilyMismatch { cidr, declared } => write!(
                f,
                "{} declared as {} but is {}, using {}",
                cidr,
                declared,
                cidr.family(),
                cidr.family()
            ),
            ConfigWarning::MissingNextHop { cidr } => {
                write!(f, "no next hop configured for {}", cidr)
            }
            ConfigWarning::NextHopFamilyMismatch { cidr, next_hop } => {
                write!(f, "next hop {} does not match family of {}", next_hop, cidr)
            }
        }
    }
}
