//! Domain configuration documents
//!
//! Loads the per-domain JSON document written by the provisioning system and
//! validates it into a [`DomainConfig`].
//! Default location: /var/lib/infra/network/<domain>.json

use crate::error::{AnnounceError, Result};
use crate::model::{AddressEntry, DeclaredFamily, DomainConfig, SubnetEntry};
use announcer_types::{IpCidr, MacAddress};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory holding one `<domain>.json` document per domain
pub const DEFAULT_CONFIG_DIR: &str = "/var/lib/infra/network";

/// Rule preference used when the document names none.
///
/// Rules need an explicit preference for the kernel to recognise a
/// repeated add as a duplicate.
pub const DEFAULT_RULE_PRIORITY: u32 = 1000;

/// One entry of `ip_addresses`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressDocument {
    pub family: String,
    pub address: String,
}

/// One entry of `ip_networks`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkDocument {
    pub family: String,
    pub network: String,
    #[serde(default)]
    pub next_hop: Option<String>,
}

/// Configuration document as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainDocument {
    pub domain_id: u64,

    #[serde(default)]
    pub ip_addresses: Vec<AddressDocument>,

    #[serde(default)]
    pub ip_networks: Vec<NetworkDocument>,

    pub mac_address: String,

    pub interface: String,

    /// Routing table id, 0 selects the kernel main table
    #[serde(default)]
    pub table: u32,

    /// Policy rule preference, 0 or absent selects the default
    #[serde(default)]
    pub rule_priority: u32,
}

/// Returns the document path for a domain inside `dir`.
///
/// The identifier must be a plain file stem.
pub fn document_path(dir: impl AsRef<Path>, domain: &str) -> Result<PathBuf> {
    if domain.is_empty()
        || domain == "."
        || domain == ".."
        || domain.contains('/')
        || domain.contains('\0')
    {
        return Err(AnnounceError::InvalidDomain(domain.to_string()));
    }
    Ok(dir.as_ref().join(format!("{}.json", domain)))
}

impl DomainDocument {
    /// Load a document from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).map_err(|source| AnnounceError::ConfigLoad {
            path: path.to_path_buf(),
            source,
        })?;

        let document: DomainDocument =
            serde_json::from_str(&content).map_err(|source| AnnounceError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(
            path = %path.display(),
            domain_id = document.domain_id,
            addresses = document.ip_addresses.len(),
            networks = document.ip_networks.len(),
            "Loaded domain configuration"
        );
        Ok(document)
    }

    /// Parse every address field, failing on the first malformed one
    pub fn validate(self) -> Result<DomainConfig> {
        let mac_address = self
            .mac_address
            .parse::<MacAddress>()
            .map_err(AnnounceError::InvalidMac)?;

        let addresses = self
            .ip_addresses
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                Ok(AddressEntry {
                    family: DeclaredFamily::parse(&entry.family),
                    cidr: parse_cidr(&entry.address, || format!("ip_addresses[{}].address", i))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let subnets = self
            .ip_networks
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                Ok(SubnetEntry {
                    family: DeclaredFamily::parse(&entry.family),
                    cidr: parse_cidr(&entry.network, || format!("ip_networks[{}].network", i))?,
                    next_hop: parse_next_hop(entry.next_hop.as_deref(), || {
                        format!("ip_networks[{}].next_hop", i)
                    })?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DomainConfig {
            domain_id: self.domain_id,
            interface: self.interface,
            mac_address,
            table: (self.table != 0).then_some(self.table),
            rule_priority: match self.rule_priority {
                0 => DEFAULT_RULE_PRIORITY,
                priority => priority,
            },
            addresses,
            subnets,
        })
    }
}

/// Load and validate the document for `domain` from `dir`
pub fn load_domain(dir: impl AsRef<Path>, domain: &str) -> Result<DomainConfig> {
    let path = document_path(dir, domain)?;
    DomainDocument::load(&path)?.validate()
}

fn parse_cidr(value: &str, field: impl FnOnce() -> String) -> Result<IpCidr> {
    value.parse().map_err(|source| AnnounceError::InvalidCidr {
        field: field(),
        source,
    })
}

fn parse_next_hop(value: Option<&str>, field: impl FnOnce() -> String) -> Result<Option<IpAddr>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| AnnounceError::InvalidNextHop {
                field: field(),
                value: raw.to_string(),
            }),
    }
}
