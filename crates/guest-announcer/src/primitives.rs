//! Routing primitives derived from configured entries
//!
//! Each address or subnet of a domain expands into a fixed sequence of
//! kernel objects. Nothing here touches the kernel; the
//! [`crate::reconciler::Reconciler`] applies what is built.

use crate::model::{AddressEntry, ConfigWarning, DomainConfig, SubnetEntry};
use announcer_types::{IpCidr, IpFamily, MacAddress};
use std::fmt;
use std::net::{IpAddr, Ipv6Addr};

/// Policy rule steering traffic for one network into the domain's table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    pub family: IpFamily,
    pub network: IpCidr,
    /// `None` leaves the table attribute out (kernel main table)
    pub table: Option<u32>,
    /// Rule preference; always sent so a repeated add is rejected as a duplicate
    pub priority: u32,
}

/// Which end of a packet a policy rule matches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSelector {
    Source,
    Destination,
}

impl fmt::Display for RuleSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSelector::Source => f.write_str("from"),
            RuleSelector::Destination => f.write_str("to"),
        }
    }
}

/// Route toward a network out of the host interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub family: IpFamily,
    pub destination: IpCidr,
    pub gateway: Option<IpAddr>,
    pub link_index: u32,
    pub table: Option<u32>,
    /// Gateway is reachable on the link without a covering route
    pub on_link: bool,
}

/// Permanent neighbor entry binding a guest address to its MAC
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborSpec {
    pub family: IpFamily,
    pub address: IpAddr,
    pub mac: MacAddress,
    pub link_index: u32,
}

/// One kernel object to add or remove
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingPrimitive {
    SourceRule(RuleSpec),
    DestinationRule(RuleSpec),
    Route(RouteSpec),
    Neighbor(NeighborSpec),
}

impl RoutingPrimitive {
    /// Short name used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            RoutingPrimitive::SourceRule(_) => "src rule",
            RoutingPrimitive::DestinationRule(_) => "dst rule",
            RoutingPrimitive::Route(_) => "route",
            RoutingPrimitive::Neighbor(_) => "neigh",
        }
    }

    pub fn family(&self) -> IpFamily {
        match self {
            RoutingPrimitive::SourceRule(rule) | RoutingPrimitive::DestinationRule(rule) => {
                rule.family
            }
            RoutingPrimitive::Route(route) => route.family,
            RoutingPrimitive::Neighbor(neigh) => neigh.family,
        }
    }
}

impl RoutingPrimitive {
    /// Direction a rule matches on, `None` for routes and neighbors
    pub fn selector(&self) -> Option<RuleSelector> {
        match self {
            RoutingPrimitive::SourceRule(_) => Some(RuleSelector::Source),
            RoutingPrimitive::DestinationRule(_) => Some(RuleSelector::Destination),
            _ => None,
        }
    }
}

fn fmt_table(f: &mut fmt::Formatter<'_>, table: Option<u32>) -> fmt::Result {
    match table {
        Some(id) => write!(f, " table {}", id),
        None => Ok(()),
    }
}

impl fmt::Display for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.destination)?;
        if let Some(gw) = self.gateway {
            write!(f, " via {}", gw)?;
        }
        write!(f, " dev #{}", self.link_index)?;
        if self.on_link {
            f.write_str(" onlink")?;
        }
        fmt_table(f, self.table)
    }
}

impl fmt::Display for NeighborSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} lladdr {} dev #{} permanent",
            self.address, self.mac, self.link_index
        )
    }
}

impl fmt::Display for RoutingPrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingPrimitive::SourceRule(rule) | RoutingPrimitive::DestinationRule(rule) => {
                if let Some(selector) = self.selector() {
                    write!(f, "{} ", selector)?;
                }
                write!(f, "{}", rule.network)?;
                fmt_table(f, rule.table)?;
                write!(f, " pref {}", rule.priority)
            }
            RoutingPrimitive::Route(route) => route.fmt(f),
            RoutingPrimitive::Neighbor(neigh) => neigh.fmt(f),
        }
    }
}

/// Primitives for one configured entry, in application order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPrimitives {
    /// The entry as configured, e.g. `10.0.0.5/32`
    pub label: IpCidr,
    pub primitives: Vec<RoutingPrimitive>,
    pub warnings: Vec<ConfigWarning>,
}

/// Domain-wide inputs shared by every entry
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveBuilder {
    table: Option<u32>,
    rule_priority: u32,
    link_index: u32,
    mac: MacAddress,
    link_local: Ipv6Addr,
}

impl PrimitiveBuilder {
    pub fn new(config: &DomainConfig, link_index: u32, link_local: Ipv6Addr) -> Self {
        Self {
            table: config.table,
            rule_priority: config.rule_priority,
            link_index,
            mac: config.mac_address,
            link_local,
        }
    }

    fn rules(&self, family: IpFamily, network: IpCidr) -> [RoutingPrimitive; 2] {
        let rule = RuleSpec {
            family,
            network,
            table: self.table,
            priority: self.rule_priority,
        };
        [
            RoutingPrimitive::SourceRule(rule.clone()),
            RoutingPrimitive::DestinationRule(rule),
        ]
    }

    /// Rules, route and (IPv4 only) neighbor entry for a guest address
    pub fn address(&self, entry: &AddressEntry) -> EntryPrimitives {
        let (family, warning) = entry.family.resolve(&entry.cidr);
        let network = entry.cidr.network();

        let gateway = match family {
            IpFamily::V4 => None,
            IpFamily::V6 => Some(IpAddr::V6(self.link_local)),
        };

        let mut primitives = Vec::with_capacity(4);
        primitives.extend(self.rules(family, network));
        primitives.push(RoutingPrimitive::Route(RouteSpec {
            family,
            destination: network,
            gateway,
            link_index: self.link_index,
            table: self.table,
            on_link: false,
        }));
        match family {
            IpFamily::V4 => primitives.push(RoutingPrimitive::Neighbor(NeighborSpec {
                family,
                address: entry.cidr.address(),
                mac: self.mac,
                link_index: self.link_index,
            })),
            IpFamily::V6 => {}
        }

        EntryPrimitives {
            label: entry.cidr,
            primitives,
            warnings: warning.into_iter().collect(),
        }
    }

    /// Rules and on-link route for a routed subnet
    pub fn subnet(&self, entry: &SubnetEntry) -> EntryPrimitives {
        let (family, warning) = entry.family.resolve(&entry.cidr);
        let network = entry.cidr.network();
        let mut warnings: Vec<ConfigWarning> = warning.into_iter().collect();

        let next_hop = match entry.next_hop {
            Some(hop) if IpFamily::of(&hop) != family => {
                warnings.push(ConfigWarning::NextHopFamilyMismatch {
                    cidr: entry.cidr,
                    next_hop: hop,
                });
                None
            }
            other => other,
        };

        let gateway = match family {
            IpFamily::V4 => {
                if next_hop.is_none() {
                    warnings.push(ConfigWarning::MissingNextHop { cidr: entry.cidr });
                }
                next_hop
            }
            IpFamily::V6 => Some(next_hop.unwrap_or(IpAddr::V6(self.link_local))),
        };

        let mut primitives = Vec::with_capacity(3);
        primitives.extend(self.rules(family, network));
        primitives.push(RoutingPrimitive::Route(RouteSpec {
            family,
            destination: network,
            gateway,
            link_index: self.link_index,
            table: self.table,
            // the kernel rejects onlink on a nexthop without gateway
            on_link: gateway.is_some(),
        }));

        EntryPrimitives {
            label: entry.cidr,
            primitives,
            warnings,
        }
    }

    /// Every entry of the domain, addresses before subnets
    pub fn domain(&self, config: &DomainConfig) -> Vec<EntryPrimitives> {
        config
            .addresses
            .iter()
            .map(|entry| self.address(entry))
            .chain(config.subnets.iter().map(|entry| self.subnet(entry)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link_local;
    use crate::model::DeclaredFamily;
    use pretty_assertions::assert_eq;

    const MAC: &str = "52:54:00:aa:bb:cc";

    fn config(table: Option<u32>) -> DomainConfig {
        DomainConfig {
            domain_id: 7,
            interface: "br0".to_string(),
            mac_address: MAC.parse().unwrap(),
            table,
            rule_priority: 1000,
            addresses: Vec::new(),
            subnets: Vec::new(),
        }
    }

    fn builder(table: Option<u32>) -> PrimitiveBuilder {
        let config = config(table);
        PrimitiveBuilder::new(&config, 12, link_local::derive(&config.mac_address))
    }

    fn address(family: &str, cidr: &str) -> AddressEntry {
        AddressEntry {
            family: DeclaredFamily::parse(family),
            cidr: cidr.parse().unwrap(),
        }
    }

    fn subnet(family: &str, cidr: &str, next_hop: Option<&str>) -> SubnetEntry {
        SubnetEntry {
            family: DeclaredFamily::parse(family),
            cidr: cidr.parse().unwrap(),
            next_hop: next_hop.map(|h| h.parse().unwrap()),
        }
    }

    #[test]
    fn test_ipv4_address_scenario() {
        let built = builder(Some(100)).address(&address("ipv4", "10.0.0.5/32"));
        let net: IpCidr = "10.0.0.5/32".parse().unwrap();
        let rule = RuleSpec {
            family: IpFamily::V4,
            network: net,
            table: Some(100),
            priority: 1000,
        };

        assert_eq!(
            built.primitives,
            vec![
                RoutingPrimitive::SourceRule(rule.clone()),
                RoutingPrimitive::DestinationRule(rule),
                RoutingPrimitive::Route(RouteSpec {
                    family: IpFamily::V4,
                    destination: net,
                    gateway: None,
                    link_index: 12,
                    table: Some(100),
                    on_link: false,
                }),
                RoutingPrimitive::Neighbor(NeighborSpec {
                    family: IpFamily::V4,
                    address: "10.0.0.5".parse().unwrap(),
                    mac: MAC.parse().unwrap(),
                    link_index: 12,
                }),
            ]
        );
        assert!(built.warnings.is_empty());
    }

    #[test]
    fn test_ipv6_address_has_no_neighbor() {
        let built = builder(Some(100)).address(&address("ipv6", "2001:db8:1::5/128"));
        assert_eq!(built.primitives.len(), 3);
        assert!(!built
            .primitives
            .iter()
            .any(|p| matches!(p, RoutingPrimitive::Neighbor(_))));

        match &built.primitives[2] {
            RoutingPrimitive::Route(route) => {
                assert_eq!(
                    route.gateway,
                    Some("fe80::5054:ff:feaa:bbcc".parse().unwrap())
                );
                assert!(!route.on_link);
            }
            other => panic!("expected route, got {other:?}"),
        }
    }

    #[test]
    fn test_address_rules_use_network_and_neighbor_uses_host() {
        let built = builder(None).address(&address("ipv4", "10.0.0.5/24"));
        match (&built.primitives[0], &built.primitives[3]) {
            (RoutingPrimitive::SourceRule(rule), RoutingPrimitive::Neighbor(neigh)) => {
                assert_eq!(rule.network.to_string(), "10.0.0.0/24");
                assert_eq!(neigh.address.to_string(), "10.0.0.5");
            }
            other => panic!("unexpected primitives {other:?}"),
        }
        assert_eq!(built.label.to_string(), "10.0.0.5/24");
    }

    #[test]
    fn test_ipv6_subnet_scenario() {
        let built = builder(Some(100)).subnet(&subnet("ipv6", "2001:db8::/64", None));
        assert_eq!(built.primitives.len(), 3);
        assert_eq!(
            built.primitives[2],
            RoutingPrimitive::Route(RouteSpec {
                family: IpFamily::V6,
                destination: "2001:db8::/64".parse().unwrap(),
                gateway: Some("fe80::5054:ff:feaa:bbcc".parse().unwrap()),
                link_index: 12,
                table: Some(100),
                on_link: true,
            })
        );
        assert!(built.warnings.is_empty());
    }

    #[test]
    fn test_ipv4_subnet_uses_next_hop() {
        let built = builder(Some(100)).subnet(&subnet("ipv4", "192.0.2.0/24", Some("10.0.0.5")));
        assert_eq!(built.primitives.len(), 3);
        match &built.primitives[2] {
            RoutingPrimitive::Route(route) => {
                assert_eq!(route.gateway, Some("10.0.0.5".parse().unwrap()));
                assert!(route.on_link);
            }
            other => panic!("expected route, got {other:?}"),
        }
    }

    #[test]
    fn test_ipv6_subnet_explicit_next_hop_wins() {
        let built =
            builder(None).subnet(&subnet("ipv6", "2001:db8::/64", Some("fe80::1")));
        match &built.primitives[2] {
            RoutingPrimitive::Route(route) => {
                assert_eq!(route.gateway, Some("fe80::1".parse().unwrap()))
            }
            other => panic!("expected route, got {other:?}"),
        }
    }

    #[test]
    fn test_ipv4_subnet_without_next_hop_warns() {
        let built = builder(None).subnet(&subnet("ipv4", "192.0.2.0/24", None));
        assert_eq!(
            built.warnings,
            vec![ConfigWarning::MissingNextHop {
                cidr: "192.0.2.0/24".parse().unwrap()
            }]
        );
        match &built.primitives[2] {
            RoutingPrimitive::Route(route) => {
                assert_eq!(route.gateway, None);
                assert!(!route.on_link);
            }
            other => panic!("expected route, got {other:?}"),
        }
    }

    #[test]
    fn test_next_hop_family_mismatch_is_dropped() {
        let built = builder(None).subnet(&subnet("ipv6", "2001:db8::/64", Some("10.0.0.1")));
        assert!(matches!(
            built.warnings[0],
            ConfigWarning::NextHopFamilyMismatch { .. }
        ));
        match &built.primitives[2] {
            RoutingPrimitive::Route(route) => assert_eq!(
                route.gateway,
                Some("fe80::5054:ff:feaa:bbcc".parse().unwrap())
            ),
            other => panic!("expected route, got {other:?}"),
        }
    }

    #[test]
    fn test_families_never_mix() {
        let b = builder(Some(5));
        let all = [
            b.address(&address("ipv6", "10.0.0.9/32")),
            b.address(&address("bogus", "2001:db8::9/128")),
            b.subnet(&subnet("ipv4", "2001:db8:2::/48", None)),
            b.subnet(&subnet("", "198.51.100.0/24", Some("10.0.0.1"))),
        ];

        for entry in &all {
            assert!(!entry.warnings.is_empty(), "{} should warn", entry.label);
            for primitive in &entry.primitives {
                assert_eq!(primitive.family(), entry.label.family());
                if let RoutingPrimitive::Route(route) = primitive {
                    if let Some(gw) = route.gateway {
                        assert_eq!(IpFamily::of(&gw), route.family);
                    }
                }
            }
        }
        // mis-declared IPv4 address still gets its neighbor entry
        assert_eq!(all[0].primitives.len(), 4);
        assert_eq!(all[1].primitives.len(), 3);
    }

    #[test]
    fn test_domain_orders_addresses_before_subnets() {
        let mut config = config(None);
        config.subnets.push(subnet("ipv4", "192.0.2.0/24", Some("10.0.0.5")));
        config.addresses.push(address("ipv4", "10.0.0.5/32"));
        config.addresses.push(address("ipv6", "2001:db8:1::5/128"));

        let b = PrimitiveBuilder::new(&config, 3, link_local::derive(&config.mac_address));
        let labels: Vec<String> = b
            .domain(&config)
            .iter()
            .map(|e| e.label.to_string())
            .collect();
        assert_eq!(
            labels,
            vec!["10.0.0.5/32", "2001:db8:1::5/128", "192.0.2.0/24"]
        );
    }

    #[test]
    fn test_display() {
        let built = builder(Some(100)).subnet(&subnet("ipv4", "192.0.2.0/24", Some("10.0.0.5")));
        let lines: Vec<String> = built.primitives.iter().map(|p| p.to_string()).collect();
        assert_eq!(
            lines,
            vec![
                "from 192.0.2.0/24 table 100 pref 1000",
                "to 192.0.2.0/24 table 100 pref 1000",
                "192.0.2.0/24 via 10.0.0.5 dev #12 onlink table 100",
            ]
        );
    }
}
