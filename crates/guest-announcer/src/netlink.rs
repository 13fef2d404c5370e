//! rtnetlink gateway for rules, routes and neighbor entries
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - AC-3: Access Enforcement - Kernel routing changes require CAP_NET_ADMIN
//! - SC-7: Boundary Protection - Policy routing for guest addresses
//! - AU-12: Audit Record Generation - Every kernel call is logged
//!
//! Requests are sent one at a time on a blocking socket and each waits for
//! its acknowledgement, so an error always belongs to the request that
//! caused it.

#[cfg(target_os = "linux")]
mod linux {
    use crate::error::{AnnounceError, Result};
    use crate::gateway::{GatewayError, RoutingGateway};
    use crate::primitives::{NeighborSpec, RouteSpec, RuleSelector, RuleSpec};
    use announcer_types::IpFamily;
    use netlink_packet_core::{
        NetlinkHeader, NetlinkMessage, NetlinkPayload, NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL,
        NLM_F_REQUEST,
    };
    use netlink_packet_route::neighbour::{
        NeighbourAddress, NeighbourAttribute, NeighbourMessage, NeighbourState,
    };
    use netlink_packet_route::route::{
        RouteAddress, RouteAttribute, RouteFlags, RouteHeader, RouteMessage, RouteProtocol,
        RouteScope, RouteType,
    };
    use netlink_packet_route::rule::{RuleAction, RuleAttribute, RuleMessage};
    use netlink_packet_route::{AddressFamily, RouteNetlinkMessage};
    use netlink_sys::{protocols::NETLINK_ROUTE, Socket, SocketAddr};
    use std::net::IpAddr;
    use tracing::{debug, instrument, trace};

    /// Receive buffer size; acknowledgements are small
    const RECV_BUFFER_SIZE: usize = 8192;

    fn address_family(family: IpFamily) -> AddressFamily {
        match family {
            IpFamily::V4 => AddressFamily::Inet,
            IpFamily::V6 => AddressFamily::Inet6,
        }
    }

    fn route_address(addr: IpAddr) -> RouteAddress {
        match addr {
            IpAddr::V4(v4) => RouteAddress::Inet(v4),
            IpAddr::V6(v6) => RouteAddress::Inet6(v6),
        }
    }

    fn neighbour_address(addr: IpAddr) -> NeighbourAddress {
        match addr {
            IpAddr::V4(v4) => NeighbourAddress::Inet(v4),
            IpAddr::V6(v6) => NeighbourAddress::Inet6(v6),
        }
    }

    /// Build an RTM_*RULE body matching one network in one direction
    pub fn rule_message(rule: &RuleSpec, selector: RuleSelector) -> RuleMessage {
        let mut msg = RuleMessage::default();
        msg.header.family = address_family(rule.family);
        msg.header.action = RuleAction::ToTable;

        let network = rule.network.address();
        match selector {
            RuleSelector::Source => {
                msg.header.src_len = rule.network.prefix_len();
                msg.attributes.push(RuleAttribute::Source(network));
            }
            RuleSelector::Destination => {
                msg.header.dst_len = rule.network.prefix_len();
                msg.attributes.push(RuleAttribute::Destination(network));
            }
        }

        match rule.table {
            Some(table) => {
                msg.header.table = u8::try_from(table).unwrap_or(0);
                msg.attributes.push(RuleAttribute::Table(table));
            }
            None => msg.header.table = RouteHeader::RT_TABLE_MAIN,
        }
        // without a preference the kernel numbers each add afresh and never reports EEXIST
        msg.attributes.push(RuleAttribute::Priority(rule.priority));
        msg
    }

    /// Build an RTM_*ROUTE body
    pub fn route_message(route: &RouteSpec) -> RouteMessage {
        let mut msg = RouteMessage::default();
        msg.header.address_family = address_family(route.family);
        msg.header.destination_prefix_length = route.destination.prefix_len();
        msg.header.protocol = RouteProtocol::Static;
        msg.header.kind = RouteType::Unicast;
        msg.header.scope = match route.gateway {
            Some(_) => RouteScope::Universe,
            None => RouteScope::Link,
        };
        if route.on_link {
            msg.header.flags |= RouteFlags::Onlink;
        }

        msg.attributes.push(RouteAttribute::Destination(route_address(
            route.destination.address(),
        )));
        if let Some(gateway) = route.gateway {
            msg.attributes
                .push(RouteAttribute::Gateway(route_address(gateway)));
        }
        msg.attributes.push(RouteAttribute::Oif(route.link_index));

        match route.table {
            Some(table) => {
                msg.header.table = u8::try_from(table).unwrap_or(0);
                msg.attributes.push(RouteAttribute::Table(table));
            }
            None => msg.header.table = RouteHeader::RT_TABLE_MAIN,
        }
        msg
    }

    /// Build an RTM_*NEIGH body for a permanent entry
    pub fn neighbour_message(neigh: &NeighborSpec) -> NeighbourMessage {
        let mut msg = NeighbourMessage::default();
        msg.header.family = address_family(neigh.family);
        msg.header.ifindex = neigh.link_index;
        msg.header.state = NeighbourState::Permanent;
        msg.header.kind = RouteType::Unicast;
        msg.attributes
            .push(NeighbourAttribute::Destination(neighbour_address(neigh.address)));
        msg.attributes.push(NeighbourAttribute::LinkLocalAddress(
            neigh.mac.as_bytes().to_vec(),
        ));
        msg
    }

    /// Resolve an interface name to its kernel index
    pub fn interface_index(name: &str) -> Result<u32> {
        nix::net::if_::if_nametoindex(name).map_err(|_| AnnounceError::InterfaceNotFound {
            name: name.to_string(),
        })
    }

    /// Scan one receive buffer for the acknowledgement of `sequence`.
    ///
    /// Returns `None` when the buffer holds no reply to that request.
    pub(crate) fn find_ack(
        buf: &[u8],
        sequence: u32,
    ) -> Option<std::result::Result<(), GatewayError>> {
        let mut offset = 0;
        while offset < buf.len() {
            let msg = match NetlinkMessage::<RouteNetlinkMessage>::deserialize(&buf[offset..]) {
                Ok(msg) => msg,
                Err(e) => {
                    return Some(Err(GatewayError::Transport(format!(
                        "Failed to parse reply: {}",
                        e
                    ))))
                }
            };

            let msg_len = msg.header.length as usize;
            if msg_len == 0 {
                return Some(Err(GatewayError::Transport("Zero-length reply".to_string())));
            }
            // netlink messages are 4-byte aligned
            offset += (msg_len + 3) & !3;

            if msg.header.sequence_number != sequence {
                trace!(
                    expected = sequence,
                    got = msg.header.sequence_number,
                    "Skipping unrelated netlink message"
                );
                continue;
            }

            if let NetlinkPayload::Error(err) = msg.payload {
                return Some(match err.code {
                    None => Ok(()),
                    Some(code) => Err(GatewayError::from_errno(-code.get())),
                });
            }
        }
        None
    }

    /// Blocking rtnetlink connection used for one invocation
    pub struct NetlinkGateway {
        socket: Socket,
        sequence: u32,
        buffer: Vec<u8>,
    }

    impl NetlinkGateway {
        /// Open and connect a NETLINK_ROUTE socket
        ///
        /// # NIST Controls
        /// - AC-3: Access Enforcement - Kernel socket requires CAP_NET_ADMIN
        #[instrument]
        pub fn new() -> Result<Self> {
            let mut socket = Socket::new(NETLINK_ROUTE)
                .map_err(|e| AnnounceError::Netlink(format!("Failed to create socket: {}", e)))?;
            socket
                .bind_auto()
                .map_err(|e| AnnounceError::Netlink(format!("Failed to bind socket: {}", e)))?;
            socket
                .connect(&SocketAddr::new(0, 0))
                .map_err(|e| AnnounceError::Netlink(format!("Failed to connect socket: {}", e)))?;

            debug!("Netlink route socket connected");
            Ok(Self {
                socket,
                sequence: 0,
                buffer: Vec::with_capacity(RECV_BUFFER_SIZE),
            })
        }

        /// Send one request and wait for its acknowledgement
        fn request(
            &mut self,
            payload: RouteNetlinkMessage,
            flags: u16,
        ) -> std::result::Result<(), GatewayError> {
            self.sequence = self.sequence.wrapping_add(1);
            let sequence = self.sequence;

            let mut header = NetlinkHeader::default();
            header.flags = NLM_F_REQUEST | NLM_F_ACK | flags;
            header.sequence_number = sequence;

            let mut packet = NetlinkMessage::new(header, NetlinkPayload::InnerMessage(payload));
            packet.finalize();

            let mut buf = vec![0u8; packet.buffer_len()];
            packet.serialize(&mut buf);

            self.socket
                .send(&buf, 0)
                .map_err(|e| GatewayError::Transport(format!("Failed to send request: {}", e)))?;

            loop {
                self.buffer.clear();
                let len = self
                    .socket
                    .recv(&mut self.buffer, 0)
                    .map_err(|e| GatewayError::Transport(format!("Failed to receive: {}", e)))?;

                if let Some(outcome) = find_ack(&self.buffer[..len], sequence) {
                    return outcome;
                }
            }
        }

        fn create() -> u16 {
            NLM_F_CREATE | NLM_F_EXCL
        }
    }

    impl RoutingGateway for NetlinkGateway {
        fn add_rule(
            &mut self,
            rule: &RuleSpec,
            selector: RuleSelector,
        ) -> std::result::Result<(), GatewayError> {
            let msg = rule_message(rule, selector);
            self.request(RouteNetlinkMessage::NewRule(msg), Self::create())
        }

        fn delete_rule(
            &mut self,
            rule: &RuleSpec,
            selector: RuleSelector,
        ) -> std::result::Result<(), GatewayError> {
            let msg = rule_message(rule, selector);
            self.request(RouteNetlinkMessage::DelRule(msg), 0)
        }

        fn add_route(&mut self, route: &RouteSpec) -> std::result::Result<(), GatewayError> {
            let msg = route_message(route);
            self.request(RouteNetlinkMessage::NewRoute(msg), Self::create())
        }

        fn delete_route(&mut self, route: &RouteSpec) -> std::result::Result<(), GatewayError> {
            let msg = route_message(route);
            self.request(RouteNetlinkMessage::DelRoute(msg), 0)
        }

        fn add_neighbor(&mut self, neigh: &NeighborSpec) -> std::result::Result<(), GatewayError> {
            let msg = neighbour_message(neigh);
            self.request(RouteNetlinkMessage::NewNeighbour(msg), Self::create())
        }

        fn delete_neighbor(
            &mut self,
            neigh: &NeighborSpec,
        ) -> std::result::Result<(), GatewayError> {
            let msg = neighbour_message(neigh);
            self.request(RouteNetlinkMessage::DelNeighbour(msg), 0)
        }
    }

}

#[cfg(target_os = "linux")]
pub use linux::*;

/// Mock implementation for non-Linux platforms (development only)
#[cfg(not(target_os = "linux"))]
mod mock {
    use crate::error::{AnnounceError, Result};
    use crate::gateway::{GatewayError, RoutingGateway};
    use crate::primitives::{NeighborSpec, RouteSpec, RuleSelector, RuleSpec};

    pub fn interface_index(name: &str) -> Result<u32> {
        Err(AnnounceError::InterfaceNotFound {
            name: name.to_string(),
        })
    }

    pub struct NetlinkGateway;

    impl NetlinkGateway {
        pub fn new() -> Result<Self> {
            Err(AnnounceError::Netlink(
                "rtnetlink is only available on Linux".to_string(),
            ))
        }
    }

    #[allow(unused_variables)]
    impl RoutingGateway for NetlinkGateway {
        fn add_rule(&mut self, rule: &RuleSpec, selector: RuleSelector) -> std::result::Result<(), GatewayError> {
            Ok(())
        }
        fn delete_rule(&mut self, rule: &RuleSpec, selector: RuleSelector) -> std::result::Result<(), GatewayError> {
            Ok(())
        }
        fn add_route(&mut self, route: &RouteSpec) -> std::result::Result<(), GatewayError> {
            Ok(())
        }
        fn delete_route(&mut self, route: &RouteSpec) -> std::result::Result<(), GatewayError> {
            Ok(())
        }
        fn add_neighbor(&mut self, neigh: &NeighborSpec) -> std::result::Result<(), GatewayError> {
            Ok(())
        }
        fn delete_neighbor(&mut self, neigh: &NeighborSpec) -> std::result::Result<(), GatewayError> {
            Ok(())
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub use mock::*;
