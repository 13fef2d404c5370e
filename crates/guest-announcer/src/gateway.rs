//! Kernel routing gateway abstraction
//!
//! The reconciler talks to the kernel only through [`RoutingGateway`]. The
//! netlink implementation lives in [`crate::netlink`]; [`DryRunGateway`]
//! logs instead of mutating anything.

use crate::primitives::{NeighborSpec, RouteSpec, RuleSelector, RuleSpec};
use thiserror::Error;
use tracing::info;

/// Outcome of one failed kernel call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Object is already present (EEXIST on add)
    #[error("object already exists")]
    AlreadyExists,

    /// Object is not present (ENOENT/ESRCH on delete)
    #[error("object not found")]
    NotFound,

    /// Any other errno reported by the kernel
    #[error("{message} (errno {code})")]
    Os { code: i32, message: String },

    /// Request could not be sent or the reply could not be read
    #[error("netlink transport: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Classify a positive errno returned by the kernel
    pub fn from_errno(code: i32) -> Self {
        match code {
            #[cfg(target_os = "linux")]
            libc::EEXIST => GatewayError::AlreadyExists,
            #[cfg(target_os = "linux")]
            libc::ENOENT | libc::ESRCH => GatewayError::NotFound,
            _ => GatewayError::Os {
                code,
                message: std::io::Error::from_raw_os_error(code).to_string(),
            },
        }
    }
}

/// Add/delete access to the kernel rule, route and neighbor tables.
///
/// Every call is independent; implementations do not batch or retry.
#[cfg_attr(test, mockall::automock)]
pub trait RoutingGateway {
    fn add_rule(&mut self, rule: &RuleSpec, selector: RuleSelector) -> Result<(), GatewayError>;
    fn delete_rule(&mut self, rule: &RuleSpec, selector: RuleSelector) -> Result<(), GatewayError>;
    fn add_route(&mut self, route: &RouteSpec) -> Result<(), GatewayError>;
    fn delete_route(&mut self, route: &RouteSpec) -> Result<(), GatewayError>;
    fn add_neighbor(&mut self, neigh: &NeighborSpec) -> Result<(), GatewayError>;
    fn delete_neighbor(&mut self, neigh: &NeighborSpec) -> Result<(), GatewayError>;
}

impl<G: RoutingGateway + ?Sized> RoutingGateway for &mut G {
    fn add_rule(&mut self, rule: &RuleSpec, selector: RuleSelector) -> Result<(), GatewayError> {
        (**self).add_rule(rule, selector)
    }
    fn delete_rule(&mut self, rule: &RuleSpec, selector: RuleSelector) -> Result<(), GatewayError> {
        (**self).delete_rule(rule, selector)
    }
    fn add_route(&mut self, route: &RouteSpec) -> Result<(), GatewayError> {
        (**self).add_route(route)
    }
    fn delete_route(&mut self, route: &RouteSpec) -> Result<(), GatewayError> {
        (**self).delete_route(route)
    }
    fn add_neighbor(&mut self, neigh: &NeighborSpec) -> Result<(), GatewayError> {
        (**self).add_neighbor(neigh)
    }
    fn delete_neighbor(&mut self, neigh: &NeighborSpec) -> Result<(), GatewayError> {
        (**self).delete_neighbor(neigh)
    }
}

/// Gateway that reports every call and succeeds without touching the kernel
#[derive(Debug, Default)]
pub struct DryRunGateway {
    calls: usize,
}

impl DryRunGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calls received so far
    pub fn calls(&self) -> usize {
        self.calls
    }

    fn record(&mut self, op: &str, what: &dyn std::fmt::Display) -> Result<(), GatewayError> {
        self.calls += 1;
        info!(dry_run = true, "Would {} {}", op, what);
        Ok(())
    }
}

struct RuleLine<'a>(&'a RuleSpec, RuleSelector);

impl std::fmt::Display for RuleLine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.1, self.0.network)?;
        if let Some(id) = self.0.table {
            write!(f, " table {}", id)?;
        }
        write!(f, " pref {}", self.0.priority)
    }
}

impl RoutingGateway for DryRunGateway {
    fn add_rule(&mut self, rule: &RuleSpec, selector: RuleSelector) -> Result<(), GatewayError> {
        self.record("add rule", &RuleLine(rule, selector))
    }

    fn delete_rule(&mut self, rule: &RuleSpec, selector: RuleSelector) -> Result<(), GatewayError> {
        self.record("del rule", &RuleLine(rule, selector))
    }

    fn add_route(&mut self, route: &RouteSpec) -> Result<(), GatewayError> {
        self.record("add route", route)
    }

    fn delete_route(&mut self, route: &RouteSpec) -> Result<(), GatewayError> {
        self.record("del route", route)
    }

    fn add_neighbor(&mut self, neigh: &NeighborSpec) -> Result<(), GatewayError> {
        self.record("add neigh", neigh)
    }

    fn delete_neighbor(&mut self, neigh: &NeighborSpec) -> Result<(), GatewayError> {
        self.record("del neigh", neigh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use announcer_types::IpFamily;

    #[cfg(target_os = "linux")]
    #[test]
    fn test_errno_classification() {
        assert_eq!(GatewayError::from_errno(libc::EEXIST), GatewayError::AlreadyExists);
        assert_eq!(GatewayError::from_errno(libc::ENOENT), GatewayError::NotFound);
        assert_eq!(GatewayError::from_errno(libc::ESRCH), GatewayError::NotFound);
        assert!(matches!(
            GatewayError::from_errno(libc::EPERM),
            GatewayError::Os { code, .. } if code == libc::EPERM
        ));
    }

    #[test]
    fn test_dry_run_counts_calls() {
        let rule = RuleSpec {
            family: IpFamily::V4,
            network: "10.0.0.5/32".parse().unwrap(),
            table: Some(100),
            priority: 1000,
        };
        let mut gateway = DryRunGateway::new();
        gateway.add_rule(&rule, RuleSelector::Source).unwrap();
        gateway.delete_rule(&rule, RuleSelector::Destination).unwrap();
        assert_eq!(
            RuleLine(&rule, RuleSelector::Source).to_string(),
            "from 10.0.0.5/32 table 100 pref 1000"
        );
        assert_eq!(gateway.calls(), 2);
    }
}
