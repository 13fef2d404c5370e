//! Lifecycle phases and the provisioning pipeline behind them

use crate::error::{AnnounceError, Result};
use crate::gateway::RoutingGateway;
use crate::link_local;
use crate::model::DomainConfig;
use crate::primitives::{EntryPrimitives, PrimitiveBuilder};
use crate::reconciler::{ReconcileMode, ReconcileReport, Reconciler};
use std::fmt;
use std::str::FromStr;
use tracing::{info, instrument};

/// Phase named by the virtualization host's hook argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    PreStart,
    PostStart,
    PreStop,
    PostStop,
}

impl HookPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookPhase::PreStart => "pre-start",
            HookPhase::PostStart => "post-start",
            HookPhase::PreStop => "pre-stop",
            HookPhase::PostStop => "post-stop",
        }
    }

    /// Reconciliation pass for this phase, `None` for the no-op phases
    pub fn mode(&self) -> Option<ReconcileMode> {
        match self {
            HookPhase::PostStart => Some(ReconcileMode::Provision),
            HookPhase::PostStop => Some(ReconcileMode::Deprovision),
            HookPhase::PreStart | HookPhase::PreStop => None,
        }
    }
}

impl FromStr for HookPhase {
    type Err = AnnounceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pre-start" => Ok(HookPhase::PreStart),
            "post-start" => Ok(HookPhase::PostStart),
            "pre-stop" => Ok(HookPhase::PreStop),
            "post-stop" => Ok(HookPhase::PostStop),
            other => Err(AnnounceError::UnrecognizedAction(other.to_string())),
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build every entry's primitives for the domain attached at `link_index`
pub fn plan(config: &DomainConfig, link_index: u32) -> Vec<EntryPrimitives> {
    let link_local = link_local::derive(&config.mac_address);
    PrimitiveBuilder::new(config, link_index, link_local).domain(config)
}

/// Plan and apply one pass, failing if any primitive failed
#[instrument(skip(config, gateway), fields(domain = config.domain_id, interface = %config.interface))]
pub fn execute<G: RoutingGateway>(
    config: &DomainConfig,
    link_index: u32,
    mode: ReconcileMode,
    gateway: G,
) -> Result<ReconcileReport> {
    let entries = plan(config, link_index);
    info!(
        entries = entries.len(),
        primitives = entries.iter().map(|e| e.primitives.len()).sum::<usize>(),
        "Starting {}",
        mode
    );

    let mut reconciler = Reconciler::new(gateway);
    reconciler.apply(&entries, mode).into_result()
}
