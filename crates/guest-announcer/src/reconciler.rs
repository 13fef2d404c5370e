//! Best-effort application of routing primitives
//!
//! One pass over every entry, each primitive added or removed independently.
//! A primitive that is already in the requested state counts as settled, so
//! re-running an interrupted invocation finishes the job.

use crate::error::{AnnounceError, Result};
use crate::gateway::{GatewayError, RoutingGateway};
use crate::primitives::{EntryPrimitives, RoutingPrimitive, RuleSelector};
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// Direction of one reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Add every primitive (post-start)
    Provision,
    /// Remove every primitive (post-stop)
    Deprovision,
}

impl ReconcileMode {
    fn verb(&self) -> &'static str {
        match self {
            ReconcileMode::Provision => "Add",
            ReconcileMode::Deprovision => "Del",
        }
    }

    fn settled_state(&self) -> &'static str {
        match self {
            ReconcileMode::Provision => "present",
            ReconcileMode::Deprovision => "absent",
        }
    }

    /// Error meaning the kernel already matches this mode
    fn is_settled(&self, err: &GatewayError) -> bool {
        matches!(
            (self, err),
            (ReconcileMode::Provision, GatewayError::AlreadyExists)
                | (ReconcileMode::Deprovision, GatewayError::NotFound)
        )
    }
}

impl fmt::Display for ReconcileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileMode::Provision => f.write_str("provisioning"),
            ReconcileMode::Deprovision => f.write_str("deprovisioning"),
        }
    }
}

/// A primitive whose kernel call failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveFailure {
    pub entry: String,
    pub primitive: RoutingPrimitive,
    pub error: GatewayError,
}

impl fmt::Display for PrimitiveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} for {}: {}",
            self.primitive.kind(),
            self.primitive,
            self.entry,
            self.error
        )
    }
}

/// Summary of one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub mode: ReconcileMode,
    /// Calls the kernel accepted
    pub applied: usize,
    /// Primitives already present (provision) or absent (deprovision)
    pub settled: usize,
    pub failures: Vec<PrimitiveFailure>,
}

impl ReconcileReport {
    fn new(mode: ReconcileMode) -> Self {
        Self {
            mode,
            applied: 0,
            settled: 0,
            failures: Vec::new(),
        }
    }

    /// Total number of primitives attempted
    pub fn total(&self) -> usize {
        self.applied + self.settled + self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn recorded failures into an error
    pub fn into_result(self) -> Result<Self> {
        if self.is_clean() {
            Ok(self)
        } else {
            Err(AnnounceError::Reconcile {
                failed: self.failures.len(),
                total: self.total(),
            })
        }
    }
}

/// Applies primitives through a [`RoutingGateway`]
pub struct Reconciler<G> {
    gateway: G,
}

impl<G: RoutingGateway> Reconciler<G> {
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    fn dispatch(
        &mut self,
        primitive: &RoutingPrimitive,
        mode: ReconcileMode,
    ) -> std::result::Result<(), GatewayError> {
        use ReconcileMode::{Deprovision, Provision};
        use RoutingPrimitive::{DestinationRule, Neighbor, Route, SourceRule};

        let gw = &mut self.gateway;
        match (primitive, mode) {
            (SourceRule(rule), Provision) => gw.add_rule(rule, RuleSelector::Source),
            (SourceRule(rule), Deprovision) => gw.delete_rule(rule, RuleSelector::Source),
            (DestinationRule(rule), Provision) => gw.add_rule(rule, RuleSelector::Destination),
            (DestinationRule(rule), Deprovision) => {
                gw.delete_rule(rule, RuleSelector::Destination)
            }
            (Route(route), Provision) => gw.add_route(route),
            (Route(route), Deprovision) => gw.delete_route(route),
            (Neighbor(neigh), Provision) => gw.add_neighbor(neigh),
            (Neighbor(neigh), Deprovision) => gw.delete_neighbor(neigh),
        }
    }

    /// Apply every entry in order; never stops early
    #[instrument(skip(self, entries, mode), fields(entries = entries.len()))]
    pub fn apply(&mut self, entries: &[EntryPrimitives], mode: ReconcileMode) -> ReconcileReport {
        let mut report = ReconcileReport::new(mode);

        for entry in entries {
            for warning in &entry.warnings {
                warn!(entry = %entry.label, "{}", warning);
            }

            for primitive in &entry.primitives {
                info!("{} {} for {}", mode.verb(), primitive.kind(), entry.label);
                match self.dispatch(primitive, mode) {
                    Ok(()) => report.applied += 1,
                    Err(err) if mode.is_settled(&err) => {
                        debug!(primitive = %primitive, error = %err, "Already {}", mode.settled_state());
                        report.settled += 1;
                    }
                    Err(err) => {
                        warn!(
                            entry = %entry.label,
                            primitive = %primitive,
                            error = %err,
                            "{} {} failed",
                            mode.verb(),
                            primitive.kind()
                        );
                        report.failures.push(PrimitiveFailure {
                            entry: entry.label.to_string(),
                            primitive: primitive.clone(),
                            error: err,
                        });
                    }
                }
            }
        }

        info!(
            applied = report.applied,
            settled = report.settled,
            failed = report.failures.len(),
            "Reconciliation pass complete"
        );
        report
    }
}
