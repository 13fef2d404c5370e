//! Guest address announcer
//!
//! Lifecycle hook run by a virtualization host when a guest domain starts or
//! stops. On `post-start` it makes the guest's addresses reachable on a host
//! interface by installing policy routing rules, routes and static neighbor
//! entries; on `post-stop` it removes the same objects.
//!
//! # NIST 800-53 Rev 5 Control Mappings
//!
//! | Control | Description | Implementation |
//! |---------|-------------|----------------|
//! | AC-3 | Access Enforcement | Kernel netlink requires CAP_NET_ADMIN |
//! | AU-12 | Audit Record Generation | Every kernel call logged |
//! | CM-6 | Configuration Settings | Per-domain JSON document |
//! | SC-7 | Boundary Protection | Per-guest policy routing table |
//! | SI-10 | Input Validation | Addresses and MAC validated before use |
//! | SI-11 | Error Handling | Structured error types |
//!
//! # Pipeline
//!
//! ```text
//! DomainDocument -> DomainConfig -> PrimitiveBuilder -> Reconciler -> RoutingGateway
//!  (config)          (model)        (primitives)       (reconciler)   (netlink)
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod hook;
pub mod link_local;
pub mod model;
pub mod netlink;
pub mod primitives;
pub mod reconciler;

pub use config::{load_domain, DomainDocument, DEFAULT_CONFIG_DIR};
pub use error::{AnnounceError, Result};
pub use gateway::{DryRunGateway, GatewayError, RoutingGateway};
pub use hook::{execute, plan, HookPhase};
pub use model::{AddressEntry, ConfigWarning, DeclaredFamily, DomainConfig, SubnetEntry};
pub use netlink::{interface_index, NetlinkGateway};
pub use primitives::{
    EntryPrimitives, NeighborSpec, PrimitiveBuilder, RouteSpec, RoutingPrimitive, RuleSelector,
    RuleSpec,
};
pub use reconciler::{PrimitiveFailure, ReconcileMode, ReconcileReport, Reconciler};
