//! Error types for guest-announcer
//!
//! Every variant except [`AnnounceError::Reconcile`] aborts the invocation
//! before the first kernel mutation. Per-primitive kernel failures are
//! collected by the reconciler and only surface here as a summary.

use announcer_types::ParseError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can end a hook invocation.
#[derive(Debug, Error)]
pub enum AnnounceError {
    /// Configuration document missing or unreadable
    #[error("Failed to load configuration {}: {source}", path.display())]
    ConfigLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration document is not valid JSON for the expected schema
    #[error("Failed to parse configuration {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Domain identifier cannot name a configuration file
    #[error("Invalid domain identifier '{0}'")]
    InvalidDomain(String),

    /// MAC address field is not a valid EUI-48 string
    #[error("Invalid MAC address: {0}")]
    InvalidMac(#[source] ParseError),

    /// Address or network field is not valid CIDR notation
    #[error("Invalid CIDR in {field}: {source}")]
    InvalidCidr {
        field: String,
        #[source]
        source: ParseError,
    },

    /// Subnet next-hop is not a valid IP address
    #[error("Invalid next hop '{value}' in {field}")]
    InvalidNextHop { field: String, value: String },

    /// Lifecycle action argument is not one of the known phases
    #[error("Unrecognized action '{0}' (expected pre-start, post-start, pre-stop or post-stop)")]
    UnrecognizedAction(String),

    /// Host interface named by the configuration does not exist
    #[error("Interface not found: {name}")]
    InterfaceNotFound { name: String },

    /// Netlink socket could not be opened or used
    #[error("Netlink error: {0}")]
    Netlink(String),

    /// One or more primitives failed during reconciliation
    #[error("{failed} of {total} routing primitives failed")]
    Reconcile { failed: usize, total: usize },
}

impl AnnounceError {
    /// Process exit code for this error.
    ///
    /// Usage errors exit with 2, every other failure with 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            AnnounceError::UnrecognizedAction(_) => 2,
            _ => 1,
        }
    }
}

/// Result type alias for guest-announcer operations
pub type Result<T> = std::result::Result<T, AnnounceError>;
