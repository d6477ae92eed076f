//! Gateway Oracle - access prediction engine for EPICS Channel-Access
//! gateway networks
//!
//! Given a PV name and a client host identity, this crate deterministically
//! predicts the access level a gateway network should grant, from a
//! declarative rule set: pvlist ALLOW/DENY matches per gateway instance plus
//! a shared access-security file of host groups and permission rules. The
//! prediction is reconciled against an IOC-side ground-truth snapshot to
//! produce the exact record a healthy gateway is expected to return.
//!
//! All evaluation is pure and synchronous over immutable configuration
//! values; the crate performs no Channel-Access I/O itself.

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod oracle;
pub mod report;
pub mod subnet;
pub mod topology;

pub use config::NetworkConfig;
pub use engine::{evaluate_access, predict_gateway_response, GatewayResponse, GatewayResponseSummary};
pub use error::{GatewayError, Result};
pub use model::{AccessBehavior, AccessSecurityConfig, GatewayMatchSet, PVInfo, PvlistMatch, RuleCommand};
pub use oracle::correct_gateway_pvinfo;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
