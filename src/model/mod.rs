//! Rule model for the gateway access oracle
//!
//! Immutable, parsed representations of one gateway network's pvlist matches,
//! the shared access-security file, and the PV snapshot records the oracle
//! reasons about.

mod access;
mod pvinfo;
mod pvlist;
mod security;

pub use access::{AccessBehavior, Permission};
pub use pvinfo::{PVInfo, TIMEOUT_ERROR};
pub use pvlist::{
    file_matches_subnet, is_deprecated_pvlist, pvlist_stem, GatewayMatchSet, PvlistMatch,
    RuleCommand,
};
pub use security::{AccessGroup, AccessSecurityConfig, HostGroup, PermissionRule};
