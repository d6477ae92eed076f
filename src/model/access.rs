//! Access level ordering, promotion and demotion.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Observable access outcome for one PV through one gateway instance.
///
/// Ordered by ascending privilege so that promotion and demotion are plain
/// `max`/`min`. `Ambiguous` and `NoAccess` are terminal outcomes that are
/// assigned explicitly by the predictor; normal rule evaluation never
/// promotes into them.
#[repr(u8)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessBehavior {
    Ambiguous = 0,
    NoAccess = 1,
    Disconnected = 2,
    Read = 3,
    Write = 4,
}

impl AccessBehavior {
    /// Canonical name, matching the Channel-Access access-rights wording
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessBehavior::Ambiguous => "AMBIGUOUS",
            AccessBehavior::NoAccess => "NO_ACCESS",
            AccessBehavior::Disconnected => "DISCONNECTED",
            AccessBehavior::Read => "READ",
            AccessBehavior::Write => "WRITE",
        }
    }

    /// Raise to `other` if it grants more access
    pub fn promote(self, other: AccessBehavior) -> AccessBehavior {
        self.max(other)
    }

    /// Lower to `other` if it grants less access
    pub fn demote(self, other: AccessBehavior) -> AccessBehavior {
        self.min(other)
    }
}

impl fmt::Display for AccessBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessBehavior {
    type Err = GatewayError;

    /// Interpret an access-rights string as reported over Channel Access.
    ///
    /// Composite write grants render as `WRITE|READ`, so any string leading
    /// with `WRITE` counts as write access.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AMBIGUOUS" => Ok(AccessBehavior::Ambiguous),
            "NO_ACCESS" => Ok(AccessBehavior::NoAccess),
            "DISCONNECTED" => Ok(AccessBehavior::Disconnected),
            "READ" => Ok(AccessBehavior::Read),
            "WRITE" => Ok(AccessBehavior::Write),
            other if other.starts_with("WRITE") => Ok(AccessBehavior::Write),
            other => Err(GatewayError::config(format!(
                "could not interpret {other:?} as an access behavior"
            ))),
        }
    }
}

/// Permission level granted by one access-security rule.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Permission {
    None,
    Read,
    Write,
}

impl Permission {
    /// The behavior this permission promotes a channel to.
    ///
    /// A rule granting `NONE` leaves the channel looking disconnected rather
    /// than actively denied.
    pub fn as_behavior(&self) -> AccessBehavior {
        match self {
            Permission::None => AccessBehavior::Disconnected,
            Permission::Read => AccessBehavior::Read,
            Permission::Write => AccessBehavior::Write,
        }
    }
}
