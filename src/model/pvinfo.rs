//! PV snapshot records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error marker used when a Channel-Access read timed out
pub const TIMEOUT_ERROR: &str = "timeout";

/// One snapshot of a PV as seen from a specific vantage point, either
/// directly from the IOC or through a gateway.
///
/// Created fresh per comparison and never mutated after construction. The
/// access field keeps the wire string form (`READ`, `WRITE|READ`, ...) so
/// observed and predicted records diff cleanly field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PVInfo {
    pub name: String,
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub data_count: Option<u64>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub time_md: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub control_md: Option<BTreeMap<String, Value>>,
    /// Source address of the server that answered, if any
    #[serde(default)]
    pub address: Option<(String, u16)>,
}

impl PVInfo {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Minimal record for a PV that does not answer
    pub fn timeout<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            error: Some(TIMEOUT_ERROR.to_string()),
            ..Self::default()
        }
    }

    /// Minimal record for an explicit denial; the NO_ACCESS event carries no
    /// data
    pub fn no_access<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            access: Some("NO_ACCESS".to_string()),
            ..Self::default()
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.error.as_deref() == Some(TIMEOUT_ERROR)
    }
}
