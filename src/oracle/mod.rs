//! Oracle reconciliation: what should a gateway client have seen?
//!
//! Combines the network-wide prediction with a ground-truth snapshot taken
//! directly from the IOC to produce the exact record a healthy gateway is
//! expected to return. The comparison against a real gateway observation
//! happens elsewhere.

use tracing::debug;

use crate::engine::GatewayResponseSummary;
use crate::error::{GatewayError, Result};
use crate::model::{AccessBehavior, PVInfo};

/// Produce the `PVInfo` a gateway client should observe, given the IOC-side
/// ground truth and the predicted response summary.
///
/// A gateway can only narrow access relative to the IOC's native
/// permissions, never widen it, so the access field is demoted to the lower
/// of the two. The gateway's own source address is not part of the policy
/// being modeled and is left unset.
pub fn correct_gateway_pvinfo(
    summary: &GatewayResponseSummary,
    pvinfo: &PVInfo,
) -> Result<PVInfo> {
    // A gateway cannot serve a PV the IOC itself does not answer for
    if pvinfo.is_timeout() {
        return Ok(pvinfo.clone());
    }

    match summary.behavior {
        AccessBehavior::Ambiguous => Err(GatewayError::ambiguous(
            summary.pvname.clone(),
            summary.inconsistency_detail(),
        )),
        AccessBehavior::NoAccess => Ok(PVInfo::no_access(&pvinfo.name)),
        AccessBehavior::Disconnected => Ok(PVInfo::timeout(&pvinfo.name)),
        predicted @ (AccessBehavior::Read | AccessBehavior::Write) => {
            let truth_access = pvinfo.access.as_deref().ok_or_else(|| {
                GatewayError::config(format!(
                    "ground truth for {} is connected but has no access level",
                    pvinfo.name
                ))
            })?;
            let truth: AccessBehavior = truth_access.parse()?;
            let demoted = truth.demote(predicted);
            let access = if demoted == AccessBehavior::Write {
                // Write implies read on the wire
                "WRITE|READ".to_string()
            } else {
                demoted.as_str().to_string()
            };
            debug!(pvname = %pvinfo.name, truth = %truth, %predicted, access = %access, "reconciled access");

            Ok(PVInfo {
                name: pvinfo.name.clone(),
                access: Some(access),
                data_type: pvinfo.data_type.clone(),
                data_count: pvinfo.data_count,
                value: pvinfo.value.clone(),
                error: pvinfo.error.clone(),
                time_md: pvinfo.time_md.clone(),
                control_md: pvinfo.control_md.clone(),
                address: None,
            })
        }
    }
}
