//! Network-wide response prediction for one PV and client host.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::NetworkConfig;
use crate::engine::evaluate_access;
use crate::error::{GatewayError, Result};
use crate::model::{
    is_deprecated_pvlist, pvlist_stem, AccessBehavior, GatewayMatchSet, RuleCommand,
};

/// What one gateway instance is expected to answer for one PV and client
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayResponse {
    /// Pvlist file defining the gateway instance
    pub file: PathBuf,
    /// Subnet the pvlist file is attributed to, by basename prefix
    pub subnet: Option<String>,
    /// Gateway host carrying an interface on that subnet
    pub gateway_host: Option<String>,
    pub client_host: String,
    pub pvname: String,
    pub behavior: AccessBehavior,
}

/// The combined network-wide prediction for one PV and client host.
///
/// `subnet_responses` holds the instances on the PV's own subnet; they alone
/// decide the outcome. `other_responses` is kept for diagnostics only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayResponseSummary {
    pub pvname: String,
    pub client_host: String,
    /// Subnet of the host that owns the PV
    pub pv_subnet: String,
    pub behavior: AccessBehavior,
    /// The dominant instance, when exactly one instance answers
    pub chosen: Option<GatewayResponse>,
    pub subnet_responses: Vec<GatewayResponse>,
    pub other_responses: Vec<GatewayResponse>,
}

impl GatewayResponseSummary {
    /// Subnet responses that would actually answer the client
    pub fn connected(&self) -> impl Iterator<Item = &GatewayResponse> {
        self.subnet_responses
            .iter()
            .filter(|response| response.behavior != AccessBehavior::Disconnected)
    }

    /// Short rendering of the connected responses, for inconsistency reports
    pub fn inconsistency_detail(&self) -> String {
        let parts: Vec<String> = self
            .connected()
            .map(|response| format!("{}={}", pvlist_stem(&response.file), response.behavior))
            .collect();
        parts.join(", ")
    }
}

/// Predict how the gateway network should answer `client_host` asking for
/// the match set's PV.
///
/// Every gateway instance with a pvlist match is classified independently;
/// instances on the PV's home subnet are then combined into the overall
/// behavior. Ambiguity (more than one instance claiming authority) is
/// recorded in the summary, not resolved here.
pub fn predict_gateway_response(
    config: &NetworkConfig,
    matches: &GatewayMatchSet,
    client_host: &str,
) -> Result<GatewayResponseSummary> {
    let pvname = matches.pvname();
    let owning_host = config.topology.owning_host(pvname)?;
    let pv_subnet = config.interfaces.subnet_from_hostname(owning_host)?;

    let mut subnet_responses = Vec::new();
    let mut other_responses = Vec::new();

    for file in matches.files() {
        if is_deprecated_pvlist(file) {
            debug!(file = %file.display(), "skipping deprecated pvlist file");
            continue;
        }

        let behavior = match matches.authoritative_for(file, client_host) {
            // No line in the file applies to this client
            None => AccessBehavior::Disconnected,
            Some(m) => match &m.command {
                RuleCommand::DenyFrom { host } if host == client_host => AccessBehavior::NoAccess,
                // A denial of someone else never surfaces as authoritative,
                // but the match must stay exhaustive
                RuleCommand::DenyFrom { .. } => AccessBehavior::Disconnected,
                RuleCommand::Deny => AccessBehavior::Disconnected,
                RuleCommand::Allow { access_group: None } => AccessBehavior::Read,
                RuleCommand::Allow {
                    access_group: Some(group_name),
                } => {
                    let group = config.access.group(group_name).ok_or_else(|| {
                        GatewayError::config(format!(
                            "unknown access group {group_name:?} referenced by {}",
                            file.display()
                        ))
                    })?;
                    evaluate_access(&config.access, Some(group), client_host)
                }
            },
        };

        let subnet = config.interfaces.attributed_subnet(file).map(String::from);
        let gateway_host = subnet
            .as_deref()
            .and_then(|name| config.interfaces.gateway_host_for_subnet(name))
            .map(String::from);
        let response = GatewayResponse {
            file: file.to_path_buf(),
            subnet: subnet.clone(),
            gateway_host,
            client_host: client_host.to_string(),
            pvname: pvname.to_string(),
            behavior,
        };

        if subnet.as_deref() == Some(pv_subnet.as_str()) {
            subnet_responses.push(response);
        } else {
            other_responses.push(response);
        }
    }

    let mut summary = GatewayResponseSummary {
        pvname: pvname.to_string(),
        client_host: client_host.to_string(),
        pv_subnet,
        behavior: AccessBehavior::Disconnected,
        chosen: None,
        subnet_responses,
        other_responses,
    };

    let connected: Vec<GatewayResponse> = summary.connected().cloned().collect();
    match connected.as_slice() {
        [] => {}
        [only] => {
            summary.behavior = only.behavior;
            summary.chosen = Some(only.clone());
        }
        many => {
            // Multiple active instances claim authority over this PV on the
            // same subnet. Reported, never resolved by picking one.
            warn!(
                pvname = %summary.pvname,
                subnet = %summary.pv_subnet,
                instances = many.len(),
                "inconsistent gateway configuration"
            );
            summary.behavior = AccessBehavior::Ambiguous;
        }
    }

    debug!(
        pvname = %summary.pvname,
        client = %summary.client_host,
        behavior = %summary.behavior,
        "predicted gateway response"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::Ipv4Addr;
    use std::path::Path;

    use super::*;
    use crate::model::{AccessSecurityConfig, Permission, PermissionRule, PvlistMatch};
    use crate::subnet::{InterfaceConfig, StaticResolver};
    use crate::topology::TopologyMap;

    const INTERFACES: &str = "\
export MFX_BC=172.21.75.255
export MFX_IF01=172.21.72.10
export XPP_BC=172.21.87.255
export XPP_IF01=172.21.84.10
";

    fn network_config() -> NetworkConfig {
        let access = AccessSecurityConfig::from_parts(
            HashMap::from([(
                "MFX".to_string(),
                vec![
                    PermissionRule {
                        permission: Permission::Read,
                        hosts: None,
                    },
                    PermissionRule {
                        permission: Permission::Write,
                        hosts: Some(vec!["mfx-hosts".to_string()]),
                    },
                ],
            )]),
            HashMap::from([(
                "mfx-hosts".to_string(),
                vec!["mfx-control".to_string(), "mfx-console".to_string()],
            )]),
        );
        let resolver: StaticResolver = [
            ("mfx-ioc01", Ipv4Addr::new(172, 21, 72, 50)),
            ("mfx-control", Ipv4Addr::new(172, 21, 72, 101)),
            ("xpp-control", Ipv4Addr::new(172, 21, 84, 101)),
        ]
        .into_iter()
        .collect();
        let interfaces = InterfaceConfig::parse(INTERFACES)
            .unwrap()
            .with_resolver(Box::new(resolver));
        let topology = TopologyMap::new(
            HashMap::from([("MFX:GATT:01".to_string(), "ioc-mfx-gatt".to_string())]),
            HashMap::from([("ioc-mfx-gatt".to_string(), "mfx-ioc01".to_string())]),
        );
        NetworkConfig::new(access, interfaces, topology)
    }

    fn match_set(entries: &[(&str, RuleCommand)]) -> GatewayMatchSet {
        let mut set = GatewayMatchSet::new("MFX:GATT:01");
        for (file, command) in entries {
            set.push(PvlistMatch::new(Path::new(file), command.clone()));
        }
        set
    }

    #[test]
    fn test_bare_allow_is_read_only() {
        let config = network_config();
        let matches = match_set(&[("mfx-pvlist.txt", RuleCommand::Allow { access_group: None })]);
        let summary = predict_gateway_response(&config, &matches, "xpp-control").unwrap();

        assert_eq!(summary.behavior, AccessBehavior::Read);
        assert_eq!(summary.pv_subnet, "mfx");
        let chosen = summary.chosen.unwrap();
        assert_eq!(chosen.gateway_host.as_deref(), Some("pscag01"));
    }

    #[test]
    fn test_access_group_delegation() {
        let config = network_config();
        let matches = match_set(&[(
            "mfx-pvlist.txt",
            RuleCommand::Allow {
                access_group: Some("MFX".into()),
            },
        )]);

        let control = predict_gateway_response(&config, &matches, "mfx-control").unwrap();
        assert_eq!(control.behavior, AccessBehavior::Write);

        let outsider = predict_gateway_response(&config, &matches, "xpp-control").unwrap();
        assert_eq!(outsider.behavior, AccessBehavior::Read);
    }

    #[test]
    fn test_unknown_access_group_is_config_error() {
        let config = network_config();
        let matches = match_set(&[(
            "mfx-pvlist.txt",
            RuleCommand::Allow {
                access_group: Some("NOPE".into()),
            },
        )]);
        let err = predict_gateway_response(&config, &matches, "mfx-control").unwrap_err();
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_deny_looks_disconnected() {
        let config = network_config();
        let matches = match_set(&[("mfx-pvlist.txt", RuleCommand::Deny)]);
        let summary = predict_gateway_response(&config, &matches, "xpp-control").unwrap();

        assert_eq!(summary.behavior, AccessBehavior::Disconnected);
        assert!(summary.chosen.is_none());
    }

    #[test]
    fn test_deny_from_client_is_no_access() {
        let config = network_config();
        let matches = match_set(&[
            ("mfx-pvlist.txt", RuleCommand::Allow { access_group: None }),
            (
                "mfx-pvlist.txt",
                RuleCommand::DenyFrom {
                    host: "xpp-control".into(),
                },
            ),
        ]);

        let denied = predict_gateway_response(&config, &matches, "xpp-control").unwrap();
        assert_eq!(denied.behavior, AccessBehavior::NoAccess);

        // Another host falls through to the ALLOW
        let allowed = predict_gateway_response(&config, &matches, "mfx-console").unwrap();
        assert_eq!(allowed.behavior, AccessBehavior::Read);
    }

    #[test]
    fn test_deprecated_file_never_contributes() {
        let config = network_config();
        let matches = match_set(&[
            ("mfx-pvlist.txt", RuleCommand::Deny),
            (
                "mfx-pvlist-old.txt",
                RuleCommand::Allow { access_group: None },
            ),
        ]);
        let summary = predict_gateway_response(&config, &matches, "xpp-control").unwrap();

        assert_eq!(summary.behavior, AccessBehavior::Disconnected);
        assert!(summary.subnet_responses.len() == 1);
    }

    #[test]
    fn test_two_connected_instances_are_ambiguous() {
        let config = network_config();
        // Structural inconsistency even though both answers agree
        let matches = match_set(&[
            ("mfx-pvlist.txt", RuleCommand::Allow { access_group: None }),
            (
                "mfx-pvlist2.txt",
                RuleCommand::Allow { access_group: None },
            ),
        ]);
        let summary = predict_gateway_response(&config, &matches, "xpp-control").unwrap();

        assert_eq!(summary.behavior, AccessBehavior::Ambiguous);
        assert!(summary.chosen.is_none());
        assert!(summary.inconsistency_detail().contains("mfx-pvlist"));
    }

    #[test]
    fn test_other_subnet_files_are_diagnostics_only() {
        let config = network_config();
        let matches = match_set(&[
            ("mfx-pvlist.txt", RuleCommand::Deny),
            ("xpp-pvlist.txt", RuleCommand::Allow { access_group: None }),
        ]);
        let summary = predict_gateway_response(&config, &matches, "xpp-control").unwrap();

        // The xpp file would answer, but it is not on the PV's subnet
        assert_eq!(summary.behavior, AccessBehavior::Disconnected);
        assert_eq!(summary.other_responses.len(), 1);
        assert_eq!(summary.other_responses[0].subnet.as_deref(), Some("xpp"));
    }

    #[test]
    fn test_unknown_pv_is_unresolved() {
        let config = network_config();
        let matches = GatewayMatchSet::new("XPP:NOPE");
        let err = predict_gateway_response(&config, &matches, "xpp-control").unwrap_err();
        assert_eq!(err.category(), "unresolved_pv");
    }
}
