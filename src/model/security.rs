//! Access-security configuration: host groups, access groups, rules.
//!
//! Loaded once from a structured YAML document at process start and immutable
//! thereafter. Reloading means constructing a new instance.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::model::access::Permission;

/// Named, flat set of hostnames (HAG-style block).
///
/// Membership is flat; any nesting in the source format must be pre-flattened
/// by whatever produced the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostGroup {
    pub name: String,
    pub hosts: HashSet<String>,
}

/// One rule inside an access group.
///
/// `hosts: None` means the rule applies to every client host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRule {
    pub permission: Permission,
    #[serde(default)]
    pub hosts: Option<Vec<String>>,
}

/// Ordered sequence of permission rules (ASG-style block).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGroup {
    pub name: String,
    pub rules: Vec<PermissionRule>,
}

/// The full access-security file: access groups and host groups by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccessSecurityConfig {
    pub groups: HashMap<String, AccessGroup>,
    pub hosts: HashMap<String, HostGroup>,
}

/// On-disk document shape: plain name-keyed maps, names filled in on load.
#[derive(Debug, Deserialize)]
struct RawAccessSecurity {
    #[serde(default)]
    groups: HashMap<String, Vec<PermissionRule>>,
    #[serde(default)]
    hosts: HashMap<String, Vec<String>>,
}

impl AccessSecurityConfig {
    /// Load the access-security configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parse the access-security configuration from a YAML document
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let raw: RawAccessSecurity = serde_yaml::from_str(contents)?;
        Ok(Self::from_parts(raw.groups, raw.hosts))
    }

    /// Build a configuration from already-structured group tables
    pub fn from_parts(
        groups: HashMap<String, Vec<PermissionRule>>,
        hosts: HashMap<String, Vec<String>>,
    ) -> Self {
        let groups = groups
            .into_iter()
            .map(|(name, rules)| {
                let group = AccessGroup {
                    name: name.clone(),
                    rules,
                };
                (name, group)
            })
            .collect();
        let hosts = hosts
            .into_iter()
            .map(|(name, members)| {
                let group = HostGroup {
                    name: name.clone(),
                    hosts: members.into_iter().collect(),
                };
                (name, group)
            })
            .collect();
        Self { groups, hosts }
    }

    /// Look up an access group by name
    pub fn group(&self, name: &str) -> Option<&AccessGroup> {
        self.groups.get(name)
    }

    /// Union of member hostnames across the referenced host groups.
    ///
    /// Unknown host-group references narrow the grant and are reported at
    /// warn level rather than failing the evaluation.
    pub fn hosts_in_groups<'a>(&'a self, group_names: &[String]) -> HashSet<&'a str> {
        let mut members = HashSet::new();
        for name in group_names {
            match self.hosts.get(name) {
                Some(group) => members.extend(group.hosts.iter().map(String::as_str)),
                None => warn!(host_group = %name, "unknown host group reference"),
            }
        }
        members
    }

    /// Is `hostname` a member of any of the referenced host groups?
    pub fn host_in_groups(&self, hostname: &str, group_names: &[String]) -> bool {
        self.hosts_in_groups(group_names).contains(hostname)
    }
}
