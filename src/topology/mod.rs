//! PV to IOC to host topology mapping.
//!
//! Answers "which host serves this PV" from two deployment artifacts: the
//! per-IOC `IOC.pvlist` files under the IOC data tree, and the iocmanager
//! configuration files that pin each IOC to a host.

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{GatewayError, Result};

static IOCMANAGER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"id:.*'(\S+)', host: '(\S+)'").unwrap());

/// Immutable PV/IOC/host lookup tables, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct TopologyMap {
    pv_to_ioc: HashMap<String, String>,
    ioc_to_host: HashMap<String, String>,
}

impl TopologyMap {
    pub fn new(pv_to_ioc: HashMap<String, String>, ioc_to_host: HashMap<String, String>) -> Self {
        Self {
            pv_to_ioc,
            ioc_to_host,
        }
    }

    /// Build the map from an IOC data tree and an iocmanager config glob
    pub fn load<P: AsRef<Path>>(ioc_data_root: P, iocmanager_pattern: &str) -> Result<Self> {
        Ok(Self::new(
            pv_map_from_ioc_data(ioc_data_root.as_ref())?,
            hosts_from_iocmanager(iocmanager_pattern)?,
        ))
    }

    /// IOC serving the given PV
    pub fn ioc_for(&self, pvname: &str) -> Option<&str> {
        self.pv_to_ioc.get(pvname).map(String::as_str)
    }

    /// Host an IOC is deployed on
    pub fn host_for_ioc(&self, iocname: &str) -> Option<&str> {
        self.ioc_to_host.get(iocname).map(String::as_str)
    }

    /// Host that owns (serves) the given PV.
    ///
    /// A PV missing from every IOC pvlist is unresolved; an IOC with no
    /// iocmanager host entry is a configuration inconsistency.
    pub fn owning_host(&self, pvname: &str) -> Result<&str> {
        let ioc = self
            .ioc_for(pvname)
            .ok_or_else(|| GatewayError::unresolved_pv(pvname))?;
        self.host_for_ioc(ioc).ok_or_else(|| {
            GatewayError::config(format!("IOC {ioc} (serving {pvname}) has no known host"))
        })
    }

    pub fn pv_count(&self) -> usize {
        self.pv_to_ioc.len()
    }
}

/// Each line of an `IOC.pvlist` file is `PV[,record_type]`
fn split_rtype(line: &str) -> (&str, &str) {
    match line.split_once(',') {
        Some((pv, rtype)) => (pv, rtype),
        None => (line, "unknown"),
    }
}

/// Scan `<root>/*/iocInfo/IOC.pvlist` and invert to a PV -> IOC map.
///
/// IOC data directories that are symlinks are aliases of another entry and
/// are skipped.
pub fn pv_map_from_ioc_data(root: &Path) -> Result<HashMap<String, String>> {
    let pattern = root.join("*/iocInfo/IOC.pvlist");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| GatewayError::config(format!("non-UTF8 IOC data root {root:?}")))?;

    let mut pv_to_ioc = HashMap::new();
    let paths = glob::glob(pattern)
        .map_err(|err| GatewayError::config(format!("bad IOC data pattern: {err}")))?;
    for entry in paths {
        let pvlist = entry.map_err(|err| GatewayError::config(err.to_string()))?;
        let Some(ioc_dir) = pvlist.parent().and_then(Path::parent) else {
            continue;
        };
        if std::fs::symlink_metadata(ioc_dir)?.file_type().is_symlink() {
            continue;
        }
        let Some(ioc_name) = ioc_dir.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let contents = std::fs::read_to_string(&pvlist)?;
        for line in contents.lines() {
            let (pv, _rtype) = split_rtype(line.trim());
            if !pv.is_empty() {
                pv_to_ioc.insert(pv.to_string(), ioc_name.to_string());
            }
        }
    }
    debug!(pvs = pv_to_ioc.len(), "loaded IOC pvlists");
    Ok(pv_to_ioc)
}

/// Scan iocmanager configuration files for `id: '<ioc>', host: '<host>'`
/// entries.
pub fn hosts_from_iocmanager(pattern: &str) -> Result<HashMap<String, String>> {
    let mut ioc_to_host = HashMap::new();
    let paths = glob::glob(pattern)
        .map_err(|err| GatewayError::config(format!("bad iocmanager pattern: {err}")))?;
    for entry in paths {
        let path = match entry {
            Ok(path) => path,
            Err(err) => {
                warn!(%err, "skipping unreadable iocmanager config");
                continue;
            }
        };
        let contents = std::fs::read_to_string(&path)?;
        for line in contents.lines() {
            if let Some(captures) = IOCMANAGER_LINE.captures(line.trim()) {
                ioc_to_host.insert(captures[1].to_string(), captures[2].to_string());
            }
        }
    }
    Ok(ioc_to_host)
}
