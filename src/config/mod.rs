//! Deployment-wide configuration bundle.
//!
//! One immutable value holding everything a prediction needs: the shared
//! access-security tables, the gateway interface topology, and the PV
//! ownership map. Constructed once at process start and passed by reference
//! into every evaluation call; reloading is constructing a new value.

use std::path::Path;

use crate::error::Result;
use crate::model::AccessSecurityConfig;
use crate::subnet::InterfaceConfig;
use crate::topology::TopologyMap;

/// Everything the predictor needs to know about the deployed environment
#[derive(Debug)]
pub struct NetworkConfig {
    pub access: AccessSecurityConfig,
    pub interfaces: InterfaceConfig,
    pub topology: TopologyMap,
}

impl NetworkConfig {
    pub fn new(
        access: AccessSecurityConfig,
        interfaces: InterfaceConfig,
        topology: TopologyMap,
    ) -> Self {
        Self {
            access,
            interfaces,
            topology,
        }
    }

    /// Load every table from its deployment artifact
    pub fn load(
        access_file: impl AsRef<Path>,
        interface_file: impl AsRef<Path>,
        ioc_data_root: impl AsRef<Path>,
        iocmanager_pattern: &str,
    ) -> Result<Self> {
        Ok(Self::new(
            AccessSecurityConfig::from_yaml_file(access_file)?,
            InterfaceConfig::from_file(interface_file)?,
            TopologyMap::load(ioc_data_root, iocmanager_pattern)?,
        ))
    }
}
