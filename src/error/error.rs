//! Error types and handling for the gateway access oracle

use thiserror::Error;

/// Result type alias for oracle operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Main error type for the gateway access oracle
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Two or more gateway instances on the same subnet claim authority
    /// over the same PV
    #[error("Ambiguous gateway configuration for {pvname}: {detail}")]
    AmbiguousConfig { pvname: String, detail: String },

    /// A pvlist rule command the evaluator does not understand
    #[error("Unknown pvlist rule command: {command:?}")]
    UnknownRuleCommand { command: String },

    /// The PV is not present in any known IOC's PV list
    #[error("PV {pvname} has no known owning host")]
    UnresolvedPv { pvname: String },

    /// Host or address outside the known network topology
    #[error("Subnet resolution error: {message}")]
    SubnetResolution { message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic errors
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an ambiguous-configuration error
    pub fn ambiguous<S: Into<String>>(pvname: S, detail: S) -> Self {
        Self::AmbiguousConfig {
            pvname: pvname.into(),
            detail: detail.into(),
        }
    }

    /// Create an unknown-rule-command error
    pub fn unknown_command<S: Into<String>>(command: S) -> Self {
        Self::UnknownRuleCommand {
            command: command.into(),
        }
    }

    /// Create an unresolved-PV error
    pub fn unresolved_pv<S: Into<String>>(pvname: S) -> Self {
        Self::UnresolvedPv {
            pvname: pvname.into(),
        }
    }

    /// Create a subnet resolution error
    pub fn subnet<S: Into<String>>(message: S) -> Self {
        Self::SubnetResolution {
            message: message.into(),
        }
    }

    /// Get the error category for logging/metrics
    pub fn category(&self) -> &'static str {
        match self {
            GatewayError::Config { .. } => "config",
            GatewayError::AmbiguousConfig { .. } => "ambiguous_config",
            GatewayError::UnknownRuleCommand { .. } => "unknown_rule_command",
            GatewayError::UnresolvedPv { .. } => "unresolved_pv",
            GatewayError::SubnetResolution { .. } => "subnet_resolution",
            GatewayError::Io(_) => "io",
            GatewayError::Serde(_) => "serialization",
            GatewayError::Yaml(_) => "yaml",
            GatewayError::Internal(_) => "internal",
        }
    }
}
