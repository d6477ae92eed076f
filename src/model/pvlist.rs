//! Pvlist match model: rule commands, per-file matches, match sets.
//!
//! Pvlist syntax parsing happens upstream; this module only consumes matches
//! that were already resolved against a PV name, one ordered list per pvlist
//! file. The command is decided once, when the match is produced, so the rest
//! of the engine branches on a closed set of variants instead of strings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// One pvlist directive as it applies to a matched PV name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum RuleCommand {
    /// ALLOW, optionally tied to an access-security group
    Allow {
        #[serde(default)]
        access_group: Option<String>,
    },
    /// Unconditional DENY: the PV looks nonexistent through this instance
    Deny,
    /// DENY FROM a specific client host
    DenyFrom { host: String },
}

impl RuleCommand {
    /// Decide the command variant from a raw pvlist command string.
    ///
    /// Anything outside the closed ALLOW/DENY/DENY FROM set is a
    /// configuration contract violation, never guessed around.
    pub fn parse(command: &str, access_group: Option<String>) -> Result<Self> {
        match command.trim() {
            "ALLOW" => Ok(RuleCommand::Allow { access_group }),
            "DENY" => Ok(RuleCommand::Deny),
            other => {
                if let Some(host) = other.strip_prefix("DENY FROM ") {
                    let host = host.trim();
                    if !host.is_empty() {
                        return Ok(RuleCommand::DenyFrom {
                            host: host.to_string(),
                        });
                    }
                }
                Err(GatewayError::unknown_command(other))
            }
        }
    }
}

/// The effect of one matching pvlist line for a given PV name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PvlistMatch {
    /// Pvlist file the line came from; identifies the gateway instance
    pub file: PathBuf,
    pub command: RuleCommand,
}

impl PvlistMatch {
    pub fn new<P: Into<PathBuf>>(file: P, command: RuleCommand) -> Self {
        Self {
            file: file.into(),
            command,
        }
    }
}

/// All pvlist matches for one PV name, grouped per gateway instance file.
///
/// Within a file, matches keep their file order; the last applicable line
/// wins. Files iterate in a stable path order so predictions are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayMatchSet {
    pvname: String,
    by_file: BTreeMap<PathBuf, Vec<PvlistMatch>>,
}

impl GatewayMatchSet {
    pub fn new<S: Into<String>>(pvname: S) -> Self {
        Self {
            pvname: pvname.into(),
            by_file: BTreeMap::new(),
        }
    }

    pub fn pvname(&self) -> &str {
        &self.pvname
    }

    /// Append a match, preserving file order within its pvlist file
    pub fn push(&mut self, m: PvlistMatch) {
        self.by_file.entry(m.file.clone()).or_default().push(m);
    }

    /// Pvlist files that matched this PV, in stable order
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.by_file.keys().map(PathBuf::as_path)
    }

    pub fn is_empty(&self) -> bool {
        self.by_file.is_empty()
    }

    /// The authoritative match in `file` for a specific client host.
    ///
    /// An explicit `DENY FROM` naming the client wins regardless of its
    /// position in the file. Among the remaining lines, later ones override
    /// earlier ones; `DENY FROM` lines naming other hosts are transparent.
    /// `None` means no line in the file applies to this client at all.
    pub fn authoritative_for(&self, file: &Path, client_host: &str) -> Option<&PvlistMatch> {
        let matches = self.by_file.get(file)?;
        if let Some(denial) = matches.iter().find(
            |m| matches!(&m.command, RuleCommand::DenyFrom { host } if host == client_host),
        ) {
            return Some(denial);
        }
        matches
            .iter()
            .rev()
            .find(|m| !matches!(m.command, RuleCommand::DenyFrom { .. }))
    }
}

/// Basename of a pvlist file with its extension stripped
pub fn pvlist_stem(file: &Path) -> &str {
    file.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("")
}

/// Deprecated/backup copies are named with an `old` suffix and must never
/// affect a decision. The marker may sit on the stem (`xpp-pvlist-old.txt`)
/// or be the extension itself (`mfx.pvlist.old`).
pub fn is_deprecated_pvlist(file: &Path) -> bool {
    let extension = file.extension().and_then(|ext| ext.to_str());
    extension == Some("old") || pvlist_stem(file).ends_with("old")
}

/// Pvlist files are attributed to a subnet by basename prefix convention
pub fn file_matches_subnet(file: &Path, subnet: &str) -> bool {
    file.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with(subnet))
        .unwrap_or(false)
}
