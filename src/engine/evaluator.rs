//! Access-group evaluation for a single client host.

use tracing::debug;

use crate::model::{AccessBehavior, AccessGroup, AccessSecurityConfig};

/// Compute the behavior one access group grants a client host.
///
/// `None` is the default group: an ALLOW with no access group attached is
/// read-only for everyone. Otherwise evaluation starts from the
/// nothing-granted floor (`Disconnected`, so a group that grants nothing
/// looks absent rather than actively denied) and considers every rule in
/// file order. Rules are cumulative: a later, broader grant can raise the
/// result but nothing can revoke an earlier grant.
///
/// The result is always one of `Disconnected`, `Read` or `Write`; the
/// terminal outcomes are assigned by the caller, never here.
pub fn evaluate_access(
    config: &AccessSecurityConfig,
    group: Option<&AccessGroup>,
    hostname: &str,
) -> AccessBehavior {
    let Some(group) = group else {
        return AccessBehavior::Read;
    };

    let mut behavior = AccessBehavior::Disconnected;
    for rule in &group.rules {
        let applies = match &rule.hosts {
            None => true,
            Some(host_groups) => config.host_in_groups(hostname, host_groups),
        };
        if applies {
            behavior = behavior.promote(rule.permission.as_behavior());
        }
    }
    debug!(group = %group.name, host = %hostname, %behavior, "evaluated access group");
    behavior
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::model::{Permission, PermissionRule};

    fn unconditional(permission: Permission) -> PermissionRule {
        PermissionRule {
            permission,
            hosts: None,
        }
    }

    fn restricted(permission: Permission, groups: &[&str]) -> PermissionRule {
        PermissionRule {
            permission,
            hosts: Some(groups.iter().map(|s| s.to_string()).collect()),
        }
    }

    fn config_with(rules: Vec<PermissionRule>) -> AccessSecurityConfig {
        AccessSecurityConfig::from_parts(
            HashMap::from([("GRP".to_string(), rules)]),
            HashMap::from([(
                "mfx-hosts".to_string(),
                vec!["mfx-control".to_string(), "mfx-console".to_string()],
            )]),
        )
    }

    fn evaluate(config: &AccessSecurityConfig, hostname: &str) -> AccessBehavior {
        evaluate_access(config, config.group("GRP"), hostname)
    }

    #[test]
    fn test_default_group_is_read_only() {
        let config = AccessSecurityConfig::default();
        assert_eq!(
            evaluate_access(&config, None, "anyhost"),
            AccessBehavior::Read
        );
    }

    #[test]
    fn test_single_unconditional_read() {
        let config = config_with(vec![unconditional(Permission::Read)]);
        assert_eq!(evaluate(&config, "anyhost"), AccessBehavior::Read);
        assert_eq!(evaluate(&config, "mfx-control"), AccessBehavior::Read);
    }

    #[test]
    fn test_restricted_write_promotes_members_only() {
        let config = config_with(vec![
            unconditional(Permission::Read),
            restricted(Permission::Write, &["mfx-hosts"]),
        ]);
        assert_eq!(evaluate(&config, "mfx-control"), AccessBehavior::Write);
        assert_eq!(evaluate(&config, "anyhost"), AccessBehavior::Read);
    }

    #[test]
    fn test_empty_group_looks_disconnected() {
        let config = config_with(vec![]);
        assert_eq!(evaluate(&config, "anyhost"), AccessBehavior::Disconnected);
    }

    #[test]
    fn test_later_rules_never_revoke() {
        // WRITE first, then a narrower READ: the grant must not drop
        let config = config_with(vec![
            restricted(Permission::Write, &["mfx-hosts"]),
            unconditional(Permission::Read),
        ]);
        assert_eq!(evaluate(&config, "mfx-control"), AccessBehavior::Write);
    }

    #[test]
    fn test_promotion_monotonicity() {
        let base = config_with(vec![unconditional(Permission::Read)]);
        let widened = config_with(vec![
            unconditional(Permission::Read),
            restricted(Permission::Write, &["mfx-hosts"]),
        ]);

        // Adding a higher grant for a member never decreases its behavior
        assert!(evaluate(&widened, "mfx-control") >= evaluate(&base, "mfx-control"));
        // And never changes an unrelated host's behavior
        assert_eq!(evaluate(&widened, "anyhost"), evaluate(&base, "anyhost"));
    }

    #[test]
    fn test_idempotence() {
        let config = config_with(vec![
            unconditional(Permission::Read),
            restricted(Permission::Write, &["mfx-hosts"]),
        ]);
        let first = evaluate(&config, "mfx-console");
        let second = evaluate(&config, "mfx-console");
        assert_eq!(first, second);
    }
}
