//! Naming - Physical resource names derived from server keys
//!
//! Every per-server resource name is `name(base, key)`. For a fixed base the
//! function is injective, so unique server keys always yield unique names.

use std::sync::LazyLock;

use regex::Regex;

/// Cluster shared by all servers
pub const CLUSTER_NAME: &str = "minecraft";
pub const SERVICE_BASE: &str = "minecraft-server";
pub const TASK_DEFINITION_BASE: &str = "minecraft-task";
pub const TASK_ROLE_BASE: &str = "minecraft-task-role";
pub const EXECUTION_ROLE_BASE: &str = "minecraft-execution-role";
pub const SERVER_CONTAINER_BASE: &str = "minecraft-server";
pub const WATCHDOG_CONTAINER_BASE: &str = "minecraft-ecsfargate-watchdog";
pub const VOLUME_BASE: &str = "minecraft-data";
pub const CONTROL_POLICY_BASE: &str = "minecraft-control";
pub const DNS_POLICY_BASE: &str = "minecraft-dns";
pub const STORAGE_POLICY_BASE: &str = "minecraft-efs-rw";
pub const LOG_GROUP_BASE: &str = "minecraft-logs";

const MAX_KEY_LEN: usize = 63;

static DNS_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    // Lowercase only: keys double as DNS labels and resource name suffixes
    Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").expect("valid regex")
});

/// Derive the physical name of a per-server resource
pub fn name(base: &str, key: &str) -> String {
    format!("{}-{}", base, key)
}

/// Hostname the watchdog publishes for a server, in the lowercase form
/// Route 53 uses for normalized record names
pub fn hostname(key: &str, domain: &str) -> String {
    format!("{}.{}", key, domain.trim_end_matches('.')).to_ascii_lowercase()
}

/// Check that a server key is usable as both a DNS label and a name suffix
pub fn validate_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("key must not be empty".to_string());
    }
    if key.len() > MAX_KEY_LEN {
        return Err(format!(
            "key must be at most {} characters, got {}",
            MAX_KEY_LEN,
            key.len()
        ));
    }
    if !DNS_LABEL.is_match(key) {
        return Err(
            "key must contain only lowercase letters, digits and inner hyphens".to_string(),
        );
    }
    Ok(())
}
