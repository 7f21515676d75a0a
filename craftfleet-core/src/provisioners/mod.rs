//! Provisioners - Builders for each part of the topology
//!
//! Shared infrastructure is provisioned once; `tenant` builds one isolated
//! subgraph per server on top of it.

pub mod cluster;
pub mod maintenance;
pub mod network;
pub mod notification;
pub mod storage;
pub mod tenant;

use crate::config::StackConfig;
use crate::resolver::ResolvedParameter;
use crate::resource::{Resource, ResourceId};

/// Rendered in ARNs when no account id is configured
pub const ACCOUNT_PLACEHOLDER: &str = "${AWS::AccountId}";

pub const LOOKUP_TYPE: &str = "ssm.parameter_lookup";

/// Account id used in ARNs
pub fn account(config: &StackConfig) -> String {
    config
        .account_id
        .clone()
        .unwrap_or_else(|| ACCOUNT_PLACEHOLDER.to_string())
}

pub fn lookup_id(parameter: &ResolvedParameter) -> ResourceId {
    ResourceId::new(LOOKUP_TYPE, parameter.key.to_string())
}

/// Read-only node recording a cross-stack value captured at build time
pub fn parameter_lookup(parameter: &ResolvedParameter) -> Resource {
    Resource::new(LOOKUP_TYPE, parameter.key.to_string())
        .with_attribute("parameter_name", parameter.key.name.as_str())
        .with_attribute("region", parameter.key.region.as_str())
        .with_attribute("value", parameter.value.as_str())
        .with_read_only(true)
}
