//! Compute cluster and the shared game-port security group

use std::collections::BTreeSet;

use log::debug;

use crate::edition::Edition;
use crate::error::TopologyError;
use crate::naming::CLUSTER_NAME;
use crate::provisioners::network::SharedNetwork;
use crate::provisioners::storage::SharedStorage;
use crate::resource::{Resource, ResourceId, Value};
use crate::topology::Topology;

pub const SECURITY_GROUP_NAME: &str = "minecraft-server-sg";
pub const CAPACITY_PROVIDERS: [&str; 2] = ["FARGATE", "FARGATE_SPOT"];
/// NFS grant from the service group to the file system group
pub const STORAGE_INGRESS_NAME: &str = "minecraft-server-efs-ingress";

#[derive(Debug, Clone, PartialEq)]
pub struct ComputeCluster {
    pub cluster: ResourceId,
    /// Shared by every server service
    pub security_group: ResourceId,
}

impl ComputeCluster {
    pub fn provision(
        topology: &mut Topology,
        network: &SharedNetwork,
    ) -> Result<Self, TopologyError> {
        let cluster = topology.add_shared(
            Resource::new("ecs.cluster", CLUSTER_NAME)
                .with_attribute("cluster_name", CLUSTER_NAME)
                .with_attribute("vpc_id", network.vpc.attr("id"))
                .with_attribute("capacity_providers", Value::strings(CAPACITY_PROVIDERS))
                .with_attribute("container_insights", false),
        )?;

        let security_group = topology.add_shared(
            Resource::new("ec2.security_group", SECURITY_GROUP_NAME)
                .with_attribute("vpc_id", network.vpc.attr("id"))
                .with_attribute("description", "Game port access for all servers"),
        )?;

        debug!("Cluster: {} with {}", cluster, security_group);

        Ok(Self {
            cluster,
            security_group,
        })
    }

    /// Game-port ingress for an edition, open to all addresses
    pub fn ingress_rule(&self, edition: Edition) -> Resource {
        let config = edition.config();
        Resource::new(
            "ec2.security_group_ingress",
            format!("{}-{}", SECURITY_GROUP_NAME, edition.tag()),
        )
        .with_attribute("group_id", self.security_group.attr("id"))
        .with_attribute("cidr_ip", "0.0.0.0/0")
        .with_attribute("ip_protocol", config.protocol.as_str())
        .with_attribute("from_port", config.port)
        .with_attribute("to_port", config.port)
        .with_attribute("description", format!("{} edition game port", edition))
    }

    /// Mount access for every service. All services share one group, so a
    /// single rule covers them.
    pub fn storage_ingress(&self, storage: &SharedStorage) -> Resource {
        storage.allow_mount_from(STORAGE_INGRESS_NAME, &self.security_group)
    }

    /// Every task that runs in this cluster
    pub fn task_arn_pattern(region: &str, account: &str) -> String {
        format!("arn:aws:ecs:{}:{}:task/{}/*", region, account, CLUSTER_NAME)
    }

    /// Game-port ingress rules currently in the topology
    pub fn ingress_rules<'a>(&'a self, topology: &'a Topology) -> Vec<&'a Resource> {
        let group = self.security_group.attr("id");
        topology
            .of_type("ec2.security_group_ingress")
            .filter(|r| r.get("group_id") == Some(&group))
            .collect()
    }
}

/// Ingress rules that have already been added.
///
/// Threaded through the server fold so each edition gets exactly one rule,
/// and the storage grant exactly one, no matter how many servers need them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngressLedger {
    admitted: BTreeSet<Edition>,
    storage_granted: bool,
}

impl IngressLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an edition. Returns true the first time it is seen.
    pub fn admit(&mut self, edition: Edition) -> bool {
        self.admitted.insert(edition)
    }

    /// Record the storage grant. Returns true only on the first call.
    pub fn grant_storage(&mut self) -> bool {
        !std::mem::replace(&mut self.storage_granted, true)
    }

    pub fn len(&self) -> usize {
        self.admitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.admitted.is_empty()
    }
}
