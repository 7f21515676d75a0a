//! Shared virtual network

use log::debug;

use crate::config::NetworkSource;
use crate::error::TopologyError;
use crate::resource::{Resource, ResourceId};
use crate::topology::Topology;

pub const VPC_NAME: &str = "minecraft-vpc";

#[derive(Debug, Clone, PartialEq)]
pub struct SharedNetwork {
    pub vpc: ResourceId,
}

impl SharedNetwork {
    /// Create a public-subnet-only VPC, or look up an existing one
    pub fn provision(
        topology: &mut Topology,
        source: &NetworkSource,
    ) -> Result<Self, TopologyError> {
        let resource = match source {
            NetworkSource::Create => Resource::new("ec2.vpc", VPC_NAME)
                .with_attribute("max_azs", 3u32)
                .with_attribute("nat_gateways", 0u32)
                .with_attribute("subnet_type", "public"),
            NetworkSource::Existing(vpc_id) => Resource::new("ec2.vpc", VPC_NAME)
                .with_attribute("vpc_id", vpc_id.as_str())
                .with_read_only(true),
        };
        debug!("Network: {:?}", source);
        let vpc = topology.add_shared(resource)?;
        Ok(Self { vpc })
    }
}
