//! Shared network file system
//!
//! One file system and one access point serve every server. Mount rights are
//! only granted to callers that present this access point.

use log::debug;

use crate::error::TopologyError;
use crate::policy::PolicyStatement;
use crate::provisioners::network::SharedNetwork;
use crate::resource::{Resource, ResourceId, Value};
use crate::topology::Topology;

pub const FILE_SYSTEM_NAME: &str = "minecraft-efs";
pub const ACCESS_POINT_NAME: &str = "minecraft-efs-ap";
pub const SECURITY_GROUP_NAME: &str = "minecraft-efs-sg";
pub const ACCESS_POINT_PATH: &str = "/minecraft";
pub const POSIX_ID: &str = "1000";
pub const ACCESS_POINT_PERMISSIONS: &str = "0755";
/// Default NFS port of the file system
pub const NFS_PORT: u16 = 2049;

pub const READ_WRITE_ACTIONS: [&str; 3] = [
    "elasticfilesystem:ClientMount",
    "elasticfilesystem:ClientWrite",
    "elasticfilesystem:DescribeFileSystems",
];

#[derive(Debug, Clone, PartialEq)]
pub struct SharedStorage {
    pub file_system: ResourceId,
    pub access_point: ResourceId,
    pub security_group: ResourceId,
}

impl SharedStorage {
    pub fn provision(
        topology: &mut Topology,
        network: &SharedNetwork,
    ) -> Result<Self, TopologyError> {
        let security_group = topology.add_shared(
            Resource::new("ec2.security_group", SECURITY_GROUP_NAME)
                .with_attribute("vpc_id", network.vpc.attr("id"))
                .with_attribute("description", "Shared file system for game servers"),
        )?;

        // Snapshot on delete: world data outlives the stack
        let file_system = topology.add_shared(
            Resource::new("efs.file_system", FILE_SYSTEM_NAME)
                .with_attribute("vpc_id", network.vpc.attr("id"))
                .with_attribute("security_group", security_group.attr("id"))
                .with_attribute("encrypted", true)
                .with_attribute("removal_policy", "snapshot"),
        )?;

        let access_point = topology.add_shared(
            Resource::new("efs.access_point", ACCESS_POINT_NAME)
                .with_attribute("file_system_id", file_system.attr("id"))
                .with_attribute("path", ACCESS_POINT_PATH)
                .with_attribute(
                    "posix_user",
                    Value::map([
                        ("uid", Value::from(POSIX_ID)),
                        ("gid", Value::from(POSIX_ID)),
                    ]),
                )
                .with_attribute(
                    "create_acl",
                    Value::map([
                        ("owner_uid", Value::from(POSIX_ID)),
                        ("owner_gid", Value::from(POSIX_ID)),
                        ("permissions", Value::from(ACCESS_POINT_PERMISSIONS)),
                    ]),
                ),
        )?;

        debug!("Storage: {} via {}", file_system, access_point);

        Ok(Self {
            file_system,
            access_point,
            security_group,
        })
    }

    /// Read-write access, valid only through this access point
    pub fn read_write_statement(&self) -> PolicyStatement {
        PolicyStatement::allow(READ_WRITE_ACTIONS)
            .on(self.file_system.attr("arn"))
            .when(
                "StringEquals",
                "elasticfilesystem:AccessPointArn",
                self.access_point.attr("arn"),
            )
    }

    /// Ingress on the NFS port from another security group
    pub fn allow_mount_from(
        &self,
        name: impl Into<String>,
        source_group: &ResourceId,
    ) -> Resource {
        Resource::new("ec2.security_group_ingress", name)
            .with_attribute("group_id", self.security_group.attr("id"))
            .with_attribute("source_security_group_id", source_group.attr("id"))
            .with_attribute("ip_protocol", "tcp")
            .with_attribute("from_port", NFS_PORT)
            .with_attribute("to_port", NFS_PORT)
    }
}
