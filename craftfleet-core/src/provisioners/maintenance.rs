//! Maintenance host
//!
//! A launch template for a small spot instance that mounts the shared file
//! system, so world data can be inspected without a running server. Nothing
//! is launched by the stack itself.

use log::debug;

use crate::error::TopologyError;
use crate::policy::PolicyDocument;
use crate::provisioners::network::SharedNetwork;
use crate::provisioners::storage::SharedStorage;
use crate::resource::{Resource, ResourceId, Value};
use crate::topology::Topology;

pub const LAUNCH_TEMPLATE_NAME: &str = "minecraft-maintenance";
pub const SECURITY_GROUP_NAME: &str = "minecraft-maintenance-sg";
pub const ROLE_NAME: &str = "minecraft-maintenance-role";
pub const INSTANCE_PROFILE_NAME: &str = "minecraft-maintenance-profile";
pub const STORAGE_POLICY_NAME: &str = "minecraft-maintenance-efs";
pub const STORAGE_INGRESS_NAME: &str = "minecraft-maintenance-efs-ingress";

pub const INSTANCE_TYPE: &str = "t3.micro";
pub const MACHINE_IMAGE: &str = "amazon-linux-2023";
pub const SSM_MANAGED_POLICY: &str = "arn:aws:iam::aws:policy/AmazonSSMManagedInstanceCore";

pub const MOUNT_POINT: &str = "/mnt/efs";
pub const MOUNT_ATTEMPTS: u32 = 15;
pub const MOUNT_BACKOFF_SECS: u32 = 30;

/// Filled in at deploy time from the referenced resources
pub const FILE_SYSTEM_TOKEN: &str = "{{FILE_SYSTEM_ID}}";
pub const ACCESS_POINT_TOKEN: &str = "{{ACCESS_POINT_ID}}";

const MOUNT_SCRIPT: &str = r#"#!/bin/bash
# Mount the shared Minecraft file system. Failures are retried and never
# terminate the instance.

FILE_SYSTEM_ID="{{FILE_SYSTEM_ID}}"
ACCESS_POINT_ID="{{ACCESS_POINT_ID}}"
REGION="{{REGION}}"
MOUNT_POINT="{{MOUNT_POINT}}"
EFS_CONFIG=/etc/amazon/efs/efs-utils.conf

yum install -y amazon-efs-utils || echo "amazon-efs-utils install failed, falling back to nfs"
mkdir -p "$MOUNT_POINT"

if command -v mount.efs &> /dev/null; then
    FSTAB_ENTRY="$FILE_SYSTEM_ID:/ $MOUNT_POINT efs _netdev,noresvport,tls,iam,accesspoint=$ACCESS_POINT_ID 0 0"
else
    FSTAB_ENTRY="$FILE_SYSTEM_ID.efs.$REGION.amazonaws.com:/ $MOUNT_POINT nfs4 nfsvers=4.1,rsize=1048576,wsize=1048576,hard,timeo=600,retrans=2,noresvport,_netdev 0 0"
fi

if ! grep -qF "$FSTAB_ENTRY" /etc/fstab; then
    echo "$FSTAB_ENTRY" >> /etc/fstab
fi

if [ -f "$EFS_CONFIG" ] && ! grep -q "^\[client-info\]" "$EFS_CONFIG"; then
    printf '\n[client-info]\nsource=minecraft-maintenance\n' >> "$EFS_CONFIG"
fi

attempt=1
until mount -a; do
    if [ "$attempt" -ge {{MOUNT_ATTEMPTS}} ]; then
        echo "Mount failed after $attempt attempts"
        break
    fi
    echo "Mount attempt $attempt failed, retrying in {{MOUNT_BACKOFF_SECS}}s"
    attempt=$((attempt + 1))
    sleep {{MOUNT_BACKOFF_SECS}}
done
"#;

/// Render the boot script for a region. The file system and access point
/// tokens are left in place.
pub fn mount_script(region: &str) -> String {
    MOUNT_SCRIPT
        .replace("{{REGION}}", region)
        .replace("{{MOUNT_POINT}}", MOUNT_POINT)
        .replace("{{MOUNT_ATTEMPTS}}", &MOUNT_ATTEMPTS.to_string())
        .replace("{{MOUNT_BACKOFF_SECS}}", &MOUNT_BACKOFF_SECS.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaintenanceHost {
    pub launch_template: ResourceId,
    pub security_group: ResourceId,
    pub role: ResourceId,
    pub instance_profile: ResourceId,
    pub storage_policy: ResourceId,
    pub storage_ingress: ResourceId,
}

impl MaintenanceHost {
    pub fn provision(
        topology: &mut Topology,
        network: &SharedNetwork,
        storage: &SharedStorage,
        region: &str,
    ) -> Result<Self, TopologyError> {
        let security_group = topology.add_shared(
            Resource::new("ec2.security_group", SECURITY_GROUP_NAME)
                .with_attribute("vpc_id", network.vpc.attr("id"))
                .with_attribute("description", "Maintenance host"),
        )?;

        let role = topology.add_shared(
            Resource::new("iam.role", ROLE_NAME)
                .with_attribute("assumed_by", "ec2.amazonaws.com")
                .with_attribute("managed_policy_arns", Value::strings([SSM_MANAGED_POLICY])),
        )?;

        let storage_policy = topology.add_shared(
            Resource::new("iam.policy", STORAGE_POLICY_NAME)
                .with_attribute(
                    "document",
                    PolicyDocument::new()
                        .with_statement(storage.read_write_statement())
                        .to_value(),
                )
                .with_attribute("attach_to", Value::List(vec![role.attr("arn")])),
        )?;

        let instance_profile = topology.add_shared(
            Resource::new("iam.instance_profile", INSTANCE_PROFILE_NAME)
                .with_attribute("roles", Value::List(vec![role.attr("name")])),
        )?;

        let storage_ingress = topology
            .add_shared(storage.allow_mount_from(STORAGE_INGRESS_NAME, &security_group))?;

        let user_data = Value::map([
            ("template", Value::string(mount_script(region))),
            (
                "substitutions",
                Value::map([
                    (FILE_SYSTEM_TOKEN, storage.file_system.attr("id")),
                    (ACCESS_POINT_TOKEN, storage.access_point.attr("id")),
                ]),
            ),
        ]);

        let launch_template = topology.add_shared(
            Resource::new("ec2.launch_template", LAUNCH_TEMPLATE_NAME)
                .with_attribute("instance_type", INSTANCE_TYPE)
                .with_attribute("machine_image", MACHINE_IMAGE)
                .with_attribute(
                    "instance_market",
                    Value::map([
                        ("market_type", Value::from("spot")),
                        ("spot_instance_type", Value::from("one-time")),
                    ]),
                )
                .with_attribute("security_groups", Value::List(vec![security_group.attr("id")]))
                .with_attribute("instance_profile", instance_profile.attr("arn"))
                .with_attribute("associate_public_ip", true)
                .with_attribute("user_data", user_data),
        )?;

        debug!("Maintenance: {}", launch_template);

        Ok(Self {
            launch_template,
            security_group,
            role,
            instance_profile,
            storage_policy,
            storage_ingress,
        })
    }
}
