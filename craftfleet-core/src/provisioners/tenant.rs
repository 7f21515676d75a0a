//! Per-server subgraph
//!
//! Each server gets its own task definition, containers, service and IAM
//! policies, all named `name(base, key)`. The subgraph is built completely
//! in memory and committed to the topology in one step.

use log::debug;

use crate::config::{MinecraftServerDef, StackConfig};
use crate::error::{BuildError, BuildResult};
use crate::naming::{self, CLUSTER_NAME};
use crate::policy::{PolicyDocument, PolicyStatement};
use crate::provisioners::cluster::ComputeCluster;
use crate::provisioners::notification::NotificationTopic;
use crate::provisioners::storage::SharedStorage;
use crate::provisioners::{account, lookup_id, parameter_lookup};
use crate::resolver::ResolvedParameter;
use crate::resource::{Resource, Value};
use crate::topology::{TenantNodes, TenantSubgraph};

pub const WATCHDOG_IMAGE: &str = "doctorray/minecraft-ecsfargate-watchdog";
/// Mount path of the shared volume in both containers
pub const DATA_PATH: &str = "/data";
pub const LOG_RETENTION_DAYS: u32 = 3;

pub const CONTROL_ACTIONS: [&str; 1] = ["ecs:*"];
pub const LOG_ACTIONS: [&str; 2] = ["logs:CreateLogStream", "logs:PutLogEvents"];
pub const DNS_ACTIONS: [&str; 3] = [
    "route53:GetHostedZone",
    "route53:ChangeResourceRecordSets",
    "route53:ListResourceRecordSets",
];

/// Validated task size of one server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantSize {
    pub cpu: u32,
    pub memory: u32,
}

/// Check a server's key and size. The deployment defaults are never
/// substituted; they only appear in the error as a suggestion.
pub fn validate_server(
    key: &str,
    def: &MinecraftServerDef,
    config: &StackConfig,
) -> BuildResult<TenantSize> {
    naming::validate_key(key).map_err(|reason| BuildError::InvalidServerKey {
        key: key.to_string(),
        reason,
    })?;

    let cpu = def.cpu.ok_or_else(|| BuildError::MissingServerField {
        key: key.to_string(),
        field: "cpu",
        default: config.default_task_cpu,
    })?;
    let memory = def.memory.ok_or_else(|| BuildError::MissingServerField {
        key: key.to_string(),
        field: "memory",
        default: config.default_task_memory,
    })?;

    Ok(TenantSize { cpu, memory })
}

/// Shared nodes every server subgraph references
#[derive(Debug, Clone, Copy)]
pub struct SharedNodes<'a> {
    pub config: &'a StackConfig,
    pub storage: &'a SharedStorage,
    pub cluster: &'a ComputeCluster,
    pub notifications: &'a NotificationTopic,
    pub hosted_zone: &'a ResolvedParameter,
}

impl SharedNodes<'_> {
    fn hosted_zone_arn(&self) -> String {
        format!("arn:aws:route53:::hostedzone/{}", self.hosted_zone.value)
    }
}

/// Build the full subgraph of one server
pub fn build_subgraph(
    shared: &SharedNodes<'_>,
    key: &str,
    def: &MinecraftServerDef,
    launcher: &ResolvedParameter,
) -> BuildResult<TenantSubgraph> {
    let config = shared.config;
    let size = validate_server(key, def, config)?;
    let edition = config.edition.config();
    let hostname = naming::hostname(key, &config.domain_name);
    let service_name = naming::name(naming::SERVICE_BASE, key);

    let mut resources = Vec::new();

    let launcher_lookup = lookup_id(launcher);
    resources.push(parameter_lookup(launcher));

    // Task role
    let mut task_role = Resource::new("iam.role", naming::name(naming::TASK_ROLE_BASE, key))
        .with_attribute("assumed_by", "ecs-tasks.amazonaws.com");
    if let Some(publish) = shared.notifications.publish_statement() {
        task_role = task_role.with_attribute(
            "inline_policy",
            PolicyDocument::new().with_statement(publish).to_value(),
        );
    }
    let task_role_id = task_role.id.clone();
    resources.push(task_role);

    let log_group = config.debug.then(|| {
        Resource::new("logs.log_group", naming::name(naming::LOG_GROUP_BASE, key))
            .with_attribute("retention_days", LOG_RETENTION_DAYS)
    });
    let log_group_id = log_group.as_ref().map(|r| r.id.clone());
    resources.extend(log_group);

    // Fargate pulls the awslogs driver credentials from the execution role
    let execution_role = log_group_id.as_ref().map(|group| {
        Resource::new("iam.role", naming::name(naming::EXECUTION_ROLE_BASE, key))
            .with_attribute("assumed_by", "ecs-tasks.amazonaws.com")
            .with_attribute(
                "inline_policy",
                PolicyDocument::new()
                    .with_statement(PolicyStatement::allow(LOG_ACTIONS).on(group.attr("arn")))
                    .to_value(),
            )
    });
    let execution_role_id = execution_role.as_ref().map(|r| r.id.clone());
    resources.extend(execution_role);

    let mut task_definition = Resource::new(
        "ecs.task_definition",
        naming::name(naming::TASK_DEFINITION_BASE, key),
    )
    .with_attribute("cpu", size.cpu)
    .with_attribute("memory", size.memory)
    .with_attribute("network_mode", "awsvpc")
    .with_attribute("requires_compatibilities", Value::strings(["FARGATE"]))
    .with_attribute("task_role_arn", task_role_id.attr("arn"));
    if let Some(role) = &execution_role_id {
        task_definition = task_definition.with_attribute("execution_role_arn", role.attr("arn"));
    }
    let task_definition_id = task_definition.id.clone();
    resources.push(task_definition);

    let volume = Resource::new("ecs.volume", naming::name(naming::VOLUME_BASE, key))
        .with_attribute("task_definition", task_definition_id.attr("arn"))
        .with_attribute("file_system_id", shared.storage.file_system.attr("id"))
        .with_attribute("transit_encryption", "ENABLED")
        .with_attribute(
            "authorization_config",
            Value::map([
                ("access_point_id", shared.storage.access_point.attr("id")),
                ("iam", Value::from("ENABLED")),
            ]),
        );
    let volume_id = volume.id.clone();
    resources.push(volume);

    let mount = Value::List(vec![Value::map([
        ("source_volume", volume_id.attr("name")),
        ("container_path", Value::from(DATA_PATH)),
        ("read_only", Value::from(false)),
    ])]);

    // Primary server container
    let mut server = Resource::new(
        "ecs.container_definition",
        naming::name(naming::SERVER_CONTAINER_BASE, key),
    )
    .with_attribute("task_definition", task_definition_id.attr("arn"))
    .with_attribute("image", edition.image)
    .with_attribute("essential", true)
    .with_attribute("pseudo_terminal", true)
    .with_attribute("interactive", true)
    .with_attribute(
        "port_mappings",
        Value::List(vec![Value::map([
            ("container_port", Value::from(edition.port)),
            ("host_port", Value::from(edition.port)),
            ("protocol", Value::from(edition.protocol.as_str())),
        ])]),
    )
    .with_attribute(
        "environment",
        Value::map(
            def.container_env
                .iter()
                .map(|(k, v)| (k.clone(), Value::string(v.as_str()))),
        ),
    )
    .with_attribute("mount_points", mount.clone());
    if let Some(log_group) = &log_group_id {
        server = server.with_attribute(
            "log_configuration",
            Value::map([
                ("driver", Value::from("awslogs")),
                ("log_group", log_group.attr("name")),
                ("stream_prefix", Value::string(key)),
            ]),
        );
    }
    let server_id = server.id.clone();
    resources.push(server);

    // Idle watchdog
    let sms = &config.sms;
    let watchdog = Resource::new(
        "ecs.container_definition",
        naming::name(naming::WATCHDOG_CONTAINER_BASE, key),
    )
    .with_attribute("task_definition", task_definition_id.attr("arn"))
    .with_attribute("image", WATCHDOG_IMAGE)
    .with_attribute("essential", true)
    .with_attribute(
        "environment",
        Value::map([
            ("CLUSTER", Value::from(CLUSTER_NAME)),
            ("SERVICE", Value::string(service_name.as_str())),
            ("DNSZONE", Value::string(shared.hosted_zone.value.as_str())),
            ("SERVERNAME", Value::string(hostname.as_str())),
            ("SNSTOPIC", shared.notifications.watchdog_value()),
            ("TWILIOFROM", Value::string(sms.from_number.as_str())),
            ("TWILIOTO", Value::string(sms.to_number.as_str())),
            ("TWILIOAID", Value::string(sms.account_id.as_str())),
            ("TWILIOAUTH", Value::string(sms.auth_code.as_str())),
            ("STARTUPMIN", Value::string(config.startup_minutes.as_str())),
            ("SHUTDOWNMIN", Value::string(config.shutdown_minutes.as_str())),
        ]),
    )
    .with_attribute("mount_points", mount);
    let watchdog_id = watchdog.id.clone();
    resources.push(watchdog);

    let capacity_provider = if config.use_spot {
        "FARGATE_SPOT"
    } else {
        "FARGATE"
    };
    let service = Resource::new("ecs.service", service_name.as_str())
        .with_attribute("service_name", service_name.as_str())
        .with_attribute("cluster", shared.cluster.cluster.attr("arn"))
        .with_attribute("task_definition", task_definition_id.attr("arn"))
        // Started on demand by the launcher, stopped by the watchdog
        .with_attribute("desired_count", 0u32)
        .with_attribute(
            "capacity_provider_strategy",
            Value::List(vec![Value::map([
                ("capacity_provider", Value::from(capacity_provider)),
                ("weight", Value::from(1u32)),
            ])]),
        )
        .with_attribute("assign_public_ip", "ENABLED")
        .with_attribute(
            "security_groups",
            Value::List(vec![shared.cluster.security_group.attr("id")]),
        )
        .with_attribute("max_healthy_percent", 100u32)
        .with_attribute("min_healthy_percent", 0u32);
    let service_id = service.id.clone();
    resources.push(service);

    // One rule on the shared service group admits every server
    let storage_grant = shared.cluster.storage_ingress(shared.storage).id;

    let storage_policy = policy(
        naming::name(naming::STORAGE_POLICY_BASE, key),
        PolicyDocument::new().with_statement(shared.storage.read_write_statement()),
        vec![task_role_id.attr("arn")],
    );
    let storage_policy_id = storage_policy.id.clone();
    resources.push(storage_policy);

    // Service ARN scoping is the isolation boundary between servers
    let task_pattern = ComputeCluster::task_arn_pattern(&config.server_region, &account(config));
    let control_policy = policy(
        naming::name(naming::CONTROL_POLICY_BASE, key),
        PolicyDocument::new()
            .with_statement(
                PolicyStatement::allow(CONTROL_ACTIONS)
                    .on(service_id.attr("arn"))
                    .on(task_pattern),
            )
            .with_statement(PolicyStatement::allow(["ec2:DescribeNetworkInterfaces"]).on("*")),
        vec![task_role_id.attr("arn"), launcher_lookup.attr("value")],
    );
    let control_policy_id = control_policy.id.clone();
    resources.push(control_policy);

    let dns_policy = policy(
        naming::name(naming::DNS_POLICY_BASE, key),
        PolicyDocument::new().with_statement(
            PolicyStatement::allow(DNS_ACTIONS)
                .on(shared.hosted_zone_arn())
                .when(
                    "ForAllValues:StringEquals",
                    "route53:ChangeResourceRecordSetsNormalizedRecordNames",
                    Value::strings([hostname.as_str()]),
                ),
        ),
        vec![task_role_id.attr("arn")],
    );
    let dns_policy_id = dns_policy.id.clone();
    resources.push(dns_policy);

    debug!("Server {}: {} resources", key, resources.len());

    Ok(TenantSubgraph {
        nodes: TenantNodes {
            key: key.to_string(),
            hostname,
            task_role: task_role_id,
            log_group: log_group_id,
            execution_role: execution_role_id,
            task_definition: task_definition_id,
            volume: volume_id,
            server_container: server_id,
            watchdog_container: watchdog_id,
            service: service_id,
            storage_grant,
            storage_policy: storage_policy_id,
            control_policy: control_policy_id,
            dns_policy: dns_policy_id,
            launcher_lookup,
        },
        resources,
    })
}

fn policy(name: String, document: PolicyDocument, attach_to: Vec<Value>) -> Resource {
    Resource::new("iam.policy", name)
        .with_attribute("document", document.to_value())
        .with_attribute("attach_to", Value::List(attach_to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkSource;
    use crate::provisioners::network::SharedNetwork;
    use crate::resolver::ParameterKey;
    use crate::resource::ResourceId;
    use crate::topology::Topology;

    struct Fixture {
        topology: Topology,
        config: StackConfig,
        storage: SharedStorage,
        cluster: ComputeCluster,
        notifications: NotificationTopic,
        zone: ResolvedParameter,
    }

    impl Fixture {
        fn new(config: StackConfig) -> Self {
            let mut topology = Topology::new();
            let network = SharedNetwork::provision(&mut topology, &NetworkSource::Create).unwrap();
            let storage = SharedStorage::provision(&mut topology, &network).unwrap();
            let cluster = ComputeCluster::provision(&mut topology, &network).unwrap();
            let notifications = NotificationTopic::provision(
                &mut topology,
                config.notification_email.as_deref(),
            )
            .unwrap();
            Self {
                topology,
                config,
                storage,
                cluster,
                notifications,
                zone: ResolvedParameter {
                    key: ParameterKey::hosted_zone(),
                    value: "Z0123".to_string(),
                },
            }
        }

        fn build(&self, key: &str, def: &MinecraftServerDef) -> BuildResult<TenantSubgraph> {
            let shared = SharedNodes {
                config: &self.config,
                storage: &self.storage,
                cluster: &self.cluster,
                notifications: &self.notifications,
                hosted_zone: &self.zone,
            };
            let launcher = ResolvedParameter {
                key: ParameterKey::launcher_role(key),
                value: format!("arn:aws:iam::123456789012:role/launcher-{}", key),
            };
            build_subgraph(&shared, key, def, &launcher)
        }
    }

    fn find<'a>(subgraph: &'a TenantSubgraph, id: &ResourceId) -> &'a Resource {
        subgraph.resources.iter().find(|r| &r.id == id).unwrap()
    }

    fn env(resource: &Resource) -> &std::collections::HashMap<String, Value> {
        resource.get("environment").and_then(Value::as_map).unwrap()
    }

    #[test]
    fn missing_cpu_is_fatal_and_names_server() {
        let config = StackConfig::new("example.com");
        let def = MinecraftServerDef {
            cpu: None,
            memory: Some(1024),
            ..Default::default()
        };
        let err = validate_server("s1", &def, &config).unwrap_err();
        match err {
            BuildError::MissingServerField {
                key,
                field,
                default,
            } => {
                assert_eq!(key, "s1");
                assert_eq!(field, "cpu");
                assert_eq!(default, 2048);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn missing_memory_is_fatal() {
        let config = StackConfig::new("example.com");
        let def = MinecraftServerDef {
            cpu: Some(512),
            memory: None,
            ..Default::default()
        };
        let err = validate_server("s1", &def, &config).unwrap_err();
        assert!(err.to_string().contains("`memory`"));
    }

    #[test]
    fn invalid_key_is_rejected() {
        let config = StackConfig::new("example.com");
        let err = validate_server("Bad_Key", &MinecraftServerDef::new(512, 1024), &config)
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidServerKey { ref key, .. } if key == "Bad_Key"));
    }

    #[test]
    fn subgraph_commits_cleanly() {
        let mut fixture = Fixture::new(StackConfig::new("example.com"));
        let subgraph = fixture.build("s1", &MinecraftServerDef::new(512, 1024)).unwrap();
        let count = subgraph.resources.len();
        fixture.topology.commit(subgraph).unwrap();
        assert_eq!(fixture.topology.tenant_resources("s1").count(), count);
    }

    #[test]
    fn every_name_carries_the_key() {
        let fixture = Fixture::new(StackConfig::new("example.com"));
        let subgraph = fixture.build("alpha", &MinecraftServerDef::new(512, 1024)).unwrap();
        for id in subgraph.resources.iter().map(|r| &r.id) {
            assert!(id.name.contains("alpha"), "{} is not scoped to the server", id);
        }
        assert_eq!(subgraph.nodes.service.name, "minecraft-server-alpha");
        assert_eq!(subgraph.nodes.hostname, "alpha.example.com");
    }

    #[test]
    fn task_definition_uses_server_size() {
        let fixture = Fixture::new(StackConfig::new("example.com"));
        let subgraph = fixture.build("s1", &MinecraftServerDef::new(1024, 4096)).unwrap();
        let task = find(&subgraph, &subgraph.nodes.task_definition);
        assert_eq!(task.get("cpu").and_then(Value::as_int), Some(1024));
        assert_eq!(task.get("memory").and_then(Value::as_int), Some(4096));
    }

    #[test]
    fn volume_requires_encryption_and_iam() {
        let fixture = Fixture::new(StackConfig::new("example.com"));
        let subgraph = fixture.build("s1", &MinecraftServerDef::new(512, 1024)).unwrap();
        let volume = find(&subgraph, &subgraph.nodes.volume);
        assert_eq!(volume.get_str("transit_encryption"), Some("ENABLED"));
        let auth = volume.get("authorization_config").and_then(Value::as_map).unwrap();
        assert_eq!(auth["iam"], Value::from("ENABLED"));
        assert_eq!(auth["access_point_id"], fixture.storage.access_point.attr("id"));
    }

    #[test]
    fn server_container_follows_edition_and_env() {
        let fixture = Fixture::new(StackConfig::new("example.com"));
        let def = MinecraftServerDef::new(512, 1024).with_env("EULA", "TRUE");
        let subgraph = fixture.build("s1", &def).unwrap();
        let server = find(&subgraph, &subgraph.nodes.server_container);

        assert_eq!(server.get_str("image"), Some("itzg/minecraft-server"));
        assert_eq!(server.get("pseudo_terminal"), Some(&Value::Bool(true)));
        assert_eq!(server.get("interactive"), Some(&Value::Bool(true)));
        assert_eq!(server.get("essential"), Some(&Value::Bool(true)));
        assert_eq!(env(server)["EULA"], Value::from("TRUE"));
        assert!(server.get("log_configuration").is_none());

        let ports = server.get("port_mappings").and_then(Value::as_list).unwrap();
        let port = ports[0].as_map().unwrap();
        assert_eq!(port["container_port"], Value::Int(25565));
        assert_eq!(port["protocol"], Value::from("tcp"));
    }

    #[test]
    fn debug_adds_log_shipping() {
        let mut config = StackConfig::new("example.com");
        config.debug = true;
        let mut fixture = Fixture::new(config);
        let subgraph = fixture.build("s1", &MinecraftServerDef::new(512, 1024)).unwrap();
        let server = find(&subgraph, &subgraph.nodes.server_container);
        let logging = server.get("log_configuration").and_then(Value::as_map).unwrap();
        assert_eq!(logging["driver"], Value::from("awslogs"));

        let group_id = subgraph.nodes.log_group.clone().unwrap();
        assert_eq!(logging["log_group"], group_id.attr("name"));

        let role_id = subgraph.nodes.execution_role.clone().unwrap();
        assert_eq!(role_id.name, "minecraft-execution-role-s1");
        let task = find(&subgraph, &subgraph.nodes.task_definition);
        assert_eq!(task.get("execution_role_arn"), Some(&role_id.attr("arn")));
        assert_eq!(task.get("task_role_arn"), Some(&subgraph.nodes.task_role.attr("arn")));

        let role = find(&subgraph, &role_id);
        assert_eq!(role.get_str("assumed_by"), Some("ecs-tasks.amazonaws.com"));
        let inline = role.get("inline_policy").and_then(Value::as_map).unwrap();
        let statement = inline["Statement"].as_list().unwrap()[0].as_map().unwrap();
        assert_eq!(
            statement["Action"],
            Value::strings(["logs:CreateLogStream", "logs:PutLogEvents"])
        );
        assert_eq!(statement["Resource"], Value::List(vec![group_id.attr("arn")]));

        fixture.topology.commit(subgraph).unwrap();
        let group = fixture.topology.of_type("logs.log_group").next().unwrap();
        assert_eq!(group.id.name, "minecraft-logs-s1");
        assert_eq!(group.get("retention_days").and_then(Value::as_int), Some(3));
        assert_eq!(fixture.topology.of_type("iam.role").count(), 2);
    }

    #[test]
    fn no_execution_role_without_debug() {
        let fixture = Fixture::new(StackConfig::new("example.com"));
        let subgraph = fixture.build("s1", &MinecraftServerDef::new(512, 1024)).unwrap();
        assert!(subgraph.nodes.log_group.is_none());
        assert!(subgraph.nodes.execution_role.is_none());
        let task = find(&subgraph, &subgraph.nodes.task_definition);
        assert!(task.get("execution_role_arn").is_none());
    }

    #[test]
    fn storage_grant_is_the_shared_rule() {
        let fixture = Fixture::new(StackConfig::new("example.com"));
        let a = fixture.build("a", &MinecraftServerDef::new(512, 1024)).unwrap();
        let b = fixture.build("b", &MinecraftServerDef::new(512, 1024)).unwrap();

        let shared_rule = fixture.cluster.storage_ingress(&fixture.storage).id;
        assert_eq!(a.nodes.storage_grant, shared_rule);
        assert_eq!(b.nodes.storage_grant, shared_rule);
        assert!(
            a.resources
                .iter()
                .all(|r| r.id.resource_type != "ec2.security_group_ingress")
        );
    }

    #[test]
    fn watchdog_environment_contract() {
        let mut config = StackConfig::new("example.com");
        config.sms.from_number = "+15550001".to_string();
        let fixture = Fixture::new(config);
        let subgraph = fixture.build("s1", &MinecraftServerDef::new(512, 1024)).unwrap();
        let watchdog = find(&subgraph, &subgraph.nodes.watchdog_container);
        let env = env(watchdog);

        assert_eq!(watchdog.get_str("image"), Some(WATCHDOG_IMAGE));
        assert_eq!(env["CLUSTER"], Value::from("minecraft"));
        assert_eq!(env["SERVICE"], Value::from("minecraft-server-s1"));
        assert_eq!(env["DNSZONE"], Value::from("Z0123"));
        assert_eq!(env["SERVERNAME"], Value::from("s1.example.com"));
        assert_eq!(env["SNSTOPIC"], Value::from(""));
        assert_eq!(env["TWILIOFROM"], Value::from("+15550001"));
        assert_eq!(env["TWILIOAUTH"], Value::from(""));
        assert_eq!(env["STARTUPMIN"], Value::from("10"));
        assert_eq!(env["SHUTDOWNMIN"], Value::from("20"));
        assert_eq!(env.len(), 11);
        assert_eq!(
            watchdog.get("mount_points"),
            find(&subgraph, &subgraph.nodes.server_container).get("mount_points")
        );
    }

    #[test]
    fn service_starts_stopped_on_spot() {
        let fixture = Fixture::new(StackConfig::new("example.com"));
        let subgraph = fixture.build("s1", &MinecraftServerDef::new(512, 1024)).unwrap();
        let service = find(&subgraph, &subgraph.nodes.service);

        assert_eq!(service.get("desired_count").and_then(Value::as_int), Some(0));
        assert_eq!(service.get_str("assign_public_ip"), Some("ENABLED"));
        let strategy = service
            .get("capacity_provider_strategy")
            .and_then(Value::as_list)
            .unwrap();
        assert_eq!(
            strategy[0].as_map().unwrap()["capacity_provider"],
            Value::from("FARGATE_SPOT")
        );
    }

    #[test]
    fn on_demand_when_spot_disabled() {
        let mut config = StackConfig::new("example.com");
        config.use_spot = false;
        let fixture = Fixture::new(config);
        let subgraph = fixture.build("s1", &MinecraftServerDef::new(512, 1024)).unwrap();
        let service = find(&subgraph, &subgraph.nodes.service);
        let strategy = service
            .get("capacity_provider_strategy")
            .and_then(Value::as_list)
            .unwrap();
        assert_eq!(
            strategy[0].as_map().unwrap()["capacity_provider"],
            Value::from("FARGATE")
        );
    }

    #[test]
    fn control_policy_is_scoped_and_shared_with_launcher() {
        let mut config = StackConfig::new("example.com");
        config.account_id = Some("123456789012".to_string());
        let fixture = Fixture::new(config);
        let subgraph = fixture.build("s1", &MinecraftServerDef::new(512, 1024)).unwrap();
        let policy = find(&subgraph, &subgraph.nodes.control_policy);

        let document = policy.get("document").and_then(Value::as_map).unwrap();
        let statements = document["Statement"].as_list().unwrap();
        let control = statements[0].as_map().unwrap();
        assert_eq!(control["Action"], Value::strings(["ecs:*"]));
        assert_eq!(
            control["Resource"],
            Value::List(vec![
                subgraph.nodes.service.attr("arn"),
                Value::from("arn:aws:ecs:us-east-1:123456789012:task/minecraft/*"),
            ])
        );
        let describe = statements[1].as_map().unwrap();
        assert_eq!(describe["Resource"], Value::strings(["*"]));

        assert_eq!(
            policy.get("attach_to"),
            Some(&Value::List(vec![
                subgraph.nodes.task_role.attr("arn"),
                subgraph.nodes.launcher_lookup.attr("value"),
            ]))
        );
    }

    #[test]
    fn dns_policy_is_zone_scoped_and_task_only() {
        let fixture = Fixture::new(StackConfig::new("example.com"));
        let subgraph = fixture.build("s1", &MinecraftServerDef::new(512, 1024)).unwrap();
        let policy = find(&subgraph, &subgraph.nodes.dns_policy);

        let document = policy.get("document").and_then(Value::as_map).unwrap();
        let statement = document["Statement"].as_list().unwrap()[0].as_map().unwrap();
        assert_eq!(
            statement["Resource"],
            Value::strings(["arn:aws:route53:::hostedzone/Z0123"])
        );
        assert!(statement["Condition"].mentions("s1.example.com"));
        assert_eq!(
            policy.get("attach_to"),
            Some(&Value::List(vec![subgraph.nodes.task_role.attr("arn")]))
        );
    }

    #[test]
    fn dns_condition_uses_normalized_record_name() {
        let fixture = Fixture::new(StackConfig::new("Games.Example.com"));
        let subgraph = fixture.build("s1", &MinecraftServerDef::new(512, 1024)).unwrap();
        assert_eq!(subgraph.nodes.hostname, "s1.games.example.com");

        let policy = find(&subgraph, &subgraph.nodes.dns_policy);
        let document = policy.get("document").and_then(Value::as_map).unwrap();
        let statement = document["Statement"].as_list().unwrap()[0].as_map().unwrap();
        assert!(statement["Condition"].mentions("s1.games.example.com"));
        assert!(!statement["Condition"].mentions("Games"));

        let watchdog = find(&subgraph, &subgraph.nodes.watchdog_container);
        assert_eq!(env(watchdog)["SERVERNAME"], Value::from("s1.games.example.com"));
    }

    #[test]
    fn publish_grant_only_with_topic() {
        let fixture = Fixture::new(StackConfig::new("example.com"));
        let subgraph = fixture.build("s1", &MinecraftServerDef::new(512, 1024)).unwrap();
        assert!(find(&subgraph, &subgraph.nodes.task_role).get("inline_policy").is_none());

        let config = StackConfig::new("example.com").with_notification_email("ops@example.com");
        let fixture = Fixture::new(config);
        let subgraph = fixture.build("s1", &MinecraftServerDef::new(512, 1024)).unwrap();
        let role = find(&subgraph, &subgraph.nodes.task_role);
        assert!(role.get("inline_policy").unwrap().mentions("minecraft-notifications"));
        let watchdog = find(&subgraph, &subgraph.nodes.watchdog_container);
        assert_eq!(env(watchdog)["SNSTOPIC"], fixture.notifications.watchdog_value());
    }
}
