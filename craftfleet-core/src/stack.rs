//! Stack - Top-level composition
//!
//! Shared infrastructure is provisioned once, then every server in the map is
//! folded into the topology in key order. The only state carried between
//! servers is the ingress ledger.

use log::{debug, info};

use crate::config::StackConfig;
use crate::error::BuildResult;
use crate::provisioners::cluster::{ComputeCluster, IngressLedger};
use crate::provisioners::maintenance::MaintenanceHost;
use crate::provisioners::network::SharedNetwork;
use crate::provisioners::notification::NotificationTopic;
use crate::provisioners::parameter_lookup;
use crate::provisioners::storage::SharedStorage;
use crate::provisioners::tenant::{self, SharedNodes, TenantSize};
use crate::resolver::{ParameterResolver, StackParameters};
use crate::topology::Topology;

/// Check every server before anything is built
pub fn validate_servers(config: &StackConfig) -> BuildResult<Vec<(String, TenantSize)>> {
    config
        .servers
        .iter()
        .map(|(key, def)| Ok((key.clone(), tenant::validate_server(key, def, config)?)))
        .collect()
}

/// Build the full topology from already-resolved parameters
pub fn build(config: &StackConfig, parameters: &StackParameters) -> BuildResult<Topology> {
    validate_servers(config)?;

    let mut topology = Topology::new();
    let network = SharedNetwork::provision(&mut topology, &config.network)?;
    let storage = SharedStorage::provision(&mut topology, &network)?;
    let cluster = ComputeCluster::provision(&mut topology, &network)?;
    MaintenanceHost::provision(&mut topology, &network, &storage, &config.server_region)?;
    let notifications =
        NotificationTopic::provision(&mut topology, config.notification_email.as_deref())?;
    topology.add_shared(parameter_lookup(&parameters.hosted_zone))?;

    let shared = SharedNodes {
        config,
        storage: &storage,
        cluster: &cluster,
        notifications: &notifications,
        hosted_zone: &parameters.hosted_zone,
    };

    let ledger = config.servers.iter().try_fold(
        IngressLedger::new(),
        |mut ledger, (key, def)| -> BuildResult<IngressLedger> {
            if ledger.admit(config.edition) {
                topology.add_shared(cluster.ingress_rule(config.edition))?;
            }
            if ledger.grant_storage() {
                topology.add_shared(cluster.storage_ingress(&storage))?;
            }
            let launcher = parameters.launcher_role(key)?;
            let subgraph = tenant::build_subgraph(&shared, key, def, launcher)?;
            let count = subgraph.resources.len();
            topology.commit(subgraph)?;
            info!("Server {}: {} resources", key, count);
            Ok(ledger)
        },
    )?;

    debug!("Game ports opened for {} editions", ledger.len());
    info!(
        "Built {} servers with {} game-port rules ({})",
        topology.tenant_count(),
        cluster.ingress_rules(&topology).len(),
        topology.summary()
    );
    Ok(topology)
}

/// Resolve cross-stack parameters, then build
pub async fn synthesize<R>(config: &StackConfig, resolver: &R) -> BuildResult<Topology>
where
    R: ParameterResolver + ?Sized,
{
    validate_servers(config)?;
    let parameters = StackParameters::resolve(config, resolver).await?;
    build(config, &parameters)
}
