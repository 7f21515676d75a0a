//! Topology - The provisioned resource graph
//!
//! A `Topology` is an append-only list of resources, each owned either by
//! the stack (shared) or by exactly one server. References between resources
//! form the dependency graph; a resource may only reference resources added
//! before it, which keeps the graph acyclic.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::json;

use crate::error::TopologyError;
use crate::resource::{Resource, ResourceId};

/// Owner of a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Owner {
    /// Created once and referenced by every server
    Shared,
    /// Exclusively owned by one server key
    Tenant(String),
}

impl Owner {
    pub fn tenant(key: impl Into<String>) -> Self {
        Self::Tenant(key.into())
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Shared)
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Owner::Shared => json!("shared"),
            Owner::Tenant(key) => json!({ "server": key }),
        }
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Owner::Shared => write!(f, "Shared"),
            Owner::Tenant(key) => write!(f, "Server: {}", key),
        }
    }
}

/// Dependency graph between resources
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Resource -> resources it references
    edges: HashMap<ResourceId, Vec<ResourceId>>,
    /// Reverse edges: target -> resources that reference it
    reverse_edges: HashMap<ResourceId, Vec<ResourceId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, from: ResourceId, to: ResourceId) {
        self.reverse_edges
            .entry(to.clone())
            .or_default()
            .push(from.clone());
        self.edges.entry(from).or_default().push(to);
    }

    /// Direct dependencies of a resource
    pub fn dependencies_of(&self, id: &ResourceId) -> &[ResourceId] {
        self.edges.get(id).map_or(&[], |v| v.as_slice())
    }

    /// Resources that reference this resource
    pub fn dependents_of(&self, id: &ResourceId) -> &[ResourceId] {
        self.reverse_edges.get(id).map_or(&[], |v| v.as_slice())
    }
}

/// Named nodes of one server's subgraph
#[derive(Debug, Clone, PartialEq)]
pub struct TenantNodes {
    pub key: String,
    /// `<key>.<domain>`, the A record the watchdog maintains
    pub hostname: String,
    pub task_role: ResourceId,
    /// Only present when debug logging is enabled
    pub log_group: Option<ResourceId>,
    pub execution_role: Option<ResourceId>,
    pub task_definition: ResourceId,
    pub volume: ResourceId,
    pub server_container: ResourceId,
    pub watchdog_container: ResourceId,
    pub service: ResourceId,
    /// Shared NFS rule that admits this server's service group
    pub storage_grant: ResourceId,
    pub storage_policy: ResourceId,
    pub control_policy: ResourceId,
    pub dns_policy: ResourceId,
    pub launcher_lookup: ResourceId,
}

/// A complete server subgraph, built before it is committed
#[derive(Debug, Clone)]
pub struct TenantSubgraph {
    pub nodes: TenantNodes,
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, Default)]
pub struct Topology {
    resources: Vec<Resource>,
    owners: Vec<Owner>,
    index: HashMap<ResourceId, usize>,
    graph: DependencyGraph,
    tenants: BTreeMap<String, TenantNodes>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a shared resource
    pub fn add_shared(&mut self, resource: Resource) -> Result<ResourceId, TopologyError> {
        let id = resource.id.clone();
        self.validate_batch(std::slice::from_ref(&resource))?;
        self.insert(Owner::Shared, resource);
        Ok(id)
    }

    /// Commit a server subgraph. Either every resource is added or none is.
    pub fn commit(&mut self, subgraph: TenantSubgraph) -> Result<(), TopologyError> {
        self.validate_batch(&subgraph.resources)?;

        let key = subgraph.nodes.key.clone();
        for resource in subgraph.resources {
            self.insert(Owner::Tenant(key.clone()), resource);
        }
        self.tenants.insert(key, subgraph.nodes);
        Ok(())
    }

    fn validate_batch(&self, batch: &[Resource]) -> Result<(), TopologyError> {
        let mut seen: HashSet<&ResourceId> = HashSet::new();
        for resource in batch {
            if self.index.contains_key(&resource.id) || !seen.insert(&resource.id) {
                return Err(TopologyError::Duplicate(resource.id.clone()));
            }
            for dependency in resource.dependencies() {
                if !self.index.contains_key(&dependency) && !seen.contains(&dependency) {
                    return Err(TopologyError::DanglingReference {
                        from: resource.id.clone(),
                        to: dependency,
                    });
                }
            }
        }
        Ok(())
    }

    fn insert(&mut self, owner: Owner, resource: Resource) {
        for dependency in resource.dependencies() {
            self.graph.add_edge(resource.id.clone(), dependency);
        }
        self.index.insert(resource.id.clone(), self.resources.len());
        self.resources.push(resource);
        self.owners.push(owner);
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, id: &ResourceId) -> Option<&Resource> {
        self.index.get(id).map(|&i| &self.resources[i])
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.index.contains_key(id)
    }

    pub fn owner_of(&self, id: &ResourceId) -> Option<&Owner> {
        self.index.get(id).map(|&i| &self.owners[i])
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    fn owned(&self) -> impl Iterator<Item = (&Resource, &Owner)> {
        self.resources.iter().zip(self.owners.iter())
    }

    /// Resources owned by the stack
    pub fn shared(&self) -> impl Iterator<Item = &Resource> {
        self.owned()
            .filter(|(_, owner)| owner.is_shared())
            .map(|(r, _)| r)
    }

    /// Resources owned by one server
    pub fn tenant_resources<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Resource> {
        self.owned()
            .filter(move |(_, owner)| matches!(owner, Owner::Tenant(k) if k == key))
            .map(|(r, _)| r)
    }

    pub fn tenant(&self, key: &str) -> Option<&TenantNodes> {
        self.tenants.get(key)
    }

    /// Server subgraphs in key order
    pub fn tenants(&self) -> impl Iterator<Item = &TenantNodes> {
        self.tenants.values()
    }

    pub fn tenant_count(&self) -> usize {
        self.tenants.len()
    }

    pub fn of_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a Resource> {
        self.resources
            .iter()
            .filter(move |r| r.id.resource_type == resource_type)
    }

    /// Group resources by owner, shared first, servers in key order
    pub fn group_by_owner(&self) -> BTreeMap<Owner, Vec<&Resource>> {
        let mut groups: BTreeMap<Owner, Vec<&Resource>> = BTreeMap::new();
        for (resource, owner) in self.owned() {
            groups.entry(owner.clone()).or_default().push(resource);
        }
        groups
    }

    pub fn summary(&self) -> TopologySummary {
        let mut summary = TopologySummary {
            tenants: self.tenants.len(),
            ..Default::default()
        };
        for (resource, owner) in self.owned() {
            if resource.is_data_source() {
                summary.lookups += 1;
            } else if owner.is_shared() {
                summary.shared += 1;
            } else {
                summary.per_tenant += 1;
            }
        }
        summary
    }

    pub fn to_json(&self) -> serde_json::Value {
        let resources: Vec<serde_json::Value> = self
            .owned()
            .map(|(resource, owner)| {
                let mut value = resource.to_json();
                value["owner"] = owner.to_json();
                value["depends_on"] = json!(
                    self.graph
                        .dependencies_of(&resource.id)
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                );
                value
            })
            .collect();

        let servers: serde_json::Map<String, serde_json::Value> = self
            .tenants
            .values()
            .map(|nodes| {
                (
                    nodes.key.clone(),
                    json!({
                        "hostname": nodes.hostname,
                        "service": nodes.service.to_string(),
                        "task_definition": nodes.task_definition.to_string(),
                        "storage_grant": nodes.storage_grant.to_string(),
                    }),
                )
            })
            .collect();

        json!({ "resources": resources, "servers": servers })
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct TopologySummary {
    pub shared: usize,
    pub per_tenant: usize,
    pub tenants: usize,
    pub lookups: usize,
}

impl std::fmt::Display for TopologySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Topology: {} shared, {} per-server across {} servers, {} lookups",
            self.shared, self.per_tenant, self.tenants, self.lookups
        )
    }
}
