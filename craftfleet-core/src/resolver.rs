//! Resolver - Cross-stack parameter lookup
//!
//! Values published by the independently deployed control-plane stack (the
//! hosted zone id and the launcher roles) are read through the
//! `ParameterResolver` capability. A build wraps its resolver in a
//! `CachedResolver` so every consumer observes the same value and each
//! `{name, region}` is looked up at most once.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info};
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::config::StackConfig;
use crate::error::{BuildError, BuildResult};
use crate::naming;

/// Region the control-plane stack publishes its parameters in
pub const CONTROL_PLANE_REGION: &str = "us-east-1";
/// Hosted zone id of the domain
pub const HOSTED_ZONE_PARAMETER: &str = "MinecraftHostedZoneID";
/// Prefix of the per-server launcher role ARN parameters
pub const LAUNCHER_ROLE_PARAMETER: &str = "LauncherLambdaRoleArn";

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Name and region of an external parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParameterKey {
    pub name: String,
    pub region: String,
}

impl ParameterKey {
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
        }
    }

    pub fn hosted_zone() -> Self {
        Self::new(HOSTED_ZONE_PARAMETER, CONTROL_PLANE_REGION)
    }

    pub fn launcher_role(server_key: &str) -> Self {
        Self::new(
            naming::name(LAUNCHER_ROLE_PARAMETER, server_key),
            CONTROL_PLANE_REGION,
        )
    }
}

impl std::fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.region)
    }
}

/// Errors from parameter lookup. Both are fatal for a build.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Parameter not found: {name} in {region}")]
    NotFound { name: String, region: String },

    #[error("Parameter {name} in {region} could not be read: {message}")]
    Unavailable {
        name: String,
        region: String,
        message: String,
    },
}

impl ResolveError {
    pub fn not_found(key: &ParameterKey) -> Self {
        Self::NotFound {
            name: key.name.clone(),
            region: key.region.clone(),
        }
    }

    pub fn unavailable(key: &ParameterKey, message: impl Into<String>) -> Self {
        Self::Unavailable {
            name: key.name.clone(),
            region: key.region.clone(),
            message: message.into(),
        }
    }
}

pub type ResolveResult<T> = Result<T, ResolveError>;

/// Capability to read a parameter published by another deployment
pub trait ParameterResolver: Send + Sync {
    /// Returns the current value, or `ResolveError::NotFound` if the
    /// parameter does not exist in the region.
    fn resolve(&self, key: &ParameterKey) -> BoxFuture<'_, ResolveResult<String>>;
}

impl ParameterResolver for Box<dyn ParameterResolver> {
    fn resolve(&self, key: &ParameterKey) -> BoxFuture<'_, ResolveResult<String>> {
        (**self).resolve(key)
    }
}

/// In-memory resolver, used for tests and offline builds
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    values: HashMap<ParameterKey, String>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: ParameterKey, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: ParameterKey, value: impl Into<String>) {
        self.values.insert(key, value.into());
    }
}

impl ParameterResolver for StaticResolver {
    fn resolve(&self, key: &ParameterKey) -> BoxFuture<'_, ResolveResult<String>> {
        let result = self
            .values
            .get(key)
            .cloned()
            .ok_or_else(|| ResolveError::not_found(key));
        Box::pin(async move { result })
    }
}

/// Memoizing wrapper. Concurrent requests for one key share a single lookup;
/// failures are not cached.
pub struct CachedResolver<R> {
    inner: R,
    cells: Mutex<HashMap<ParameterKey, Arc<OnceCell<String>>>>,
    lookups: AtomicUsize,
}

impl<R: ParameterResolver> CachedResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cells: Mutex::new(HashMap::new()),
            lookups: AtomicUsize::new(0),
        }
    }

    pub async fn get(&self, key: &ParameterKey) -> ResolveResult<String> {
        let cell = {
            let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
            cells.entry(key.clone()).or_default().clone()
        };

        let value = cell
            .get_or_try_init(|| async {
                self.lookups.fetch_add(1, Ordering::SeqCst);
                debug!("Resolving parameter {}", key);
                self.inner.resolve(key).await
            })
            .await?;

        Ok(value.clone())
    }

    /// Number of lookups forwarded to the wrapped resolver
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl<R: ParameterResolver> ParameterResolver for CachedResolver<R> {
    fn resolve(&self, key: &ParameterKey) -> BoxFuture<'_, ResolveResult<String>> {
        let key = key.clone();
        Box::pin(async move { self.get(&key).await })
    }
}

/// A parameter value captured for one build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParameter {
    pub key: ParameterKey,
    pub value: String,
}

/// Every external value a build needs, resolved up front
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackParameters {
    pub hosted_zone: ResolvedParameter,
    /// Server key -> launcher role ARN
    pub launcher_roles: BTreeMap<String, ResolvedParameter>,
}

impl StackParameters {
    /// Resolve the hosted zone and the launcher role of every server.
    ///
    /// The first failure aborts; a missing launcher role is reported with
    /// the server key it belongs to.
    pub async fn resolve<R>(config: &StackConfig, resolver: &R) -> BuildResult<Self>
    where
        R: ParameterResolver + ?Sized,
    {
        let zone_key = ParameterKey::hosted_zone();
        let zone = resolver.resolve(&zone_key).await?;
        info!("Resolved hosted zone {} from {}", zone, zone_key);

        let mut launcher_roles = BTreeMap::new();
        for server_key in config.servers.keys() {
            let key = ParameterKey::launcher_role(server_key);
            let value = resolver
                .resolve(&key)
                .await
                .map_err(|source| BuildError::TenantParameter {
                    key: server_key.clone(),
                    source,
                })?;
            launcher_roles.insert(server_key.clone(), ResolvedParameter { key, value });
        }

        Ok(Self {
            hosted_zone: ResolvedParameter {
                key: zone_key,
                value: zone,
            },
            launcher_roles,
        })
    }

    pub fn launcher_role(&self, server_key: &str) -> BuildResult<&ResolvedParameter> {
        self.launcher_roles.get(server_key).ok_or_else(|| {
            BuildError::Unresolved(ParameterKey::launcher_role(server_key).to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MinecraftServerDef;

    /// Counts calls and yields to the runtime before answering
    struct CountingResolver {
        calls: AtomicUsize,
        inner: StaticResolver,
    }

    impl ParameterResolver for CountingResolver {
        fn resolve(&self, key: &ParameterKey) -> BoxFuture<'_, ResolveResult<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let key = key.clone();
            Box::pin(async move {
                tokio::task::yield_now().await;
                self.inner.resolve(&key).await
            })
        }
    }

    fn counting(inner: StaticResolver) -> CountingResolver {
        CountingResolver {
            calls: AtomicUsize::new(0),
            inner,
        }
    }

    #[tokio::test]
    async fn static_resolver_returns_values() {
        let resolver = StaticResolver::new().with(ParameterKey::hosted_zone(), "Z123");
        assert_eq!(
            resolver.resolve(&ParameterKey::hosted_zone()).await.unwrap(),
            "Z123"
        );
    }

    #[tokio::test]
    async fn missing_parameter_is_not_found() {
        let resolver = StaticResolver::new();
        let err = resolver
            .resolve(&ParameterKey::hosted_zone())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::NotFound {
                name: "MinecraftHostedZoneID".to_string(),
                region: "us-east-1".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn same_key_in_other_region_is_distinct() {
        let resolver = StaticResolver::new().with(ParameterKey::hosted_zone(), "Z123");
        let other = ParameterKey::new(HOSTED_ZONE_PARAMETER, "eu-west-1");
        assert!(resolver.resolve(&other).await.is_err());
    }

    #[tokio::test]
    async fn cached_resolver_looks_up_once() {
        let cached = CachedResolver::new(counting(
            StaticResolver::new().with(ParameterKey::hosted_zone(), "Z123"),
        ));

        let first = cached.get(&ParameterKey::hosted_zone()).await.unwrap();
        let second = cached.get(&ParameterKey::hosted_zone()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(cached.lookup_count(), 1);
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_lookup() {
        let cached = Arc::new(CachedResolver::new(counting(
            StaticResolver::new().with(ParameterKey::hosted_zone(), "Z123"),
        )));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cached = Arc::clone(&cached);
                tokio::spawn(async move { cached.get(&ParameterKey::hosted_zone()).await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "Z123");
        }
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cached = CachedResolver::new(counting(StaticResolver::new()));
        assert!(cached.get(&ParameterKey::hosted_zone()).await.is_err());
        assert!(cached.get(&ParameterKey::hosted_zone()).await.is_err());
        assert_eq!(cached.lookup_count(), 2);
    }

    #[tokio::test]
    async fn stack_parameters_resolve_every_server() {
        let config = StackConfig::new("example.com")
            .with_server("a", MinecraftServerDef::new(512, 1024))
            .with_server("b", MinecraftServerDef::new(512, 1024));
        let resolver = CachedResolver::new(
            StaticResolver::new()
                .with(ParameterKey::hosted_zone(), "Z123")
                .with(ParameterKey::launcher_role("a"), "arn:aws:iam::1:role/la")
                .with(ParameterKey::launcher_role("b"), "arn:aws:iam::1:role/lb"),
        );

        let params = StackParameters::resolve(&config, &resolver).await.unwrap();

        assert_eq!(params.hosted_zone.value, "Z123");
        assert_eq!(params.launcher_role("a").unwrap().value, "arn:aws:iam::1:role/la");
        assert_eq!(params.launcher_role("b").unwrap().value, "arn:aws:iam::1:role/lb");
        assert_eq!(
            params.launcher_role("a").unwrap().key.name,
            "LauncherLambdaRoleArn-a"
        );
    }

    #[tokio::test]
    async fn missing_launcher_role_names_the_server() {
        let config = StackConfig::new("example.com")
            .with_server("a", MinecraftServerDef::new(512, 1024))
            .with_server("b", MinecraftServerDef::new(512, 1024));
        let resolver = StaticResolver::new()
            .with(ParameterKey::hosted_zone(), "Z123")
            .with(ParameterKey::launcher_role("a"), "arn:aws:iam::1:role/la");

        let err = StackParameters::resolve(&config, &resolver)
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::TenantParameter { ref key, .. } if key == "b"));
    }

    #[tokio::test]
    async fn missing_hosted_zone_fails() {
        let config = StackConfig::new("example.com");
        let err = StackParameters::resolve(&config, &StaticResolver::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::Parameter(ResolveError::NotFound { .. })));
    }
}
