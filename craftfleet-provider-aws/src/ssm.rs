//! SSM Parameter Store lookups
//!
//! Parameters can live in any region, so one client is kept per region and
//! created on first use.

use std::collections::HashMap;

use aws_sdk_ssm::Client as SsmClient;
use aws_sdk_ssm::config::Region;
use aws_sdk_ssm::error::{DisplayErrorContext, SdkError};
use aws_sdk_ssm::operation::get_parameter::GetParameterError;
use craftfleet_core::resolver::{
    BoxFuture, ParameterKey, ParameterResolver, ResolveError, ResolveResult,
};
use log::debug;
use tokio::sync::Mutex;

/// Resolver backed by `ssm:GetParameter`
#[derive(Default)]
pub struct SsmParameterResolver {
    clients: Mutex<HashMap<String, SsmClient>>,
}

impl SsmParameterResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a pre-built client for one region (for testing)
    pub fn with_client(region: impl Into<String>, client: SsmClient) -> Self {
        Self {
            clients: Mutex::new(HashMap::from([(region.into(), client)])),
        }
    }

    async fn client(&self, region: &str) -> SsmClient {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(region) {
            return client.clone();
        }

        debug!("Creating SSM client for {}", region);
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        let client = SsmClient::new(&config);
        clients.insert(region.to_string(), client.clone());
        client
    }

    async fn get_parameter(&self, key: &ParameterKey) -> ResolveResult<String> {
        let client = self.client(&key.region).await;
        debug!("GetParameter {}", key);

        let output = client
            .get_parameter()
            .name(&key.name)
            .send()
            .await
            .map_err(|err| classify(key, err))?;

        output
            .parameter()
            .and_then(|parameter| parameter.value())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ResolveError::unavailable(key, "parameter has no value"))
    }
}

impl ParameterResolver for SsmParameterResolver {
    fn resolve(&self, key: &ParameterKey) -> BoxFuture<'_, ResolveResult<String>> {
        let key = key.clone();
        Box::pin(async move { self.get_parameter(&key).await })
    }
}

/// `ParameterNotFound` is reported as missing; anything else as unavailable
fn classify(key: &ParameterKey, err: SdkError<GetParameterError>) -> ResolveError {
    match err.as_service_error() {
        Some(service_err) if service_err.is_parameter_not_found() => ResolveError::not_found(key),
        _ => ResolveError::unavailable(key, DisplayErrorContext(&err).to_string()),
    }
}
