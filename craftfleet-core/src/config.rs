//! Stack configuration
//!
//! Loaded once from the process environment and never mutated afterwards.
//! The server map comes from a JSON document; a malformed document is the one
//! recoverable configuration error and degrades to an empty map.

use std::collections::BTreeMap;

use log::warn;
use serde::Deserialize;

use crate::edition::Edition;
use crate::error::ConfigError;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_SHUTDOWN_MINUTES: &str = "20";
pub const DEFAULT_STARTUP_MINUTES: &str = "10";
pub const DEFAULT_TASK_CPU: u32 = 2048;
pub const DEFAULT_TASK_MEMORY: u32 = 8192;

/// Per-server overrides from the server map
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinecraftServerDef {
    /// CPU units for the task
    pub cpu: Option<u32>,
    /// Memory for the task in MiB
    pub memory: Option<u32>,
    /// Environment passed to the server container
    #[serde(default)]
    pub container_env: BTreeMap<String, String>,
}

impl MinecraftServerDef {
    pub fn new(cpu: u32, memory: u32) -> Self {
        Self {
            cpu: Some(cpu),
            memory: Some(memory),
            container_env: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.container_env.insert(key.into(), value.into());
        self
    }
}

/// Where the shared network comes from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NetworkSource {
    /// Create a dedicated VPC
    #[default]
    Create,
    /// Look up an existing VPC by id
    Existing(String),
}

/// SMS provider credentials handed through to the watchdog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmsCredentials {
    pub from_number: String,
    pub to_number: String,
    pub account_id: String,
    pub auth_code: String,
}

impl SmsCredentials {
    pub fn is_configured(&self) -> bool {
        !self.from_number.is_empty()
            && !self.to_number.is_empty()
            && !self.account_id.is_empty()
            && !self.auth_code.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StackConfig {
    pub domain_name: String,
    pub server_region: String,
    pub edition: Edition,
    /// Idle minutes after the last connection before scaling to zero
    pub shutdown_minutes: String,
    /// Minutes after boot to wait for a first connection
    pub startup_minutes: String,
    pub use_spot: bool,
    /// Deployment-wide task size. Never merged into server definitions.
    pub default_task_cpu: u32,
    pub default_task_memory: u32,
    pub network: NetworkSource,
    pub notification_email: Option<String>,
    pub sms: SmsCredentials,
    /// Account used in ARNs; a placeholder is rendered when unset
    pub account_id: Option<String>,
    pub debug: bool,
    pub servers: BTreeMap<String, MinecraftServerDef>,
}

impl StackConfig {
    /// Minimal configuration with defaults for everything but the domain
    pub fn new(domain_name: impl Into<String>) -> Self {
        Self {
            domain_name: domain_name.into(),
            server_region: DEFAULT_REGION.to_string(),
            edition: Edition::default(),
            shutdown_minutes: DEFAULT_SHUTDOWN_MINUTES.to_string(),
            startup_minutes: DEFAULT_STARTUP_MINUTES.to_string(),
            use_spot: true,
            default_task_cpu: DEFAULT_TASK_CPU,
            default_task_memory: DEFAULT_TASK_MEMORY,
            network: NetworkSource::Create,
            notification_email: None,
            sms: SmsCredentials::default(),
            account_id: None,
            debug: false,
            servers: BTreeMap::new(),
        }
    }

    pub fn with_edition(mut self, edition: Edition) -> Self {
        self.edition = edition;
        self
    }

    pub fn with_server(mut self, key: impl Into<String>, def: MinecraftServerDef) -> Self {
        self.servers.insert(key.into(), def);
        self
    }

    pub fn with_notification_email(mut self, email: impl Into<String>) -> Self {
        self.notification_email = Some(email.into());
        self
    }

    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load using an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let domain_name =
            get("DOMAIN_NAME").ok_or_else(|| ConfigError::Missing("DOMAIN_NAME".into()))?;

        let edition = match get("MINECRAFT_EDITION") {
            Some(raw) => raw
                .parse::<Edition>()
                .map_err(|reason| ConfigError::invalid("MINECRAFT_EDITION", &raw, reason))?,
            None => Edition::default(),
        };

        let shutdown_minutes = minutes(
            get("SHUTDOWN_MINUTES"),
            "SHUTDOWN_MINUTES",
            DEFAULT_SHUTDOWN_MINUTES,
        )?;
        let startup_minutes = minutes(
            get("STARTUP_MINUTES"),
            "STARTUP_MINUTES",
            DEFAULT_STARTUP_MINUTES,
        )?;

        let use_spot = get("USE_FARGATE_SPOT")
            .map(|v| parse_flag(&v))
            .unwrap_or(true);

        let default_task_cpu = number(get("TASK_CPU"), "TASK_CPU", DEFAULT_TASK_CPU)?;
        let default_task_memory =
            number(get("TASK_MEMORY"), "TASK_MEMORY", DEFAULT_TASK_MEMORY)?;

        let network = match get("VPC_ID") {
            Some(id) => NetworkSource::Existing(id),
            None => NetworkSource::Create,
        };

        let sms = SmsCredentials {
            from_number: get("TWILIO_PHONE_FROM").unwrap_or_default(),
            to_number: get("TWILIO_PHONE_TO").unwrap_or_default(),
            account_id: get("TWILIO_ACCOUNT_ID").unwrap_or_default(),
            auth_code: get("TWILIO_AUTH_CODE").unwrap_or_default(),
        };

        let servers = get("MINECRAFT_SERVERS")
            .map(|raw| parse_servers(&raw))
            .unwrap_or_default();

        Ok(Self {
            domain_name,
            server_region: get("SERVER_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            edition,
            shutdown_minutes,
            startup_minutes,
            use_spot,
            default_task_cpu,
            default_task_memory,
            network,
            notification_email: get("SNS_EMAIL_ADDRESS"),
            sms,
            account_id: get("AWS_ACCOUNT_ID"),
            debug: get("DEBUG").map(|v| parse_flag(&v)).unwrap_or(false),
            servers,
        })
    }
}

/// Parse the server map. Malformed JSON yields an empty map and a warning.
pub fn parse_servers(raw: &str) -> BTreeMap<String, MinecraftServerDef> {
    match serde_json::from_str::<BTreeMap<String, MinecraftServerDef>>(raw) {
        Ok(servers) => servers,
        Err(e) => {
            warn!(
                "MINECRAFT_SERVERS is not a valid server map ({}); continuing with no servers",
                e
            );
            BTreeMap::new()
        }
    }
}

/// Interpret a boolean-ish environment value
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn minutes(raw: Option<String>, var: &str, default: &str) -> Result<String, ConfigError> {
    match raw {
        Some(value) => {
            let trimmed = value.trim();
            trimmed.parse::<u32>().map_err(|_| {
                ConfigError::invalid(var, &value, "expected a whole number of minutes")
            })?;
            Ok(trimmed.to_string())
        }
        None => Ok(default.to_string()),
    }
}

fn number(raw: Option<String>, var: &str, default: u32) -> Result<u32, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::invalid(var, &value, "expected a whole number")),
        None => Ok(default),
    }
}
