//! Error types for configuration loading and topology construction

use thiserror::Error;

use crate::resolver::ResolveError;
use crate::resource::ResourceId;

/// Errors raised while reading the stack configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A required setting is not present
    #[error("Missing required setting: {0}")]
    Missing(String),

    /// A setting is present but cannot be used
    #[error("Invalid value for {var}: '{value}' ({reason})")]
    Invalid {
        var: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid(
        var: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Invalid {
            var: var.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Structural errors in the resource graph
#[derive(Debug, Error, PartialEq)]
pub enum TopologyError {
    #[error("Resource {0} is defined more than once")]
    Duplicate(ResourceId),

    #[error("Resource {from} references {to}, which is not in the topology")]
    DanglingReference { from: ResourceId, to: ResourceId },
}

/// Errors that abort a build. No partial topology is ever returned.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Server '{key}' has an invalid key: {reason}")]
    InvalidServerKey { key: String, reason: String },

    #[error("Server '{key}' is missing required field `{field}` (deployment default is {default}; set it explicitly)")]
    MissingServerField {
        key: String,
        field: &'static str,
        default: u32,
    },

    #[error("Failed to resolve cross-stack parameter for server '{key}': {source}")]
    TenantParameter {
        key: String,
        #[source]
        source: ResolveError,
    },

    #[error("Failed to resolve cross-stack parameter: {0}")]
    Parameter(#[from] ResolveError),

    #[error("Parameter {0} was not resolved before building")]
    Unresolved(String),

    #[error(transparent)]
    Topology(#[from] TopologyError),
}

pub type BuildResult<T> = Result<T, BuildError>;
