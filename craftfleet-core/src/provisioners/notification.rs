//! Operator notifications

use log::debug;

use crate::error::TopologyError;
use crate::policy::PolicyStatement;
use crate::resource::{Resource, ResourceId, Value};
use crate::topology::Topology;

pub const TOPIC_NAME: &str = "minecraft-notifications";
pub const SUBSCRIPTION_NAME: &str = "minecraft-notifications-email";

/// Whether the watchdogs have a topic to publish to
#[derive(Debug, Clone, Default, PartialEq)]
pub enum NotificationTopic {
    #[default]
    Disabled,
    Enabled(ResourceId),
}

impl NotificationTopic {
    /// Create a topic with one email subscription, or nothing at all
    pub fn provision(
        topology: &mut Topology,
        email: Option<&str>,
    ) -> Result<Self, TopologyError> {
        let Some(email) = email else {
            debug!("Notifications: disabled");
            return Ok(Self::Disabled);
        };

        let topic = topology.add_shared(
            Resource::new("sns.topic", TOPIC_NAME).with_attribute("display_name", "Minecraft"),
        )?;
        topology.add_shared(
            Resource::new("sns.subscription", SUBSCRIPTION_NAME)
                .with_attribute("topic_arn", topic.attr("arn"))
                .with_attribute("protocol", "email")
                .with_attribute("endpoint", email),
        )?;

        debug!("Notifications: {} -> {}", topic, email);
        Ok(Self::Enabled(topic))
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled(_))
    }

    /// Value of the watchdog's `SNSTOPIC` variable. Empty means disabled.
    pub fn watchdog_value(&self) -> Value {
        match self {
            Self::Disabled => Value::string(""),
            Self::Enabled(topic) => topic.attr("arn"),
        }
    }

    /// Publish grant for a task role
    pub fn publish_statement(&self) -> Option<PolicyStatement> {
        match self {
            Self::Disabled => None,
            Self::Enabled(topic) => {
                Some(PolicyStatement::allow(["sns:Publish"]).on(topic.attr("arn")))
            }
        }
    }
}
