//! Edition - Game edition and the container settings derived from it

use std::str::FromStr;

/// Network protocol of the game port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

/// Settings that follow from the edition tag alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditionConfig {
    pub image: &'static str,
    pub port: u16,
    pub protocol: Protocol,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Edition {
    #[default]
    Java,
    Bedrock,
}

impl Edition {
    pub fn tag(&self) -> &'static str {
        match self {
            Edition::Java => "java",
            Edition::Bedrock => "bedrock",
        }
    }

    pub fn config(&self) -> EditionConfig {
        match self {
            Edition::Java => EditionConfig {
                image: "itzg/minecraft-server",
                port: 25565,
                protocol: Protocol::Tcp,
            },
            Edition::Bedrock => EditionConfig {
                image: "itzg/minecraft-bedrock-server",
                port: 19132,
                protocol: Protocol::Udp,
            },
        }
    }
}

impl std::fmt::Display for Edition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Edition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "java" => Ok(Edition::Java),
            "bedrock" => Ok(Edition::Bedrock),
            other => Err(format!(
                "unknown edition '{}'. Must be one of: java, bedrock",
                other
            )),
        }
    }
}
