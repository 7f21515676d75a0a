//! Craftfleet Core
//!
//! Builds the resource topology for a fleet of on-demand Minecraft servers
//! that share one cluster, one file system and one network

pub mod config;
pub mod edition;
pub mod error;
pub mod naming;
pub mod policy;
pub mod provisioners;
pub mod resolver;
pub mod resource;
pub mod stack;
pub mod topology;
